// EDB - Ethereum Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Branch candidate extraction.
//!
//! Conditions of `require(...)`, `if` and the ternary operator are split into their
//! boolean leaves. Each leaf is a branch candidate, tagged with whether a taken JUMPI
//! on that leaf means it evaluated to true.

use std::collections::BTreeMap;

use crate::{AstNode, NodeId, NodeKind, Offset, SourceTree, Traversal};

/// Branch candidates of `tree`: leaf condition offset to "jump means true".
pub fn collect_branches(tree: &SourceTree) -> BTreeMap<Offset, bool> {
    let mut branches = BTreeMap::new();

    for contract in tree.contracts() {
        for base in tree.descendants(contract, Traversal::all(), |node| is_branch_base(tree, node)) {
            for (leaf, jump_means_true) in leaf_conditions(tree, base) {
                branches.insert(tree.node(leaf).offset(), jump_means_true);
            }
        }
    }

    branches
}

/// `require(...)` calls, `if` statements and conditionals.
fn is_branch_base(tree: &SourceTree, node: &AstNode) -> bool {
    match &node.kind {
        NodeKind::FunctionCall { expression, .. } => is_identifier(tree, *expression, "require"),
        NodeKind::IfStatement { .. } | NodeKind::Conditional { .. } => true,
        _ => false,
    }
}

pub(crate) fn is_identifier(tree: &SourceTree, id: NodeId, expected: &str) -> bool {
    matches!(&tree.node(id).kind, NodeKind::Identifier { name, .. } if name == expected)
}

fn leaf_conditions(tree: &SourceTree, base: NodeId) -> Vec<(NodeId, bool)> {
    let base_node = tree.node(base);
    // an `if` jumps over its body when the condition is false
    let (condition, jump_means_true) = match &base_node.kind {
        NodeKind::FunctionCall { .. } => (base, true),
        NodeKind::IfStatement { condition } => (*condition, false),
        NodeKind::Conditional { condition } => (*condition, true),
        _ => return Vec::new(),
    };

    let connectives = boolean_connectives(tree, condition);
    if connectives.is_empty() {
        let leaf = match &base_node.kind {
            NodeKind::FunctionCall { arguments, .. } => match arguments.first() {
                Some(argument) => *argument,
                None => return Vec::new(),
            },
            _ => unwrap_unary(tree, condition),
        };
        return vec![(leaf, jump_means_true)];
    }

    let mut leaves = Vec::new();
    for connective in connectives {
        let NodeKind::BinaryOperation { left, right, .. } = &tree.node(connective).kind else {
            continue;
        };
        for operand in [*left, *right] {
            if !boolean_connectives(tree, operand).is_empty() {
                continue;
            }
            let jump = match left_side_operator(tree, operand, base_node.depth) {
                Some(operator) => operator == "||",
                None => jump_means_true,
            };
            leaves.push((unwrap_unary(tree, operand), jump));
        }
    }
    leaves
}

/// `&&` and `||` operations at or below `id`.
fn boolean_connectives(tree: &SourceTree, id: NodeId) -> Vec<NodeId> {
    tree.descendants(id, Traversal::all().with_self(), |node| node.kind.is_boolean_connective())
}

/// The operator of the nearest enclosing boolean operation that has `id` on its left
/// side, looking no higher than `min_depth`. `None` means `id` is the rightmost operand
/// of its chain.
fn left_side_operator(tree: &SourceTree, id: NodeId, min_depth: usize) -> Option<&str> {
    tree.ancestors(id, min_depth, |node| node.kind.is_boolean_operation()).into_iter().find_map(
        |ancestor| match &tree.node(ancestor).kind {
            NodeKind::BinaryOperation { operator, left, .. } if tree.is_within(id, *left) => {
                Some(operator.as_str())
            }
            _ => None,
        },
    )
}

/// Some compilers do not map the negation itself to bytecode, only its operand.
fn unwrap_unary(tree: &SourceTree, id: NodeId) -> NodeId {
    match &tree.node(id).kind {
        NodeKind::UnaryOperation { sub_expression, .. } => *sub_expression,
        _ => id,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn identifier(name: &str, start: usize) -> Value {
        json!({
            "nodeType": "Identifier", "src": format!("{start}:1:0"), "name": name,
            "typeDescriptions": {"typeString": "bool"}
        })
    }

    fn binary(operator: &str, left: Value, right: Value, src: &str) -> Value {
        json!({
            "nodeType": "BinaryOperation", "src": src, "operator": operator,
            "typeDescriptions": {"typeString": "bool"},
            "leftExpression": left, "rightExpression": right
        })
    }

    fn not(operand: Value, src: &str) -> Value {
        json!({
            "nodeType": "UnaryOperation", "src": src, "operator": "!",
            "typeDescriptions": {"typeString": "bool"}, "subExpression": operand
        })
    }

    fn require(argument: Value) -> Value {
        json!({
            "nodeType": "ExpressionStatement", "src": "20:30:0",
            "expression": {
                "nodeType": "FunctionCall", "src": "20:29:0",
                "typeDescriptions": {"typeString": "tuple()"},
                "expression": {"nodeType": "Identifier", "src": "20:7:0", "name": "require"},
                "arguments": [argument]
            }
        })
    }

    fn if_statement(condition: Value) -> Value {
        json!({
            "nodeType": "IfStatement", "src": "20:30:0", "condition": condition,
            "trueBody": {"nodeType": "Block", "src": "45:5:0", "statements": []}
        })
    }

    fn source(statement: Value) -> SourceTree {
        SourceTree::from_json(&json!({
            "nodeType": "SourceUnit", "src": "0:100:0", "absolutePath": "B.sol",
            "nodes": [{
                "nodeType": "ContractDefinition", "src": "0:100:0", "name": "B",
                "nodes": [{
                    "nodeType": "FunctionDefinition", "src": "5:90:0", "name": "f",
                    "body": {"nodeType": "Block", "src": "15:80:0", "statements": [statement]}
                }]
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_require_single_condition() {
        let tree = source(require(identifier("a", 28)));
        let branches = collect_branches(&tree);
        assert_eq!(branches, BTreeMap::from([(Offset::new(28, 29), true)]));
    }

    #[test]
    fn test_require_conjunction() {
        // require(a && b)
        let tree = source(require(binary("&&", identifier("a", 28), identifier("b", 33), "28:6:0")));
        let branches = collect_branches(&tree);

        assert_eq!(branches.len(), 2);
        // `b` is rightmost and keeps the polarity of the require
        assert!(branches[&Offset::new(33, 34)]);
        // `a` sits on the left of `&&`: the jump skips `b` when `a` is false
        assert!(!branches[&Offset::new(28, 29)]);
    }

    #[test]
    fn test_if_with_negation() {
        // if (!a) { ... }
        let tree = source(if_statement(not(identifier("a", 25), "24:2:0")));
        let branches = collect_branches(&tree);
        assert_eq!(branches, BTreeMap::from([(Offset::new(25, 26), false)]));
    }

    #[test]
    fn test_if_nested_chain() {
        // if ((a || b) && !c) { ... }
        let left = binary("||", identifier("a", 25), identifier("b", 30), "25:6:0");
        let condition = binary("&&", left, not(identifier("c", 36), "35:2:0"), "24:13:0");
        let tree = source(if_statement(condition));
        let branches = collect_branches(&tree);

        assert_eq!(branches.len(), 3);
        assert!(branches[&Offset::new(25, 26)]);
        assert!(!branches[&Offset::new(30, 31)]);
        assert!(!branches[&Offset::new(36, 37)]);
    }

    #[test]
    fn test_require_without_arguments() {
        let tree = source(json!({
            "nodeType": "ExpressionStatement", "src": "20:10:0",
            "expression": {
                "nodeType": "FunctionCall", "src": "20:9:0",
                "expression": {"nodeType": "Identifier", "src": "20:7:0", "name": "require"},
                "arguments": []
            }
        }));
        assert!(collect_branches(&tree).is_empty());
    }
}

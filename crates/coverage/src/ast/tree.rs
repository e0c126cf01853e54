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

//! An arena of typed nodes built from a solc JSON AST, with depth-bounded queries.

use std::collections::HashMap;

use serde_json::{Map, Value};
use thiserror::Error;

use super::{AstNode, NodeId, NodeKind, Offset, SourceRange, StatementKind};

/// Errors raised while building a [`SourceTree`].
#[derive(Debug, Error)]
pub enum AstError {
    /// The AST could not be parsed as JSON.
    #[error("invalid AST JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A node is not a JSON object.
    #[error("AST node is not a JSON object")]
    NotAnObject,
    /// The root of the AST is not a `SourceUnit`.
    #[error("expected a `SourceUnit` at the root of the AST, found `{0}`")]
    NotASourceUnit(String),
    /// A node lacks a field the engine relies on.
    #[error("`{node_type}` node is missing field `{field}`")]
    MissingField {
        /// The node's `nodeType`.
        node_type: String,
        /// The missing field.
        field: &'static str,
    },
    /// A `src` attribute is not of the form `start:length:file`.
    #[error("invalid source range `{0}`")]
    InvalidSourceRange(String),
}

/// Bounds and options for [`SourceTree::descendants`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Traversal {
    /// Maximum depth to visit, relative to the starting node.
    pub max_depth: Option<usize>,
    /// Whether the starting node itself may match.
    pub include_self: bool,
    /// Do not descend into nodes that matched.
    pub stop_at_match: bool,
}

impl Traversal {
    /// Unbounded traversal that excludes the starting node.
    pub const fn all() -> Self {
        Self { max_depth: None, include_self: false, stop_at_match: false }
    }

    /// Traversal bounded at `depth` levels below the starting node.
    pub const fn depth(depth: usize) -> Self {
        Self { max_depth: Some(depth), include_self: false, stop_at_match: false }
    }

    /// Let the starting node match as well.
    pub const fn with_self(mut self) -> Self {
        self.include_self = true;
        self
    }

    /// Stop descending below matching nodes.
    pub const fn outermost(mut self) -> Self {
        self.stop_at_match = true;
        self
    }
}

/// The AST of one compiled file.
#[derive(Debug, Clone)]
pub struct SourceTree {
    nodes: Vec<AstNode>,
}

impl SourceTree {
    /// Parse a solc JSON AST from a string.
    pub fn from_json_str(ast: &str) -> Result<Self, AstError> {
        let value: Value = serde_json::from_str(ast)?;
        Self::from_json(&value)
    }

    /// Build the tree from a solc JSON AST whose root is a `SourceUnit`.
    pub fn from_json(ast: &Value) -> Result<Self, AstError> {
        let mut tree = Self { nodes: Vec::new() };
        let root = tree.build(ast, None, 0)?;

        match &tree.node(root).kind {
            NodeKind::SourceUnit { .. } => Ok(tree),
            other => Err(AstError::NotASourceUnit(other.node_type().to_string())),
        }
    }

    /// The `SourceUnit` node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Access a node by id.
    pub fn node(&self, id: NodeId) -> &AstNode {
        &self.nodes[id.0]
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the tree holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in pre-order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &AstNode)> {
        self.nodes.iter().enumerate().map(|(index, node)| (NodeId(index), node))
    }

    /// The path of the file, as given to the compiler.
    pub fn absolute_path(&self) -> &str {
        match &self.node(self.root()).kind {
            NodeKind::SourceUnit { absolute_path } => absolute_path,
            _ => "",
        }
    }

    /// The file index solc assigned to this source.
    pub fn file_index(&self) -> Option<usize> {
        self.node(self.root()).src.file
    }

    /// Contract definitions declared at the top level of the file.
    pub fn contracts(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.node(self.root())
            .children
            .iter()
            .copied()
            .filter(|id| matches!(self.node(*id).kind, NodeKind::ContractDefinition { .. }))
    }

    /// Descendants of `from` matching `predicate`, in pre-order.
    pub fn descendants(
        &self,
        from: NodeId,
        traversal: Traversal,
        predicate: impl Fn(&AstNode) -> bool,
    ) -> Vec<NodeId> {
        self.descendants_pruned(from, traversal, predicate, |_| false)
    }

    /// Like [`Self::descendants`], but never visits nodes for which `prune` holds, nor
    /// anything below them.
    pub fn descendants_pruned(
        &self,
        from: NodeId,
        traversal: Traversal,
        predicate: impl Fn(&AstNode) -> bool,
        prune: impl Fn(&AstNode) -> bool,
    ) -> Vec<NodeId> {
        let base_depth = self.node(from).depth;
        let mut found = Vec::new();
        let mut stack = vec![from];

        while let Some(id) = stack.pop() {
            let node = self.node(id);
            if prune(node) {
                continue;
            }

            if (id != from || traversal.include_self) && predicate(node) {
                found.push(id);
                if traversal.stop_at_match {
                    continue;
                }
            }

            if traversal.max_depth.is_some_and(|max| node.depth - base_depth >= max) {
                continue;
            }
            stack.extend(node.children.iter().rev());
        }

        found
    }

    /// Ancestors of `id` matching `predicate`, nearest first, up to and including the
    /// ancestor at depth `min_depth`.
    pub fn ancestors(
        &self,
        id: NodeId,
        min_depth: usize,
        predicate: impl Fn(&AstNode) -> bool,
    ) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut current = self.node(id).parent;

        while let Some(parent) = current {
            let node = self.node(parent);
            if node.depth < min_depth {
                break;
            }
            if predicate(node) {
                found.push(parent);
            }
            current = node.parent;
        }

        found
    }

    /// Returns true if `id` is `ancestor` or lies below it.
    pub fn is_within(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.node(node).parent;
        }
        false
    }

    /// The deepest node whose source range covers `offset`.
    pub fn covering_node(&self, offset: Offset) -> Option<NodeId> {
        self.iter()
            .filter(|(_, node)| node.offset().contains(&offset))
            .fold(None, |deepest: Option<(NodeId, usize)>, (id, node)| match deepest {
                Some((_, depth)) if depth >= node.depth => deepest,
                _ => Some((id, node.depth)),
            })
            .map(|(id, _)| id)
    }

    /// The contract function whose body covers `offset`.
    pub fn enclosing_function(&self, offset: Offset) -> Option<NodeId> {
        self.descendants(self.root(), Traversal::depth(2), |node| {
            matches!(node.kind, NodeKind::FunctionDefinition { .. })
                && node.offset().contains(&offset)
        })
        .into_iter()
        .find(|id| {
            self.node(*id).parent.is_some_and(|parent| {
                matches!(self.node(parent).kind, NodeKind::ContractDefinition { .. })
            })
        })
    }

    /// `Contract.function` for a function definition, with `<constructor>`,
    /// `<fallback>`, or `<kind>` standing in for unnamed functions.
    pub fn function_full_name(&self, function: NodeId) -> Option<String> {
        let node = self.node(function);
        let NodeKind::FunctionDefinition { name, kind, is_constructor } = &node.kind else {
            return None;
        };
        let NodeKind::ContractDefinition { name: contract, .. } = &self.node(node.parent?).kind
        else {
            return None;
        };

        let name = match kind.as_deref() {
            _ if !name.is_empty() => name.clone(),
            Some(kind) if kind != "function" => format!("<{kind}>"),
            _ if *is_constructor => "<constructor>".to_string(),
            _ => "<fallback>".to_string(),
        };
        Some(format!("{contract}.{name}"))
    }

    fn build(
        &mut self,
        value: &Value,
        parent: Option<NodeId>,
        depth: usize,
    ) -> Result<NodeId, AstError> {
        let object = value.as_object().ok_or(AstError::NotAnObject)?;
        let node_type = object
            .get("nodeType")
            .and_then(Value::as_str)
            .ok_or_else(|| missing("<unknown>", "nodeType"))?;
        let src: SourceRange = object
            .get("src")
            .and_then(Value::as_str)
            .ok_or_else(|| missing(node_type, "src"))?
            .parse()?;

        let id = NodeId(self.nodes.len());
        self.nodes.push(AstNode {
            id: object.get("id").and_then(Value::as_i64),
            kind: NodeKind::Other(node_type.to_string()),
            src,
            parent,
            children: Vec::new(),
            depth,
        });

        let mut fields = HashMap::new();
        for (key, field) in object {
            let mut ids = Vec::new();
            self.collect_nodes(field, id, depth + 1, &mut ids)?;
            if !ids.is_empty() {
                fields.insert(key.as_str(), ids);
            }
        }

        let mut children: Vec<NodeId> = fields.values().flatten().copied().collect();
        children.sort_by_key(|child| (self.nodes[child.0].src.start, child.0));

        let kind = node_kind(node_type, object, &fields)?;
        let node = &mut self.nodes[id.0];
        node.kind = kind;
        node.children = children;
        Ok(id)
    }

    /// Collect the nodes directly nested in `value`, looking through plain objects and
    /// arrays that are not nodes themselves.
    fn collect_nodes(
        &mut self,
        value: &Value,
        parent: NodeId,
        depth: usize,
        out: &mut Vec<NodeId>,
    ) -> Result<(), AstError> {
        match value {
            Value::Object(object) if object.contains_key("nodeType") => {
                out.push(self.build(value, Some(parent), depth)?);
            }
            Value::Object(object) => {
                for field in object.values() {
                    self.collect_nodes(field, parent, depth, out)?;
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.collect_nodes(item, parent, depth, out)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn missing(node_type: &str, field: &'static str) -> AstError {
    AstError::MissingField { node_type: node_type.to_string(), field }
}

fn text(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

fn integers(object: &Map<String, Value>, key: &str) -> Vec<i64> {
    object
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default()
}

fn type_string(object: &Map<String, Value>) -> Option<String> {
    object
        .get("typeDescriptions")
        .and_then(|descriptions| descriptions.get("typeString"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn node_kind(
    node_type: &str,
    object: &Map<String, Value>,
    fields: &HashMap<&str, Vec<NodeId>>,
) -> Result<NodeKind, AstError> {
    let child = |field: &'static str| {
        fields.get(field).and_then(|ids| ids.first().copied()).ok_or_else(|| missing(node_type, field))
    };

    if let Some(statement) = StatementKind::from_node_type(node_type) {
        return Ok(NodeKind::Statement(statement));
    }

    let kind = match node_type {
        "SourceUnit" => NodeKind::SourceUnit {
            absolute_path: text(object, "absolutePath")
                .ok_or_else(|| missing(node_type, "absolutePath"))?,
        },
        "ContractDefinition" => NodeKind::ContractDefinition {
            name: text(object, "name").ok_or_else(|| missing(node_type, "name"))?,
            contract_kind: text(object, "contractKind").unwrap_or_else(|| "contract".to_string()),
            linearized_base_contracts: integers(object, "linearizedBaseContracts"),
            contract_dependencies: integers(object, "contractDependencies"),
        },
        "FunctionDefinition" => {
            let kind = text(object, "kind");
            let is_constructor = object.get("isConstructor").and_then(Value::as_bool)
                == Some(true)
                || kind.as_deref() == Some("constructor");
            NodeKind::FunctionDefinition {
                name: text(object, "name").unwrap_or_default(),
                kind,
                is_constructor,
            }
        }
        "IfStatement" => NodeKind::IfStatement { condition: child("condition")? },
        "Conditional" => NodeKind::Conditional { condition: child("condition")? },
        "FunctionCall" => NodeKind::FunctionCall {
            expression: child("expression")?,
            arguments: fields.get("arguments").cloned().unwrap_or_default(),
            type_string: type_string(object),
        },
        "BinaryOperation" => NodeKind::BinaryOperation {
            operator: text(object, "operator").ok_or_else(|| missing(node_type, "operator"))?,
            left: child("leftExpression")?,
            right: child("rightExpression")?,
            type_string: type_string(object),
        },
        "UnaryOperation" => NodeKind::UnaryOperation {
            operator: text(object, "operator").ok_or_else(|| missing(node_type, "operator"))?,
            sub_expression: child("subExpression")?,
        },
        "IndexAccess" => NodeKind::IndexAccess,
        "Identifier" => NodeKind::Identifier {
            name: text(object, "name").unwrap_or_default(),
            referenced_declaration: object.get("referencedDeclaration").and_then(Value::as_i64),
        },
        "UsingForDirective" => NodeKind::UsingForDirective {
            library: object
                .get("libraryName")
                .and_then(|library| library.get("referencedDeclaration"))
                .and_then(Value::as_i64),
        },
        "UserDefinedTypeName" => NodeKind::UserDefinedTypeName {
            referenced_declaration: object.get("referencedDeclaration").and_then(Value::as_i64),
        },
        other => NodeKind::Other(other.to_string()),
    };
    Ok(kind)
}

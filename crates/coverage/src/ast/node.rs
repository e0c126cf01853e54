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

//! Typed AST nodes.
//!
//! Only the node kinds the coverage engine inspects carry a structured payload. Every
//! other solc node type is kept as [`NodeKind::Other`] so that traversal and offset
//! queries still see it.

use super::{Offset, SourceRange};

/// Index of a node inside a [`SourceTree`](super::SourceTree) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node in the arena.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Simple statements that can be attributed to bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// `ExpressionStatement`
    Expression,
    /// `VariableDeclarationStatement`
    VariableDeclaration,
    /// `Return`
    Return,
    /// `Break`
    Break,
    /// `Continue`
    Continue,
    /// `Throw`
    Throw,
    /// `EmitStatement`
    Emit,
    /// `RevertStatement`
    Revert,
    /// `PlaceholderStatement`
    Placeholder,
}

impl StatementKind {
    /// Map a solc `nodeType` to a statement kind.
    pub fn from_node_type(node_type: &str) -> Option<Self> {
        Some(match node_type {
            "ExpressionStatement" => Self::Expression,
            "VariableDeclarationStatement" => Self::VariableDeclaration,
            "Return" => Self::Return,
            "Break" => Self::Break,
            "Continue" => Self::Continue,
            "Throw" => Self::Throw,
            "EmitStatement" => Self::Emit,
            "RevertStatement" => Self::Revert,
            "PlaceholderStatement" => Self::Placeholder,
            _ => return None,
        })
    }

    /// The solc `nodeType` of this statement kind.
    pub fn node_type(&self) -> &'static str {
        match self {
            Self::Expression => "ExpressionStatement",
            Self::VariableDeclaration => "VariableDeclarationStatement",
            Self::Return => "Return",
            Self::Break => "Break",
            Self::Continue => "Continue",
            Self::Throw => "Throw",
            Self::Emit => "EmitStatement",
            Self::Revert => "RevertStatement",
            Self::Placeholder => "PlaceholderStatement",
        }
    }
}

/// The kind of an AST node, with the attributes the engine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A compiled file.
    SourceUnit {
        /// Path of the file as given to the compiler.
        absolute_path: String,
    },
    /// A contract, library or interface.
    ContractDefinition {
        /// Contract name.
        name: String,
        /// `contract`, `library` or `interface`.
        contract_kind: String,
        /// C3 linearization of the inheritance graph, ids of contract nodes.
        linearized_base_contracts: Vec<i64>,
        /// Contracts created by this contract.
        contract_dependencies: Vec<i64>,
    },
    /// A function definition.
    FunctionDefinition {
        /// Function name, empty for constructors and fallback functions.
        name: String,
        /// `function`, `constructor`, `fallback`, `receive`; absent on old compilers.
        kind: Option<String>,
        /// Set for constructors on any compiler version.
        is_constructor: bool,
    },
    /// A simple statement.
    Statement(StatementKind),
    /// `if (condition) ...`
    IfStatement {
        /// The condition expression.
        condition: NodeId,
    },
    /// `condition ? a : b`
    Conditional {
        /// The condition expression.
        condition: NodeId,
    },
    /// A call, including type conversions.
    FunctionCall {
        /// The callee.
        expression: NodeId,
        /// Call arguments in order.
        arguments: Vec<NodeId>,
        /// `typeDescriptions.typeString` of the call result.
        type_string: Option<String>,
    },
    /// `left op right`
    BinaryOperation {
        /// Operator, e.g. `&&`.
        operator: String,
        /// Left operand.
        left: NodeId,
        /// Right operand.
        right: NodeId,
        /// `typeDescriptions.typeString` of the result.
        type_string: Option<String>,
    },
    /// `op sub` or `sub op`
    UnaryOperation {
        /// Operator, e.g. `!`.
        operator: String,
        /// The operand.
        sub_expression: NodeId,
    },
    /// `base[index]`
    IndexAccess,
    /// A name reference.
    Identifier {
        /// The referenced name.
        name: String,
        /// Id of the referenced declaration.
        referenced_declaration: Option<i64>,
    },
    /// `using Library for Type`
    UsingForDirective {
        /// Id of the library declaration.
        library: Option<i64>,
    },
    /// A user-defined type name, e.g. a contract used as a variable type.
    UserDefinedTypeName {
        /// Id of the referenced declaration.
        referenced_declaration: Option<i64>,
    },
    /// Any other node type.
    Other(String),
}

impl NodeKind {
    /// The solc `nodeType` of this node.
    pub fn node_type(&self) -> &str {
        match self {
            Self::SourceUnit { .. } => "SourceUnit",
            Self::ContractDefinition { .. } => "ContractDefinition",
            Self::FunctionDefinition { .. } => "FunctionDefinition",
            Self::Statement(kind) => kind.node_type(),
            Self::IfStatement { .. } => "IfStatement",
            Self::Conditional { .. } => "Conditional",
            Self::FunctionCall { .. } => "FunctionCall",
            Self::BinaryOperation { .. } => "BinaryOperation",
            Self::UnaryOperation { .. } => "UnaryOperation",
            Self::IndexAccess => "IndexAccess",
            Self::Identifier { .. } => "Identifier",
            Self::UsingForDirective { .. } => "UsingForDirective",
            Self::UserDefinedTypeName { .. } => "UserDefinedTypeName",
            Self::Other(node_type) => node_type,
        }
    }

    /// Returns true for `&&` and `||` operations producing a `bool`.
    pub fn is_boolean_connective(&self) -> bool {
        matches!(
            self,
            Self::BinaryOperation { operator, type_string: Some(ty), .. }
                if ty == "bool" && (operator == "&&" || operator == "||")
        )
    }

    /// Returns true for any binary operation producing a `bool`.
    pub fn is_boolean_operation(&self) -> bool {
        matches!(self, Self::BinaryOperation { type_string: Some(ty), .. } if ty == "bool")
    }

    /// Returns true for constructor definitions.
    pub fn is_constructor(&self) -> bool {
        matches!(self, Self::FunctionDefinition { is_constructor: true, .. })
    }
}

/// A node in a [`SourceTree`](super::SourceTree).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AstNode {
    /// The solc node id.
    pub id: Option<i64>,
    /// The node kind.
    pub kind: NodeKind,
    /// Where the node sits in its source file.
    pub src: SourceRange,
    /// Parent node, `None` for the source unit.
    pub parent: Option<NodeId>,
    /// Child nodes ordered by their position in the source.
    pub children: Vec<NodeId>,
    /// Distance from the source unit.
    pub depth: usize,
}

impl AstNode {
    /// The `(start, end)` offset of the node.
    pub fn offset(&self) -> Offset {
        self.src.offset()
    }
}

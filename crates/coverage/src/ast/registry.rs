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

//! Cross-file view over the ASTs of one compilation: contract lookup by name or solc id,
//! and contract dependency resolution.

use std::collections::{BTreeSet, HashMap};

use itertools::Itertools;
use serde_json::Value;

use super::{AstError, AstNode, NodeId, NodeKind, Offset, SourceTree, Traversal};

/// Location of a contract definition inside a [`SourceRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContractRef {
    tree: usize,
    node: NodeId,
}

/// All source trees of a compilation.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    trees: Vec<SourceTree>,
    by_file: HashMap<usize, usize>,
    symbols: HashMap<i64, ContractRef>,
}

impl SourceRegistry {
    /// Index the given trees.
    pub fn new(trees: impl IntoIterator<Item = SourceTree>) -> Self {
        let trees: Vec<_> = trees.into_iter().collect();
        let mut by_file = HashMap::new();
        let mut symbols = HashMap::new();

        for (index, tree) in trees.iter().enumerate() {
            if let Some(file) = tree.file_index() {
                by_file.insert(file, index);
            }
            for node in tree.contracts() {
                if let Some(id) = tree.node(node).id {
                    symbols.insert(id, ContractRef { tree: index, node });
                }
            }
        }

        Self { trees, by_file, symbols }
    }

    /// Build every tree from solc JSON ASTs and index them.
    pub fn from_asts<'a>(asts: impl IntoIterator<Item = &'a Value>) -> Result<Self, AstError> {
        let trees = asts.into_iter().map(SourceTree::from_json).collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(trees))
    }

    /// All source trees, in the order they were added.
    pub fn trees(&self) -> &[SourceTree] {
        &self.trees
    }

    /// The tree solc assigned `file_index` to.
    pub fn tree_for_file(&self, file_index: usize) -> Option<&SourceTree> {
        self.by_file.get(&file_index).map(|index| &self.trees[*index])
    }

    /// Every contract definition, in source order per file.
    pub fn contracts(&self) -> impl Iterator<Item = Contract<'_>> + '_ {
        self.trees.iter().enumerate().flat_map(move |(index, tree)| {
            tree.contracts().map(move |node| self.contract(ContractRef { tree: index, node }))
        })
    }

    /// Resolve a contract reference.
    pub fn contract(&self, reference: ContractRef) -> Contract<'_> {
        let tree = &self.trees[reference.tree];
        Contract { reference, tree, node: tree.node(reference.node) }
    }

    /// The first contract declared with `name`.
    pub fn find_contract(&self, name: &str) -> Option<Contract<'_>> {
        self.contracts().find(|contract| contract.name() == name)
    }

    /// The contract with solc node id `id`.
    pub fn contract_by_id(&self, id: i64) -> Option<Contract<'_>> {
        self.symbols.get(&id).map(|reference| self.contract(*reference))
    }

    /// Every contract `contract` needs to be compiled and debugged: referenced
    /// contracts and libraries, closed transitively, plus its base contracts. The
    /// contract itself is excluded and the result is sorted by name.
    pub fn dependencies(&self, contract: &Contract<'_>) -> Vec<Contract<'_>> {
        let mut resolved = BTreeSet::new();
        let mut pending = self.immediate_dependencies(contract.reference);

        while let Some(reference) = pending.pop() {
            if reference == contract.reference || !resolved.insert(reference) {
                continue;
            }
            pending.extend(self.immediate_dependencies(reference));
        }

        if let NodeKind::ContractDefinition { linearized_base_contracts, .. } = &contract.node.kind {
            resolved.extend(
                linearized_base_contracts.iter().filter_map(|id| self.symbols.get(id)).copied(),
            );
        }
        resolved.remove(&contract.reference);

        resolved
            .into_iter()
            .map(|reference| self.contract(reference))
            .sorted_by(|a, b| a.name().cmp(b.name()))
            .collect()
    }

    /// Returns true if `contract` or any of its base contracts declares a fallback
    /// function.
    pub fn has_fallback(&self, contract: &Contract<'_>) -> bool {
        if contract.declares_fallback() {
            return true;
        }
        let NodeKind::ContractDefinition { linearized_base_contracts, .. } = &contract.node.kind
        else {
            return false;
        };
        linearized_base_contracts
            .iter()
            .filter_map(|id| self.contract_by_id(*id))
            .any(|base| base.declares_fallback())
    }

    fn immediate_dependencies(&self, reference: ContractRef) -> Vec<ContractRef> {
        let tree = &self.trees[reference.tree];
        let lookup = |id: &Option<i64>| id.and_then(|id| self.symbols.get(&id)).copied();
        let mut found = Vec::new();

        if let NodeKind::ContractDefinition { contract_dependencies, .. } =
            &tree.node(reference.node).kind
        {
            found.extend(contract_dependencies.iter().filter_map(|id| self.symbols.get(id)));
        }

        for id in tree.descendants(reference.node, Traversal::all(), |_| true) {
            let dependency = match &tree.node(id).kind {
                NodeKind::UsingForDirective { library } => lookup(library),
                NodeKind::UserDefinedTypeName { referenced_declaration } => {
                    lookup(referenced_declaration)
                }
                NodeKind::FunctionCall { expression, type_string: Some(ty), .. }
                    if ty.starts_with("contract ") =>
                {
                    match &tree.node(*expression).kind {
                        NodeKind::Identifier { referenced_declaration, .. } => {
                            lookup(referenced_declaration)
                        }
                        _ => None,
                    }
                }
                NodeKind::Identifier { referenced_declaration, .. } => {
                    lookup(referenced_declaration)
                        .filter(|target| self.contract(*target).kind() == "library")
                }
                _ => None,
            };
            found.extend(dependency);
        }

        found
    }
}

/// A contract definition together with the tree that declares it.
#[derive(Debug, Clone, Copy)]
pub struct Contract<'a> {
    reference: ContractRef,
    tree: &'a SourceTree,
    node: &'a AstNode,
}

impl<'a> Contract<'a> {
    /// Registry reference of this contract.
    pub fn reference(&self) -> ContractRef {
        self.reference
    }

    /// The declaring source tree.
    pub fn tree(&self) -> &'a SourceTree {
        self.tree
    }

    /// The contract node id within its tree.
    pub fn node_id(&self) -> NodeId {
        self.reference.node
    }

    /// Contract name.
    pub fn name(&self) -> &'a str {
        match &self.node.kind {
            NodeKind::ContractDefinition { name, .. } => name,
            _ => "",
        }
    }

    /// `contract`, `library` or `interface`.
    pub fn kind(&self) -> &'a str {
        match &self.node.kind {
            NodeKind::ContractDefinition { contract_kind, .. } => contract_kind,
            _ => "",
        }
    }

    /// Offset of the contract definition in its file.
    pub fn offset(&self) -> Offset {
        self.node.offset()
    }

    /// Path of the declaring file.
    pub fn path(&self) -> &'a str {
        self.tree.absolute_path()
    }

    /// File index of the declaring file.
    pub fn file_index(&self) -> Option<usize> {
        self.tree.file_index()
    }

    /// Function definitions declared directly in the contract.
    pub fn functions(&self) -> impl Iterator<Item = &'a AstNode> + 'a {
        let tree = self.tree;
        self.node
            .children
            .iter()
            .map(move |id| tree.node(*id))
            .filter(|node| matches!(node.kind, NodeKind::FunctionDefinition { .. }))
    }

    /// Returns true if the contract itself declares a fallback function, under either
    /// the `fallback` kind or the legacy unnamed form.
    pub fn declares_fallback(&self) -> bool {
        self.functions().any(|function| match &function.kind {
            NodeKind::FunctionDefinition { name, kind, is_constructor } => {
                kind.as_deref() == Some("fallback")
                    || (kind.is_none() && name.is_empty() && !is_constructor)
            }
            _ => false,
        })
    }
}

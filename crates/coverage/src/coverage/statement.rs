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

//! Statement collection and attribution.
//!
//! Every simple statement outside of constructors is a statement candidate. While
//! walking the bytecode, the first instruction mapping into a candidate claims it, and
//! the candidate is never handed out again.

use std::collections::{BTreeSet, HashMap};

use crate::{
    CoverageId, IdCounter, InstructionRecord, NodeKind, Offset, SourceTree, StatementMap,
    Traversal,
};

/// Offsets of all statements in `tree` that end up in deployed code.
pub fn collect_statements(tree: &SourceTree) -> BTreeSet<Offset> {
    tree.descendants_pruned(
        tree.root(),
        Traversal::all(),
        |node| matches!(node.kind, NodeKind::Statement(_)),
        |node| node.kind.is_constructor(),
    )
    .into_iter()
    .map(|id| tree.node(id).offset())
    .collect()
}

/// Hands out statement ids as the walk reaches unclaimed statements.
#[derive(Debug, Default)]
pub(crate) struct StatementAttributor {
    pending: HashMap<String, BTreeSet<Offset>>,
    map: StatementMap,
}

impl StatementAttributor {
    /// Start with the given unclaimed statements per path. Every path gets an entry in
    /// the resulting map, even if nothing is attributed to it.
    pub(crate) fn new(pending: impl IntoIterator<Item = (String, BTreeSet<Offset>)>) -> Self {
        let pending: HashMap<_, _> = pending.into_iter().collect();
        let map = pending.keys().map(|path| (path.clone(), Default::default())).collect();
        Self { pending, map }
    }

    /// Attribute the last record in `records` to its function and, if it is the first
    /// instruction reaching a statement, to that statement.
    pub(crate) fn attribute(
        &mut self,
        records: &mut [InstructionRecord],
        tree: &SourceTree,
        ids: &mut IdCounter,
    ) -> Option<CoverageId> {
        let (current, previous) = records.split_last_mut()?;
        let offset = current.offset?;

        if let Some(previous) = previous.last().filter(|previous| previous.offset == Some(offset)) {
            current.function = previous.function.clone();
            return None;
        }

        let function = tree.function_full_name(tree.enclosing_function(offset)?)?;
        current.function = Some(function.clone());

        let path = current.path.as_ref()?;
        let pending = self.pending.get_mut(path)?;
        let statement = pending.iter().find(|statement| statement.contains(&offset)).copied()?;
        pending.remove(&statement);

        let id = ids.next_id();
        self.map.entry(path.clone()).or_default().entry(function).or_default().insert(id, statement);
        current.statement = Some(id);
        Some(id)
    }

    /// Number of statements nobody claimed.
    pub(crate) fn unclaimed(&self) -> usize {
        self.pending.values().map(BTreeSet::len).sum()
    }

    pub(crate) fn into_map(self) -> StatementMap {
        self.map
    }
}

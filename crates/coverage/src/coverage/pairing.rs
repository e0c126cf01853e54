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

//! Pairing of branch candidates with the JUMPI that decides them.
//!
//! An instruction mapping to a candidate activates it. The next JUMPI in the same file
//! finalizes every active candidate as an `(activation, jumpi)` pair. Reaching a
//! candidate again after it was finalized discards the pair and activates it anew, so
//! only the last pairing survives.

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;

use crate::{opcode::mnemonic, BranchLocation, BranchMap, IdCounter, InstructionRecord, Offset};

/// Branch bookkeeping for one walk.
#[derive(Debug, Default)]
pub(crate) struct BranchTracker {
    candidates: HashMap<String, BTreeMap<Offset, bool>>,
    /// Candidates awaiting a JUMPI, with the index of their activating instruction.
    active: HashMap<String, IndexMap<Offset, usize>>,
    /// Finalized `(activation, jumpi)` instruction index pairs.
    finalized: BTreeMap<String, IndexMap<Offset, (usize, usize)>>,
}

impl BranchTracker {
    pub(crate) fn new(
        candidates: impl IntoIterator<Item = (String, BTreeMap<Offset, bool>)>,
    ) -> Self {
        Self { candidates: candidates.into_iter().collect(), ..Default::default() }
    }

    /// Feed the instruction at `index`, mapped to `offset` in `path`.
    pub(crate) fn observe(&mut self, path: &str, offset: Offset, op: &str, index: usize) {
        let active = self.active.entry(path.to_string()).or_default();

        if op == mnemonic::JUMPI && !active.is_empty() {
            let finalized = self.finalized.entry(path.to_string()).or_default();
            for (offset, activation) in active.drain(..) {
                finalized.insert(offset, (activation, index));
            }
        } else if self.candidates.get(path).is_some_and(|branches| branches.contains_key(&offset)) {
            if let Some(finalized) = self.finalized.get_mut(path) {
                finalized.shift_remove(&offset);
            }
            active.insert(offset, index);
        }
    }

    /// Number of finalized pairs.
    pub(crate) fn finalized(&self) -> usize {
        self.finalized.values().map(IndexMap::len).sum()
    }

    /// Assign ids to finalized pairs and build the branch map. Pairs whose activating
    /// instruction has no function are dropped.
    pub(crate) fn into_branch_map(
        self,
        records: &mut [InstructionRecord],
        ids: &mut IdCounter,
    ) -> BranchMap {
        let mut map: BranchMap =
            self.candidates.keys().map(|path| (path.clone(), Default::default())).collect();

        for (path, pairs) in self.finalized {
            for (offset, (activation, jumpi)) in pairs {
                let Some(function) = records.get(activation).and_then(|r| r.function.clone())
                else {
                    continue;
                };
                let Some(&jump) = self.candidates.get(&path).and_then(|c| c.get(&offset)) else {
                    continue;
                };

                let id = ids.next_id();
                for index in [activation, jumpi] {
                    if let Some(record) = records.get_mut(index) {
                        record.branch = Some(id);
                    }
                }
                map.entry(path.clone())
                    .or_default()
                    .entry(function)
                    .or_default()
                    .insert(id, BranchLocation(offset.start(), offset.end(), jump));
            }
        }

        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CoverageId;

    const PATH: &str = "A.sol";

    fn tracker() -> BranchTracker {
        BranchTracker::new([(
            PATH.to_string(),
            BTreeMap::from([(Offset::new(10, 15), true), (Offset::new(20, 25), false)]),
        )])
    }

    fn records(ops: &[&str]) -> Vec<InstructionRecord> {
        ops.iter()
            .enumerate()
            .map(|(pc, op)| InstructionRecord {
                function: Some("A.f".to_string()),
                ..InstructionRecord::new(pc, *op)
            })
            .collect()
    }

    #[test]
    fn test_activation_then_jumpi() {
        let mut tracker = tracker();
        tracker.observe(PATH, Offset::new(10, 15), "DUP1", 0);
        tracker.observe(PATH, Offset::new(3, 4), "PUSH1", 1);
        tracker.observe(PATH, Offset::new(3, 4), "JUMPI", 2);
        assert_eq!(tracker.finalized(), 1);

        let mut records = records(&["DUP1", "PUSH1", "JUMPI"]);
        let mut ids = IdCounter::default();
        let map = tracker.into_branch_map(&mut records, &mut ids);

        assert_eq!(records[0].branch, Some(CoverageId(0)));
        assert_eq!(records[1].branch, None);
        assert_eq!(records[2].branch, Some(CoverageId(0)));
        assert_eq!(map[PATH]["A.f"][&CoverageId(0)], BranchLocation(10, 15, true));
    }

    #[test]
    fn test_jumpi_on_candidate_without_active_branch_activates() {
        let mut tracker = tracker();
        tracker.observe(PATH, Offset::new(10, 15), "JUMPI", 0);
        assert_eq!(tracker.finalized(), 0);

        tracker.observe(PATH, Offset::new(30, 31), "JUMPI", 1);
        assert_eq!(tracker.finalized(), 1);
    }

    #[test]
    fn test_revisit_discards_earlier_pair() {
        let mut tracker = tracker();
        tracker.observe(PATH, Offset::new(10, 15), "DUP1", 0);
        tracker.observe(PATH, Offset::new(20, 25), "DUP1", 1);
        tracker.observe(PATH, Offset::new(0, 1), "JUMPI", 2);
        assert_eq!(tracker.finalized(), 2);

        // the first candidate is reached again but never followed by a JUMPI
        tracker.observe(PATH, Offset::new(10, 15), "ISZERO", 3);
        assert_eq!(tracker.finalized(), 1);

        let mut records = records(&["DUP1", "DUP1", "JUMPI", "ISZERO"]);
        let mut ids = IdCounter::default();
        let map = tracker.into_branch_map(&mut records, &mut ids);
        assert_eq!(map[PATH]["A.f"].len(), 1);
        assert_eq!(map[PATH]["A.f"][&CoverageId(0)], BranchLocation(20, 25, false));
        assert_eq!(records[0].branch, None);
    }

    #[test]
    fn test_pair_without_function_is_dropped() {
        let mut tracker = tracker();
        tracker.observe(PATH, Offset::new(10, 15), "DUP1", 0);
        tracker.observe(PATH, Offset::new(0, 1), "JUMPI", 1);

        let mut records = vec![InstructionRecord::new(0, "DUP1"), InstructionRecord::new(1, "JUMPI")];
        let mut ids = IdCounter::default();
        let map = tracker.into_branch_map(&mut records, &mut ids);
        assert!(map[PATH].is_empty());
        assert_eq!(ids.issued(), 0);
    }
}

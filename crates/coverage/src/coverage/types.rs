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

//! Output types of the coverage engine.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{JumpType, Offset};

/// Identifier of a statement or branch.
///
/// Statements and branches of one contract draw from the same [`IdCounter`], so their
/// ids never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoverageId(pub u64);

impl fmt::Display for CoverageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic source of [`CoverageId`]s, scoped to one contract.
#[derive(Debug, Clone, Default)]
pub struct IdCounter {
    next: u64,
}

impl IdCounter {
    /// Hand out the next id.
    pub fn next_id(&mut self) -> CoverageId {
        let id = CoverageId(self.next);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.next
    }
}

/// Debug and coverage information for one instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionRecord {
    /// Program counter. It keys the PC map and is not repeated in the record.
    #[serde(skip)]
    pub pc: usize,
    /// Mnemonic.
    pub op: String,
    /// Source file the instruction maps to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Source range the instruction maps to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<Offset>,
    /// `Contract.function` the instruction belongs to.
    #[serde(rename = "fn", default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    /// Statement first reached by this instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<CoverageId>,
    /// Branch this instruction activates or decides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<CoverageId>,
    /// Jump annotation, omitted for regular instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jump: Option<JumpType>,
    /// Inlined immediate of a push, as printed by the compiler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Developer-facing explanation of why this instruction reverts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev: Option<String>,
    /// Set on the dispatcher's shared REVERT.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub first_revert: bool,
    /// Set on jumps to the shared REVERT that stand in for a `revert()` call.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub jump_revert: bool,
}

impl InstructionRecord {
    /// A record with only its position and mnemonic set.
    pub fn new(pc: usize, op: impl Into<String>) -> Self {
        Self { pc, op: op.into(), ..Default::default() }
    }
}

/// A branch location: `(start, end, jump_means_true)`.
///
/// The flag tells whether taking the JUMPI means the condition evaluated to true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchLocation(pub usize, pub usize, pub bool);

impl BranchLocation {
    /// Source range of the branch condition.
    pub fn offset(&self) -> Offset {
        Offset::new(self.0, self.1)
    }

    /// Whether a taken jump means the condition was true.
    pub fn jump_means_true(&self) -> bool {
        self.2
    }
}

/// Program counter to instruction record.
pub type PcMap = BTreeMap<usize, InstructionRecord>;

/// `path -> function -> id -> statement offset`.
pub type StatementMap = BTreeMap<String, BTreeMap<String, BTreeMap<CoverageId, Offset>>>;

/// `path -> function -> id -> branch location`.
pub type BranchMap = BTreeMap<String, BTreeMap<String, BTreeMap<CoverageId, BranchLocation>>>;

/// Statement and branch maps, as stored in build artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageMap {
    /// Statement map.
    pub statements: StatementMap,
    /// Branch map.
    pub branches: BranchMap,
}

/// Everything the instruction walk produces for one contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageData {
    /// Per-instruction debug data.
    pub pc_map: PcMap,
    /// Statement coverage map.
    pub statement_map: StatementMap,
    /// Branch coverage map.
    pub branch_map: BranchMap,
}

impl CoverageData {
    /// Total number of statement and branch ids.
    pub fn id_count(&self) -> usize {
        let statements: usize =
            self.statement_map.values().flat_map(BTreeMap::values).map(BTreeMap::len).sum();
        let branches: usize =
            self.branch_map.values().flat_map(BTreeMap::values).map(BTreeMap::len).sum();
        statements + branches
    }

    /// Split into the PC map and the coverage map.
    pub fn into_parts(self) -> (PcMap, CoverageMap) {
        (self.pc_map, CoverageMap { statements: self.statement_map, branches: self.branch_map })
    }
}

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

//! The instruction walk.
//!
//! The expanded source map and the decoded opcodes are consumed in lock-step. Each step
//! appends one [`InstructionRecord`] and feeds it to the statement attributor, the
//! branch tracker and the revert heuristics. Revert reconciliation and branch id
//! assignment run once the walk is complete.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, trace};

use super::{
    collect_branches, collect_statements,
    pairing::BranchTracker,
    revert::{apply_nonpayable_guard, RevertTracker},
    statement::StatementAttributor,
};
use crate::{
    decode_opcodes, expand_source_map, opcode::mnemonic, Contract, CoverageData, CoverageError,
    DecodedOpcode, EngineConfig, IdCounter, InstructionRecord, JumpType, NodeKind, Offset,
    SourceMapEntry, SourceRegistry, SourceTree,
};

/// Statement and branch candidates of every file in a compilation.
///
/// Collected once and shared by all contracts of the compilation.
#[derive(Debug, Clone, Default)]
pub struct CoverageCandidates {
    statements: HashMap<String, BTreeSet<Offset>>,
    branches: HashMap<String, BTreeMap<Offset, bool>>,
}

impl CoverageCandidates {
    /// Collect candidates from every tree in `registry`.
    pub fn collect(registry: &SourceRegistry) -> Self {
        let mut candidates = Self::default();
        for tree in registry.trees() {
            let path = tree.absolute_path().to_string();
            candidates.statements.insert(path.clone(), collect_statements(tree));
            candidates.branches.insert(path, collect_branches(tree));
        }
        candidates
    }

    /// Statement offsets of `path`.
    pub fn statements(&self, path: &str) -> Option<&BTreeSet<Offset>> {
        self.statements.get(path)
    }

    /// Branch candidates of `path`, with their jump polarity.
    pub fn branches(&self, path: &str) -> Option<&BTreeMap<Offset, bool>> {
        self.branches.get(path)
    }
}

/// State threaded through every step of the walk.
struct WalkerState<'a> {
    /// Trees of the contract and its dependencies, by solc file index.
    sources: HashMap<usize, &'a SourceTree>,
    records: Vec<InstructionRecord>,
    ids: IdCounter,
    statements: StatementAttributor,
    branches: BranchTracker,
    reverts: RevertTracker,
}

/// Generate the PC map, statement map and branch map of `contract`'s deployed code.
///
/// `source_map` and `opcodes` are solc's `deployedBytecode.sourceMap` and
/// `deployedBytecode.opcodes`. An empty opcode string yields empty maps.
pub fn generate_coverage_data(
    registry: &SourceRegistry,
    candidates: &CoverageCandidates,
    contract: &Contract<'_>,
    source_map: &str,
    opcodes: &str,
    config: &EngineConfig,
) -> Result<CoverageData, CoverageError> {
    let name = contract.name();
    let ops = decode_opcodes(opcodes)
        .map_err(|source| CoverageError::Opcode { contract: name.to_string(), source })?;
    if ops.is_empty() {
        debug!("Contract {name} has no deployed code");
        return Ok(CoverageData::default());
    }

    let entries = expand_source_map(source_map)
        .map_err(|source| CoverageError::SourceMap { contract: name.to_string(), source })?;
    if entries.len() > ops.len() {
        return Err(CoverageError::LengthMismatch {
            contract: name.to_string(),
            source_map: entries.len(),
            opcodes: ops.len(),
        });
    }

    let sources: HashMap<usize, &SourceTree> = std::iter::once(*contract)
        .chain(registry.dependencies(contract))
        .filter_map(|source| Some((source.file_index()?, source.tree())))
        .collect();
    let paths: BTreeSet<String> =
        sources.values().map(|tree| tree.absolute_path().to_string()).collect();

    let mut state = WalkerState {
        sources,
        records: Vec::with_capacity(entries.len()),
        ids: IdCounter::default(),
        statements: StatementAttributor::new(paths.iter().map(|path| {
            (path.clone(), candidates.statements(path).cloned().unwrap_or_default())
        })),
        branches: BranchTracker::new(paths.iter().map(|path| {
            (path.clone(), candidates.branches(path).cloned().unwrap_or_default())
        })),
        reverts: RevertTracker::new(
            config.revert_heuristics && !registry.has_fallback(contract),
        ),
    };

    for (index, (entry, op)) in entries.iter().zip(&ops).enumerate() {
        step(&mut state, index, entry, op, ops.get(index + 1));
    }

    Ok(finish(state, name))
}

/// Consume one source map entry and its instruction.
fn step(
    state: &mut WalkerState<'_>,
    index: usize,
    entry: &SourceMapEntry,
    op: &DecodedOpcode<'_>,
    next_op: Option<&DecodedOpcode<'_>>,
) {
    let mut record = InstructionRecord::new(op.pc, op.mnemonic);
    if entry.jump != JumpType::Regular {
        record.jump = Some(entry.jump);
    }
    record.value = op.immediate.map(str::to_string);
    state.records.push(record);
    state.reverts.detect_fallback(&mut state.records);

    let Some(file) = entry.file_index else {
        apply_nonpayable_guard(&mut state.records);
        return;
    };
    let Some(tree) = state.sources.get(&file).copied() else {
        trace!(pc = op.pc, file, "Source map refers to a file outside of the contract's sources");
        return;
    };
    let path = tree.absolute_path();
    let Some(record) = state.records.last_mut() else {
        return;
    };
    record.path = Some(path.to_string());

    let Some(offset) = entry.offset() else {
        return;
    };
    record.offset = Some(offset);
    if op.mnemonic == mnemonic::INVALID {
        record.dev = invalid_reason(tree, offset).map(str::to_string);
    }

    state.branches.observe(path, offset, op.mnemonic, index);
    state.statements.attribute(&mut state.records, tree, &mut state.ids);

    if let Some(record) = state.records.last() {
        state.reverts.track_jump(record, index + 1, next_op.map(|op| op.mnemonic));
    }
}

/// Run the post-walk passes and assemble the maps.
fn finish(state: WalkerState<'_>, contract: &str) -> CoverageData {
    let WalkerState { sources, mut records, mut ids, statements, branches, reverts } = state;

    trace!(
        contract,
        unclaimed_statements = statements.unclaimed(),
        forwarded_reverts = reverts.candidates(),
        fallback = ?reverts.fallback_address(),
        "Walk complete"
    );

    let trees: HashMap<String, &SourceTree> =
        sources.values().map(|tree| (tree.absolute_path().to_string(), *tree)).collect();
    reverts.reconcile(&mut records, &trees);

    let statement_count = ids.issued();
    let finalized = branches.finalized();
    let branch_map = branches.into_branch_map(&mut records, &mut ids);
    debug!(
        "Generated coverage data for {contract}: {} instructions, {statement_count} statements, {} of {finalized} branches",
        records.len(),
        ids.issued() - statement_count,
    );

    CoverageData {
        pc_map: records.into_iter().map(|record| (record.pc, record)).collect(),
        statement_map: statements.into_map(),
        branch_map,
    }
}

/// Explain an INVALID instruction by the innermost node it maps to.
fn invalid_reason(tree: &SourceTree, offset: Offset) -> Option<&'static str> {
    match &tree.node(tree.covering_node(offset)?).kind {
        NodeKind::IndexAccess => Some("Index out of range"),
        NodeKind::BinaryOperation { operator, .. } if operator == "/" => Some("Division by zero"),
        NodeKind::BinaryOperation { operator, .. } if operator == "%" => Some("Modulus by zero"),
        _ => None,
    }
}

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

//! Revert heuristics.
//!
//! solc routes many failure paths to a single REVERT at the end of the function
//! dispatcher instead of emitting one per `revert()`. The first REVERT preceded by
//! [`FALLBACK_REVERT_PRELUDE`] is that shared target. Pushes of its address that feed a
//! jump are collected, and after the walk they are matched against argument-less
//! `revert()` calls that otherwise have no bytecode of their own.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::trace;

use crate::{
    opcode::{mnemonic, parse_hex_literal},
    AstNode, InstructionRecord, NodeKind, Offset, SourceTree, Traversal,
};

use super::branch::is_identifier;

/// Instructions immediately before the shared REVERT: `JUMPDEST PUSH1 0x00 DUP1 REVERT`.
pub const FALLBACK_REVERT_PRELUDE: [&str; 3] =
    [mnemonic::JUMPDEST, mnemonic::PUSH1, mnemonic::DUP1];

/// Distance in bytes from the prelude's JUMPDEST to the REVERT.
pub const FALLBACK_REVERT_DISTANCE: usize = 4;

/// Records in a nonpayable guard, from its CALLVALUE to its REVERT inclusive.
pub const NONPAYABLE_GUARD_WINDOW: usize = 8;

/// Explanation attached to nonpayable guard reverts.
pub const NONPAYABLE_MESSAGE: &str = "Cannot send ether to nonpayable function";

/// Tracks the shared REVERT and jumps to it.
#[derive(Debug, Default)]
pub(crate) struct RevertTracker {
    enabled: bool,
    fallback: Option<u64>,
    candidates: IndexMap<(String, Offset), Vec<usize>>,
}

impl RevertTracker {
    pub(crate) fn new(enabled: bool) -> Self {
        Self { enabled, ..Default::default() }
    }

    /// Address of the shared REVERT's JUMPDEST, once found.
    pub(crate) fn fallback_address(&self) -> Option<u64> {
        self.fallback
    }

    /// Check whether the last record is the shared REVERT.
    pub(crate) fn detect_fallback(&mut self, records: &mut [InstructionRecord]) {
        if !self.enabled || self.fallback.is_some() {
            return;
        }
        let Some((current, previous)) = records.split_last_mut() else {
            return;
        };
        if current.op != mnemonic::REVERT || previous.len() < FALLBACK_REVERT_PRELUDE.len() {
            return;
        }

        let prelude = &previous[previous.len() - FALLBACK_REVERT_PRELUDE.len()..];
        if prelude.iter().map(|record| record.op.as_str()).eq(FALLBACK_REVERT_PRELUDE) {
            self.fallback =
                current.pc.checked_sub(FALLBACK_REVERT_DISTANCE).map(|address| address as u64);
            current.first_revert = true;
            trace!(pc = current.pc, "found shared fallback revert");
        }
    }

    /// Record `record` as a forwarded revert if it pushes the shared REVERT's address
    /// and `next_op` jumps there. `jump_index` is the index of that jump.
    pub(crate) fn track_jump(
        &mut self,
        record: &InstructionRecord,
        jump_index: usize,
        next_op: Option<&str>,
    ) {
        let Some(fallback) = self.fallback else {
            return;
        };
        let (Some(path), Some(offset), Some(value)) = (&record.path, record.offset, &record.value)
        else {
            return;
        };
        if parse_hex_literal(value) != Some(fallback)
            || !matches!(next_op, Some(mnemonic::JUMP | mnemonic::JUMPI))
        {
            return;
        }

        self.candidates.entry((path.clone(), offset)).or_default().push(jump_index);
    }

    /// Number of collected forwarded-revert jumps.
    pub(crate) fn candidates(&self) -> usize {
        self.candidates.values().map(Vec::len).sum()
    }

    /// Attribute forwarded-revert jumps to argument-less `revert()` calls that no
    /// instruction maps to.
    ///
    /// Calls are visited in source order within the function enclosing each push, and
    /// each claims the earliest unclaimed jump of that push.
    pub(crate) fn reconcile(
        self,
        records: &mut [InstructionRecord],
        trees: &HashMap<String, &SourceTree>,
    ) {
        for ((path, offset), jumps) in self.candidates {
            let Some(tree) = trees.get(&path) else {
                continue;
            };
            let Some(function) = tree.enclosing_function(offset) else {
                continue;
            };

            let calls =
                tree.descendants(function, Traversal::all(), |node| is_bare_revert(tree, node));
            let mut jumps = jumps.into_iter();
            for call in calls {
                let call_offset = tree.node(call).offset();
                if records.iter().any(|record| record.offset == Some(call_offset)) {
                    continue;
                }
                let Some(index) = jumps.next() else {
                    break;
                };
                if let Some(record) = records.get_mut(index) {
                    record.offset = Some(call_offset);
                    record.jump_revert = true;
                }
            }
        }
    }
}

/// `revert()` without a reason.
fn is_bare_revert(tree: &SourceTree, node: &AstNode) -> bool {
    matches!(
        &node.kind,
        NodeKind::FunctionCall { expression, arguments, .. }
            if arguments.is_empty() && is_identifier(tree, *expression, "revert")
    )
}

/// Tag the last record if it is the REVERT of a nonpayable guard
/// (`CALLVALUE DUP1 ISZERO PUSH2 JUMPI PUSH1 DUP1 REVERT`).
///
/// The REVERT has no source of its own, so it takes over the location of the
/// CALLVALUE that starts the guard.
pub(crate) fn apply_nonpayable_guard(records: &mut [InstructionRecord]) {
    let Some((current, previous)) = records.split_last_mut() else {
        return;
    };
    if current.op != mnemonic::REVERT {
        return;
    }
    let Some(guard) = previous
        .len()
        .checked_sub(NONPAYABLE_GUARD_WINDOW - 1)
        .and_then(|index| previous.get(index))
    else {
        return;
    };
    if guard.op != mnemonic::CALLVALUE {
        return;
    }

    current.dev = Some(NONPAYABLE_MESSAGE.to_string());
    current.function = Some(guard.function.clone().unwrap_or_else(|| "<unknown>".to_string()));
    current.offset = guard.offset;
    current.path = guard.path.clone();
}

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

//! Normalization of unlinked library placeholders.
//!
//! Depending on the compiler version, an unlinked library address appears in bytecode as
//! `__path/to/File.sol:Lib__`, as a hashed `__$...$__` placeholder, or as zeros. All of
//! them are rewritten to `__Lib______...__`, 40 characters wide, so that bytecode of the
//! same contract compares equal across compiler versions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::CoverageError;

/// Width of an address in hex characters.
const ADDRESS_WIDTH: usize = 40;

/// Longest library name that fits in a placeholder.
const MAX_NAME_WIDTH: usize = ADDRESS_WIDTH - 4;

/// Position of one placeholder, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkOffset {
    /// Byte offset of the placeholder in the bytecode.
    pub start: usize,
    /// Placeholder length in bytes, always 20.
    pub length: usize,
}

/// solc's `linkReferences`: `file -> library -> placeholder positions`.
pub type LinkReferences = BTreeMap<String, BTreeMap<String, Vec<LinkOffset>>>;

/// The placeholder written for `library`.
pub fn library_placeholder(library: &str) -> String {
    let name: String = library.chars().take(MAX_NAME_WIDTH).collect();
    format!("__{name:_<width$}__", width = MAX_NAME_WIDTH)
}

/// Rewrite every library placeholder in the hex `bytecode` of `contract`.
///
/// Applying this to already normalized bytecode is a no-op.
pub fn format_link_references(
    contract: &str,
    bytecode: &str,
    references: &LinkReferences,
) -> Result<String, CoverageError> {
    let mut bytecode = bytecode.to_string();

    for (library, offsets) in references.values().flatten() {
        let placeholder = library_placeholder(library);
        for offset in offsets {
            let location = offset.start * 2;
            let range = location..location + ADDRESS_WIDTH;
            if range.end > bytecode.len() || !bytecode.is_char_boundary(location) {
                return Err(CoverageError::LinkReferenceOutOfRange {
                    contract: contract.to_string(),
                    library: library.clone(),
                    start: offset.start,
                });
            }
            bytecode.replace_range(range, &placeholder);
        }
    }

    Ok(bytecode)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn references(library: &str, starts: &[usize]) -> LinkReferences {
        let offsets = starts.iter().map(|start| LinkOffset { start: *start, length: 20 }).collect();
        BTreeMap::from([(
            "contracts/Lib.sol".to_string(),
            BTreeMap::from([(library.to_string(), offsets)]),
        )])
    }

    #[test]
    fn test_placeholder() {
        assert_eq!(library_placeholder("Math"), format!("__Math{}__", "_".repeat(32)));
        assert_eq!(library_placeholder("Math").len(), ADDRESS_WIDTH);

        let long = "L".repeat(50);
        assert_eq!(library_placeholder(&long), format!("__{}__", "L".repeat(36)));
    }

    #[test]
    fn test_format_link_references() {
        let hashed = format!("__${}$__", "a".repeat(34));
        let bytecode = format!("6080{hashed}6040{hashed}00");
        let references = references("Math", &[2, 24]);

        let formatted = format_link_references("Token", &bytecode, &references).unwrap();
        let placeholder = library_placeholder("Math");
        assert_eq!(formatted, format!("6080{placeholder}6040{placeholder}00"));

        // normalizing twice changes nothing
        let again = format_link_references("Token", &formatted, &references).unwrap();
        assert_eq!(again, formatted);
    }

    #[test]
    fn test_out_of_range() {
        let err = format_link_references("Token", "6080", &references("Math", &[1])).unwrap_err();
        assert!(matches!(
            err,
            CoverageError::LinkReferenceOutOfRange { start: 1, ref library, .. } if library == "Math"
        ));
    }
}

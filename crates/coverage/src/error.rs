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

//! Errors raised while generating coverage data and build artifacts.

use thiserror::Error;

use crate::{AstError, OpcodeError, SourceMapError};

/// Errors raised by the coverage engine.
///
/// Malformed compiler output is fatal and names the offending contract. Data that
/// simply cannot be attributed to source is never an error.
#[derive(Debug, Error)]
pub enum CoverageError {
    /// An AST could not be built
    #[error("failed to build AST: {0}")]
    Ast(#[from] AstError),

    /// The compressed source map of a contract is malformed
    #[error("contract `{contract}`: {source}")]
    SourceMap {
        /// Contract name
        contract: String,
        /// The underlying error
        #[source]
        source: SourceMapError,
    },

    /// The opcode string of a contract is malformed
    #[error("contract `{contract}`: {source}")]
    Opcode {
        /// Contract name
        contract: String,
        /// The underlying error
        #[source]
        source: OpcodeError,
    },

    /// The source map describes more instructions than the opcode string holds
    #[error(
        "contract `{contract}`: source map has {source_map} entries but the bytecode only has {opcodes} instructions"
    )]
    LengthMismatch {
        /// Contract name
        contract: String,
        /// Number of source map entries
        source_map: usize,
        /// Number of decoded instructions
        opcodes: usize,
    },

    /// No contract with this name exists in the compilation
    #[error("unknown contract `{0}`")]
    UnknownContract(String),

    /// A library link reference points outside of the bytecode
    #[error("contract `{contract}`: link reference to `{library}` at byte {start} lies outside the bytecode")]
    LinkReferenceOutOfRange {
        /// Contract name
        contract: String,
        /// Library name
        library: String,
        /// Byte offset of the placeholder
        start: usize,
    },
}

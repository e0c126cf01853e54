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

//! EDB Coverage - debug and coverage maps for compiled Solidity contracts
//!
//! Given solc's deployed bytecode, opcode listing and compressed source map, together
//! with the JSON ASTs of the compiled sources, this crate produces:
//!
//! - a PC map from every program counter to its source location, function, statement and
//!   branch, with developer-facing revert explanations where they can be inferred;
//! - a statement map and a branch map keyed by source path and function;
//! - bytecode with normalized library placeholders and a metadata-independent hash.
//!
//! The entry points are [`generate_coverage_data`] for a single contract and
//! [`generate_build_artifacts`] for a whole compilation.

#![recursion_limit = "256"]

pub mod artifact;
pub use artifact::*;

pub mod ast;
pub use ast::*;

pub mod config;
pub use config::*;

pub mod coverage;
pub use coverage::*;

pub mod error;
pub use error::*;

pub mod link;
pub use link::*;

pub mod opcode;
pub use opcode::*;

pub mod sourcemap;
pub use sourcemap::*;

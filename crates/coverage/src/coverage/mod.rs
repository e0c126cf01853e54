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

//! Coverage map generation: statement and branch candidates, the instruction walk, and
//! the heuristics that attribute compiler-generated reverts.

mod branch;
pub use branch::collect_branches;

mod pairing;

mod revert;
pub use revert::{
    FALLBACK_REVERT_DISTANCE, FALLBACK_REVERT_PRELUDE, NONPAYABLE_GUARD_WINDOW, NONPAYABLE_MESSAGE,
};

mod statement;
pub use statement::collect_statements;

mod types;
pub use types::*;

mod walker;
pub use walker::*;

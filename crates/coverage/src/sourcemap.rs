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

//! Expansion of solc's compressed source maps.
//!
//! A source map holds one `;`-separated entry per instruction. Each entry carries up to
//! five `:`-separated fields `s:l:f:j:m` (start, length, file index, jump type and, for
//! newer compilers, modifier depth). An empty or missing field repeats the value of the
//! previous entry, and `-1` in a numeric field means "not available".

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Offset;

/// Maximum number of fields in a single source map entry.
const MAX_FIELDS: usize = 5;

/// The jump annotation of a source map entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum JumpType {
    /// A jump into a function.
    #[serde(rename = "i")]
    In,
    /// A return out of a function.
    #[serde(rename = "o")]
    Out,
    /// A regular jump, or not a jump at all.
    #[default]
    #[serde(rename = "-")]
    Regular,
}

impl JumpType {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "i" => Some(Self::In),
            "o" => Some(Self::Out),
            "-" => Some(Self::Regular),
            _ => None,
        }
    }

    /// Returns the single-character representation used by solc.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "i",
            Self::Out => "o",
            Self::Regular => "-",
        }
    }
}

impl fmt::Display for JumpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully populated source map entry. `None` stands for solc's `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMapEntry {
    /// Start of the source range in bytes.
    pub start: Option<usize>,
    /// Length of the source range in bytes.
    pub length: Option<usize>,
    /// Index of the source file, `None` for compiler-generated glue code.
    pub file_index: Option<usize>,
    /// Jump annotation.
    pub jump: JumpType,
    /// Modifier depth, `0` when the compiler does not emit it.
    pub modifier_depth: usize,
}

impl SourceMapEntry {
    /// Returns the `(start, end)` source range, if the entry has a start.
    pub fn offset(&self) -> Option<Offset> {
        self.start.map(|start| Offset::new(start, start + self.length.unwrap_or(0)))
    }
}

/// Errors raised while expanding a source map.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceMapError {
    /// A field could not be parsed.
    #[error("invalid {field} `{value}` in source map entry {entry}")]
    InvalidField {
        /// Index of the offending entry.
        entry: usize,
        /// Name of the field.
        field: &'static str,
        /// The raw field text.
        value: String,
    },
    /// A field is omitted in the first entry, so there is nothing to inherit.
    #[error("source map entry {entry} omits {field} and has no previous entry")]
    MissingField {
        /// Index of the offending entry.
        entry: usize,
        /// Name of the field.
        field: &'static str,
    },
    /// An entry has more fields than any solc version emits.
    #[error("source map entry {entry} has {count} fields, at most five are allowed")]
    TooManyFields {
        /// Index of the offending entry.
        entry: usize,
        /// Number of fields found.
        count: usize,
    },
}

/// Expand a compressed source map into one entry per instruction.
///
/// An empty string expands to an empty list.
pub fn expand_source_map(source_map: &str) -> Result<Vec<SourceMapEntry>, SourceMapError> {
    if source_map.is_empty() {
        return Ok(Vec::new());
    }

    let mut entries: Vec<SourceMapEntry> = Vec::new();
    for (index, row) in source_map.split(';').enumerate() {
        let entry = expand_entry(index, row, entries.last())?;
        entries.push(entry);
    }
    Ok(entries)
}

fn expand_entry(
    index: usize,
    row: &str,
    previous: Option<&SourceMapEntry>,
) -> Result<SourceMapEntry, SourceMapError> {
    let fields: Vec<&str> = if row.is_empty() { Vec::new() } else { row.split(':').collect() };
    if fields.len() > MAX_FIELDS {
        return Err(SourceMapError::TooManyFields { entry: index, count: fields.len() });
    }
    let field = |i: usize| fields.get(i).copied().filter(|f| !f.is_empty());

    let start = match field(0) {
        Some(value) => parse_position(index, "start", value)?,
        None => inherit(previous, index, "start", |p| p.start)?,
    };
    let length = match field(1) {
        Some(value) => parse_position(index, "length", value)?,
        None => inherit(previous, index, "length", |p| p.length)?,
    };
    let file_index = match field(2) {
        Some(value) => parse_position(index, "file index", value)?,
        None => inherit(previous, index, "file index", |p| p.file_index)?,
    };
    let jump = match field(3) {
        Some(value) => JumpType::parse(value).ok_or_else(|| SourceMapError::InvalidField {
            entry: index,
            field: "jump type",
            value: value.to_string(),
        })?,
        None => inherit(previous, index, "jump type", |p| p.jump)?,
    };
    let modifier_depth = match field(4) {
        Some(value) => value.parse::<usize>().map_err(|_| SourceMapError::InvalidField {
            entry: index,
            field: "modifier depth",
            value: value.to_string(),
        })?,
        None => previous.map(|p| p.modifier_depth).unwrap_or_default(),
    };

    Ok(SourceMapEntry { start, length, file_index, jump, modifier_depth })
}

/// Parse a numeric field where `-1` means "not available".
fn parse_position(
    entry: usize,
    field: &'static str,
    value: &str,
) -> Result<Option<usize>, SourceMapError> {
    let invalid = || SourceMapError::InvalidField { entry, field, value: value.to_string() };
    match value.parse::<i64>().map_err(|_| invalid())? {
        -1 => Ok(None),
        v if v < 0 => Err(invalid()),
        v => usize::try_from(v).map(Some).map_err(|_| invalid()),
    }
}

fn inherit<T>(
    previous: Option<&SourceMapEntry>,
    entry: usize,
    field: &'static str,
    get: impl FnOnce(&SourceMapEntry) -> T,
) -> Result<T, SourceMapError> {
    previous.map(get).ok_or(SourceMapError::MissingField { entry, field })
}

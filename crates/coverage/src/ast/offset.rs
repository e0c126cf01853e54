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

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::AstError;

/// A `(start, end)` byte range in a source file.
///
/// Serialized as a two-element array so that coverage maps stay compatible with the
/// JSON consumed by coverage reporters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Offset(pub usize, pub usize);

impl Offset {
    /// Creates a new offset from its start and end.
    pub const fn new(start: usize, end: usize) -> Self {
        Self(start, end)
    }

    /// Start of the range.
    pub const fn start(&self) -> usize {
        self.0
    }

    /// End of the range, exclusive.
    pub const fn end(&self) -> usize {
        self.1
    }

    /// Returns true if `other` lies entirely within this range.
    pub const fn contains(&self, other: &Self) -> bool {
        self.0 <= other.0 && other.1 <= self.1
    }

    /// Returns true if this range lies entirely within `other`.
    pub const fn is_inside(&self, other: &Self) -> bool {
        other.contains(self)
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.0, self.1)
    }
}

/// The `src` attribute of an AST node: `start:length:fileIndex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceRange {
    /// The start index of this source range.
    pub start: usize,
    /// The length of this source range.
    pub length: usize,
    /// The index of the file of this source range, `None` when solc emits `-1`.
    pub file: Option<usize>,
}

impl SourceRange {
    /// The `(start, end)` offset covered by this range.
    pub fn offset(&self) -> Offset {
        Offset::new(self.start, self.start + self.length)
    }
}

impl FromStr for SourceRange {
    type Err = AstError;

    fn from_str(src: &str) -> Result<Self, Self::Err> {
        let invalid = || AstError::InvalidSourceRange(src.to_string());

        let mut parts = src.split(':');
        let mut next = || parts.next().ok_or_else(invalid)?.parse::<i64>().map_err(|_| invalid());
        let (start, length, file) = (next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }

        // Synthetic nodes carry `-1:-1:-1`, which we map to an empty range at zero.
        let start = usize::try_from(start).unwrap_or_default();
        let length = usize::try_from(length).unwrap_or_default();
        let file = usize::try_from(file).ok();
        Ok(Self { start, length, file })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_containment() {
        let outer = Offset::new(10, 50);
        assert!(outer.contains(&Offset::new(10, 50)));
        assert!(outer.contains(&Offset::new(12, 20)));
        assert!(!outer.contains(&Offset::new(5, 20)));
        assert!(!outer.contains(&Offset::new(40, 51)));
        assert!(Offset::new(12, 20).is_inside(&outer));
    }

    #[test]
    fn test_offset_serializes_as_pair() {
        let json = serde_json::to_string(&Offset::new(3, 9)).unwrap();
        assert_eq!(json, "[3,9]");
    }

    #[test]
    fn test_parse_source_range() {
        let src: SourceRange = "120:35:2".parse().unwrap();
        assert_eq!(src, SourceRange { start: 120, length: 35, file: Some(2) });
        assert_eq!(src.offset(), Offset::new(120, 155));

        let synthetic: SourceRange = "-1:-1:-1".parse().unwrap();
        assert_eq!(synthetic.file, None);

        assert!("1:2".parse::<SourceRange>().is_err());
        assert!("1:2:3:4".parse::<SourceRange>().is_err());
        assert!("a:2:3".parse::<SourceRange>().is_err());
    }
}

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

//! Decoding of solc's `opcodes` output.
//!
//! solc prints deployed code as space-separated mnemonics, with the immediate operand
//! of every `PUSHn` inlined as a hexadecimal literal (`PUSH1 0x80 PUSH1 0x40 MSTORE`).
//! Decoding pairs each mnemonic with its immediate and assigns program counters.
//!
//! Bytes that are not valid opcodes are printed as bare one-byte literals (`0x22`).
//! They show up in the metadata trailer appended to every deployed contract.

use thiserror::Error;

/// Mnemonics the coverage heuristics look for.
pub mod mnemonic {
    /// Conditional jump.
    pub const JUMPI: &str = "JUMPI";
    /// Unconditional jump.
    pub const JUMP: &str = "JUMP";
    /// Jump target.
    pub const JUMPDEST: &str = "JUMPDEST";
    /// Revert with return data.
    pub const REVERT: &str = "REVERT";
    /// Designated invalid instruction, emitted for panics by older compilers.
    pub const INVALID: &str = "INVALID";
    /// Message value.
    pub const CALLVALUE: &str = "CALLVALUE";
    /// One-byte push.
    pub const PUSH1: &str = "PUSH1";
    /// Duplicate the top stack item.
    pub const DUP1: &str = "DUP1";
}

/// Errors raised while decoding an opcode string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpcodeError {
    /// A hexadecimal literal wider than one byte does not follow a `PUSHn` mnemonic.
    #[error("unexpected immediate `{token}` after `{previous}` at token {position}")]
    UnexpectedImmediate {
        /// Token index in the opcode string.
        position: usize,
        /// The literal itself.
        token: String,
        /// The token before it, or an empty string at the start of the stream.
        previous: String,
    },
}

/// A decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedOpcode<'a> {
    /// Program counter of the instruction.
    pub pc: usize,
    /// The mnemonic, e.g. `PUSH2`, or the literal byte of an invalid opcode.
    pub mnemonic: &'a str,
    /// The inlined immediate value of a push, e.g. `0x1A`.
    pub immediate: Option<&'a str>,
}

impl DecodedOpcode<'_> {
    /// Number of bytes the instruction occupies in the bytecode.
    pub fn instruction_size(&self) -> usize {
        match self.immediate {
            Some(_) => 1 + push_width(self.mnemonic).unwrap_or(0),
            None => 1,
        }
    }

    /// Returns true if the instruction is `JUMP` or `JUMPI`.
    pub fn is_jump(&self) -> bool {
        self.mnemonic == mnemonic::JUMP || self.mnemonic == mnemonic::JUMPI
    }
}

/// Returns true if the token is an inlined hexadecimal literal rather than a mnemonic.
pub fn is_hex_literal(token: &str) -> bool {
    token.starts_with("0x")
}

/// Returns the immediate width of a `PUSHn` mnemonic, or `None` for anything else.
pub fn push_width(mnemonic: &str) -> Option<usize> {
    mnemonic.strip_prefix("PUSH")?.parse::<usize>().ok().filter(|width| *width <= 32)
}

/// Returns true if the token is a bare one-byte literal standing for an invalid opcode.
pub fn is_invalid_byte(token: &str) -> bool {
    token.strip_prefix("0x").is_some_and(|digits| {
        digits.len() == 2 && digits.chars().all(|c| c.is_ascii_hexdigit())
    })
}

/// Parse an inlined hexadecimal literal.
///
/// Literals longer than 64 bits are not valid jump targets and yield `None`.
pub fn parse_hex_literal(token: &str) -> Option<u64> {
    let digits = token.strip_prefix("0x")?;
    u64::from_str_radix(digits, 16).ok()
}

/// Decode an opcode string into instructions with their program counters.
///
/// # Example
///
/// ```rust
/// let ops = decode_opcodes("PUSH1 0x80 PUSH1 0x40 MSTORE").unwrap();
/// assert_eq!(ops.len(), 3);
/// assert_eq!(ops[2].pc, 4);
/// ```
pub fn decode_opcodes(opcodes: &str) -> Result<Vec<DecodedOpcode<'_>>, OpcodeError> {
    let mut decoded: Vec<DecodedOpcode<'_>> = Vec::new();
    let mut pc = 0;

    for (position, token) in opcodes.split_whitespace().enumerate() {
        if !is_hex_literal(token) {
            decoded.push(DecodedOpcode { pc, mnemonic: token, immediate: None });
            pc += 1;
            continue;
        }

        if let Some(last) = decoded
            .last_mut()
            .filter(|last| last.immediate.is_none() && push_width(last.mnemonic).is_some())
        {
            last.immediate = Some(token);
            pc += push_width(last.mnemonic).unwrap_or(0);
        } else if is_invalid_byte(token) {
            decoded.push(DecodedOpcode { pc, mnemonic: token, immediate: None });
            pc += 1;
        } else {
            return Err(OpcodeError::UnexpectedImmediate {
                position,
                token: token.to_string(),
                previous: decoded.last().map(|l| l.mnemonic.to_string()).unwrap_or_default(),
            });
        }
    }

    Ok(decoded)
}

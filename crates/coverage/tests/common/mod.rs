//! Shared fixtures: a two-file compilation of
//!
//! ```solidity
//! // contracts/SafeMath.sol
//! library SafeMath {
//!     function add(uint a, uint b) internal pure returns (uint) {
//!         uint c = a + b;
//!         return c;
//!     }
//! }
//!
//! // contracts/Token.sol
//! contract Token {
//!     using SafeMath for uint;
//!     mapping(address => uint) balances;
//!
//!     function transfer(address to, uint amount) public {
//!         require(balances[msg.sender] >= amount && amount > 0);
//!         if (amount > 100) { revert(); } else { revert(); }
//!         balances[to] = balances[to].add(amount);
//!     }
//!
//!     constructor() public { balances[msg.sender] = 1000; }
//! }
//! ```
//!
//! The runtime code is hand-assembled so that every instruction's source mapping is
//! known.

#![allow(dead_code)]

use edb_coverage::{CompilerOutput, ContractOutput, EvmOutput, SourceOutput};
use serde_json::{json, Value};

pub const TOKEN_PATH: &str = "contracts/Token.sol";
pub const SAFE_MATH_PATH: &str = "contracts/SafeMath.sol";

/// Creation code of `Token` up to the library placeholder.
pub const TOKEN_CREATION_PREFIX: &str = "608060405234801561001057600080fd5b50";
/// What solc emits for an unlinked `SafeMath`.
pub const SAFE_MATH_HASHED_PLACEHOLDER: &str = "__$0123456789abcdef0123456789abcdef01$__";
/// Creation code of `Token` after the placeholder, up to the metadata.
pub const TOKEN_CREATION_SUFFIX: &str = "6080604052";

/// Runtime instructions of `Token` with their compressed source map entries.
pub const TOKEN_RUNTIME: &[(&str, &str)] = &[
    // free memory pointer and nonpayable guard
    ("PUSH1 0x80", "10:380:0:-"),
    ("PUSH1 0x40", ""),
    ("MSTORE", ""),
    ("CALLVALUE", ""),
    ("DUP1", ""),
    ("ISZERO", ""),
    ("PUSH2 0x0010", ""),
    ("JUMPI", ""),
    ("PUSH1 0x00", ""),
    ("DUP1", ""),
    ("REVERT", "-1:-1:-1"),
    // dispatcher
    ("JUMPDEST", "10:380:0"),
    ("POP", ""),
    ("PUSH1 0x04", ""),
    ("CALLDATASIZE", ""),
    ("LT", ""),
    ("PUSH2 0x0030", ""),
    ("JUMPI", ""),
    ("PUSH1 0x00", ""),
    ("CALLDATALOAD", ""),
    ("PUSH1 0xE0", ""),
    ("SHR", ""),
    ("DUP1", ""),
    ("PUSH4 0xA9059CBB", ""),
    ("EQ", ""),
    ("PUSH2 0x0030", ""),
    ("JUMPI", ""),
    // shared revert at pc 43
    ("JUMPDEST", ""),
    ("PUSH1 0x00", ""),
    ("DUP1", ""),
    ("REVERT", ""),
    // transfer: require(balances[msg.sender] >= amount && amount > 0)
    ("JUMPDEST", "60:200:0"),
    ("PUSH1 0x01", "118:18:0"),
    ("SLOAD", ""),
    ("LT", ""),
    ("ISZERO", ""),
    ("DUP1", ""),
    ("ISZERO", ""),
    ("PUSH2 0x0045", ""),
    ("JUMPI", "110:39:0"),
    ("POP", "140:8:0"),
    ("PUSH1 0x00", ""),
    ("GT", ""),
    ("JUMPDEST", "110:39:0"),
    ("PUSH2 0x0050", ""),
    ("JUMPI", ""),
    // if (amount > 100), both arms forwarded to the shared revert
    ("PUSH1 0x64", "164:12:0"),
    ("DUP2", ""),
    ("GT", ""),
    ("ISZERO", ""),
    ("PUSH2 0x002B", "160:48:0"),
    ("JUMPI", ""),
    // balances[to].add(amount)
    ("JUMPDEST", "210:40:0"),
    ("PUSH2 0x0060", "210:39:0"),
    ("SWAP1", ""),
    ("PUSH2 0x0070", ""),
    ("JUMP", ":::i"),
    ("JUMPDEST", "20:120:1:-"),
    ("PUSH1 0x00", "60:20:1"),
    ("DUP3", ""),
    ("ADD", ""),
    ("SWAP1", "90:8:1"),
    ("JUMP", ":::o"),
    ("JUMPDEST", "250:10:0:-"),
    ("STOP", ""),
];

/// Disassembled metadata trailer, which has no source map entries. The CBOR bytes
/// `0x22` and the hash bytes that do not form opcodes are printed as bare literals.
pub const METADATA_OPCODES: &str = "INVALID LOG2 PUSH5 0x6970667358 0x22 SLT KECCAK256 \
     0xB1 PUSH32 0x1F0E6A3B5C8D7E2F4A6B9C0D1E2F3A4B5C6D7E8F9A0B1C2D3E4F5A6B7C8D9E0F \
     0xEE 0xC0 PUSH5 0x736F6C6343 STOP ADDMOD EQ STOP CALLER";

/// Runtime opcodes and source map of `Token`.
pub fn token_runtime() -> (String, String) {
    let opcodes = TOKEN_RUNTIME.iter().map(|(op, _)| *op).collect::<Vec<_>>().join(" ");
    let source_map = TOKEN_RUNTIME.iter().map(|(_, entry)| *entry).collect::<Vec<_>>().join(";");
    (format!("{opcodes} {METADATA_OPCODES}"), source_map)
}

/// A 34-byte CBOR metadata trailer, hex encoded.
pub fn metadata(fill: &str) -> String {
    format!("a2646970667358221220{}", fill.repeat(24))
}

pub fn token_evm(metadata_fill: &str) -> EvmOutput {
    let (opcodes, source_map) = token_runtime();
    serde_json::from_value(json!({
        "bytecode": {
            "object": format!(
                "{TOKEN_CREATION_PREFIX}{SAFE_MATH_HASHED_PLACEHOLDER}{TOKEN_CREATION_SUFFIX}{}",
                metadata(metadata_fill)
            ),
            "linkReferences": {
                SAFE_MATH_PATH: {"SafeMath": [{"start": TOKEN_CREATION_PREFIX.len() / 2, "length": 20}]}
            }
        },
        "deployedBytecode": {"opcodes": opcodes, "sourceMap": source_map}
    }))
    .unwrap()
}

pub fn safe_math_evm() -> EvmOutput {
    serde_json::from_value(json!({
        "bytecode": {"object": format!("60806040{}", metadata("cd"))},
        "deployedBytecode": {
            "opcodes": "PUSH20 0x0000000000000000000000000000000000000000 ADDRESS EQ PUSH1 0x80 PUSH1 0x40 MSTORE PUSH1 0x00 DUP1 REVERT",
            "sourceMap": "0:150:1:-;;;;;;;;"
        }
    }))
    .unwrap()
}

fn identifier(name: &str, src: &str, referenced: i64) -> Value {
    json!({
        "nodeType": "Identifier", "src": src, "name": name, "referencedDeclaration": referenced,
        "typeDescriptions": {"typeString": "uint256"}
    })
}

fn literal(src: &str) -> Value {
    json!({"nodeType": "Literal", "src": src, "typeDescriptions": {"typeString": "int_const"}})
}

fn binary(operator: &str, src: &str, left: Value, right: Value) -> Value {
    json!({
        "nodeType": "BinaryOperation", "src": src, "operator": operator,
        "typeDescriptions": {"typeString": "bool"},
        "leftExpression": left, "rightExpression": right
    })
}

fn bare_revert(statement_src: &str, call_src: &str, identifier_src: &str) -> Value {
    json!({
        "nodeType": "ExpressionStatement", "src": statement_src,
        "expression": {
            "nodeType": "FunctionCall", "src": call_src, "arguments": [],
            "typeDescriptions": {"typeString": "tuple()"},
            "expression": {"nodeType": "Identifier", "src": identifier_src, "name": "revert"}
        }
    })
}

pub fn safe_math_ast() -> Value {
    json!({
        "nodeType": "SourceUnit", "src": "0:150:1", "id": 2, "absolutePath": SAFE_MATH_PATH,
        "exportedSymbols": {"SafeMath": [200]},
        "nodes": [{
            "nodeType": "ContractDefinition", "src": "0:150:1", "id": 200, "name": "SafeMath",
            "contractKind": "library", "linearizedBaseContracts": [200],
            "contractDependencies": [],
            "nodes": [{
                "nodeType": "FunctionDefinition", "src": "20:120:1", "id": 201, "name": "add",
                "kind": "function",
                "body": {"nodeType": "Block", "src": "50:90:1", "statements": [
                    {
                        "nodeType": "VariableDeclarationStatement", "src": "60:20:1",
                        "initialValue": binary(
                            "+", "69:5:1", identifier("a", "69:1:1", 202), identifier("b", "73:1:1", 203)
                        )
                    },
                    {
                        "nodeType": "Return", "src": "90:8:1",
                        "expression": identifier("c", "97:1:1", 204)
                    }
                ]}
            }]
        }]
    })
}

pub fn token_ast() -> Value {
    let balance = json!({
        "nodeType": "IndexAccess", "src": "118:10:0",
        "baseExpression": identifier("balances", "118:8:0", 104)
    });
    let require = json!({
        "nodeType": "ExpressionStatement", "src": "110:40:0",
        "expression": {
            "nodeType": "FunctionCall", "src": "110:39:0",
            "typeDescriptions": {"typeString": "tuple()"},
            "expression": {"nodeType": "Identifier", "src": "110:7:0", "name": "require"},
            "arguments": [binary(
                "&&",
                "118:30:0",
                binary(">=", "118:18:0", balance, identifier("amount", "129:6:0", 106)),
                binary(">", "140:8:0", identifier("amount", "140:6:0", 106), literal("147:1:0"))
            )]
        }
    });
    let branch = json!({
        "nodeType": "IfStatement", "src": "160:48:0",
        "condition": binary(">", "164:12:0", identifier("amount", "164:6:0", 106), literal("173:3:0")),
        "trueBody": {
            "nodeType": "Block", "src": "178:14:0",
            "statements": [bare_revert("180:9:0", "180:8:0", "180:6:0")]
        },
        "falseBody": {
            "nodeType": "Block", "src": "194:14:0",
            "statements": [bare_revert("196:9:0", "196:8:0", "196:6:0")]
        }
    });
    let add = json!({
        "nodeType": "ExpressionStatement", "src": "210:40:0",
        "expression": {
            "nodeType": "FunctionCall", "src": "210:39:0",
            "typeDescriptions": {"typeString": "uint256"},
            "expression": {
                "nodeType": "MemberAccess", "src": "210:29:0", "memberName": "add",
                "expression": {
                    "nodeType": "IndexAccess", "src": "225:12:0",
                    "baseExpression": identifier("balances", "225:8:0", 104),
                    "indexExpression": identifier("to", "234:2:0", 105)
                }
            },
            "arguments": [identifier("amount", "240:6:0", 106)]
        }
    });

    json!({
        "nodeType": "SourceUnit", "src": "0:400:0", "id": 1, "absolutePath": TOKEN_PATH,
        "exportedSymbols": {"Token": [100]},
        "nodes": [
            {
                "nodeType": "ImportDirective", "src": "0:9:0", "absolutePath": SAFE_MATH_PATH
            },
            {
                "nodeType": "ContractDefinition", "src": "10:380:0", "id": 100, "name": "Token",
                "contractKind": "contract", "linearizedBaseContracts": [100],
                "contractDependencies": [],
                "nodes": [
                    {
                        "nodeType": "UsingForDirective", "src": "30:24:0",
                        "libraryName": {
                            "nodeType": "UserDefinedTypeName", "src": "36:8:0",
                            "referencedDeclaration": 200
                        }
                    },
                    {
                        "nodeType": "FunctionDefinition", "src": "60:200:0", "id": 103,
                        "name": "transfer", "kind": "function",
                        "body": {
                            "nodeType": "Block", "src": "100:160:0",
                            "statements": [require, branch, add]
                        }
                    },
                    {
                        "nodeType": "FunctionDefinition", "src": "270:100:0", "id": 107,
                        "name": "", "kind": "constructor",
                        "body": {"nodeType": "Block", "src": "290:80:0", "statements": [{
                            "nodeType": "ExpressionStatement", "src": "300:20:0",
                            "expression": {"nodeType": "Assignment", "src": "300:19:0"}
                        }]}
                    }
                ]
            }
        ]
    })
}

/// The full standard JSON output for both contracts.
pub fn compiler_output(metadata_fill: &str) -> CompilerOutput {
    CompilerOutput {
        sources: [
            (TOKEN_PATH.to_string(), SourceOutput { id: 0, ast: token_ast() }),
            (SAFE_MATH_PATH.to_string(), SourceOutput { id: 1, ast: safe_math_ast() }),
        ]
        .into(),
        contracts: [
            (
                TOKEN_PATH.to_string(),
                [("Token".to_string(), ContractOutput { evm: token_evm(metadata_fill) })].into(),
            ),
            (
                SAFE_MATH_PATH.to_string(),
                [("SafeMath".to_string(), ContractOutput { evm: safe_math_evm() })].into(),
            ),
        ]
        .into(),
    }
}

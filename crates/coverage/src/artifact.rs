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

//! Build artifact assembly.
//!
//! A [`BuildArtifact`] bundles everything a test runner needs to debug a contract and
//! report its coverage. Artifacts are generated from the `evm` section of solc's standard
//! JSON output and the ASTs of the compiled sources.

use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::keccak256;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    format_link_references, generate_coverage_data, CoverageCandidates, CoverageError,
    CoverageMap, EngineConfig, LinkReferences, Offset, PcMap, SourceRegistry,
};

/// Hex characters at the end of deployed bytecode holding the CBOR metadata.
pub const METADATA_TRAILER_WIDTH: usize = 68;

/// One of `evm.bytecode` and `evm.deployedBytecode`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BytecodeOutput {
    /// Hex encoded bytecode, possibly with library placeholders.
    pub object: String,
    /// Space separated disassembly.
    pub opcodes: String,
    /// Compressed source map.
    pub source_map: String,
    /// Unlinked library placeholders.
    pub link_references: LinkReferences,
}

/// The `evm` section of one contract in solc's output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvmOutput {
    /// Creation code.
    pub bytecode: BytecodeOutput,
    /// Runtime code.
    pub deployed_bytecode: BytecodeOutput,
}

/// One contract in solc's output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractOutput {
    /// Compiled code.
    pub evm: EvmOutput,
}

/// One source file in solc's output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceOutput {
    /// File index used by source maps.
    pub id: usize,
    /// The JSON AST.
    pub ast: Value,
}

/// The parts of solc's standard JSON output the engine consumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOutput {
    /// Compiled sources by path.
    pub sources: BTreeMap<String, SourceOutput>,
    /// Compiled contracts by path and name.
    pub contracts: BTreeMap<String, BTreeMap<String, ContractOutput>>,
}

impl CompilerOutput {
    /// Index the ASTs of all sources.
    pub fn registry(&self) -> Result<SourceRegistry, CoverageError> {
        Ok(SourceRegistry::from_asts(self.sources.values().map(|source| &source.ast))?)
    }

    /// The `evm` section of every contract, by contract name.
    pub fn evm_outputs(&self) -> BTreeMap<String, EvmOutput> {
        self.contracts
            .values()
            .flatten()
            .map(|(name, contract)| (name.clone(), contract.evm.clone()))
            .collect()
    }
}

/// Debug and coverage data of one contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildArtifact {
    /// Contract name.
    pub contract_name: String,
    /// Sorted paths of the contract's file and the files of its dependencies.
    pub all_source_paths: Vec<String>,
    /// Creation code with normalized library placeholders.
    pub bytecode: String,
    /// Hex keccak-256 of the bytecode without its metadata trailer.
    pub bytecode_hash: String,
    /// Statement and branch maps.
    pub coverage_map: CoverageMap,
    /// Names of the contracts this contract depends on.
    pub dependencies: Vec<String>,
    /// Source range of the contract definition.
    pub offset: Offset,
    /// Per-instruction debug data of the runtime code.
    pub pc_map: PcMap,
    /// `contract`, `library` or `interface`.
    #[serde(rename = "type")]
    pub contract_kind: String,
}

/// Hash of `bytecode` that ignores the metadata trailer, so that recompiling with a
/// different metadata hash does not look like a code change.
pub fn bytecode_hash(bytecode: &str) -> String {
    let body = bytecode.len().saturating_sub(METADATA_TRAILER_WIDTH);
    hex::encode(keccak256(bytecode.get(..body).unwrap_or_default().as_bytes()))
}

/// Assemble the build artifact of the contract named `name`.
pub fn generate_build_artifact(
    registry: &SourceRegistry,
    candidates: &CoverageCandidates,
    name: &str,
    evm: &EvmOutput,
    config: &EngineConfig,
) -> Result<BuildArtifact, CoverageError> {
    let contract =
        registry.find_contract(name).ok_or_else(|| CoverageError::UnknownContract(name.into()))?;
    let dependencies = registry.dependencies(&contract);

    let all_source_paths: BTreeSet<&str> = std::iter::once(contract.path())
        .chain(dependencies.iter().map(|dependency| dependency.path()))
        .collect();

    let bytecode =
        format_link_references(name, &evm.bytecode.object, &evm.bytecode.link_references)?;
    let (pc_map, coverage_map) = generate_coverage_data(
        registry,
        candidates,
        &contract,
        &evm.deployed_bytecode.source_map,
        &evm.deployed_bytecode.opcodes,
        config,
    )?
    .into_parts();

    debug!("Assembled build artifact for {name}");
    Ok(BuildArtifact {
        contract_name: name.to_string(),
        all_source_paths: all_source_paths.into_iter().map(str::to_string).collect(),
        bytecode_hash: bytecode_hash(&bytecode),
        bytecode,
        coverage_map,
        dependencies: dependencies.iter().map(|dependency| dependency.name().to_string()).collect(),
        offset: contract.offset(),
        pc_map,
        contract_kind: contract.kind().to_string(),
    })
}

/// Assemble build artifacts for every contract in `outputs`, keyed by contract name.
///
/// Contracts are independent of each other and are processed in parallel when
/// [`EngineConfig::parallel`] is set.
pub fn generate_build_artifacts(
    registry: &SourceRegistry,
    outputs: &BTreeMap<String, EvmOutput>,
    config: &EngineConfig,
) -> Result<BTreeMap<String, BuildArtifact>, CoverageError> {
    info!("Generating build artifacts for {} contracts", outputs.len());
    let candidates = CoverageCandidates::collect(registry);

    let build = |(name, evm): (&String, &EvmOutput)| {
        generate_build_artifact(registry, &candidates, name, evm, config)
            .map(|artifact| (name.clone(), artifact))
    };

    if config.parallel {
        outputs.par_iter().map(build).collect()
    } else {
        outputs.iter().map(build).collect()
    }
}

/// Assemble build artifacts for every contract of a standard JSON compiler output.
pub fn build_artifacts_from_output(
    output: &CompilerOutput,
    config: &EngineConfig,
) -> Result<BTreeMap<String, BuildArtifact>, CoverageError> {
    let registry = output.registry()?;
    generate_build_artifacts(&registry, &output.evm_outputs(), config)
}

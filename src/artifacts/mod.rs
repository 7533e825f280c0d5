//! Artifact serialization.
//!
//! Artifacts live under `artifactsRoot/<unitId>/`, one JSON document per
//! contract plus a `unit.json` manifest. Paths derive from the unit id, not
//! the fingerprint, so downstream consumers keep stable paths across
//! rebuilds. Overwriting is idempotent; a failed write is fatal for the
//! build.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::compiler::CompileOutput;
use crate::core::CompilationUnit;
use crate::util::fs::{ensure_dir, read_to_string, write_string};

/// Manifest file name inside each unit's artifact directory.
pub const MANIFEST_FILE: &str = "unit.json";

/// One serialized contract artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDocument {
    pub contract_name: String,
    pub source_name: String,
    pub abi: serde_json::Value,
    pub bytecode: String,
    pub deployed_bytecode: String,
    pub source_map: String,
    pub compiler_version: String,
}

/// Per-unit manifest listing members and produced documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitManifest {
    pub unit: String,
    pub files: Vec<String>,
    pub contracts: Vec<String>,
    pub compiler_version: String,
}

/// Artifact files produced for one unit.
#[derive(Debug, Clone)]
pub struct WrittenArtifacts {
    pub dir: PathBuf,
    pub paths: Vec<PathBuf>,
}

/// Serializes compiler output under the artifacts root.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    root: PathBuf,
}

impl ArtifactWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ArtifactWriter { root: root.into() }
    }

    /// Directory a unit's artifacts are written to.
    pub fn unit_dir(&self, unit: &CompilationUnit) -> PathBuf {
        self.root.join(unit.id.as_str())
    }

    /// Write all artifacts for one freshly compiled unit.
    pub fn write(
        &self,
        unit: &CompilationUnit,
        output: &CompileOutput,
        compiler_version: &str,
    ) -> Result<WrittenArtifacts> {
        let dir = self.unit_dir(unit);
        ensure_dir(&dir)?;

        // Contract names are usually unique within a unit; a cyclic unit
        // can legally declare the same name in two files, so disambiguate
        // with the source stem when needed.
        let mut seen: HashSet<&str> = HashSet::new();
        let mut duplicates: HashSet<&str> = HashSet::new();
        for contract in &output.contracts {
            if !seen.insert(&contract.name) {
                duplicates.insert(&contract.name);
            }
        }

        let mut paths = Vec::with_capacity(output.contracts.len());
        let mut names = Vec::with_capacity(output.contracts.len());

        for contract in &output.contracts {
            let file_name = if duplicates.contains(contract.name.as_str()) {
                let stem = contract
                    .source
                    .rsplit('/')
                    .next()
                    .and_then(|f| f.strip_suffix(".sol"))
                    .unwrap_or("contract");
                format!("{}.{}.json", stem, contract.name)
            } else {
                format!("{}.json", contract.name)
            };

            let doc = ArtifactDocument {
                contract_name: contract.name.clone(),
                source_name: contract.source.clone(),
                abi: contract.abi.clone(),
                bytecode: contract.bytecode.clone(),
                deployed_bytecode: contract.deployed_bytecode.clone(),
                source_map: contract.source_map.clone(),
                compiler_version: compiler_version.to_string(),
            };

            let path = dir.join(&file_name);
            let json = serde_json::to_string_pretty(&doc)?;
            write_string(&path, &json)
                .with_context(|| format!("failed to write artifact for {}", contract.name))?;

            paths.push(path);
            names.push(file_name);
        }

        let manifest = UnitManifest {
            unit: unit.id.as_str().to_string(),
            files: unit.files.clone(),
            contracts: names,
            compiler_version: compiler_version.to_string(),
        };
        let manifest_json = serde_json::to_string_pretty(&manifest)?;
        write_string(&dir.join(MANIFEST_FILE), &manifest_json)
            .with_context(|| format!("failed to write manifest for unit {}", unit.id))?;

        Ok(WrittenArtifacts { dir, paths })
    }

    /// Read the manifest from a previously written artifact directory.
    pub fn read_manifest(dir: &Path) -> Result<UnitManifest> {
        let content = read_to_string(&dir.join(MANIFEST_FILE))?;
        serde_json::from_str(&content)
            .with_context(|| format!("malformed manifest in {}", dir.display()))
    }

    /// Contract artifact paths recorded by a cached unit's manifest.
    pub fn cached_paths(dir: &Path) -> Result<Vec<PathBuf>> {
        let manifest = Self::read_manifest(dir)?;
        Ok(manifest.contracts.iter().map(|c| dir.join(c)).collect())
    }
}

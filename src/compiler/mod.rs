//! The compiler adapter seam.
//!
//! The scheduler treats the compiler as an opaque, slow, possibly
//! crash-prone collaborator behind the [`Compiler`] trait. The real backend
//! is [`solc::SolcCompiler`]; tests substitute scripted implementations.

pub mod solc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::UnitId;
use crate::util::diagnostic::Diagnostic;
use crate::util::hash::Fingerprint;

pub use solc::SolcCompiler;

/// Compiler options that are build-relevant context: all of them feed the
/// unit fingerprint.
#[derive(Debug, Clone)]
pub struct SolcOptions {
    /// Required compiler version, e.g. "0.8.20".
    pub version: String,

    /// Enable the optimizer.
    pub optimizer: bool,

    /// Optimizer runs setting.
    pub optimizer_runs: u32,

    /// Target EVM version (None = compiler default).
    pub evm_version: Option<String>,
}

impl SolcOptions {
    /// Digest of the option set, excluding the version (the version is a
    /// separate fingerprint component).
    pub fn digest(&self) -> String {
        let mut fp = Fingerprint::new();
        fp.update_bool(self.optimizer)
            .update_u32(self.optimizer_runs)
            .update_opt(self.evm_version.as_deref());
        fp.finish()
    }
}

/// One compilation request: a unit's sources, keyed by their
/// sources-root-relative paths.
#[derive(Debug, Clone)]
pub struct CompileInput {
    pub unit: UnitId,

    /// (relative path, content) pairs, sorted by path.
    pub sources: Vec<(String, String)>,
}

/// Compiled output for one contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractArtifact {
    /// Contract name as declared in source.
    pub name: String,

    /// Relative path of the defining source file.
    pub source: String,

    /// Interface descriptor (the ABI).
    pub abi: serde_json::Value,

    /// Creation bytecode, hex.
    pub bytecode: String,

    /// Runtime bytecode, hex.
    pub deployed_bytecode: String,

    /// Source map for the creation bytecode.
    pub source_map: String,
}

/// Successful compiler output for one unit.
#[derive(Debug, Clone, Default)]
pub struct CompileOutput {
    pub contracts: Vec<ContractArtifact>,

    /// Warnings and notes. Errors travel in [`CompileError::Source`].
    pub diagnostics: Vec<Diagnostic>,
}

/// Failure of one compiler invocation. Always converted into the owning
/// unit's failure path; never propagates a raw backend panic.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The sources did not compile. Carries the full diagnostic set,
    /// errors and warnings alike.
    #[error("compilation failed")]
    Source { diagnostics: Vec<Diagnostic> },

    /// The backend exceeded its wall-clock budget and was killed.
    #[error("compiler timed out after {0} second(s)")]
    Timeout(u64),

    /// The backend crashed, produced unparseable output, or could not be
    /// invoked at all.
    #[error("compiler backend failure: {0}")]
    Backend(String),
}

impl CompileError {
    /// Diagnostics carried by this failure, if any.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CompileError::Source { diagnostics } => diagnostics,
            _ => &[],
        }
    }
}

/// The opaque compiler collaborator.
pub trait Compiler: Send + Sync {
    /// Compile one unit. Must return within a bounded time.
    fn compile(&self, input: &CompileInput) -> Result<CompileOutput, CompileError>;

    /// The version string that identifies this compiler in fingerprints.
    fn version(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_digest_changes_with_each_field() {
        let base = SolcOptions {
            version: "0.8.20".to_string(),
            optimizer: false,
            optimizer_runs: 200,
            evm_version: None,
        };

        let mut optimized = base.clone();
        optimized.optimizer = true;
        let mut runs = base.clone();
        runs.optimizer_runs = 1000;
        let mut evm = base.clone();
        evm.evm_version = Some("paris".to_string());

        assert_ne!(base.digest(), optimized.digest());
        assert_ne!(base.digest(), runs.digest());
        assert_ne!(base.digest(), evm.digest());
    }

    #[test]
    fn options_digest_ignores_version() {
        let a = SolcOptions {
            version: "0.8.20".to_string(),
            optimizer: false,
            optimizer_runs: 200,
            evm_version: None,
        };
        let mut b = a.clone();
        b.version = "0.8.24".to_string();

        // The version is composed separately into the unit fingerprint.
        assert_eq!(a.digest(), b.digest());
    }
}

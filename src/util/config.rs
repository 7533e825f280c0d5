//! Project configuration.
//!
//! Slipway reads a single `slipway.toml` at the project root. It supplies
//! the three directory roots and the compiler selection; everything else
//! about a build is derived from the sources themselves.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use semver::Version;
use serde::{Deserialize, Serialize};

/// Name of the configuration file at the project root.
pub const CONFIG_FILE: &str = "slipway.toml";

/// Slipway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory roots
    pub project: ProjectConfig,

    /// Compiler selection and options
    pub compiler: CompilerConfig,

    /// Build settings
    pub build: BuildSettings,
}

/// Directory layout, relative to the project root unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Root of the Solidity sources
    pub sources: PathBuf,

    /// Where compiled artifacts are written
    pub artifacts: PathBuf,

    /// Where the cache index lives
    pub cache: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        ProjectConfig {
            sources: PathBuf::from("contracts"),
            artifacts: PathBuf::from("artifacts"),
            cache: PathBuf::from("cache"),
        }
    }
}

/// Compiler selection and options. All of these feed the unit fingerprint,
/// so changing any of them invalidates the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CompilerConfig {
    /// Required solc version, e.g. "0.8.20"
    pub version: String,

    /// Enable the optimizer
    pub optimizer: bool,

    /// Optimizer runs setting
    pub optimizer_runs: u32,

    /// Target EVM version (None = compiler default)
    pub evm_version: Option<String>,

    /// Wall-clock limit for one compiler invocation, in seconds
    pub timeout_secs: u64,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            version: "0.8.20".to_string(),
            optimizer: false,
            optimizer_runs: 200,
            evm_version: None,
            timeout_secs: 300,
        }
    }
}

/// Build-related settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Default number of parallel jobs (None = available parallelism)
    pub jobs: Option<usize>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback to defaults if the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("no {} found, using defaults", CONFIG_FILE);
            Ok(Self::default())
        }
    }

    /// Check configured values that can be validated up front.
    pub fn validate(&self) -> Result<()> {
        Version::parse(&self.compiler.version).with_context(|| {
            format!(
                "invalid compiler version `{}` (expected e.g. \"0.8.20\")",
                self.compiler.version
            )
        })?;

        if self.compiler.timeout_secs == 0 {
            anyhow::bail!("compiler timeout-secs must be non-zero");
        }

        Ok(())
    }
}

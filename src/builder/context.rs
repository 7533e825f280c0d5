//! Build context: resolved paths and compiler selection for one build.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::INDEX_FILE;
use crate::compiler::SolcOptions;
use crate::util::Config;

/// Everything a build needs to know beyond the sources themselves.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Root of the Solidity sources.
    pub sources_root: PathBuf,

    /// Where artifacts are written.
    pub artifacts_root: PathBuf,

    /// Where the cache index lives.
    pub cache_root: PathBuf,

    /// Compiler selection; feeds every unit fingerprint.
    pub solc: SolcOptions,

    /// Wall-clock budget for one compiler invocation.
    pub timeout: Duration,

    /// Worker pool bound (None = available parallelism).
    pub jobs: Option<usize>,

    /// Ignore the cache and recompile everything.
    pub force: bool,
}

impl BuildContext {
    /// Resolve a context from configuration, anchoring relative roots at
    /// the project root.
    pub fn from_config(project_root: &Path, config: &Config) -> Self {
        let anchor = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                project_root.join(p)
            }
        };

        BuildContext {
            sources_root: anchor(&config.project.sources),
            artifacts_root: anchor(&config.project.artifacts),
            cache_root: anchor(&config.project.cache),
            solc: SolcOptions {
                version: config.compiler.version.clone(),
                optimizer: config.compiler.optimizer,
                optimizer_runs: config.compiler.optimizer_runs,
                evm_version: config.compiler.evm_version.clone(),
            },
            timeout: Duration::from_secs(config.compiler.timeout_secs),
            jobs: config.build.jobs,
            force: false,
        }
    }

    /// Path of the persistent cache index.
    pub fn index_path(&self) -> PathBuf {
        self.cache_root.join(INDEX_FILE)
    }

    /// Override the worker pool bound.
    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        if jobs.is_some() {
            self.jobs = jobs;
        }
        self
    }

    /// Ignore the cache for this build.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

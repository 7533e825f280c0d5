//! Build execution.
//!
//! Walks the condensation graph level by level: units within a level are
//! independent and compile in parallel on a bounded rayon pool; a unit is
//! never dispatched before every direct dependency has produced an
//! artifact, cached or fresh. The cache index is mutated only here, on the
//! scheduling thread, after workers report back.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::artifacts::ArtifactWriter;
use crate::builder::plan::BuildPlan;
use crate::cache::CacheIndex;
use crate::compiler::{CompileError, CompileInput, Compiler};
use crate::core::{ContentStore, UnitId};
use crate::graph::DependencyGraph;
use crate::util::diagnostic::Diagnostic;

/// Per-unit scheduling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitState {
    Pending,
    Dispatched,
    Done,
    Failed,
}

/// A unit that did not produce artifacts this build, with its root cause.
#[derive(Debug, Clone)]
pub struct UnitFailure {
    pub unit: UnitId,

    /// The unit whose failure caused this one (itself for direct failures).
    pub root: UnitId,

    pub error: String,
}

/// Outcome of one build invocation.
#[derive(Debug, Default)]
pub struct BuildResult {
    /// Paths of all valid artifacts, cached and fresh.
    pub artifacts: Vec<PathBuf>,

    /// All diagnostics, from failed and successful units alike.
    pub diagnostics: Vec<Diagnostic>,

    /// Units that failed, directly or through a dependency.
    pub failed: Vec<UnitFailure>,

    /// Units never dispatched because the build was cancelled.
    pub skipped: Vec<UnitId>,

    /// Units actually compiled this run.
    pub compiled: usize,

    /// Units reused from cache.
    pub reused: usize,
}

impl BuildResult {
    /// Whether every requested unit produced artifacts.
    pub fn success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Executes a [`BuildPlan`] against a compiler backend.
pub struct BuildExecutor<'a> {
    graph: &'a DependencyGraph,
    store: &'a ContentStore,
    plan: &'a BuildPlan,
    cancel: Arc<AtomicBool>,
    progress: bool,
}

impl<'a> BuildExecutor<'a> {
    pub fn new(graph: &'a DependencyGraph, store: &'a ContentStore, plan: &'a BuildPlan) -> Self {
        BuildExecutor {
            graph,
            store,
            plan,
            cancel: Arc::new(AtomicBool::new(false)),
            progress: false,
        }
    }

    /// Show a progress bar while compiling.
    pub fn progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    /// Flag that stops dispatching new units when set. In-flight
    /// compilations finish and their artifacts remain cached.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Use an externally owned cancellation flag instead of the default
    /// never-set one.
    pub fn cancelled_by(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Run the build.
    pub fn execute(
        &self,
        compiler: &dyn Compiler,
        cache: &mut CacheIndex,
        writer: &ArtifactWriter,
        jobs: Option<usize>,
    ) -> Result<BuildResult> {
        let start = Instant::now();
        let n = self.graph.len();

        let mut states = vec![UnitState::Pending; n];
        let mut roots: Vec<Option<usize>> = vec![None; n];
        let mut result = BuildResult::default();

        // Cached units contribute their artifacts immediately and unblock
        // dependents without touching the compiler.
        for &idx in &self.plan.hits {
            let unit = self.graph.unit(idx);
            states[idx] = UnitState::Done;
            result.reused += 1;

            if let Some(entry) = cache.lookup(&unit.id, &self.plan.fingerprints[idx]) {
                match ArtifactWriter::cached_paths(&entry.artifact_dir) {
                    Ok(paths) => result.artifacts.extend(paths),
                    Err(e) => {
                        tracing::debug!("manifest missing for cached {}: {}", unit.id, e);
                        result.artifacts.push(entry.artifact_dir.clone());
                    }
                }
            }
        }

        // Units broken before compilation: unreadable member file or
        // unresolved import.
        for idx in 0..n {
            if let Some(cause) = self.graph.broken(idx) {
                states[idx] = UnitState::Failed;
                roots[idx] = Some(idx);
                result.failed.push(UnitFailure {
                    unit: self.graph.unit(idx).id.clone(),
                    root: self.graph.unit(idx).id.clone(),
                    error: cause.to_string(),
                });
            }
        }

        let bar = if self.progress && self.plan.compile_count() > 1 {
            let bar = ProgressBar::new(self.plan.compile_count() as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            Some(bar)
        } else {
            None
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs.unwrap_or(0))
            .build()
            .context("failed to build worker pool")?;

        'levels: for level in self.graph.levels() {
            if self.cancel.load(Ordering::SeqCst) {
                tracing::info!("build cancelled, stopping dispatch");
                break 'levels;
            }

            // Decide each unit's fate at this level.
            let mut runnable = Vec::new();
            for &idx in level {
                if states[idx] != UnitState::Pending {
                    continue;
                }

                let failed_dep = self.graph.deps(idx).iter().copied().find(|&d| {
                    states[d] == UnitState::Failed
                });
                if let Some(dep) = failed_dep {
                    let root_idx = roots[dep].unwrap_or(dep);
                    states[idx] = UnitState::Failed;
                    roots[idx] = Some(root_idx);
                    result.failed.push(UnitFailure {
                        unit: self.graph.unit(idx).id.clone(),
                        root: self.graph.unit(root_idx).id.clone(),
                        error: format!(
                            "dependency `{}` failed to compile",
                            self.graph.unit(dep).id
                        ),
                    });
                    continue;
                }

                // Levels guarantee deps have already been visited; anything
                // not Done here means the build was cancelled above us.
                if self.graph.deps(idx).iter().all(|&d| states[d] == UnitState::Done) {
                    runnable.push(idx);
                }
            }

            if runnable.is_empty() {
                continue;
            }

            let inputs: Vec<(usize, CompileInput)> = runnable
                .iter()
                .map(|&idx| {
                    let unit = self.graph.unit(idx);
                    let sources = unit
                        .files
                        .iter()
                        .filter_map(|rel| {
                            self.store
                                .get(rel)
                                .map(|f| (rel.clone(), f.content.clone()))
                        })
                        .collect();
                    (
                        idx,
                        CompileInput {
                            unit: unit.id.clone(),
                            sources,
                        },
                    )
                })
                .collect();

            for &idx in &runnable {
                states[idx] = UnitState::Dispatched;
            }

            let outcomes: Vec<(usize, Result<_, CompileError>)> = pool.install(|| {
                inputs
                    .par_iter()
                    .map(|(idx, input)| {
                        tracing::debug!("compiling unit {}", input.unit);
                        (*idx, compiler.compile(input))
                    })
                    .collect()
            });

            // Bookkeeping happens only here, on the scheduling thread.
            for (idx, outcome) in outcomes {
                let unit = self.graph.unit(idx);
                match outcome {
                    Ok(output) => {
                        let written = writer
                            .write(unit, &output, compiler.version())
                            .with_context(|| {
                                format!("failed to write artifacts for unit {}", unit.id)
                            })?;

                        let dep_fps = self
                            .graph
                            .deps(idx)
                            .iter()
                            .map(|&d| self.plan.fingerprints[d].clone())
                            .collect();
                        cache.record(
                            &unit.id,
                            self.plan.fingerprints[idx].clone(),
                            written.dir.clone(),
                            dep_fps,
                        );

                        states[idx] = UnitState::Done;
                        result.compiled += 1;
                        result.artifacts.extend(written.paths);
                        result.diagnostics.extend(output.diagnostics);
                    }
                    Err(e) => {
                        states[idx] = UnitState::Failed;
                        roots[idx] = Some(idx);
                        result.diagnostics.extend(e.diagnostics().to_vec());

                        let error = match &e {
                            CompileError::Source { diagnostics } => {
                                let errors = diagnostics
                                    .iter()
                                    .filter(|d| {
                                        d.severity == crate::util::Severity::Error
                                    })
                                    .count();
                                format!("compilation failed with {} error(s)", errors)
                            }
                            other => other.to_string(),
                        };
                        tracing::warn!("unit {} failed: {}", unit.id, error);
                        result.failed.push(UnitFailure {
                            unit: unit.id.clone(),
                            root: unit.id.clone(),
                            error,
                        });
                    }
                }

                if let Some(ref bar) = bar {
                    bar.inc(1);
                }
            }
        }

        // Anything still pending was behind the cancellation point.
        for idx in 0..n {
            if states[idx] == UnitState::Pending {
                result.skipped.push(self.graph.unit(idx).id.clone());
            }
            debug_assert_ne!(states[idx], UnitState::Dispatched);
        }

        if let Some(bar) = bar {
            bar.finish_and_clear();
        }

        tracing::info!(
            "built {} unit(s) ({} compiled, {} cached, {} failed) in {:.2}s",
            n,
            result.compiled,
            result.reused,
            result.failed.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(result)
    }
}

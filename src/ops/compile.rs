//! The end-to-end build pipeline.

use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::artifacts::ArtifactWriter;
use crate::builder::{BuildContext, BuildExecutor, BuildPlan, BuildResult};
use crate::cache::CacheIndex;
use crate::compiler::Compiler;
use crate::core::ContentStore;
use crate::graph::DependencyGraph;
use crate::util::fs::ensure_dir;

/// Compile a project: fingerprint sources, build the import graph, reuse
/// what the cache allows, compile the rest in dependency order, persist
/// artifacts and the updated index.
///
/// The index is saved even when some units fail; their entries are simply
/// absent, so the next build retries exactly those. Only an index-level
/// write failure aborts the whole build.
pub fn compile_project(ctx: &BuildContext, compiler: &dyn Compiler) -> Result<BuildResult> {
    compile_project_with_cancel(ctx, compiler, Arc::new(AtomicBool::new(false)))
}

/// Like [`compile_project`], but abortable: once `cancel` is set, no new
/// units are dispatched. In-flight compilations finish and their artifacts
/// are recorded, so a cancelled build resumes from where it stopped; units
/// never dispatched are reported as skipped.
pub fn compile_project_with_cancel(
    ctx: &BuildContext,
    compiler: &dyn Compiler,
    cancel: Arc<AtomicBool>,
) -> Result<BuildResult> {
    ensure_dir(&ctx.artifacts_root)?;
    ensure_dir(&ctx.cache_root)?;

    let store = ContentStore::load(&ctx.sources_root)
        .with_context(|| format!("failed to load sources from {}", ctx.sources_root.display()))?;

    let graph = DependencyGraph::build(&store)?;
    if graph.is_empty() && store.unreadable().is_empty() {
        tracing::info!("no sources found under {}", ctx.sources_root.display());
        return Ok(BuildResult::default());
    }

    let mut cache = CacheIndex::load(&ctx.index_path());
    let plan = BuildPlan::new(&graph, &store, ctx, &cache);
    let writer = ArtifactWriter::new(&ctx.artifacts_root);

    let executor = BuildExecutor::new(&graph, &store, &plan)
        .progress(true)
        .cancelled_by(cancel);
    let result = executor.execute(compiler, &mut cache, &writer, ctx.jobs)?;

    let live: HashSet<&str> = graph.units().iter().map(|u| u.id.as_str()).collect();
    cache.prune(&live);
    cache
        .save(&ctx.index_path())
        .context("failed to save cache index")?;

    Ok(result)
}

//! Build planning: partition units into cache hits and stale work.

use crate::builder::context::BuildContext;
use crate::builder::fingerprint::compute_unit_fingerprints;
use crate::cache::CacheIndex;
use crate::core::ContentStore;
use crate::graph::DependencyGraph;

/// The per-build work partition.
#[derive(Debug)]
pub struct BuildPlan {
    /// Fresh fingerprint per unit, indexed by unit index.
    pub fingerprints: Vec<String>,

    /// Units whose cached artifacts are reusable, in topo order.
    pub hits: Vec<usize>,

    /// Units that must be compiled (or pre-failed), in topo order.
    pub stale: Vec<usize>,
}

impl BuildPlan {
    /// Compute fingerprints and split the graph against the cache.
    ///
    /// A unit is a hit iff its stored fingerprint equals the fresh one and
    /// its artifacts still exist on disk; `--force` and broken units
    /// (unreadable file, unresolved import) always land in `stale`.
    pub fn new(
        graph: &DependencyGraph,
        store: &ContentStore,
        ctx: &BuildContext,
        cache: &CacheIndex,
    ) -> Self {
        let fingerprints = compute_unit_fingerprints(
            graph,
            store,
            &ctx.solc.version,
            &ctx.solc.digest(),
        );

        let mut hits = Vec::new();
        let mut stale = Vec::new();

        for &idx in graph.topo_order() {
            let unit = graph.unit(idx);
            let reusable = !ctx.force
                && graph.broken(idx).is_none()
                && cache.lookup(&unit.id, &fingerprints[idx]).is_some();

            if reusable {
                hits.push(idx);
            } else {
                stale.push(idx);
            }
        }

        tracing::info!(
            "build plan: {} unit(s), {} cached, {} to compile",
            graph.len(),
            hits.len(),
            stale.len()
        );

        BuildPlan {
            fingerprints,
            hits,
            stale,
        }
    }

    /// Number of units to compile.
    pub fn compile_count(&self) -> usize {
        self.stale.len()
    }

    /// Number of units reused from cache.
    pub fn reuse_count(&self) -> usize {
        self.hits.len()
    }
}

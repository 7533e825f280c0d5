//! Unit fingerprint composition.
//!
//! A unit's fingerprint is computed bottom-up over the condensation graph:
//!
//! `fp(u) = H(sorted file hashes, compiler version, options digest,
//! sorted fp(d) for direct deps d)`
//!
//! Because each fingerprint folds in its direct dependencies' fingerprints,
//! any change to a transitively imported file changes the fingerprint of
//! every dependent unit. No transitive-closure walk is needed at lookup
//! time, and each fingerprint is computed exactly once per build.

use crate::core::ContentStore;
use crate::graph::DependencyGraph;
use crate::util::hash::Fingerprint;

/// Compute fingerprints for every unit, indexed by unit index.
///
/// Unreadable member files contribute a sentinel component; their units are
/// pre-failed by the scheduler and never recorded, so the sentinel can
/// never produce a false cache hit.
pub fn compute_unit_fingerprints(
    graph: &DependencyGraph,
    store: &ContentStore,
    compiler_version: &str,
    options_digest: &str,
) -> Vec<String> {
    let mut fingerprints = vec![String::new(); graph.len()];

    for &idx in graph.topo_order() {
        let unit = graph.unit(idx);

        let mut file_hashes: Vec<String> = unit
            .files
            .iter()
            .map(|rel| match store.fingerprint(rel) {
                Some(hash) => hash.to_string(),
                None => format!("unreadable:{}", rel),
            })
            .collect();
        file_hashes.sort();

        let mut dep_fps: Vec<&str> = graph
            .deps(idx)
            .iter()
            .map(|&d| fingerprints[d].as_str())
            .collect();
        dep_fps.sort();

        let mut fp = Fingerprint::new();
        fp.update_strs(file_hashes.iter().map(String::as_str))
            .update_str(compiler_version)
            .update_str(options_digest)
            .update_strs(dep_fps);

        fingerprints[idx] = fp.finish();
    }

    fingerprints
}

//! Import graph construction and cycle collapse.
//!
//! Builds the file-level import graph, collapses strongly-connected
//! components into [`CompilationUnit`]s, and exposes the resulting
//! condensation graph in dependency order. The condensation is acyclic by
//! construction; if that invariant ever breaks it is reported as an
//! internal error, never as a user-facing cycle error: real import cycles
//! are legal and compiled jointly.

pub mod imports;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::DiGraph;

use crate::core::{CompilationUnit, ContentStore, UnitId};
use crate::util::diagnostic::{InternalGraphError, UnresolvedImportError};
use crate::util::fs::normalize_lexical;

/// The condensation graph: compilation units plus their "depends on" edges.
#[derive(Debug)]
pub struct DependencyGraph {
    units: Vec<CompilationUnit>,

    /// Direct dependency unit indices, sorted, per unit.
    deps: Vec<Vec<usize>>,

    /// Direct dependent unit indices, sorted, per unit.
    dependents: Vec<Vec<usize>>,

    /// Units that cannot be compiled regardless of cache state, with the
    /// reported cause (unreadable member file or unresolved import).
    broken: Vec<Option<String>>,

    /// Topological order, dependencies before dependents.
    order: Vec<usize>,

    /// Units grouped by topological level; units within a level are
    /// mutually independent.
    levels: Vec<Vec<usize>>,

    file_to_unit: HashMap<String, usize>,
    id_to_unit: HashMap<UnitId, usize>,
}

impl DependencyGraph {
    /// Build the graph from a loaded source snapshot.
    pub fn build(store: &ContentStore) -> Result<Self> {
        // File-level nodes. Unreadable files still get nodes so that units
        // importing them form real edges and fail with a cause instead of
        // an unresolved-import error.
        let mut file_keys: Vec<String> = store.files().map(|f| f.rel.clone()).collect();
        file_keys.extend(store.unreadable().keys().cloned());
        file_keys.sort();

        let file_index: HashMap<&str, usize> = file_keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.as_str(), i))
            .collect();

        let mut file_graph: DiGraph<usize, ()> = DiGraph::new();
        let nodes: Vec<_> = (0..file_keys.len()).map(|i| file_graph.add_node(i)).collect();

        // Scan and resolve imports. Resolution failures poison the file's
        // unit, not the whole build.
        let mut scans: HashMap<usize, imports::ScanResult> = HashMap::new();
        let mut file_errors: HashMap<usize, String> = HashMap::new();

        for file in store.files() {
            let from = file_index[file.rel.as_str()];
            let scan = imports::scan(&file.content);

            for spec in &scan.imports {
                match resolve_import(spec, &file.rel, store) {
                    Ok(target) => {
                        let to = file_index[target.as_str()];
                        if from != to && !file_graph.contains_edge(nodes[from], nodes[to]) {
                            file_graph.add_edge(nodes[from], nodes[to], ());
                        }
                    }
                    Err(e) => {
                        tracing::warn!("{}", e);
                        file_errors.entry(from).or_insert_with(|| e.to_string());
                    }
                }
            }

            scans.insert(from, scan);
        }

        for (rel, reason) in store.unreadable() {
            let idx = file_index[rel.as_str()];
            file_errors.insert(idx, format!("unreadable source `{}`: {}", rel, reason));
        }

        // Collapse strongly-connected components into units.
        let components = tarjan_scc(&file_graph);
        let mut comp_of_file = vec![usize::MAX; file_keys.len()];
        let mut units = Vec::with_capacity(components.len());
        let mut broken = Vec::with_capacity(components.len());

        for component in &components {
            let unit_idx = units.len();
            let mut members = Vec::with_capacity(component.len());
            let mut pragmas = Vec::new();
            let mut cause: Option<String> = None;

            for &node in component {
                let fidx = file_graph[node];
                comp_of_file[fidx] = unit_idx;
                members.push(file_keys[fidx].clone());
                if let Some(scan) = scans.get(&fidx) {
                    pragmas.extend(scan.pragmas.iter().cloned());
                }
                if cause.is_none() {
                    cause = file_errors.get(&fidx).cloned();
                }
            }

            pragmas.sort();
            pragmas.dedup();
            units.push(CompilationUnit::new(members, pragmas));
            broken.push(cause);
        }

        // Condensation edges.
        let mut unit_graph: DiGraph<usize, ()> = DiGraph::new();
        let unit_nodes: Vec<_> = (0..units.len()).map(|i| unit_graph.add_node(i)).collect();

        for edge in file_graph.edge_indices() {
            let (a, b) = file_graph.edge_endpoints(edge).expect("edge exists");
            let (ua, ub) = (comp_of_file[file_graph[a]], comp_of_file[file_graph[b]]);
            if ua != ub && !unit_graph.contains_edge(unit_nodes[ua], unit_nodes[ub]) {
                unit_graph.add_edge(unit_nodes[ua], unit_nodes[ub], ());
            }
        }

        // The condensation of an SCC decomposition must be acyclic.
        let sorted = toposort(&unit_graph, None).map_err(|cycle| InternalGraphError {
            detail: format!(
                "condensation graph contains a cycle through unit `{}`",
                units[unit_graph[cycle.node_id()]].id
            ),
        })?;

        // Edges point importer -> imported, so toposort yields dependents
        // first; reverse for a dependencies-first order.
        let order: Vec<usize> = sorted.into_iter().rev().map(|n| unit_graph[n]).collect();

        let mut deps = vec![Vec::new(); units.len()];
        let mut dependents = vec![Vec::new(); units.len()];
        for edge in unit_graph.edge_indices() {
            let (a, b) = unit_graph.edge_endpoints(edge).expect("edge exists");
            let (ua, ub) = (unit_graph[a], unit_graph[b]);
            deps[ua].push(ub);
            dependents[ub].push(ua);
        }
        for list in deps.iter_mut().chain(dependents.iter_mut()) {
            list.sort_unstable();
        }

        // Topological levels: level(u) = 1 + max level of its deps.
        let mut level = vec![0usize; units.len()];
        for &u in &order {
            level[u] = deps[u].iter().map(|&d| level[d] + 1).max().unwrap_or(0);
        }
        let max_level = level.iter().copied().max().unwrap_or(0);
        let mut levels = vec![Vec::new(); if units.is_empty() { 0 } else { max_level + 1 }];
        for &u in &order {
            levels[level[u]].push(u);
        }

        let file_to_unit = file_keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.clone(), comp_of_file[i]))
            .collect();
        let id_to_unit = units
            .iter()
            .enumerate()
            .map(|(i, u)| (u.id.clone(), i))
            .collect();

        tracing::debug!(
            "dependency graph: {} files, {} units, {} levels",
            file_keys.len(),
            units.len(),
            levels.len()
        );

        Ok(DependencyGraph {
            units,
            deps,
            dependents,
            broken,
            order,
            levels,
            file_to_unit,
            id_to_unit,
        })
    }

    pub fn units(&self) -> &[CompilationUnit] {
        &self.units
    }

    pub fn unit(&self, idx: usize) -> &CompilationUnit {
        &self.units[idx]
    }

    /// Direct dependencies of a unit.
    pub fn deps(&self, idx: usize) -> &[usize] {
        &self.deps[idx]
    }

    /// Direct dependents of a unit.
    pub fn dependents(&self, idx: usize) -> &[usize] {
        &self.dependents[idx]
    }

    /// Cause preventing this unit from compiling, if any.
    pub fn broken(&self, idx: usize) -> Option<&str> {
        self.broken[idx].as_deref()
    }

    /// Topological order, dependencies first.
    pub fn topo_order(&self) -> &[usize] {
        &self.order
    }

    /// Units grouped by topological level.
    pub fn levels(&self) -> &[Vec<usize>] {
        &self.levels
    }

    pub fn unit_of_file(&self, rel: &str) -> Option<usize> {
        self.file_to_unit.get(rel).copied()
    }

    pub fn unit_index(&self, id: &UnitId) -> Option<usize> {
        self.id_to_unit.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Resolve an import specifier to a store key.
///
/// Relative specifiers resolve against the importing file's directory;
/// anything else resolves against the sources root (external package
/// resolution is out of scope, so a bare specifier only works if the path
/// exists verbatim under the root).
fn resolve_import(
    spec: &str,
    from: &str,
    store: &ContentStore,
) -> Result<String, UnresolvedImportError> {
    let unresolved = || UnresolvedImportError {
        import: spec.to_string(),
        from: from.to_string(),
    };

    let candidate = if spec.starts_with("./") || spec.starts_with("../") {
        let parent = Path::new(from).parent().unwrap_or_else(|| Path::new(""));
        parent.join(spec)
    } else {
        PathBuf::from(spec)
    };

    let normalized = normalize_lexical(&candidate).ok_or_else(unresolved)?;
    let key = crate::core::source::rel_key(&normalized);

    if store.contains(&key) {
        Ok(key)
    } else {
        Err(unresolved())
    }
}

//! Persistent cache index.
//!
//! One JSON document at `cacheRoot/index` maps unit ids to the fingerprint
//! and artifact location of their last successful build. The index is the
//! only cache state slipway trusts; artifact bytes are revalidated by
//! existence, and any mismatch is a miss. A torn or malformed index is
//! recovered by starting from an empty cache, never by failing the build.

use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::UnitId;
use crate::util::fs::ensure_dir;

/// Index file name under the cache root.
pub const INDEX_FILE: &str = "index";

/// Bumped when the entry layout changes; a mismatch discards the cache.
const FORMAT_VERSION: u32 = 1;

/// Persisted record of one successful unit build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Unit fingerprint at the time of build. Composes the content of all
    /// transitive dependencies, so equality alone proves freshness.
    pub fingerprint: String,

    /// Directory the unit's artifacts were written to.
    pub artifact_dir: PathBuf,

    /// Direct-dependency fingerprints at the time of build (diagnostic
    /// record; not consulted by the hit check).
    pub dep_fingerprints: Vec<String>,

    /// Seconds since the epoch.
    pub built_at: u64,
}

/// The persistent unit-fingerprint index.
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheIndex {
    version: u32,
    entries: BTreeMap<String, CacheEntry>,
}

impl Default for CacheIndex {
    fn default() -> Self {
        CacheIndex {
            version: FORMAT_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

impl CacheIndex {
    /// Load the index from `path`.
    ///
    /// A missing file is an empty cache; an unreadable or malformed file is
    /// treated the same way, with a warning. Every entry then misses, which
    /// recompiles the world but never reuses stale output.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return CacheIndex::default();
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("cache index unreadable, rebuilding all: {}", e);
                return CacheIndex::default();
            }
        };

        match serde_json::from_str::<CacheIndex>(&content) {
            Ok(index) if index.version == FORMAT_VERSION => {
                tracing::debug!("loaded cache index with {} entries", index.entries.len());
                index
            }
            Ok(index) => {
                tracing::warn!(
                    "cache index format v{} does not match v{}, rebuilding all",
                    index.version,
                    FORMAT_VERSION
                );
                CacheIndex::default()
            }
            Err(e) => {
                tracing::warn!("cache index malformed, rebuilding all: {}", e);
                CacheIndex::default()
            }
        }
    }

    /// Atomically persist the index: write a temp file in the same
    /// directory, then rename over the target so a crash never leaves a
    /// torn index.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = path.parent().context("cache index path has no parent")?;
        ensure_dir(dir)?;

        let content = serde_json::to_string_pretty(self)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to create temp index in {}", dir.display()))?;
        tmp.write_all(content.as_bytes())?;
        tmp.persist(path)
            .with_context(|| format!("failed to persist cache index: {}", path.display()))?;

        Ok(())
    }

    /// Look up a reusable entry: the stored fingerprint must equal the
    /// freshly computed one and the artifact directory must still exist.
    pub fn lookup(&self, id: &UnitId, fingerprint: &str) -> Option<&CacheEntry> {
        let entry = self.entries.get(id.as_str())?;

        if entry.fingerprint != fingerprint {
            return None;
        }
        if !entry.artifact_dir.exists() {
            tracing::debug!("cache entry for {} lost its artifacts, miss", id);
            return None;
        }

        Some(entry)
    }

    /// Record a fresh build result.
    pub fn record(
        &mut self,
        id: &UnitId,
        fingerprint: String,
        artifact_dir: PathBuf,
        dep_fingerprints: Vec<String>,
    ) {
        let built_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        self.entries.insert(
            id.as_str().to_string(),
            CacheEntry {
                fingerprint,
                artifact_dir,
                dep_fingerprints,
                built_at,
            },
        );
    }

    /// Drop entries for units no longer present in the graph.
    pub fn prune(&mut self, live: &HashSet<&str>) {
        let before = self.entries.len();
        self.entries.retain(|id, _| live.contains(id.as_str()));
        let dropped = before - self.entries.len();
        if dropped > 0 {
            tracing::debug!("pruned {} stale cache entries", dropped);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

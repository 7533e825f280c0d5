//! Source discovery and content fingerprinting.
//!
//! A [`ContentStore`] snapshots the source tree for one build invocation:
//! every `.sol` file under the sources root is read and hashed exactly once,
//! and the store is read-only from then on.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::util::fs::{find_sources, relative_path};
use crate::util::hash::sha256_bytes;

/// One Solidity source file, immutable for the duration of a build.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Key within the sources root, `/`-separated.
    pub rel: String,

    /// Absolute path on disk.
    pub path: PathBuf,

    /// Raw text.
    pub content: String,

    /// SHA-256 of the raw bytes.
    pub hash: String,
}

/// Snapshot of all sources for one build run.
#[derive(Debug, Default)]
pub struct ContentStore {
    root: PathBuf,
    files: BTreeMap<String, SourceFile>,
    /// Files that were discovered but could not be read. Their units are
    /// reported as failed rather than silently skipped.
    unreadable: BTreeMap<String, String>,
}

/// Normalize a sources-root-relative path into a store key.
pub fn rel_key(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

impl ContentStore {
    /// Discover, read and fingerprint every source under `root`.
    pub fn load(root: &Path) -> Result<Self> {
        let mut store = ContentStore {
            root: root.to_path_buf(),
            files: BTreeMap::new(),
            unreadable: BTreeMap::new(),
        };

        for path in find_sources(root)? {
            let rel = rel_key(&relative_path(root, &path));

            match std::fs::read(&path) {
                Ok(bytes) => {
                    let hash = sha256_bytes(&bytes);
                    match String::from_utf8(bytes) {
                        Ok(content) => {
                            store.files.insert(
                                rel.clone(),
                                SourceFile {
                                    rel,
                                    path,
                                    content,
                                    hash,
                                },
                            );
                        }
                        Err(_) => {
                            store
                                .unreadable
                                .insert(rel, "file is not valid UTF-8".to_string());
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("unreadable source {}: {}", rel, e);
                    store.unreadable.insert(rel, e.to_string());
                }
            }
        }

        tracing::debug!(
            "loaded {} sources from {} ({} unreadable)",
            store.files.len(),
            root.display(),
            store.unreadable.len()
        );

        Ok(store)
    }

    /// The sources root this store was loaded from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Look up a source by its relative key.
    pub fn get(&self, rel: &str) -> Option<&SourceFile> {
        self.files.get(rel)
    }

    /// Whether a source with this key exists (readable or not).
    pub fn contains(&self, rel: &str) -> bool {
        self.files.contains_key(rel) || self.unreadable.contains_key(rel)
    }

    /// Content fingerprint of a readable source.
    pub fn fingerprint(&self, rel: &str) -> Option<&str> {
        self.files.get(rel).map(|f| f.hash.as_str())
    }

    /// Iterate over readable sources in key order.
    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    /// Files that could not be read, with the reported reason.
    pub fn unreadable(&self) -> &BTreeMap<String, String> {
        &self.unreadable
    }

    /// Number of readable sources.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the store holds no readable sources.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_hashes_every_source() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("Base.sol"), "contract Base {}").unwrap();
        let nested = tmp.path().join("lib");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("Math.sol"), "library Math {}").unwrap();

        let store = ContentStore::load(tmp.path()).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(
            store.fingerprint("Base.sol").unwrap(),
            sha256_bytes(b"contract Base {}")
        );
        assert!(store.get("lib/Math.sol").is_some());
    }

    #[test]
    fn rereading_unchanged_tree_gives_same_hashes() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("A.sol"), "contract A {}").unwrap();

        let first = ContentStore::load(tmp.path()).unwrap();
        let second = ContentStore::load(tmp.path()).unwrap();

        assert_eq!(first.fingerprint("A.sol"), second.fingerprint("A.sol"));
    }

    #[test]
    fn invalid_utf8_is_reported_not_skipped() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("Bad.sol"), [0xff, 0xfe, 0x00]).unwrap();

        let store = ContentStore::load(tmp.path()).unwrap();

        assert!(store.is_empty());
        assert!(store.unreadable().contains_key("Bad.sol"));
        assert!(store.contains("Bad.sol"));
    }
}

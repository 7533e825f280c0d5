//! Compilation units.
//!
//! A unit is the smallest group of files compiled together as one job. Most
//! units hold a single file; files in an import cycle are collapsed into a
//! shared unit and compiled jointly.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::hash::Fingerprint;

/// Stable identifier for a compilation unit.
///
/// Derived from the sorted set of member file paths only, never from file
/// content, so artifact paths stay stable across rebuilds. Shaped like
/// `Token-3fa85f264193`: a readable stem plus a hash of the full file set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    /// Derive a unit id from its sorted member paths.
    pub fn from_files(files: &[String]) -> Self {
        debug_assert!(files.windows(2).all(|w| w[0] <= w[1]));

        let mut fp = Fingerprint::new();
        fp.update_strs(files.iter().map(String::as_str));
        let digest = fp.finish_short();

        let stem = files
            .first()
            .and_then(|f| f.rsplit('/').next())
            .and_then(|f| f.strip_suffix(".sol"))
            .unwrap_or("unit");

        UnitId(format!("{}-{}", sanitize(stem), digest))
    }

    /// The id as a path-safe string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// A group of source files compiled together as one indivisible job.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    pub id: UnitId,

    /// Member file keys, sorted.
    pub files: Vec<String>,

    /// `pragma solidity` ranges seen in the member files. Informational;
    /// version selection is driven by configuration.
    pub pragmas: Vec<String>,
}

impl CompilationUnit {
    /// Create a unit from its member files. Files are sorted to make the
    /// id and fingerprint deterministic.
    pub fn new(mut files: Vec<String>, pragmas: Vec<String>) -> Self {
        files.sort();
        files.dedup();
        let id = UnitId::from_files(&files);
        CompilationUnit { id, files, pragmas }
    }

    /// Whether this unit was collapsed from an import cycle.
    pub fn is_cyclic(&self) -> bool {
        self.files.len() > 1
    }
}

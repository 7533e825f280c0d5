//! Slipway - an incremental build pipeline for Solidity smart contracts
//!
//! Slipway fingerprints every source file, builds the import graph,
//! collapses import cycles into joint compilation units, and recompiles
//! only the units whose transitive inputs changed since the last build.

pub mod artifacts;
pub mod builder;
pub mod cache;
pub mod compiler;
pub mod core;
pub mod graph;
pub mod ops;
pub mod util;

pub use crate::core::{CompilationUnit, ContentStore, SourceFile, UnitId};
pub use builder::{BuildContext, BuildResult};
pub use cache::CacheIndex;
pub use compiler::{Compiler, SolcCompiler};
pub use graph::DependencyGraph;
pub use util::Config;

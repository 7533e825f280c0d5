//! Core data model: sources and compilation units.

pub mod source;
pub mod unit;

pub use source::{ContentStore, SourceFile};
pub use unit::{CompilationUnit, UnitId};

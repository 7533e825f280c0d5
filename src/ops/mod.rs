//! High-level operations invoked by the CLI.

pub mod compile;

pub use compile::{compile_project, compile_project_with_cancel};

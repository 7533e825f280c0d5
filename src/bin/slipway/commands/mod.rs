//! Command implementations.

pub mod build;
pub mod cache;
pub mod clean;
pub mod completions;

//! Build planning and execution.

pub mod context;
pub mod executor;
pub mod fingerprint;
pub mod plan;

pub use context::BuildContext;
pub use executor::{BuildExecutor, BuildResult, UnitFailure};
pub use plan::BuildPlan;

//! Compiler diagnostics and typed build errors.
//!
//! Diagnostics preserve the backend's file/line/message fidelity and are
//! returned in full whether or not the owning unit compiled. Typed errors
//! carry miette codes so callers can distinguish user mistakes from bugs.

use std::fmt;

use miette::Diagnostic as MietteDiagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity level for compiler diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// A single diagnostic reported by the compiler backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Source path, relative to the sources root.
    pub file: Option<String>,
    /// 1-based line.
    pub line: Option<u32>,
    /// 1-based column.
    pub column: Option<u32>,
    pub message: String,
}

impl Diagnostic {
    /// Create an error diagnostic with no location.
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            file: None,
            line: None,
            column: None,
            message: message.into(),
        }
    }

    /// Create a warning diagnostic with no location.
    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            file: None,
            line: None,
            column: None,
            message: message.into(),
        }
    }

    /// Attach a source location.
    pub fn at(mut self, file: impl Into<String>, line: u32, column: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    /// Format for terminal output, e.g. `error[Token.sol:4:9]: message`.
    pub fn render(&self, color: bool) -> String {
        let severity_str = if color {
            match self.severity {
                Severity::Error => "\x1b[1;31merror\x1b[0m",
                Severity::Warning => "\x1b[1;33mwarning\x1b[0m",
                Severity::Info => "\x1b[1;36minfo\x1b[0m",
            }
        } else {
            match self.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
                Severity::Info => "info",
            }
        };

        match (&self.file, self.line, self.column) {
            (Some(file), Some(line), Some(col)) => {
                format!("{}[{}:{}:{}]: {}", severity_str, file, line, col, self.message)
            }
            (Some(file), _, _) => format!("{}[{}]: {}", severity_str, file, self.message),
            _ => format!("{}: {}", severity_str, self.message),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(false))
    }
}

/// An import statement that does not resolve to any file under the
/// sources root.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("cannot resolve import `{import}` in {from}")]
#[diagnostic(
    code(slipway::graph::unresolved_import),
    help("imports resolve relative to the importing file, then against the sources root")
)]
pub struct UnresolvedImportError {
    pub import: String,
    pub from: String,
}

/// Cycle-collapse invariant violated. This is a slipway bug, not a user
/// error; real import cycles are legal and compiled as a single unit.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("internal dependency graph error: {detail}")]
#[diagnostic(
    code(slipway::graph::internal),
    help("this is a bug in slipway; please report it")
)]
pub struct InternalGraphError {
    pub detail: String,
}

/// The solc binary could not be located.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("solc {version} not found")]
#[diagnostic(
    code(slipway::compiler::solc_not_found),
    help("install solc and make sure it is on PATH, or set the SOLC environment variable")
)]
pub struct SolcNotFoundError {
    pub version: String,
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprintln!("{}", diagnostic.render(color));
}

//! Solc subprocess backend.
//!
//! Speaks solc's standard JSON interface over stdin/stdout. Each unit is
//! one invocation with a wall-clock deadline; a hung or crashed compiler is
//! converted into that unit's failure, never into scheduler state.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use semver::Version;
use serde_json::{json, Value};

use crate::util::diagnostic::{Diagnostic, Severity, SolcNotFoundError};
use crate::util::process::{find_solc, ProcessBuilder};

use super::{CompileError, CompileInput, CompileOutput, Compiler, ContractArtifact, SolcOptions};

/// The standard-JSON solc backend.
pub struct SolcCompiler {
    binary: PathBuf,
    options: SolcOptions,
    timeout: Duration,
}

impl SolcCompiler {
    /// Locate solc and verify its version against the configured one.
    ///
    /// A mismatch is a warning, not an error: the configured version string
    /// still feeds every fingerprint, so switching binaries invalidates the
    /// cache either way.
    pub fn new(options: SolcOptions, timeout: Duration) -> Result<Self> {
        let binary = find_solc().ok_or_else(|| SolcNotFoundError {
            version: options.version.clone(),
        })?;

        let compiler = SolcCompiler {
            binary,
            options,
            timeout,
        };

        match compiler.installed_version() {
            Ok(installed) => {
                let configured = Version::parse(&compiler.options.version).ok();
                if configured.as_ref() != Some(&installed) {
                    tracing::warn!(
                        "installed solc is {} but configuration requires {}",
                        installed,
                        compiler.options.version
                    );
                }
            }
            Err(e) => tracing::warn!("could not determine solc version: {}", e),
        }

        Ok(compiler)
    }

    /// Query the installed binary's version (`solc --version`).
    pub fn installed_version(&self) -> Result<Version> {
        let output = ProcessBuilder::new(&self.binary)
            .arg("--version")
            .exec_and_check()?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_version_output(&stdout)
            .ok_or_else(|| anyhow::anyhow!("unrecognized solc --version output"))
    }

    fn standard_json_input(&self, input: &CompileInput) -> Value {
        let sources: serde_json::Map<String, Value> = input
            .sources
            .iter()
            .map(|(path, content)| (path.clone(), json!({ "content": content })))
            .collect();

        let mut settings = json!({
            "optimizer": {
                "enabled": self.options.optimizer,
                "runs": self.options.optimizer_runs,
            },
            "outputSelection": {
                "*": {
                    "*": [
                        "abi",
                        "evm.bytecode.object",
                        "evm.bytecode.sourceMap",
                        "evm.deployedBytecode.object",
                    ]
                }
            }
        });
        if let Some(ref evm) = self.options.evm_version {
            settings["evmVersion"] = json!(evm);
        }

        json!({
            "language": "Solidity",
            "sources": sources,
            "settings": settings,
        })
    }
}

impl Compiler for SolcCompiler {
    fn compile(&self, input: &CompileInput) -> Result<CompileOutput, CompileError> {
        let request = self.standard_json_input(input);

        let output = ProcessBuilder::new(&self.binary)
            .arg("--standard-json")
            .stdin(request.to_string())
            .exec_timeout(self.timeout)
            .map_err(|e| CompileError::Backend(format!("{:#}", e)))?
            .ok_or(CompileError::Timeout(self.timeout.as_secs()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CompileError::Backend(format!(
                "solc exited with {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        let response: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| CompileError::Backend(format!("unparseable solc output: {}", e)))?;

        let diagnostics = collect_diagnostics(&response, input);
        let has_errors = diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error);
        if has_errors {
            return Err(CompileError::Source { diagnostics });
        }

        let contracts = collect_contracts(&response);
        Ok(CompileOutput {
            contracts,
            diagnostics,
        })
    }

    fn version(&self) -> &str {
        &self.options.version
    }
}

/// Extract `0.8.20` from `Version: 0.8.20+commit.a1b79de6.Linux.g++`.
fn parse_version_output(stdout: &str) -> Option<Version> {
    let line = stdout.lines().find(|l| l.trim_start().starts_with("Version:"))?;
    let raw = line.split(':').nth(1)?.trim();
    let semver_part = raw.split('+').next()?;
    Version::parse(semver_part).ok()
}

fn collect_diagnostics(response: &Value, input: &CompileInput) -> Vec<Diagnostic> {
    let Some(errors) = response.get("errors").and_then(Value::as_array) else {
        return Vec::new();
    };

    errors
        .iter()
        .map(|err| {
            let severity = match err.get("severity").and_then(Value::as_str) {
                Some("error") => Severity::Error,
                Some("warning") => Severity::Warning,
                _ => Severity::Info,
            };

            let message = err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown compiler error")
                .to_string();

            let mut diag = Diagnostic {
                severity,
                file: None,
                line: None,
                column: None,
                message,
            };

            if let Some(loc) = err.get("sourceLocation") {
                let file = loc.get("file").and_then(Value::as_str);
                let start = loc.get("start").and_then(Value::as_i64);
                if let Some(file) = file {
                    diag.file = Some(file.to_string());
                    if let (Some(offset), Some((_, content))) = (
                        start.filter(|&s| s >= 0),
                        input.sources.iter().find(|(p, _)| p == file),
                    ) {
                        let (line, col) = offset_to_line_col(content, offset as usize);
                        diag.line = Some(line);
                        diag.column = Some(col);
                    }
                }
            }

            diag
        })
        .collect()
}

fn collect_contracts(response: &Value) -> Vec<ContractArtifact> {
    let Some(by_file) = response.get("contracts").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut contracts = Vec::new();
    for (source, by_name) in by_file {
        let Some(by_name) = by_name.as_object() else {
            continue;
        };
        for (name, body) in by_name {
            let str_at = |v: &Value, path: &[&str]| -> String {
                let mut cur = v;
                for key in path {
                    match cur.get(key) {
                        Some(next) => cur = next,
                        None => return String::new(),
                    }
                }
                cur.as_str().unwrap_or_default().to_string()
            };

            contracts.push(ContractArtifact {
                name: name.clone(),
                source: source.clone(),
                abi: body.get("abi").cloned().unwrap_or(Value::Array(Vec::new())),
                bytecode: str_at(body, &["evm", "bytecode", "object"]),
                deployed_bytecode: str_at(body, &["evm", "deployedBytecode", "object"]),
                source_map: str_at(body, &["evm", "bytecode", "sourceMap"]),
            });
        }
    }

    contracts.sort_by(|a, b| (&a.source, &a.name).cmp(&(&b.source, &b.name)));
    contracts
}

/// Convert a byte offset into a 1-based line and column. The column counts
/// characters, not bytes, so multibyte source text maps correctly.
fn offset_to_line_col(content: &str, offset: usize) -> (u32, u32) {
    let mut clamped = offset.min(content.len());
    while clamped > 0 && !content.is_char_boundary(clamped) {
        clamped -= 1;
    }

    let prefix = &content[..clamped];
    let line = prefix.matches('\n').count() as u32 + 1;
    let line_start = prefix.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let col = prefix[line_start..].chars().count() as u32 + 1;
    (line, col)
}

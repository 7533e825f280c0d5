//! Implementation of `slipway build`.

use anyhow::{bail, Result};

use slipway::builder::BuildContext;
use slipway::compiler::SolcCompiler;
use slipway::ops::compile_project;
use slipway::util::config::{Config, CONFIG_FILE};
use slipway::util::diagnostic::emit;

use crate::cli::BuildArgs;

pub fn execute(args: BuildArgs, color: bool) -> Result<()> {
    let root = match args.path {
        Some(path) => path,
        None => std::env::current_dir()?,
    };

    let config = Config::load_or_default(&root.join(CONFIG_FILE))?;
    let ctx = BuildContext::from_config(&root, &config)
        .with_jobs(args.jobs)
        .with_force(args.force);

    let compiler = SolcCompiler::new(ctx.solc.clone(), ctx.timeout)?;
    let result = compile_project(&ctx, &compiler)?;

    for diagnostic in &result.diagnostics {
        emit(diagnostic, color);
    }

    for failure in &result.failed {
        if failure.root == failure.unit {
            eprintln!("error: unit {} failed: {}", failure.unit, failure.error);
        } else {
            eprintln!(
                "error: unit {} skipped: {} (root cause: {})",
                failure.unit, failure.error, failure.root
            );
        }
    }

    eprintln!(
        "    Finished {} unit(s): {} compiled, {} cached, {} failed",
        result.compiled + result.reused + result.failed.len(),
        result.compiled,
        result.reused,
        result.failed.len()
    );

    if !result.failed.is_empty() {
        bail!("{} unit(s) failed to build", result.failed.len());
    }

    Ok(())
}

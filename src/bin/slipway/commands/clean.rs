//! Implementation of `slipway clean`.

use anyhow::Result;

use slipway::builder::BuildContext;
use slipway::util::config::{Config, CONFIG_FILE};
use slipway::util::fs::remove_dir_all_if_exists;

use crate::cli::CleanArgs;

pub fn execute(args: CleanArgs) -> Result<()> {
    let root = match args.path {
        Some(path) => path,
        None => std::env::current_dir()?,
    };

    let config = Config::load_or_default(&root.join(CONFIG_FILE))?;
    let ctx = BuildContext::from_config(&root, &config);

    remove_dir_all_if_exists(&ctx.artifacts_root)?;
    remove_dir_all_if_exists(&ctx.cache_root)?;

    eprintln!("     Removed artifacts and cache");
    Ok(())
}

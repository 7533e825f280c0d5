//! Implementation of `slipway cache`.

use anyhow::Result;

use slipway::builder::BuildContext;
use slipway::cache::CacheIndex;
use slipway::util::config::{Config, CONFIG_FILE};
use slipway::util::fs::dir_size;

use crate::cli::{CacheAction, CacheArgs};

pub fn execute(args: CacheArgs) -> Result<()> {
    let root = match args.path {
        Some(path) => path,
        None => std::env::current_dir()?,
    };

    let config = Config::load_or_default(&root.join(CONFIG_FILE))?;
    let ctx = BuildContext::from_config(&root, &config);

    match args.action {
        CacheAction::Stats => {
            let index = CacheIndex::load(&ctx.index_path());
            let cache_bytes = dir_size(&ctx.cache_root);
            let artifact_bytes = dir_size(&ctx.artifacts_root);

            println!("cache entries:  {}", index.len());
            println!("cache size:     {} bytes", cache_bytes);
            println!("artifacts size: {} bytes", artifact_bytes);
        }
        CacheAction::Clear => {
            if ctx.index_path().exists() {
                std::fs::remove_file(ctx.index_path())?;
            }
            eprintln!("     Cleared cache index");
        }
    }

    Ok(())
}

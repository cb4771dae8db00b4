use anyhow::Context;
use anyhow::Result;
use pilotdeck_core::Config;
use pilotdeck_core::ResponseCache;
use std::path::Path;

#[derive(Debug, clap::Args)]
pub struct CacheCli {
    #[command(subcommand)]
    subcommand: CacheSubcommand,
}

#[derive(Debug, clap::Subcommand)]
enum CacheSubcommand {
    /// Report how many live entries the snapshot holds.
    Stats,
    /// Drop expired entries from the snapshot and rewrite it.
    Sweep,
    /// Delete the snapshot entirely.
    Clear,
}

pub fn run(config: Config, args: CacheCli) -> Result<()> {
    let path = config
        .cache_snapshot_path
        .as_deref()
        .context("cache_snapshot_path is not set in the config")?;

    match args.subcommand {
        CacheSubcommand::Stats => {
            let live = load(path)?.len();
            println!("{live} live entries in {}", path.display());
        }
        CacheSubcommand::Sweep => {
            let cache = load(path)?;
            // Loading already drops expired entries; rewriting persists that.
            let kept = cache.save_snapshot(path)?;
            println!("kept {kept} entries in {}", path.display());
        }
        CacheSubcommand::Clear => {
            if path.exists() {
                std::fs::remove_file(path)
                    .with_context(|| format!("removing {}", path.display()))?;
            }
            println!("cleared {}", path.display());
        }
    }
    Ok(())
}

fn load(path: &Path) -> Result<ResponseCache> {
    let cache = ResponseCache::new();
    if path.exists() {
        cache
            .load_snapshot(path)
            .with_context(|| format!("loading snapshot {}", path.display()))?;
    }
    Ok(cache)
}

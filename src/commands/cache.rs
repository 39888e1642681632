use clap::{Args, Subcommand};
use serde::Serialize;

use foreman::cache::{CacheEntry, CacheKey, CacheStore};
use foreman::provision;

use super::{CmdResult, GlobalArgs, Workspace};

#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    command: CacheCommand,
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Print the cache key for the current dependency manifest
    Key,
    /// List cached environments, newest first
    List {
        /// Key prefix to filter on (defaults to cache.prefix)
        #[arg(long)]
        prefix: Option<String>,
    },
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CacheOutput {
    Key {
        command: String,
        key: CacheKey,
    },
    List {
        command: String,
        root: String,
        entries: Vec<CacheEntry>,
    },
}

pub fn run(args: CacheArgs, global: &GlobalArgs) -> CmdResult<CacheOutput> {
    let ws = Workspace::load(global)?;
    match args.command {
        CacheCommand::Key => {
            let key = provision::cache_key(&ws.config, ws.root())?;
            Ok((
                CacheOutput::Key {
                    command: "cache.key".to_string(),
                    key,
                },
                0,
            ))
        }
        CacheCommand::List { prefix } => {
            let store = ws.cache_store()?;
            let prefix = prefix.unwrap_or_else(|| ws.config.cache.prefix.clone());
            let entries = store.list(&prefix)?;
            Ok((
                CacheOutput::List {
                    command: "cache.list".to_string(),
                    root: store.root().to_string_lossy().to_string(),
                    entries,
                },
                0,
            ))
        }
    }
}

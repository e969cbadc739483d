use super::open_store;
use crate::config::Config;
use std::path::PathBuf;

pub async fn cmd_prune(config: &Config, path: Option<String>) -> anyhow::Result<()> {
    let root = PathBuf::from(path.unwrap_or_else(|| config.library.library_path.clone()));
    let store = open_store(config).await?;

    let removed = store.prune_missing(&root).await?;
    println!("Removed {removed} stale entries under {}", root.display());

    Ok(())
}

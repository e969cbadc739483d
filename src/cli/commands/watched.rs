use super::open_store;
use crate::config::Config;
use crate::db::StoreError;

pub async fn cmd_watched(config: &Config, path: &str, unset: bool) -> anyhow::Result<()> {
    let store = open_store(config).await?;

    // Stored paths are canonical; accept relative input too.
    let resolved = std::fs::canonicalize(path)
        .map_or_else(|_| path.to_string(), |p| p.to_string_lossy().into_owned());

    match store.set_watched(&resolved, !unset).await {
        Ok(()) => {
            let state = if unset { "unwatched" } else { "watched" };
            println!("Marked as {state}: {resolved}");
            Ok(())
        }
        Err(StoreError::NotFound { .. }) => {
            println!("Not in the catalog: {resolved}");
            println!("Run 'anicat scan' first.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

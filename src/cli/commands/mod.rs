mod enrich;
mod init;
mod list;
mod prune;
mod scan;
mod search;
mod watched;

pub use enrich::cmd_enrich;
pub use init::cmd_init;
pub use list::cmd_list;
pub use prune::cmd_prune;
pub use scan::cmd_scan;
pub use search::cmd_search;
pub use watched::cmd_watched;

use crate::clients::{AnilistClient, MetadataProvider};
use crate::config::Config;
use crate::db::Store;
use crate::services::Catalog;
use anyhow::Context;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

async fn open_store(config: &Config) -> anyhow::Result<Store> {
    Store::open(&config.general)
        .await
        .with_context(|| format!("Failed to open catalog at {}", config.general.database_path))
}

async fn open_catalog(config: &Config) -> anyhow::Result<Catalog> {
    let store = open_store(config).await?;

    let provider: Option<Arc<dyn MetadataProvider>> = if config.metadata.enabled {
        let client = AnilistClient::new(&config.metadata).context("Failed to build AniList client")?;
        Some(Arc::new(client))
    } else {
        None
    };

    Ok(Catalog::new(store, config, provider))
}

/// Token cancelled on Ctrl+C, so long runs stop after the item in flight.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received, finishing current item");
            trigger.cancel();
        }
    });
    cancel
}

use super::{cancel_on_ctrl_c, open_catalog};
use crate::config::Config;
use crate::services::EnrichStatus;

pub async fn cmd_enrich(config: &Config) -> anyhow::Result<()> {
    if !config.metadata.enabled {
        println!("Metadata fetching is disabled (metadata.enabled = false).");
        return Ok(());
    }

    let catalog = open_catalog(config).await?;
    let cancel = cancel_on_ctrl_c();

    let Some(report) = catalog.enrich(&cancel).await? else {
        return Ok(());
    };

    if report.outcomes.is_empty() {
        println!("Every series already has metadata.");
        return Ok(());
    }

    for outcome in &report.outcomes {
        let marker = match outcome.status {
            EnrichStatus::Enriched => "✓",
            EnrichStatus::NoMatch => "?",
            EnrichStatus::Failed => "✗",
        };
        println!("{marker} {}", outcome.title);
    }

    println!();
    println!(
        "Enriched: {} | No match: {} | Failed: {}{}",
        report.count(EnrichStatus::Enriched),
        report.count(EnrichStatus::NoMatch),
        report.count(EnrichStatus::Failed),
        if report.cancelled { " (cancelled)" } else { "" }
    );

    Ok(())
}

use super::{cancel_on_ctrl_c, open_catalog};
use crate::config::Config;
use crate::services::EnrichStatus;
use std::path::PathBuf;

pub async fn cmd_scan(config: &Config, path: Option<String>, no_enrich: bool) -> anyhow::Result<()> {
    let root = PathBuf::from(path.unwrap_or_else(|| config.library.library_path.clone()));
    let catalog = open_catalog(config).await?;
    let cancel = cancel_on_ctrl_c();

    println!("Scanning {}...", root.display());

    let (report, enrichment) = if no_enrich {
        (catalog.scan(&root, &cancel).await?, None)
    } else {
        catalog.scan_and_enrich(&root, &cancel).await?
    };

    println!();
    println!("{:-<70}", "");
    println!("Scan complete{}", if report.cancelled { " (cancelled)" } else { "" });
    println!("  Series touched: {}", report.series_touched.len());
    println!("  Added:          {}", report.episodes_added);
    println!("  Updated:        {}", report.episodes_updated);
    println!("  Moved:          {}", report.moved);
    println!("  Errors:         {}", report.errors.len());

    for issue in report.errors.iter().take(10) {
        println!("    {} - {}", issue.path.display(), issue.message);
    }
    if report.errors.len() > 10 {
        println!("    ... and {} more", report.errors.len() - 10);
    }

    if let Some(handle) = enrichment {
        println!();
        println!("Fetching metadata for {} series...", report.series_touched.len());
        let enriched = handle.await??;
        println!(
            "  Enriched: {} | No match: {} | Failed: {}",
            enriched.count(EnrichStatus::Enriched),
            enriched.count(EnrichStatus::NoMatch),
            enriched.count(EnrichStatus::Failed)
        );
    }

    Ok(())
}

use super::open_store;
use crate::config::Config;

pub async fn cmd_list(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let library = store.all_series_with_episodes().await?;

    if library.is_empty() {
        println!("Catalog is empty.");
        println!();
        println!("Index your library with: anicat scan [path]");
        return Ok(());
    }

    println!("Library ({} series)", library.len());
    println!("{:-<70}", "");

    for series in &library {
        let status_indicator = if series.metadata_fetched_at.is_some() { "✓" } else { "•" };
        println!(
            "{} {} [{}/{} watched]",
            status_indicator,
            series.title,
            series.watched_count(),
            series.episodes.len()
        );
        if !series.genres.is_empty() {
            println!("  Genres: {}", series.genres.join(", "));
        }
    }

    println!();
    println!("Legend: ✓ Metadata fetched | • Pending");

    Ok(())
}

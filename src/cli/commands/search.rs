use super::open_store;
use crate::config::Config;

pub async fn cmd_search(config: &Config, query: &str) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let results = store.search_series(query).await?;

    if results.is_empty() {
        println!("No series matching '{query}'");
        return Ok(());
    }

    println!("Search Results:");
    println!("{:-<60}", "");

    for series in &results {
        println!("• {}", series.title);
        println!("  Path: {}", series.path);
        if let Some(description) = &series.description {
            let preview: String = description.chars().take(160).collect();
            let ellipsis = if description.chars().count() > 160 { "..." } else { "" };
            println!("  {preview}{ellipsis}");
        }
        println!();
    }

    Ok(())
}

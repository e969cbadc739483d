pub mod cli;
pub mod clients;
pub mod config;
pub mod constants;
pub mod db;
pub mod domain;
pub mod entities;
pub mod models;
pub mod parser;
pub mod services;

use cli::{Cli, Commands};
pub use config::Config;
pub use db::{Store, StoreError};
pub use domain::events::CatalogEvent;
pub use services::Catalog;
use tracing_subscriber::EnvFilter;

/// Loads the config named on the command line, or searches the default
/// locations.
pub fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    config.validate()?;
    Ok(config)
}

pub fn init_tracing(config: &Config) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.general.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    match cli.command {
        Commands::Scan { path, no_enrich } => cli::cmd_scan(&config, path, no_enrich).await,
        Commands::Enrich => cli::cmd_enrich(&config).await,
        Commands::List => cli::cmd_list(&config).await,
        Commands::Search { query } => cli::cmd_search(&config, &query.join(" ")).await,
        Commands::Watched { path, unset } => cli::cmd_watched(&config, &path, unset).await,
        Commands::Prune { path } => cli::cmd_prune(&config, path).await,
        Commands::Init => cli::cmd_init(),
    }
}

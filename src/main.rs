use anicat::cli::{Cli, Commands};
use anicat::{Config, init_tracing, load_config, run};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // `init` must work before any config file exists.
    let config = if matches!(cli.command, Commands::Init) {
        Config::default()
    } else {
        load_config(&cli)?
    };
    init_tracing(&config);

    let worker_threads = config.general.worker_threads;

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();

    if worker_threads > 0 {
        builder.worker_threads(worker_threads);
    }

    let runtime = builder.build()?;
    runtime.block_on(run(cli, config))
}

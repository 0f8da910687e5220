mod cli;
mod commands;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.opts.log_level);

    let config_dir = cli
        .opts
        .config_dir
        .clone()
        .unwrap_or_else(basin_config::default_config_dir);

    if let Err(error) = commands::run(config_dir, cli.command).await {
        tracing::error!(%error, "basin exited with an error");
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

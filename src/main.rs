mod app;
mod cidr;
mod config;
mod context;
mod inventory;
mod query;
mod render;

use anyhow::Result;
use clap::Parser;

use app::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let start = std::time::Instant::now();
    let match_count = app::run(&cli)?;

    let elapsed = start.elapsed();
    tracing::info!(
        "Matched {} entities in {:.2}ms",
        match_count,
        elapsed.as_secs_f64() * 1000.0
    );

    Ok(())
}

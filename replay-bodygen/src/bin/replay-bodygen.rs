//! CLI entry point for replay-bodygen.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

/// replay-bodygen — generate replay consumer bodies from an API description.
#[derive(Parser, Debug)]
#[command(name = "replay-bodygen", version, about)]
struct Cli {
    /// Path to the bodygen.toml configuration file.
    #[arg(default_value = "bodygen.toml")]
    config: PathBuf,

    /// Output file path (overrides config).
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("replay_bodygen=info")),
        )
        .init();

    let cli = Cli::parse();
    replay_bodygen::run(&cli.config, cli.output.as_deref())?;
    Ok(())
}

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use phishshield_engine::{engine::validate_url, predict, ArtifactBundle, ArtifactPaths, Config};

/// Score URLs against the phishing model without starting the server.
#[derive(Debug, Parser)]
#[command(name = "phishshield-scan", version)]
struct Args {
    /// URLs to score
    #[arg(required = true)]
    urls: Vec<String>,

    /// Configuration file (defaults to ./phishshield.{toml,yaml,json})
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the three artifacts; overrides the configured paths
    #[arg(short, long)]
    artifacts: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load_from(args.config.as_deref())?;
    let paths = args
        .artifacts
        .map(ArtifactPaths::in_dir)
        .unwrap_or(config.artifacts);

    let bundle = ArtifactBundle::load(&paths).await?;

    for url in &args.urls {
        let url = validate_url(Some(url.as_str()))?;
        let result = predict(&bundle, url, config.block_threshold)?;
        let line = if args.pretty {
            serde_json::to_string_pretty(&result)?
        } else {
            serde_json::to_string(&result)?
        };
        println!("{}", line);
    }

    Ok(())
}

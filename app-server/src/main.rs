use std::path::PathBuf;

use clap::Parser;
use imgscore_app_server::{AppConfig, init_tracing, run};

/// Score how well an image matches a text prompt.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, short = 'c', env = "IMGSCORE_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overriding `server.bind`.
    #[arg(long, env = "IMGSCORE_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }

    init_tracing(config.server.log_format);
    run(config, None).await
}

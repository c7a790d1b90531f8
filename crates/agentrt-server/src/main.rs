use std::net::SocketAddr;
use std::path::PathBuf;

use agentrt_config::ConfigLoader;
use agentrt_domain::config::Config;
use agentrt_server::AppState;
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
struct Cli {
    #[arg(long, default_value = "agentrt.toml")]
    config: PathBuf,
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = load_config(&cli.config)?;
    let state = AppState::bootstrap(config).context("bootstrapping runtime")?;

    let app = agentrt_server::api::router(state);
    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("binding {}", cli.listen))?;

    tracing::info!(addr = %cli.listen, "agentrt-server listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,agentrt_core=debug")))
        .json()
        .init();
}

fn load_config(path: &PathBuf) -> anyhow::Result<Config> {
    let config = if path.exists() {
        ConfigLoader::load(path).with_context(|| format!("loading {}", path.display()))?
    } else {
        tracing::warn!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };
    ConfigLoader::validate(&config).context("validating config")?;
    Ok(config)
}

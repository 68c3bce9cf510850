use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;

use cellar::apogee::OpenAiApogeeEstimator;
use cellar::app::{AppState, router};
use cellar::config::AppConfig;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct AppArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// Directory holding the record store.
    #[arg(long, default_value = "cellar-data")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return std::process::ExitCode::FAILURE;
    }

    std::process::ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    cellar::logging::init().context("init logging")?;

    let args = AppArgs::parse();
    let config = AppConfig::from_env().context("load config")?;
    tracing::info!(?args, ?config, "starting cellar-app");

    let secret = config.require_api_key()?.to_owned();
    let catalog = cellar::commands::open_catalog(&args.data_dir, &config)?;
    let mut state = AppState::new(Arc::new(catalog), secret);
    match &config.openai {
        Some(openai) => {
            tracing::info!(model = %openai.model, "apogee estimation enabled");
            state = state.with_apogee(Arc::new(OpenAiApogeeEstimator::new(openai)));
        }
        None => tracing::info!("OPENAI_API_KEY not set; apogee estimation disabled"),
    }

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("bind {}", args.addr))?;
    tracing::info!(addr = %args.addr, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(?err, "listen for shutdown signal");
            }
        })
        .await
        .context("serve")?;

    Ok(())
}

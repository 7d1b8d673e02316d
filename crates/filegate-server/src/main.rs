use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use filegate_core::{AppState, ReceivedStore};
use tracing_subscriber::EnvFilter;

mod config;

use config::Config;

#[derive(Debug, Parser)]
#[command(name = "filegate-server", version, about = "Upload verification gate")]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "filegate.toml")]
    config: PathBuf,

    /// Listen address, overrides server.bind_address
    #[arg(long)]
    bind: Option<String>,

    /// Directory for accepted uploads, overrides server.received_dir
    #[arg(long)]
    received_dir: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("filegate_server=info,filegate_core=info,filegate_api=info,tower_http=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Resolve the listen address: CLI flag, then `port` (the `PORT` variable),
/// then the config file. An unparsable port is ignored.
fn bind_address(args: &Args, port: Option<&str>, config: &Config) -> String {
    if let Some(bind) = &args.bind {
        return bind.clone();
    }
    if let Some(port) = port.and_then(|p| p.trim().parse::<u16>().ok()) {
        return format!("0.0.0.0:{}", port);
    }
    config.server.bind_address.clone()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let mut config = Config::load(&args.config)?;
    if let Some(dir) = &args.received_dir {
        config.server.received_dir = dir.clone();
    }
    let port = std::env::var("PORT").ok();
    let addr = bind_address(&args, port.as_deref(), &config);

    let store = ReceivedStore::new(&config.server.received_dir);
    store
        .ensure_dir()
        .with_context(|| format!("Failed to create {:?}", store.root()))?;

    let policy = config.policy.to_gate_policy();
    let state = AppState::new(&policy, store, config.server.max_upload_size);
    let app = filegate_api::build_router(config.server.max_upload_size).with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(
        "filegate listening on http://{} (received files in {:?}, max upload {} bytes)",
        addr,
        config.server.received_dir,
        config.server.max_upload_size
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

mod config;
mod constants;
mod error;
mod gate;
mod relay;
mod routes;

use clap::Parser;
use config::Config;
use reqwest::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_HASH: &str = env!("GIT_HASH");
pub const BUILD_TIME: &str = env!("BUILD_TIME");

/// Shared, read-only per-process state.
pub struct AppState {
    pub config: Config,
    pub http_client: Client,
}

/// Command-line overrides. Environment and `.env` values are read by
/// [`Config::from_env`]; flags given here win over them.
#[derive(Parser)]
#[command(name = "prompt-relay")]
#[command(about = "Origin-gated, length-capped streaming relay for a text generation API")]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    port: Option<u16>,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    let host = args.host.clone().unwrap_or_else(|| config.host.clone());
    let port = args.port.unwrap_or(config.port);

    let http_client = match relay::upstream::build_client(&config.upstream) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create HTTP client: {e}");
            std::process::exit(1);
        }
    };

    info!("Allowed origin: {:?}", config.allowed_origin);
    info!(
        max_prompt_length = config.limits.max_prompt_length,
        max_response_length = config.limits.max_response_length,
        "Limits"
    );
    info!("Upstream: {}", config.upstream.url);

    let state = Arc::new(AppState {
        config,
        http_client,
    });
    let app = routes::router(state);

    let addr: SocketAddr = match format!("{}:{}", host, port).parse() {
        Ok(a) => a,
        Err(e) => {
            error!("Invalid bind address {host}:{port}: {e}");
            std::process::exit(1);
        }
    };
    info!(
        "Starting prompt-relay v{}-{} (built {})",
        VERSION, GIT_HASH, BUILD_TIME
    );
    info!("Listening on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {e}");
        std::process::exit(1);
    }
}

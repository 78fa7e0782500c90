//! Seal Game Server
//!
//! Hosts sealed card game rooms over HTTP. Clients send their address in the
//! `X-Address` header; the decryption service calls `/rooms/:id/seal-approve`
//! before releasing a card key.

mod config;
mod handlers;
mod state;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::ServerConfig;
use state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    if config.default_turn_timeout_ms == 0 {
        tracing::info!("Turn timeouts disabled by default (set DEFAULT_TURN_TIMEOUT_MS to enable)");
    }

    let addr = config.socket_addr();
    let app = handlers::router(AppState::new(config));
    tracing::info!("Seal game server starting on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}

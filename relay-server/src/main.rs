//! relay-server – entry point.
//!
//! Startup order:
//! 1. Load `.env` and parse configuration (fails fast on missing API keys).
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Prepare the upload directory and the provider clients.
//! 4. Start the idle-session sweeper in a background task.
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.

mod config;
mod error;
mod middleware;
mod routes;
mod schemas;
mod services;
mod session;
mod state;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    dotenv::dotenv().ok();
    let cfg = Config::from_env()?;

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: RELAY_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), config = ?cfg, "relay-server starting");

    // ── 3. Upload directory + providers ────────────────────────────────────────
    tokio::fs::create_dir_all(&cfg.upload_dir).await?;
    info!(upload_dir = %cfg.upload_dir.display(), "upload directory ready");

    let addr = cfg.bind_address();
    let state = Arc::new(AppState::from_config(cfg)?);

    // ── 4. Idle-session sweeper ────────────────────────────────────────────────
    if let Some(ttl) = state.config.session.idle_ttl {
        let sessions = Arc::clone(&state.sessions);
        let period = (ttl / 4).max(std::time::Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let evicted = sessions.evict_expired();
                if evicted > 0 {
                    debug!(evicted, remaining = sessions.len(), "expired idle sessions");
                }
            }
        });
    }

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("relay-server stopped");
    Ok(())
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}

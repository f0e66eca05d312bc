//! Figment Bridge Service - local HTTP bridge between the design plugin and downstream tooling.
//!
//! Accepts exports on `POST /export`, keeps them in file-backed tiers under the
//! storage directory, and serves lookups on `GET /debug/{token}` and `GET /health`.
//! Default: http://127.0.0.1:9103/

mod config;
mod error;
mod health;
mod inspect;
mod resolver;
mod routes;
mod store;
mod sweeper;
mod token;

use config::Config;
use routes::AppState;
use std::sync::Arc;
use std::time::Instant;
use store::BridgeStore;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();

    log::info!("Opening storage directory: {}", config.storage_dir.display());
    let store = Arc::new(
        BridgeStore::open(&config.storage_dir)
            .await
            .expect("Failed to open storage directory"),
    );

    sweeper::run_sweep(&store.debug).await;
    if config.sweep_interval_secs > 0 {
        let sweep_store = store.clone();
        let interval = config.sweep_interval_secs;
        tokio::spawn(async move {
            sweeper::run_periodic(sweep_store, interval).await;
        });
    }

    let state = Arc::new(AppState {
        store,
        port: config.port,
        start_time: Instant::now(),
    });

    let app = routes::router(state, config.max_body_bytes);

    let addr = format!("{}:{}", config.host, config.port);
    log::info!("Figment Bridge listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    log::info!("Figment Bridge stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
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
                log::error!("Failed to install SIGTERM handler: {}", e);
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

    log::info!("Shutdown signal received, closing listener");
}

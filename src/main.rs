//! Application entry point and server initialization
//!
//! This module contains the main function that:
//! - Loads configuration from the environment
//! - Initializes the database
//! - Starts the HTTP server with graceful shutdown support

use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use bookdesk::config::Config;
use bookdesk::database::{init_db, AppState};
use bookdesk::route::create_app;

/// Application entry point
///
/// # Environment Variables
///
/// - `HOST` / `PORT` - Listen address (default: 0.0.0.0:8080)
/// - `DATABASE_URL` - Path to database file (default: "library.db")
/// - `API_SECRET` - Shared secret required on `/api` routes (optional)
/// - `DEFAULT_FINE_PER_DAY` - Fine rate used when approvals name none (default: 10)
/// - `RUST_LOG` - Log filter (default: "bookdesk=debug,tower_http=debug")
#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .init();

    let db = init_db(&config.database_path).expect("Failed to initialize database");
    let addr = config.server_addr();
    let db_path = config.database_path.clone();
    let secret_enabled = config.api_secret.is_some();

    let state = AppState::new(db, config);
    let app = create_app(state).layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&addr).await.expect("Failed to bind address");

    tracing::info!(%addr, database = %db_path, secret_enabled, "library service listening");

    // The server keeps running until it receives SIGTERM or SIGINT
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Resolves on SIGINT (Ctrl+C) or, on Unix, SIGTERM.
///
/// Open connections are allowed to complete, so no write transaction is cut
/// off halfway.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, stopping server");
}

use std::net::SocketAddr;

use tower_http::trace::TraceLayer;

use aptx_backend::config::Config;
use aptx_backend::logging;
use aptx_backend::routes;
use aptx_backend::state::AppState;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    let _log_guard = logging::init_tracing(&config.log_level);

    if config.jwt_secret.is_empty() || config.jwt_refresh_secret.is_empty() {
        tracing::warn!("JWT secrets not configured; token issuance will fail");
    }

    let cors = aptx_backend::cors_layer(&config);
    let addr = config.bind_addr();
    let state = AppState::from_config(config);

    if !state.store().is_available() {
        tracing::warn!("GOOGLE_CLOUD_PROJECT_ID not set; store operations will fail");
    }

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    tracing::info!(%addr, "aptx-backend listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind listener failed");

    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal());

    if let Err(e) = server.await {
        tracing::error!(error = %e, "server error");
    }

    tracing::info!("HTTP server stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

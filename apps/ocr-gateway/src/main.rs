//! OCR Gateway
//!
//! HTTP service that validates uploaded images, normalizes them, and returns
//! recognized text with confidence, caching results by content fingerprint.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ocr_gateway::config::{Config, OcrProviderKind};
use ocr_gateway::ocr::{GoogleVisionRecognizer, Recognizer, TesseractRecognizer};
use ocr_gateway::rate_limit::CLEANUP_INTERVAL;
use ocr_gateway::routes;
use ocr_gateway::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before the filter reads RUST_LOG
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ocr_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Invalid configuration")?;

    tracing::info!("Starting OCR Gateway v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        max_file_size = config.limits.max_file_size,
        max_batch_files = config.limits.max_batch_files,
        cache_ttl = config.cache.ttl_secs,
        cache_size = config.cache.max_size,
        "Limits configured"
    );

    let recognizer = build_recognizer(&config);
    if recognizer.is_available().await {
        tracing::info!("OCR backend: {}", recognizer.name());
    } else {
        tracing::warn!(
            "OCR backend {} is not available; recognition requests will fail",
            recognizer.name()
        );
    }

    let state = AppState::new(config.clone(), recognizer);
    state.rate_limits().spawn_cleanup(CLEANUP_INTERVAL);

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid SERVER_HOST/SERVER_PORT")?;
    tracing::info!("OCR Gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn build_recognizer(config: &Config) -> Arc<dyn Recognizer> {
    match config.ocr.provider {
        OcrProviderKind::Tesseract => Arc::new(TesseractRecognizer::new(&config.ocr.language)),
        OcrProviderKind::GoogleVision => Arc::new(GoogleVisionRecognizer::new(
            config.ocr.google_api_key.as_deref().unwrap_or_default(),
            config.ocr.google_endpoint.as_deref(),
        )),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}

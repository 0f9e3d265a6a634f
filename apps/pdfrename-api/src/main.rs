//! pdfrename API Server
//!
//! Lists and renames the AcroForm fields of uploaded PDFs. PDFs travel as
//! base64 inside JSON bodies; every request is handled independently on a
//! blocking worker thread.
//!
//! - `GET  /health`
//! - `POST /api/analyze`  `{ pdf }` -> `{ fields: [{ name, type, original_name }] }`
//! - `POST /api/rename`   `{ pdf, mappings }` -> `{ success, renamed_count, pdf, ... }`

use std::net::SocketAddr;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use clap::Parser;
use pdfrename_core::PipelineOptions;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod error;

use api::{handle_analyze, handle_health, handle_rename};
use config::Args;

/// Shared application state
#[derive(Clone, Default)]
pub struct AppState {
    pub options: PipelineOptions,
}

/// Build the router with all routes and middleware
pub fn app(state: AppState, max_body_bytes: usize) -> Router {
    // CORS configuration for web clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handle_health))
        // API endpoints
        .route("/api/analyze", post(handle_analyze))
        .route("/api/rename", post(handle_rename))
        // Apply middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(max_body_bytes)),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("pdfrename_api={}", level).parse()?)
                .add_directive(format!("pdfrename_core={}", level).parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let state = AppState {
        options: args.pipeline_options(),
    };

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Max request body: {} bytes", args.max_body_bytes);

    axum::serve(listener, app(state, args.max_body_bytes)).await?;

    Ok(())
}

use axum::{
    Router,
    http::{Method, header},
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::error::panic_response;
use crate::handlers::{chat_handler, health_handler, limit_handler, metrics_handler};
use crate::state::AppState;

// Used when RUST_LOG is unset; keeps one INFO line per request from tower_http
pub const DEFAULT_LOG_FILTER: &str = "chat_relay=info,tower_http=info";

pub fn build_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/limit", get(limit_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

//! HTTP surface of the wallet ledger.
//!
//! - `GET  /health`
//! - `POST /api/v1/wallet/withdraw`
//! - `GET  /api/v1/wallet/balance?user_id=<id>`

pub mod error;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{HeaderName, Method, header},
    routing::{get, post},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::application::LedgerService;

pub use error::{ApiError, ApiResult, ErrorResponse};

/// Shared state handed to every handler.
pub struct AppState {
    pub ledger: LedgerService,
}

impl AppState {
    pub fn new(ledger: LedgerService) -> Self {
        Self { ledger }
    }
}

/// Build the full application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api_v1_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new().nest("/wallet", wallet_routes())
}

fn wallet_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/withdraw", post(handlers::withdraw))
        .route("/balance", get(handlers::get_balance))
}

/// Any origin is accepted; the origin is mirrored back so credentials can
/// be allowed alongside it.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            HeaderName::from_static("origin"),
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
        .expose_headers([header::CONTENT_LENGTH])
        .allow_credentials(true)
        .max_age(Duration::from_secs(12 * 60 * 60))
}

//! HTTP surface.
//!
//! ```text
//!   POST /api/verify-burn           verify a burn proof, attach it to the session
//!   GET  /api/verification-status   session verification state
//!   POST /api/transactions          gated, first paired call
//!   POST /api/token-transfers       gated, second paired call
//!   POST /api/contract-info         ungated token metadata
//!   POST /api/clear-verification    reset the session
//!   GET  /api/api-provider          provider of the last successful query
//!   GET  /api/config                client-facing configuration, no secrets
//!   GET  /health                    liveness and counters
//! ```
//!
//! Every `/api` response is wrapped in `{success, result?, message?}` and
//! carries the `x-session-id` header.

mod handlers;
mod session;

pub use handlers::{status_for, ApiResponse, ContractRequest, VerifyRequest};
pub use session::{SessionStore, SESSION_HEADER};

use crate::service::GatewayService;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The gateway operations.
    pub service: Arc<GatewayService>,
    /// Client sessions.
    pub sessions: SessionStore,
}

impl AppState {
    /// Create state with an empty session store.
    #[must_use]
    pub fn new(service: Arc<GatewayService>) -> Self {
        Self {
            service,
            sessions: SessionStore::new(),
        }
    }
}

/// Build the router. An empty `cors_origins` allows any origin.
#[must_use]
pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/api/verify-burn", post(handlers::verify_burn))
        .route("/api/verification-status", get(handlers::verification_status))
        .route("/api/transactions", post(handlers::transactions))
        .route("/api/token-transfers", post(handlers::token_transfers))
        .route("/api/contract-info", post(handlers::contract_info))
        .route("/api/clear-verification", post(handlers::clear_verification))
        .route("/api/api-provider", get(handlers::api_provider))
        .route("/api/config", get(handlers::public_config))
        .route("/health", get(handlers::health))
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let session_header = HeaderName::from_static(SESSION_HEADER);
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, session_header.clone()])
        .expose_headers([session_header]);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {origin:?}: {e}");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Serve `app` on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns [`crate::Error::Server`] if the server fails.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> crate::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("HTTP server listening on {addr}");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::Error::Server(e.to_string()))?;
    info!("HTTP server stopped");
    Ok(())
}

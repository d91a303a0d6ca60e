//! Route handlers and the JSON envelope.

use super::session::SESSION_HEADER;
use super::AppState;
use crate::burn::BurnError;
use crate::error::Error;
use crate::gate::GateError;
use crate::service::ListRequest;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};

/// Response envelope shared by every `/api` route.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    /// User-facing message on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Body of `POST /api/verify-burn`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// Burn transaction hash.
    #[serde(default, alias = "hash")]
    pub tx_hash: String,
}

/// Body of `POST /api/contract-info`.
#[derive(Debug, Default, Deserialize)]
pub struct ContractRequest {
    /// Token mint address.
    #[serde(default, alias = "contractAddress")]
    pub address: String,
}

/// HTTP status for a failed operation.
#[must_use]
pub fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::Gate(GateError::EmptyHash)
        | Error::InvalidRequest(_)
        | Error::Burn(BurnError::EmptyHash | BurnError::NotFound(_) | BurnError::Failed(_)) => {
            StatusCode::BAD_REQUEST
        }
        Error::Gate(_) | Error::NotVerified => StatusCode::FORBIDDEN,
        Error::Query(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Burn(BurnError::Rpc(_)) => StatusCode::BAD_GATEWAY,
        Error::Ledger(_) | Error::Config(_) | Error::Server(_) | Error::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// User-facing message for a failed operation. Internal failures are not
/// described to the caller.
fn message_for(error: &Error, status: StatusCode) -> String {
    match error {
        Error::Burn(BurnError::Rpc(_)) => {
            "could not check the transaction right now, please try again later".to_string()
        }
        _ if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE => {
            "internal server error".to_string()
        }
        _ => error.to_string(),
    }
}

fn respond<T: Serialize>(session_id: &str, result: crate::Result<T>) -> Response {
    let (status, body) = match result {
        Ok(value) => (
            StatusCode::OK,
            ApiResponse {
                success: true,
                result: Some(value),
                message: None,
            },
        ),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                error!("Request failed: {e}");
            } else {
                warn!("Request rejected ({status}): {e}");
            }
            (
                status,
                ApiResponse {
                    success: false,
                    result: None,
                    message: Some(message_for(&e, status)),
                },
            )
        }
    };

    let mut response = (status, Json(body)).into_response();
    if let Ok(value) = HeaderValue::from_str(session_id) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

pub(super) async fn verify_burn(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<VerifyRequest>,
) -> Response {
    let (id, loaded) = state.sessions.load(&headers);
    let mut session = loaded.clone();
    let result = state.service.verify(&mut session, &body.tx_hash).await;
    state.sessions.commit(&id, &loaded, session);
    respond(&id, result)
}

pub(super) async fn verification_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let (id, session) = state.sessions.load(&headers);
    let status = state.service.verification_status(&session);
    respond(&id, Ok(status))
}

pub(super) async fn transactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ListRequest>,
) -> Response {
    let (id, loaded) = state.sessions.load(&headers);
    let mut session = loaded.clone();
    let result = state.service.list_transactions(&mut session, &body).await;
    state.sessions.commit(&id, &loaded, session);
    respond(&id, result)
}

pub(super) async fn token_transfers(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ListRequest>,
) -> Response {
    let (id, loaded) = state.sessions.load(&headers);
    let mut session = loaded.clone();
    let result = state.service.list_token_transfers(&mut session, &body).await;
    state.sessions.commit(&id, &loaded, session);
    respond(&id, result)
}

pub(super) async fn contract_info(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ContractRequest>,
) -> Response {
    let (id, _) = state.sessions.load(&headers);
    let result = state.service.contract_info(&body.address).await;
    respond(&id, result)
}

pub(super) async fn clear_verification(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let (id, loaded) = state.sessions.load(&headers);
    let mut session = loaded.clone();
    state.service.clear_verification(&mut session);
    state.sessions.commit(&id, &loaded, session);
    respond(&id, Ok(json!({ "cleared": true })))
}

pub(super) async fn api_provider(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (id, _) = state.sessions.load(&headers);
    respond(
        &id,
        Ok(json!({ "provider": state.service.current_provider() })),
    )
}

pub(super) async fn public_config(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let (id, _) = state.sessions.load(&headers);
    let mut response = respond(&id, Ok(state.service.public_config()));
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

pub(super) async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "gating": state.service.gating(),
        "providers": state.service.provider_names(),
        "inFlight": state.service.gate().in_flight(),
        "sessions": state.sessions.len(),
        "stats": state.service.stats(),
    }))
}

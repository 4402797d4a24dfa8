//! HTTP error mapping, copied in spirit from
//! `kumo_server_common::http_server::AppError`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Wraps any error so it can be returned from an axum handler; `?`
/// converts everything along the way through `anyhow::Error`.
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = map_status(&self.0);
        (status, format!("Error: {:#}", self.0)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// Map well-known store/engine error shapes onto status codes (400
/// malformed input, 404 unknown id, 409 duplicate group name);
/// anything else falls through to 500.
fn map_status(err: &anyhow::Error) -> StatusCode {
    if let Some(store_err) = err.downcast_ref::<suppression_store::StoreError>() {
        return store_status(store_err);
    }
    if let Some(engine_err) = err.downcast_ref::<suppression_engine::EngineError>() {
        return match engine_err {
            suppression_engine::EngineError::Config(_) => StatusCode::BAD_REQUEST,
            suppression_engine::EngineError::AlreadyRunning => StatusCode::CONFLICT,
            suppression_engine::EngineError::NotRunning => StatusCode::CONFLICT,
            suppression_engine::EngineError::Store(store_err) => store_status(store_err),
        };
    }
    if let Some(hub_err) = err.downcast_ref::<suppression_hub::HubError>() {
        return match hub_err {
            suppression_hub::HubError::WarmingUp { .. } => StatusCode::SERVICE_UNAVAILABLE,
            suppression_hub::HubError::Store(store_err) => store_status(store_err),
        };
    }
    StatusCode::INTERNAL_SERVER_ERROR
}

fn store_status(err: &suppression_store::StoreError) -> StatusCode {
    match err {
        suppression_store::StoreError::ListNotFound(_)
        | suppression_store::StoreError::SourceNotFound(_)
        | suppression_store::StoreError::CycleNotFound(_)
        | suppression_store::StoreError::GroupNotFound(_) => StatusCode::NOT_FOUND,
        suppression_store::StoreError::DuplicateGroupName(_) => StatusCode::CONFLICT,
        suppression_store::StoreError::CycleAlreadyRunning(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

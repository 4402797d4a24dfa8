//! The Hub HTTP surface.

use crate::error::AppError;
use crate::http::AppState;
use crate::metrics;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::Stream;
use futures::StreamExt as _;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Instant;
use suppression_api_types::{
    ExportFormat, HubCheckBatchMd5Request, HubCheckBatchMd5Response, HubCheckBatchRequest,
    HubCheckBatchResponse, HubCheckHashResponse, HubCheckResponse, HubCountResponse, HubRemoveResponse,
    HubStatsResponse, HubSuppressBulkRequest, HubSuppressBulkResponse, HubSuppressRequest, HubSuppressResponse,
    ScrubListRequest, ScrubListResponse,
};
use suppression_fingerprint::{resolve, Resolved};
use tokio_stream::wrappers::ReceiverStream;

#[utoipa::path(
    get,
    tag = "global-suppression",
    path = "/global-suppression/stats",
    responses(
        (status = 200, description = "Hub index statistics", body = HubStatsResponse),
    ),
)]
pub async fn stats(State(state): State<AppState>) -> Result<Json<HubStatsResponse>, AppError> {
    Ok(Json(state.hub.stats().await?))
}

#[utoipa::path(
    get,
    tag = "global-suppression",
    path = "/global-suppression/count",
    responses(
        (status = 200, description = "Total fingerprints held in the hub", body = HubCountResponse),
    ),
)]
pub async fn count(State(state): State<AppState>) -> Json<HubCountResponse> {
    Json(HubCountResponse { count: state.hub.count() })
}

#[utoipa::path(
    get,
    tag = "global-suppression",
    path = "/global-suppression/check/{email}",
    params(("email" = String, Path, description = "Email address to look up")),
    responses(
        (status = 200, description = "Suppression status for the address", body = HubCheckResponse),
    ),
)]
pub async fn check(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<HubCheckResponse>, AppError> {
    let resolved = resolve(&email);
    let suppressed = state.hub.is_suppressed(&email)?;
    metrics::record_hub_check(suppressed);
    Ok(Json(HubCheckResponse {
        email: resolved.email().unwrap_or(&email).to_string(),
        fingerprint: resolved.fingerprint().as_str().to_string(),
        suppressed,
    }))
}

#[utoipa::path(
    get,
    tag = "global-suppression",
    path = "/global-suppression/check-hash/{fp}",
    params(("fp" = String, Path, description = "MD5 fingerprint to look up")),
    responses(
        (status = 200, description = "Suppression status for the fingerprint", body = HubCheckHashResponse),
    ),
)]
pub async fn check_hash(
    State(state): State<AppState>,
    Path(fingerprint): Path<String>,
) -> Result<Json<HubCheckHashResponse>, AppError> {
    let suppressed = state.hub.is_suppressed(&fingerprint)?;
    metrics::record_hub_check(suppressed);
    Ok(Json(HubCheckHashResponse { fingerprint, suppressed }))
}

#[utoipa::path(
    post,
    tag = "global-suppression",
    path = "/global-suppression/check-batch",
    request_body = HubCheckBatchRequest,
    responses(
        (status = 200, description = "Suppression status for every address in the batch", body = HubCheckBatchResponse),
    ),
)]
pub async fn check_batch(
    State(state): State<AppState>,
    Json(request): Json<HubCheckBatchRequest>,
) -> Result<Json<HubCheckBatchResponse>, AppError> {
    let start = Instant::now();
    let results = state.hub.check_batch(&request.emails)?;

    let mut suppressed_emails = Vec::new();
    let mut deliverable_emails = Vec::new();
    for email in &request.emails {
        let is_suppressed = *results.get(email).unwrap_or(&false);
        metrics::record_hub_check(is_suppressed);
        if is_suppressed {
            suppressed_emails.push(email.clone());
        } else {
            deliverable_emails.push(email.clone());
        }
    }

    Ok(Json(HubCheckBatchResponse {
        total: request.emails.len(),
        suppressed_count: suppressed_emails.len(),
        deliverable_count: deliverable_emails.len(),
        suppressed_emails,
        deliverable_emails,
        processing_ms: start.elapsed().as_millis() as u64,
    }))
}

#[utoipa::path(
    post,
    tag = "global-suppression",
    path = "/global-suppression/check-batch-md5",
    request_body = HubCheckBatchMd5Request,
    responses(
        (status = 200, description = "Suppression status for every hash in the batch", body = HubCheckBatchMd5Response),
    ),
)]
pub async fn check_batch_md5(
    State(state): State<AppState>,
    Json(request): Json<HubCheckBatchMd5Request>,
) -> Result<Json<HubCheckBatchMd5Response>, AppError> {
    let start = Instant::now();
    let mut results = std::collections::HashMap::with_capacity(request.hashes.len());
    let mut suppressed_count = 0;
    for hash in &request.hashes {
        let is_suppressed = state.hub.is_suppressed(hash)?;
        metrics::record_hub_check(is_suppressed);
        if is_suppressed {
            suppressed_count += 1;
        }
        results.insert(hash.clone(), is_suppressed);
    }

    Ok(Json(HubCheckBatchMd5Response {
        total: request.hashes.len(),
        suppressed_count,
        deliverable_count: request.hashes.len() - suppressed_count,
        results,
        processing_ms: start.elapsed().as_millis() as u64,
    }))
}

#[utoipa::path(
    post,
    tag = "global-suppression",
    path = "/global-suppression/suppress",
    request_body = HubSuppressRequest,
    responses(
        (status = 200, description = "Address added to the suppression hub", body = HubSuppressResponse),
    ),
)]
pub async fn suppress(
    State(state): State<AppState>,
    Json(request): Json<HubSuppressRequest>,
) -> Result<Json<HubSuppressResponse>, AppError> {
    let category = request.category.unwrap_or_else(|| "general".to_string());
    let (is_new, fingerprint) = state
        .hub
        .suppress(&request.email, request.reason, request.source, category, request.list_id)
        .await?;
    Ok(Json(HubSuppressResponse {
        success: true,
        is_new,
        email: request.email,
        fingerprint,
    }))
}

#[utoipa::path(
    post,
    tag = "global-suppression",
    path = "/global-suppression/suppress-bulk",
    request_body = HubSuppressBulkRequest,
    responses(
        (status = 200, description = "Addresses added to the suppression hub", body = HubSuppressBulkResponse),
    ),
)]
pub async fn suppress_bulk(
    State(state): State<AppState>,
    Json(request): Json<HubSuppressBulkRequest>,
) -> Result<Json<HubSuppressBulkResponse>, AppError> {
    let total = request.emails.len();
    let mut added = 0;
    for email in request.emails {
        let (is_new, _fingerprint) = state
            .hub
            .suppress(&email, request.reason.clone(), request.source.clone(), "general".to_string(), None)
            .await?;
        if is_new {
            added += 1;
        }
    }
    Ok(Json(HubSuppressBulkResponse {
        success: true,
        added,
        total,
    }))
}

#[utoipa::path(
    delete,
    tag = "global-suppression",
    path = "/global-suppression/remove/{email}",
    params(("email" = String, Path, description = "Email address to remove from the hub")),
    responses(
        (status = 200, description = "Address removed from the suppression hub", body = HubRemoveResponse),
    ),
)]
pub async fn remove(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<HubRemoveResponse>, AppError> {
    state.hub.remove(&email).await?;
    Ok(Json(HubRemoveResponse { success: true, email }))
}

#[derive(Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    format: ExportFormat,
}

#[utoipa::path(
    get,
    tag = "global-suppression",
    path = "/global-suppression/export-md5",
    params(("format" = ExportFormat, Query, description = "text (newline-delimited) or json")),
    responses(
        (status = 200, description = "Every fingerprint currently held in the hub"),
    ),
)]
pub async fn export_md5(State(state): State<AppState>, Query(query): Query<ExportQuery>) -> impl IntoResponse {
    let mut fingerprints = Box::pin(state.hub.export_fingerprints());
    let mut all = Vec::new();
    while let Some(fp) = fingerprints.next().await {
        all.push(fp);
    }

    match query.format {
        ExportFormat::Text => all.join("\n").into_response(),
        ExportFormat::Json => Json(all).into_response(),
    }
}

#[utoipa::path(
    post,
    tag = "global-suppression",
    path = "/global-suppression/scrub-list",
    request_body = ScrubListRequest,
    responses(
        (status = 200, description = "Deliverable/suppressed split for a mixed list", body = ScrubListResponse),
    ),
)]
pub async fn scrub_list(
    State(state): State<AppState>,
    Json(request): Json<ScrubListRequest>,
) -> Result<Json<ScrubListResponse>, AppError> {
    let start = Instant::now();
    let mut deliverable = Vec::new();
    let mut suppressed = Vec::new();

    for email in &request.emails {
        if state.hub.is_suppressed(email)? {
            suppressed.push(email.clone());
        } else {
            deliverable.push(email.clone());
        }
    }
    for hash in &request.md5_hashes {
        let label = match resolve(hash) {
            Resolved::HashOnly(fp) => fp.as_str().to_string(),
            Resolved::Email { fingerprint, .. } => fingerprint.as_str().to_string(),
        };
        if state.hub.is_suppressed(hash)? {
            suppressed.push(label);
        } else {
            deliverable.push(label);
        }
    }

    let total_input = request.emails.len() + request.md5_hashes.len();
    let suppression_rate = if total_input == 0 {
        0.0
    } else {
        suppressed.len() as f64 / total_input as f64 * 100.0
    };

    Ok(Json(ScrubListResponse {
        total_input,
        deliverable_count: deliverable.len(),
        suppressed_count: suppressed.len(),
        suppression_rate,
        deliverable,
        suppressed,
        processing_ms: start.elapsed().as_millis() as u64,
    }))
}

#[utoipa::path(
    get,
    tag = "global-suppression",
    path = "/global-suppression/stream",
    responses(
        (status = 200, description = "Server-sent event stream of suppress/remove events", content_type = "text/event-stream"),
    ),
)]
pub async fn stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let id = uuid::Uuid::new_v4();
    let receiver = state.hub.subscribe(id);
    let hub = state.hub.clone();
    let stream = ReceiverStream::new(receiver).map(move |event| {
        let payload = serde_json::to_string(&event).unwrap_or_default();
        Ok(Event::default().data(payload))
    });
    // `hub` and `id` are moved into the stream's drop glue via this
    // guard so the subscriber entry is cleaned up once the client
    // disconnects and the stream is dropped.
    let guarded = GuardedStream { inner: stream, hub, id };
    Sse::new(guarded).keep_alive(axum::response::sse::KeepAlive::default())
}

/// Unsubscribes from the hub when the underlying stream (and therefore
/// the SSE connection) is dropped.
struct GuardedStream<S> {
    inner: S,
    hub: std::sync::Arc<suppression_hub::Hub>,
    id: uuid::Uuid,
}

impl<S: Stream + Unpin> Stream for GuardedStream<S> {
    type Item = S::Item;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        std::pin::Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl<S> Drop for GuardedStream<S> {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}

//! The refresh-control HTTP surface: status, manual trigger, stop, cycles, logs, source CRUD
//! + bulk update + CSV import + test, and group CRUD.

use crate::error::AppError;
use crate::http::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use suppression_api_types::{
    BulkUpdateSourcesRequest, BulkUpdateSourcesResponse, GroupUpsertRequest, ImportSourcesResponse,
    ListCyclesResponse, ListGroupsResponse, ListLogsResponse, ListSourcesResponse, ProviderTag, RefreshCycle,
    RefreshGroup, RefreshLog, RefreshSource, RefreshStatusResponse, SourceUpsertRequest, StopRefreshResponse,
    TestSourceResponse, TriggerRefreshRequest, TriggerRefreshResponse,
};
use suppression_store::sources::SourceFields;
use uuid::Uuid;

#[utoipa::path(
    get,
    tag = "refresh",
    path = "/refresh/status",
    responses(
        (status = 200, description = "Scheduler status and window/cooldown state", body = RefreshStatusResponse),
    ),
)]
pub async fn status(State(state): State<AppState>) -> Result<Json<RefreshStatusResponse>, AppError> {
    Ok(Json(state.engine.status().await?))
}

/// `force` is accepted for interface symmetry with the window/cooldown
/// gates; the engine's `trigger_manual` already bypasses both for any
/// manually triggered cycle, so `force` only changes the response's
/// `reason` text here.
#[utoipa::path(
    post,
    tag = "refresh",
    path = "/refresh/trigger",
    request_body = TriggerRefreshRequest,
    responses(
        (status = 200, description = "Whether a cycle was started", body = TriggerRefreshResponse),
    ),
)]
pub async fn trigger(
    State(state): State<AppState>,
    Json(request): Json<TriggerRefreshRequest>,
) -> Json<TriggerRefreshResponse> {
    let _ = request.force;
    match state.engine.trigger_manual().await {
        Ok(cycle) => Json(TriggerRefreshResponse {
            started: true,
            cycle: Some(cycle),
            reason: None,
        }),
        Err(err) => Json(TriggerRefreshResponse {
            started: false,
            cycle: None,
            reason: Some(err.to_string()),
        }),
    }
}

#[utoipa::path(
    post,
    tag = "refresh",
    path = "/refresh/stop",
    responses(
        (status = 200, description = "Whether a running cycle was stopped", body = StopRefreshResponse),
    ),
)]
pub async fn stop(State(state): State<AppState>) -> Json<StopRefreshResponse> {
    let stopped = state.engine.stop().await.is_ok();
    Json(StopRefreshResponse { stopped })
}

#[derive(Deserialize)]
pub struct ListCyclesQuery {
    #[serde(default)]
    status: Option<suppression_api_types::CycleStatus>,
    #[serde(default)]
    limit: Option<usize>,
}

#[utoipa::path(
    get,
    tag = "refresh",
    path = "/refresh/cycles",
    params(
        ("status" = Option<suppression_api_types::CycleStatus>, Query, description = "Filter by cycle status"),
        ("limit" = Option<usize>, Query, description = "Maximum number of cycles to return, default 50"),
    ),
    responses(
        (status = 200, description = "Most recent refresh cycles", body = ListCyclesResponse),
    ),
)]
pub async fn list_cycles(
    State(state): State<AppState>,
    Query(query): Query<ListCyclesQuery>,
) -> Result<Json<ListCyclesResponse>, AppError> {
    let limit = query.limit.unwrap_or(50);
    let cycles = state.engine.store().list_cycles(query.status, limit).await?;
    Ok(Json(ListCyclesResponse { cycles }))
}

#[utoipa::path(
    get,
    tag = "refresh",
    path = "/refresh/cycles/{id}",
    params(("id" = Uuid, Path, description = "Cycle id")),
    responses(
        (status = 200, description = "A single refresh cycle", body = RefreshCycle),
        (status = 404, description = "No cycle with that id"),
    ),
)]
pub async fn get_cycle(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<RefreshCycle>, AppError> {
    let cycle = state
        .engine
        .store()
        .get_cycle(id)
        .await?
        .ok_or(suppression_store::StoreError::CycleNotFound(id))?;
    Ok(Json(cycle))
}

#[derive(Deserialize)]
pub struct ListLogsQuery {
    #[serde(default)]
    status: Option<suppression_api_types::LogStatus>,
    #[serde(default)]
    source_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    tag = "refresh",
    path = "/refresh/cycles/{cycle_id}/logs",
    params(
        ("cycle_id" = Uuid, Path, description = "Cycle id"),
        ("status" = Option<suppression_api_types::LogStatus>, Query, description = "Filter by per-source log status"),
        ("source_id" = Option<Uuid>, Query, description = "Filter to a single source"),
    ),
    responses(
        (status = 200, description = "Per-source log entries for the cycle", body = ListLogsResponse),
    ),
)]
pub async fn list_logs(
    State(state): State<AppState>,
    Path(cycle_id): Path<Uuid>,
    Query(query): Query<ListLogsQuery>,
) -> Result<Json<ListLogsResponse>, AppError> {
    let logs: Vec<RefreshLog> = state
        .engine
        .store()
        .list_logs(cycle_id, query.status, query.source_id)
        .await?;
    Ok(Json(ListLogsResponse { logs }))
}

#[derive(Deserialize)]
pub struct ListSourcesQuery {
    #[serde(default)]
    only_active: bool,
}

#[utoipa::path(
    get,
    tag = "refresh",
    path = "/refresh/sources",
    params(("only_active" = bool, Query, description = "Restrict to active sources only")),
    responses(
        (status = 200, description = "Configured suppression-list sources", body = ListSourcesResponse),
    ),
)]
pub async fn list_sources(
    State(state): State<AppState>,
    Query(query): Query<ListSourcesQuery>,
) -> Result<Json<ListSourcesResponse>, AppError> {
    let sources = state.engine.store().list_sources(query.only_active).await?;
    Ok(Json(ListSourcesResponse { sources }))
}

#[utoipa::path(
    get,
    tag = "refresh",
    path = "/refresh/sources/{id}",
    params(("id" = Uuid, Path, description = "Source id")),
    responses(
        (status = 200, description = "A single source", body = RefreshSource),
        (status = 404, description = "No source with that id"),
    ),
)]
pub async fn get_source(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<RefreshSource>, AppError> {
    let source = state
        .engine
        .store()
        .get_source(id)
        .await?
        .ok_or(suppression_store::StoreError::SourceNotFound(id))?;
    Ok(Json(source))
}

#[utoipa::path(
    post,
    tag = "refresh",
    path = "/refresh/sources",
    request_body = SourceUpsertRequest,
    responses(
        (status = 200, description = "Source created or updated by url", body = RefreshSource),
    ),
)]
pub async fn create_source(
    State(state): State<AppState>,
    Json(request): Json<SourceUpsertRequest>,
) -> Result<Json<RefreshSource>, AppError> {
    let fields = source_fields_from_request(request);
    let (id, _created) = state.engine.store().upsert_source_by_url(fields).await?;
    let source = state
        .engine
        .store()
        .get_source(id)
        .await?
        .ok_or(suppression_store::StoreError::SourceNotFound(id))?;
    Ok(Json(source))
}

#[utoipa::path(
    delete,
    tag = "refresh",
    path = "/refresh/sources/{id}",
    params(("id" = Uuid, Path, description = "Source id")),
    responses(
        (status = 200, description = "Source deleted"),
    ),
)]
pub async fn delete_source(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<(), AppError> {
    state.engine.store().delete_source(id).await?;
    Ok(())
}

#[utoipa::path(
    post,
    tag = "refresh",
    path = "/refresh/sources/bulk",
    request_body = BulkUpdateSourcesRequest,
    responses(
        (status = 200, description = "Per-source created/updated/error counts", body = BulkUpdateSourcesResponse),
    ),
)]
pub async fn bulk_update_sources(
    State(state): State<AppState>,
    Json(request): Json<BulkUpdateSourcesRequest>,
) -> Json<BulkUpdateSourcesResponse> {
    let mut created = 0;
    let mut updated = 0;
    let mut errors = Vec::new();

    for item in request.sources {
        let url = item.url.clone();
        let fields = source_fields_from_request(item);
        match state.engine.store().upsert_source_by_url(fields).await {
            Ok((_, was_created)) => {
                if was_created {
                    created += 1;
                } else {
                    updated += 1;
                }
            }
            Err(err) => errors.push(format!("{url}: {err}")),
        }
    }

    Json(BulkUpdateSourcesResponse { created, updated, errors })
}

#[utoipa::path(
    post,
    tag = "refresh",
    path = "/refresh/sources/import",
    request_body = String,
    responses(
        (status = 200, description = "Sources imported from a CSV body", body = ImportSourcesResponse),
    ),
)]
pub async fn import_sources(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ImportSourcesResponse>, AppError> {
    Ok(Json(state.engine.import_sources_csv(&body).await?))
}

#[utoipa::path(
    post,
    tag = "refresh",
    path = "/refresh/sources/{id}/test",
    params(("id" = Uuid, Path, description = "Source id")),
    responses(
        (status = 200, description = "Preview of the first rows a refresh would import", body = TestSourceResponse),
    ),
)]
pub async fn test_source(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TestSourceResponse>, AppError> {
    let source = state
        .engine
        .store()
        .get_source(id)
        .await?
        .ok_or(suppression_store::StoreError::SourceNotFound(id))?;
    Ok(Json(state.engine.preview_source(&source.url).await?))
}

#[utoipa::path(
    get,
    tag = "refresh",
    path = "/refresh/groups",
    responses(
        (status = 200, description = "Configured refresh groups", body = ListGroupsResponse),
    ),
)]
pub async fn list_groups(State(state): State<AppState>) -> Result<Json<ListGroupsResponse>, AppError> {
    let groups: Vec<RefreshGroup> = state.engine.list_groups().await?;
    Ok(Json(ListGroupsResponse { groups }))
}

#[utoipa::path(
    post,
    tag = "refresh",
    path = "/refresh/groups",
    request_body = GroupUpsertRequest,
    responses(
        (status = 200, description = "Group created", body = RefreshGroup),
        (status = 409, description = "A group with this name already exists"),
    ),
)]
pub async fn create_group(
    State(state): State<AppState>,
    Json(request): Json<GroupUpsertRequest>,
) -> Result<Json<RefreshGroup>, AppError> {
    let id = state.engine.create_group(request.name.clone(), request.description.clone()).await?;
    Ok(Json(RefreshGroup {
        id,
        name: request.name,
        description: request.description,
    }))
}

#[utoipa::path(
    put,
    tag = "refresh",
    path = "/refresh/groups/{id}",
    params(("id" = Uuid, Path, description = "Group id")),
    request_body = GroupUpsertRequest,
    responses(
        (status = 200, description = "Group updated", body = RefreshGroup),
        (status = 404, description = "Unknown group id"),
        (status = 409, description = "A different group with this name already exists"),
    ),
)]
pub async fn update_group(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<GroupUpsertRequest>,
) -> Result<Json<RefreshGroup>, AppError> {
    state
        .engine
        .update_group(id, request.name.clone(), request.description.clone())
        .await?;
    Ok(Json(RefreshGroup {
        id,
        name: request.name,
        description: request.description,
    }))
}

#[utoipa::path(
    delete,
    tag = "refresh",
    path = "/refresh/groups/{id}",
    params(("id" = Uuid, Path, description = "Group id")),
    responses(
        (status = 200, description = "Group deleted"),
    ),
)]
pub async fn delete_group(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<(), AppError> {
    state.engine.delete_group(id).await?;
    Ok(())
}

fn source_fields_from_request(request: SourceUpsertRequest) -> SourceFields {
    SourceFields {
        offer_id: request.offer_id,
        campaign_name: request.campaign_name,
        provider_tag: request.provider_tag.or_else(|| Some(ProviderTag::detect(&request.url))),
        url: request.url,
        ga_id: request.ga_id,
        internal_list_id: request.internal_list_id,
        refresh_group: request.refresh_group,
        priority: request.priority,
        is_active: request.is_active,
    }
}

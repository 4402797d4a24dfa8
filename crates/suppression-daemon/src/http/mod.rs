//! The daemon's HTTP surface: the Hub surface and the
//! refresh-control surface, plus `/metrics`, mirroring the route
//! layout of `kumo_server_common::http_server`.

pub mod hub;
pub mod refresh;

use crate::config::SuppressionConfig;
use axum::routing::{delete, get, post, put};
use axum::Router;
use prometheus::TextEncoder;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<suppression_hub::Hub>,
    pub engine: Arc<suppression_engine::Engine>,
    pub config: Arc<SuppressionConfig>,
}

#[derive(OpenApi)]
#[openapi(
    info(title = "suppression-daemon"),
    paths(
        hub::stats,
        hub::count,
        hub::check,
        hub::check_hash,
        hub::check_batch,
        hub::check_batch_md5,
        hub::suppress,
        hub::suppress_bulk,
        hub::remove,
        hub::export_md5,
        hub::scrub_list,
        hub::stream,
        refresh::status,
        refresh::trigger,
        refresh::stop,
        refresh::list_cycles,
        refresh::get_cycle,
        refresh::list_logs,
        refresh::list_sources,
        refresh::get_source,
        refresh::create_source,
        refresh::delete_source,
        refresh::bulk_update_sources,
        refresh::import_sources,
        refresh::test_source,
        refresh::list_groups,
        refresh::create_group,
        refresh::update_group,
        refresh::delete_group,
    ),
    components(schemas(
        suppression_api_types::HubStatsResponse,
        suppression_api_types::HubCountResponse,
        suppression_api_types::HubCheckResponse,
        suppression_api_types::HubCheckHashResponse,
        suppression_api_types::HubCheckBatchRequest,
        suppression_api_types::HubCheckBatchResponse,
        suppression_api_types::HubCheckBatchMd5Request,
        suppression_api_types::HubCheckBatchMd5Response,
        suppression_api_types::HubSuppressRequest,
        suppression_api_types::HubSuppressResponse,
        suppression_api_types::HubSuppressBulkRequest,
        suppression_api_types::HubSuppressBulkResponse,
        suppression_api_types::HubRemoveResponse,
        suppression_api_types::ScrubListRequest,
        suppression_api_types::ScrubListResponse,
        suppression_api_types::RefreshStatusResponse,
        suppression_api_types::TriggerRefreshRequest,
        suppression_api_types::TriggerRefreshResponse,
        suppression_api_types::StopRefreshResponse,
        suppression_api_types::ListCyclesResponse,
        suppression_api_types::RefreshCycle,
        suppression_api_types::ListLogsResponse,
        suppression_api_types::RefreshLog,
        suppression_api_types::ListSourcesResponse,
        suppression_api_types::RefreshSource,
        suppression_api_types::SourceUpsertRequest,
        suppression_api_types::BulkUpdateSourcesRequest,
        suppression_api_types::BulkUpdateSourcesResponse,
        suppression_api_types::ImportSourcesResponse,
        suppression_api_types::TestSourceResponse,
        suppression_api_types::ListGroupsResponse,
        suppression_api_types::GroupUpsertRequest,
        suppression_api_types::RefreshGroup,
    )),
)]
struct ApiDoc;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/global-suppression/stats", get(hub::stats))
        .route("/global-suppression/count", get(hub::count))
        .route("/global-suppression/check/{email}", get(hub::check))
        .route("/global-suppression/check-hash/{fp}", get(hub::check_hash))
        .route("/global-suppression/check-batch", post(hub::check_batch))
        .route("/global-suppression/check-batch-md5", post(hub::check_batch_md5))
        .route("/global-suppression/suppress", post(hub::suppress))
        .route("/global-suppression/suppress-bulk", post(hub::suppress_bulk))
        .route("/global-suppression/remove/{email}", delete(hub::remove))
        .route("/global-suppression/export-md5", get(hub::export_md5))
        .route("/global-suppression/scrub-list", post(hub::scrub_list))
        .route("/global-suppression/stream", get(hub::stream))
        .route("/refresh/status", get(refresh::status))
        .route("/refresh/trigger", post(refresh::trigger))
        .route("/refresh/stop", post(refresh::stop))
        .route("/refresh/cycles", get(refresh::list_cycles))
        .route("/refresh/cycles/{id}", get(refresh::get_cycle))
        .route("/refresh/cycles/{id}/logs", get(refresh::list_logs))
        .route("/refresh/sources", get(refresh::list_sources).post(refresh::create_source))
        .route("/refresh/sources/bulk", post(refresh::bulk_update_sources))
        .route("/refresh/sources/import", post(refresh::import_sources))
        .route(
            "/refresh/sources/{id}",
            get(refresh::get_source).delete(refresh::delete_source),
        )
        .route("/refresh/sources/{id}/test", post(refresh::test_source))
        .route("/refresh/groups", get(refresh::list_groups).post(refresh::create_group))
        .route(
            "/refresh/groups/{id}",
            put(refresh::update_group).delete(refresh::delete_group),
        )
        .route("/metrics", get(report_metrics))
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn report_metrics() -> Result<String, crate::error::AppError> {
    let report = TextEncoder::new().encode_to_string(&prometheus::default_registry().gather())?;
    Ok(report)
}

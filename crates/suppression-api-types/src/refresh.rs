//! Request/response bodies for the refresh control surface.

use crate::entities::{CycleStatus, LogStatus, ProviderTag, RefreshCycle, RefreshGroup, RefreshLog, RefreshSource};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// `GET /refresh/status`
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct RefreshStatusResponse {
    pub running: bool,
    pub current_cycle: Option<RefreshCycle>,
    pub last_completed_cycle: Option<RefreshCycle>,
    pub next_window_opens_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// `POST /refresh/trigger`
#[derive(Serialize, Deserialize, Debug, Clone, Default, ToSchema)]
pub struct TriggerRefreshRequest {
    /// If true, bypass the daily window and cooldown gates. The
    /// exclusivity gate (only one running cycle) still applies.
    #[serde(default)]
    pub force: bool,
}

/// `POST /refresh/trigger`
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct TriggerRefreshResponse {
    pub started: bool,
    pub cycle: Option<RefreshCycle>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// `POST /refresh/stop`
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct StopRefreshResponse {
    pub stopped: bool,
}

/// `GET /refresh/cycles`
#[derive(Serialize, Deserialize, Debug, Clone, Default, ToSchema)]
pub struct ListCyclesRequest {
    #[serde(default)]
    pub status: Option<CycleStatus>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// `GET /refresh/cycles`
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ListCyclesResponse {
    pub cycles: Vec<RefreshCycle>,
}

/// `GET /refresh/cycles/{id}/logs`
#[derive(Serialize, Deserialize, Debug, Clone, Default, ToSchema)]
pub struct ListLogsRequest {
    #[serde(default)]
    pub status: Option<LogStatus>,
    #[serde(default)]
    pub source_id: Option<Uuid>,
}

/// `GET /refresh/cycles/{id}/logs`
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ListLogsResponse {
    pub logs: Vec<RefreshLog>,
}

/// Fields accepted when creating or bulk-updating a [`RefreshSource`].
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SourceUpsertRequest {
    #[serde(default)]
    pub offer_id: Option<String>,
    pub campaign_name: String,
    pub url: String,
    #[serde(default)]
    pub provider_tag: Option<ProviderTag>,
    #[serde(default)]
    pub ga_id: Option<String>,
    #[serde(default)]
    pub internal_list_id: Option<Uuid>,
    #[serde(default)]
    pub refresh_group: Option<Uuid>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// `POST /refresh/sources/bulk`
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct BulkUpdateSourcesRequest {
    pub sources: Vec<SourceUpsertRequest>,
}

/// `POST /refresh/sources/bulk`
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct BulkUpdateSourcesResponse {
    pub created: usize,
    pub updated: usize,
    pub errors: Vec<String>,
}

/// `POST /refresh/sources/import` (CSV body)
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ImportSourcesResponse {
    pub created: usize,
    pub updated: usize,
    pub skipped_rows: usize,
    pub errors: Vec<String>,
}

/// `POST /refresh/sources/{id}/test`
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct TestSourceResponse {
    pub http_status: Option<i32>,
    pub content_type: Option<String>,
    pub preview_lines: Vec<String>,
    pub estimated_count: Option<u64>,
    pub preview_bytes: u64,
}

/// `GET /refresh/sources`
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ListSourcesResponse {
    pub sources: Vec<RefreshSource>,
}

/// `POST /refresh/groups`, `PUT /refresh/groups/{id}`
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct GroupUpsertRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// `GET /refresh/groups`
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ListGroupsResponse {
    pub groups: Vec<RefreshGroup>,
}

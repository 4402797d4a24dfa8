//! Request/response bodies for the Hub HTTP surface.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

/// `GET /global-suppression/stats`
#[derive(Serialize, Deserialize, Debug, Clone, Default, ToSchema)]
pub struct HubStatsResponse {
    pub total: usize,
    pub per_category: HashMap<String, usize>,
    pub per_source: HashMap<String, usize>,
    pub recent_24h: usize,
}

/// `GET /global-suppression/count`
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HubCountResponse {
    pub count: usize,
}

/// `GET /global-suppression/check/{email}`
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HubCheckResponse {
    pub email: String,
    pub fingerprint: String,
    pub suppressed: bool,
}

/// `GET /global-suppression/check-hash/{fp}`
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HubCheckHashResponse {
    pub fingerprint: String,
    pub suppressed: bool,
}

/// `POST /global-suppression/check-batch`
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HubCheckBatchRequest {
    pub emails: Vec<String>,
}

/// `POST /global-suppression/check-batch`
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HubCheckBatchResponse {
    pub total: usize,
    pub suppressed_count: usize,
    pub deliverable_count: usize,
    pub suppressed_emails: Vec<String>,
    pub deliverable_emails: Vec<String>,
    pub processing_ms: u64,
}

/// `POST /global-suppression/check-batch-md5`
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HubCheckBatchMd5Request {
    pub hashes: Vec<String>,
}

/// `POST /global-suppression/check-batch-md5`
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HubCheckBatchMd5Response {
    pub total: usize,
    pub suppressed_count: usize,
    pub deliverable_count: usize,
    pub results: HashMap<String, bool>,
    pub processing_ms: u64,
}

/// `POST /global-suppression/suppress`
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct HubSuppressRequest {
    pub email: String,
    #[serde(default = "default_reason")]
    pub reason: String,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub list_id: Option<uuid::Uuid>,
}

fn default_reason() -> String {
    "manual".to_string()
}

fn default_source() -> String {
    "api".to_string()
}

/// `POST /global-suppression/suppress`
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HubSuppressResponse {
    pub success: bool,
    pub is_new: bool,
    pub email: String,
    pub fingerprint: String,
}

/// `POST /global-suppression/suppress-bulk`
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct HubSuppressBulkRequest {
    pub emails: Vec<String>,
    #[serde(default = "default_reason")]
    pub reason: String,
    #[serde(default = "default_source")]
    pub source: String,
}

/// `POST /global-suppression/suppress-bulk`
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HubSuppressBulkResponse {
    pub success: bool,
    pub added: usize,
    pub total: usize,
}

/// `DELETE /global-suppression/remove/{email}`
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HubRemoveResponse {
    pub success: bool,
    pub email: String,
}

/// `?format=` for `GET /global-suppression/export-md5`
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Json,
    Text,
}

/// `POST /global-suppression/scrub-list`
#[derive(Serialize, Deserialize, Debug, Clone, Default, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ScrubListRequest {
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub md5_hashes: Vec<String>,
}

/// `POST /global-suppression/scrub-list`
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ScrubListResponse {
    pub total_input: usize,
    pub deliverable_count: usize,
    pub suppressed_count: usize,
    pub suppression_rate: f64,
    pub deliverable: Vec<String>,
    pub suppressed: Vec<String>,
    pub processing_ms: u64,
}

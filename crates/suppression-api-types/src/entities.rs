//! The durable data model: suppression lists/entries,
//! refresh sources, cycles, logs, and groups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Whether a suppression list is scoped to one organization or applies
/// globally across every tenant.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionScope {
    Organization,
    Global,
}

/// A named, owned collection of suppression entries.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct SuppressionList {
    pub id: Uuid,
    pub name: String,
    /// Free-form tag describing where this list's entries came from.
    pub source_tag: String,
    /// Cached row count; authoritative only immediately after a
    /// successful refresh.
    pub entry_count: i64,
    pub scope: SuppressionScope,
    pub organization_id: Uuid,
    pub updated_at: DateTime<Utc>,
}

/// One `(list_id, fingerprint)` row.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct SuppressionEntryRecord {
    pub list_id: Uuid,
    pub email: Option<String>,
    pub fingerprint: String,
    pub reason: String,
    pub source: String,
    pub category: String,
}

/// Per-provider acquisition strategy, derived from the source URL's
/// host.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProviderTag {
    Optizmo,
    UnsubCentral,
    Ezepo,
    UnsubscribeMaster,
    UnsubOptr,
    UnsubBmv,
    Other,
}

impl ProviderTag {
    /// Detect the provider from a source URL's host.
    pub fn detect(url: &str) -> Self {
        let host = url.to_lowercase();
        if host.contains("optizmo.com") || host.contains("optizmo.net") {
            Self::Optizmo
        } else if host.contains("unsubcentral.com") {
            Self::UnsubCentral
        } else if host.contains("ezepo.net") {
            Self::Ezepo
        } else if host.contains("unsubscribemaster.com") {
            Self::UnsubscribeMaster
        } else if host.contains("unsub-optr.com") {
            Self::UnsubOptr
        } else if host.contains("unsub-bmv.com") {
            Self::UnsubBmv
        } else {
            Self::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Optizmo => "optizmo",
            Self::UnsubCentral => "unsubcentral",
            Self::Ezepo => "ezepo",
            Self::UnsubscribeMaster => "unsubscribemaster",
            Self::UnsubOptr => "unsub-optr",
            Self::UnsubBmv => "unsub-bmv",
            Self::Other => "other",
        }
    }
}

/// A group of refresh sources, referenced by `RefreshSource::refresh_group`.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct RefreshGroup {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A configured advertiser suppression feed.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct RefreshSource {
    pub id: Uuid,
    #[serde(default)]
    pub offer_id: Option<String>,
    pub campaign_name: String,
    pub url: String,
    pub provider_tag: ProviderTag,
    #[serde(default)]
    pub ga_id: Option<String>,
    #[serde(default)]
    pub internal_list_id: Option<Uuid>,
    #[serde(default)]
    pub refresh_group: Option<Uuid>,
    pub priority: i32,
    pub is_active: bool,

    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_status: Option<String>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub last_entries_downloaded: Option<i64>,
}

/// Status of a [`RefreshCycle`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Running,
    Completed,
    Failed,
    Paused,
    Cancelled,
}

impl CycleStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// What initiated a cycle.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CycleTrigger {
    Scheduler,
    Manual,
}

/// One scheduler-initiated pass over all active sources.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct RefreshCycle {
    pub id: Uuid,
    pub status: CycleStatus,
    pub trigger: CycleTrigger,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub total_sources: i64,
    pub completed_sources: i64,
    pub failed_sources: i64,
    pub skipped_sources: i64,
    pub entries_downloaded: i64,
    pub new_entries: i64,
    #[serde(default)]
    pub avg_download_ms: Option<f64>,
}

/// Status of a [`RefreshLog`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Downloading,
    Success,
    Failed,
    Skipped,
}

/// One per-source record within a cycle.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct RefreshLog {
    pub id: Uuid,
    pub cycle_id: Uuid,
    pub source_id: Uuid,
    pub status: LogStatus,
    pub entries_downloaded: i64,
    pub entries_new: i64,
    #[serde(default)]
    pub download_ms: Option<i64>,
    #[serde(default)]
    pub processing_ms: Option<i64>,
    #[serde(default)]
    pub http_status: Option<i32>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// `kind` of a Hub change-event.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HubEventKind {
    Added,
    Removed,
}

/// A single membership change published to Hub subscribers.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HubEvent {
    pub kind: HubEventKind,
    pub fingerprint: String,
    pub reason: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

use crate::gates::SchedulerZone;
use uuid::Uuid;

/// Engine-wide configuration resolved once at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub scheduler_zone: SchedulerZone,
    pub optizmo_token: String,
    /// Organization a newly auto-created list is assigned to when no
    /// better candidate is found in the local organizations mirror.
    pub default_org_id: Uuid,
}

impl EngineConfig {
    pub fn new(timezone: &str, optizmo_token: impl Into<String>, default_org_id: Uuid) -> Self {
        Self {
            scheduler_zone: SchedulerZone::resolve(timezone),
            optizmo_token: optizmo_token.into(),
            default_org_id,
        }
    }
}

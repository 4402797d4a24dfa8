//! Request/response bodies for the cross-reference sampler.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SampleEstimateRequest {
    pub audience_list_ids: Vec<Uuid>,
    pub suppression_list_ids: Vec<Uuid>,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct PerListEstimate {
    pub suppression_list_id: Uuid,
    pub matched_in_sample: usize,
    pub matched_estimate: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct SampleEstimateResponse {
    pub audience_size: u64,
    pub sample_size: usize,
    pub per_list: Vec<PerListEstimate>,
    pub total_estimate: u64,
    /// True if the 60s time budget elapsed before sampling completed
    /// and a conservative 5% fallback was reported instead.
    pub unconfirmed_fallback: bool,
}

//! The Cross-Reference Sampler: estimates, without a
//! full scan, how many members of an audience appear on one or more
//! suppression lists.
//!
//! The audience itself (subscriber lists, `status=confirmed` rows) is
//! owned by a system outside this crate's scope; [`AudienceSource`] is
//! the seam an embedder implements to supply it, the same way
//! `suppression-acquire`'s `Acquirer` keeps provider-specific HTTP
//! details out of the engine.

mod error;

pub use error::{SamplerError, SamplerResult};

use rand::seq::SliceRandom;
use std::time::Duration;
use suppression_api_types::{PerListEstimate, SampleEstimateResponse};
use suppression_fingerprint::Fingerprint;
use suppression_store::Store;
use uuid::Uuid;

/// Target sample size before the 2x-then-truncate draw.
const TARGET_SAMPLE: u64 = 5000;

/// Floor on the computed sample rate.
const MIN_SAMPLE_RATE_PCT: f64 = 0.01;

/// Time budget from entry to result.
const TIME_BUDGET: Duration = Duration::from_secs(60);

/// Conservative fallback suppression rate reported when extrapolation
/// would otherwise be zero, or the time budget is exceeded.
const FALLBACK_RATE_PCT: f64 = 5.0;

/// Supplies the audience half of the cross-reference: its size and a
/// random sample of confirmed members, restricted to the requested
/// subscriber lists.
#[async_trait::async_trait]
pub trait AudienceSource: Send + Sync {
    /// Total `status=confirmed` rows across `audience_list_ids`.
    async fn audience_size(&self, audience_list_ids: &[Uuid]) -> SamplerResult<u64>;

    /// Up to `limit` confirmed email addresses drawn from
    /// `audience_list_ids`, in no particular order. Implementations are
    /// free to use any uniform sampling strategy (e.g. `WHERE random()
    /// < p` at the SQL layer); the sampler only requires that the
    /// result not be biased toward any one sub-list.
    async fn sample_confirmed(&self, audience_list_ids: &[Uuid], limit: usize) -> SamplerResult<Vec<String>>;
}

/// Compute the sample rate `p` for an audience of `audience_size`
///: `min(100, 200 * target / audience_size)`,
/// floored at 0.01%.
pub fn sample_rate_pct(audience_size: u64) -> f64 {
    if audience_size == 0 {
        return MIN_SAMPLE_RATE_PCT;
    }
    let computed = 200.0 * TARGET_SAMPLE as f64 / audience_size as f64;
    computed.min(100.0).max(MIN_SAMPLE_RATE_PCT)
}

pub struct Sampler {
    store: Store,
}

impl Sampler {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Run the full estimate, racing the 60s time
    /// budget. On timeout, returns the conservative fallback with
    /// `unconfirmed_fallback = true` rather than failing the caller.
    pub async fn estimate(
        &self,
        audience: &dyn AudienceSource,
        audience_list_ids: &[Uuid],
        suppression_list_ids: &[Uuid],
    ) -> SamplerResult<SampleEstimateResponse> {
        match tokio::time::timeout(
            TIME_BUDGET,
            self.estimate_inner(audience, audience_list_ids, suppression_list_ids),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("cross-reference sampler exceeded its 60s time budget");
                let audience_size = audience.audience_size(audience_list_ids).await.unwrap_or(0);
                Ok(fallback_response(audience_size, suppression_list_ids, 0))
            }
        }
    }

    async fn estimate_inner(
        &self,
        audience: &dyn AudienceSource,
        audience_list_ids: &[Uuid],
        suppression_list_ids: &[Uuid],
    ) -> SamplerResult<SampleEstimateResponse> {
        let audience_size = audience.audience_size(audience_list_ids).await?;
        if audience_size == 0 {
            return Ok(SampleEstimateResponse {
                audience_size: 0,
                sample_size: 0,
                per_list: suppression_list_ids
                    .iter()
                    .map(|&id| PerListEstimate {
                        suppression_list_id: id,
                        matched_in_sample: 0,
                        matched_estimate: 0,
                    })
                    .collect(),
                total_estimate: 0,
                unconfirmed_fallback: false,
            });
        }

        // Draw ~2x target, then truncate to target_sample. The audience source decides how it samples
        // internally; we only bound how much of its output we keep.
        let draw_size = (TARGET_SAMPLE * 2).min(audience_size) as usize;
        let mut drawn = audience.sample_confirmed(audience_list_ids, draw_size).await?;
        drawn.shuffle(&mut rand::thread_rng());
        drawn.truncate(TARGET_SAMPLE as usize);

        let actual_sample_size = drawn.len();
        if actual_sample_size == 0 {
            return Ok(fallback_response(audience_size, suppression_list_ids, 0));
        }

        // Canonicalize and fingerprint in process memory; no raw email ever reaches the store layer.
        let fingerprints: Vec<String> = drawn
            .iter()
            .map(|e| Fingerprint::of_email(e).as_str().to_string())
            .collect();

        let mut per_list = Vec::with_capacity(suppression_list_ids.len());
        let mut total_matched_in_sample = 0usize;
        for &list_id in suppression_list_ids {
            let matched = self
                .store
                .count_fingerprints_in_list(list_id, fingerprints.clone())
                .await?;
            total_matched_in_sample += matched;
            let matched_estimate =
                extrapolate(matched, actual_sample_size, audience_size);
            per_list.push(PerListEstimate {
                suppression_list_id: list_id,
                matched_in_sample: matched,
                matched_estimate,
            });
        }

        let total_estimate: u64 = per_list.iter().map(|p| p.matched_estimate).sum();

        if total_estimate == 0 && audience_size > 0 {
            return Ok(fallback_response(audience_size, suppression_list_ids, actual_sample_size));
        }

        let _ = total_matched_in_sample;
        Ok(SampleEstimateResponse {
            audience_size,
            sample_size: actual_sample_size,
            per_list,
            total_estimate,
            unconfirmed_fallback: false,
        })
    }
}

fn extrapolate(matched_in_sample: usize, actual_sample_size: usize, audience_size: u64) -> u64 {
    if actual_sample_size == 0 {
        return 0;
    }
    (matched_in_sample as f64 / actual_sample_size as f64 * audience_size as f64).round() as u64
}

/// Conservative 5% fallback,
/// spread evenly across the requested suppression lists so the
/// per-list breakdown still sums to the total.
fn fallback_response(audience_size: u64, suppression_list_ids: &[Uuid], sample_size: usize) -> SampleEstimateResponse {
    let total_estimate = (audience_size as f64 * FALLBACK_RATE_PCT / 100.0).round() as u64;
    let list_count = suppression_list_ids.len().max(1) as u64;
    let per_list_share = total_estimate / list_count;

    let per_list = suppression_list_ids
        .iter()
        .map(|&id| PerListEstimate {
            suppression_list_id: id,
            matched_in_sample: 0,
            matched_estimate: per_list_share,
        })
        .collect();

    SampleEstimateResponse {
        audience_size,
        sample_size,
        per_list,
        total_estimate,
        unconfirmed_fallback: true,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sample_rate_respects_floor_and_ceiling() {
        assert_eq!(sample_rate_pct(0), MIN_SAMPLE_RATE_PCT);
        assert!((sample_rate_pct(1_000_000_000) - MIN_SAMPLE_RATE_PCT).abs() < 1e-9);
        assert_eq!(sample_rate_pct(1_000), 100.0);
    }

    #[test]
    fn extrapolation_scales_sample_to_audience() {
        assert_eq!(extrapolate(50, 5000, 500_000), 5000);
        assert_eq!(extrapolate(0, 5000, 500_000), 0);
        assert_eq!(extrapolate(10, 0, 500_000), 0);
    }

    struct FixedAudience {
        size: u64,
        sample: Vec<String>,
    }

    #[async_trait::async_trait]
    impl AudienceSource for FixedAudience {
        async fn audience_size(&self, _audience_list_ids: &[Uuid]) -> SamplerResult<u64> {
            Ok(self.size)
        }

        async fn sample_confirmed(&self, _audience_list_ids: &[Uuid], limit: usize) -> SamplerResult<Vec<String>> {
            Ok(self.sample.iter().take(limit).cloned().collect())
        }
    }

    #[tokio::test]
    async fn zero_audience_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("s.db").to_str().unwrap()).unwrap();
        let sampler = Sampler::new(store);
        let audience = FixedAudience { size: 0, sample: vec![] };
        let list_id = Uuid::new_v4();
        let result = sampler.estimate(&audience, &[], &[list_id]).await.unwrap();
        assert_eq!(result.audience_size, 0);
        assert_eq!(result.total_estimate, 0);
        assert!(!result.unconfirmed_fallback);
    }

    #[tokio::test]
    async fn nonzero_audience_with_no_matches_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("s.db").to_str().unwrap()).unwrap();
        let sampler = Sampler::new(store);
        let sample: Vec<String> = (0..100).map(|i| format!("user{i}@example.com")).collect();
        let audience = FixedAudience { size: 10_000, sample };
        let list_id = Uuid::new_v4();
        let result = sampler.estimate(&audience, &[], &[list_id]).await.unwrap();
        assert!(result.unconfirmed_fallback);
        assert!(result.total_estimate > 0);
    }
}

//! Cycle and per-source execution.

use crate::config::EngineConfig;
use crate::gates::window_is_open;
use chrono::Utc;
use std::time::{Duration, Instant};
use suppression_acquire::{AcquireContext, Acquirer};
use suppression_api_types::{CycleStatus, LogStatus, ProviderTag, RefreshSource, SuppressionScope};
use suppression_store::{NewEntry, Store};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Sleep between sources within a cycle.
const INTER_SOURCE_DELAY: Duration = Duration::from_secs(2);

/// Run one full cycle over every active source, in priority order
///. Returns the cycle id regardless of
/// whether it completed, paused, or every source failed — only a
/// `StoreError` (e.g. the exclusivity gate) stops this function early.
pub async fn run_cycle(
    store: &Store,
    config: &EngineConfig,
    trigger: suppression_api_types::CycleTrigger,
    cancellation: &CancellationToken,
) -> Result<Uuid, crate::error::EngineError> {
    let cycle_id = store.open_cycle(trigger).await.map_err(|err| match err {
        suppression_store::StoreError::CycleAlreadyRunning(_) => crate::error::EngineError::AlreadyRunning,
        other => other.into(),
    })?;

    let sources = store.list_sources(true).await?;
    store.set_cycle_total_sources(cycle_id, sources.len() as i64).await?;

    for (i, source) in sources.iter().enumerate() {
        if cancellation.is_cancelled() {
            tracing::info!(%cycle_id, "cycle cancelled mid-run");
            store.close_cycle(cycle_id, CycleStatus::Cancelled).await?;
            return Ok(cycle_id);
        }

        if !window_is_open(config.scheduler_zone, Utc::now()) {
            tracing::info!(%cycle_id, "window closed mid-cycle, pausing");
            store.close_cycle(cycle_id, CycleStatus::Paused).await?;
            return Ok(cycle_id);
        }

        refresh_source(store, config, cycle_id, source).await;

        if i + 1 < sources.len() {
            tokio::select! {
                biased;
                _ = cancellation.cancelled() => {}
                _ = tokio::time::sleep(INTER_SOURCE_DELAY) => {}
            }
        }
    }

    store.close_cycle(cycle_id, CycleStatus::Completed).await?;
    Ok(cycle_id)
}

/// Acquire and ingest one source's artifact. Never propagates an error to the caller: every failure is
/// contained to this source's log and the cycle's failure counters.
async fn refresh_source(store: &Store, config: &EngineConfig, cycle_id: Uuid, source: &RefreshSource) {
    let log_id = match store.open_log(cycle_id, source.id).await {
        Ok(id) => id,
        Err(err) => {
            tracing::error!(%err, source_id = %source.id, "failed to open refresh log");
            return;
        }
    };

    if source.url.trim().is_empty() {
        let _ = store
            .close_log(log_id, LogStatus::Skipped, 0, 0, None, None, None, None, Some("skipped: empty url".to_string()))
            .await;
        let _ = store.record_cycle_source_result(cycle_id, "skipped", 0, 0, None).await;
        let _ = store.record_source_attempt(source.id, "skipped", None, None).await;
        return;
    }

    let acquirer = Acquirer::detect(&source.url);
    let ctx = AcquireContext::new(config.optizmo_token.clone());

    let download_start = Instant::now();
    let acquired = acquirer.acquire(&source.url, &ctx).await;
    let download_ms = download_start.elapsed().as_millis() as i64;

    let acquired = match acquired {
        Ok(a) => a,
        Err(err) => {
            let message = err.to_string();
            tracing::warn!(source_id = %source.id, %message, "acquisition failed");
            let _ = store
                .close_log(
                    log_id,
                    LogStatus::Failed,
                    0,
                    0,
                    Some(download_ms),
                    None,
                    None,
                    None,
                    Some(message.clone()),
                )
                .await;
            let _ = store
                .record_cycle_source_result(cycle_id, "failed", 0, 0, Some(download_ms))
                .await;
            let _ = store
                .record_source_attempt(source.id, "failed", Some(message), None)
                .await;
            return;
        }
    };

    let http_status = acquired.http_status;
    let content_type = acquired.content_type.clone();
    let (entries, _skipped, _errors, _bytes) = suppression_acquire::parse_acquired(acquired, source.id.to_string()).await;
    let entries_downloaded = entries.len() as i64;

    let list_id = match resolve_destination_list(store, config, source).await {
        Ok(id) => id,
        Err(err) => {
            tracing::error!(%err, source_id = %source.id, "could not resolve destination list");
            let _ = store
                .close_log(
                    log_id,
                    LogStatus::Failed,
                    entries_downloaded,
                    0,
                    Some(download_ms),
                    None,
                    http_status.map(|s| s as i32),
                    content_type.clone(),
                    Some(err.to_string()),
                )
                .await;
            let _ = store
                .record_cycle_source_result(cycle_id, "failed", entries_downloaded, 0, Some(download_ms))
                .await;
            let _ = store
                .record_source_attempt(source.id, "failed", Some(err.to_string()), Some(entries_downloaded))
                .await;
            return;
        }
    };

    let new_entries: Vec<NewEntry> = entries
        .into_iter()
        .map(|e| NewEntry {
            email: e.email,
            fingerprint: e.fingerprint.as_str().to_string(),
            reason: "refresh".to_string(),
            source: source.campaign_name.clone(),
            category: source.provider_tag.as_str().to_string(),
        })
        .collect();

    let processing_start = Instant::now();
    let replace_result = store.replace_list(list_id, new_entries).await;
    let processing_ms = processing_start.elapsed().as_millis() as i64;

    match replace_result {
        Ok(outcome) => {
            let _ = store
                .close_log(
                    log_id,
                    LogStatus::Success,
                    outcome.entries_written as i64,
                    outcome.entries_new as i64,
                    Some(download_ms),
                    Some(processing_ms),
                    http_status.map(|s| s as i32),
                    content_type,
                    None,
                )
                .await;
            let _ = store
                .record_cycle_source_result(
                    cycle_id,
                    "success",
                    outcome.entries_written as i64,
                    outcome.entries_new as i64,
                    Some(download_ms),
                )
                .await;
            let _ = store
                .record_source_attempt(source.id, "success", None, Some(outcome.entries_written as i64))
                .await;
        }
        Err(err) => {
            let _ = store
                .close_log(
                    log_id,
                    LogStatus::Failed,
                    entries_downloaded,
                    0,
                    Some(download_ms),
                    Some(processing_ms),
                    http_status.map(|s| s as i32),
                    content_type,
                    Some(err.to_string()),
                )
                .await;
            let _ = store
                .record_cycle_source_result(cycle_id, "failed", entries_downloaded, 0, Some(download_ms))
                .await;
            let _ = store
                .record_source_attempt(source.id, "failed", Some(err.to_string()), Some(entries_downloaded))
                .await;
        }
    }
}

/// Resolve the list a source's entries should be written to: reuse `internal_list_id` if set, otherwise
/// auto-create one under an organization resolved through the local
/// fallback chain, and link it back to the source for next time.
async fn resolve_destination_list(
    store: &Store,
    config: &EngineConfig,
    source: &RefreshSource,
) -> Result<Uuid, suppression_store::StoreError> {
    if let Some(list_id) = source.internal_list_id {
        return Ok(list_id);
    }

    let name = if source.campaign_name.trim().is_empty() {
        format!("Auto-Refresh {}", source.id)
    } else {
        format!("{} Suppression", source.campaign_name)
    };

    let org_id = config.default_org_id;
    if !store.organization_exists(org_id).await? {
        store
            .upsert_organization(org_id, "Default Organization".to_string())
            .await?;
    }
    let list_id = store
        .create_list(name, provider_source_tag(source.provider_tag), SuppressionScope::Organization, org_id)
        .await?;
    store.link_source_list(source.id, list_id).await?;
    Ok(list_id)
}

fn provider_source_tag(tag: ProviderTag) -> String {
    tag.as_str().to_string()
}

#[cfg(test)]
mod test {
    use super::*;
    use suppression_api_types::CycleTrigger;

    fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suppression.db");
        (dir, Store::open(path.to_str().unwrap()).unwrap())
    }

    fn test_config() -> EngineConfig {
        EngineConfig::new("UTC", "test-token", Uuid::nil())
    }

    #[tokio::test]
    async fn empty_source_list_completes_immediately() {
        let (_dir, store) = temp_store();
        let config = test_config();
        let cancel = CancellationToken::new();
        let cycle_id = run_cycle(&store, &config, CycleTrigger::Manual, &cancel).await.unwrap();
        let cycle = store.get_cycle(cycle_id).await.unwrap().unwrap();
        assert_eq!(cycle.status, CycleStatus::Completed);
        assert_eq!(cycle.total_sources, 0);
    }

    #[tokio::test]
    async fn source_with_empty_url_is_skipped() {
        let (_dir, store) = temp_store();
        let config = test_config();

        let (source_id, _created) = store
            .upsert_source_by_url(suppression_store::sources::SourceFields {
                offer_id: None,
                campaign_name: "Empty URL Source".to_string(),
                url: String::new(),
                provider_tag: None,
                ga_id: None,
                internal_list_id: None,
                refresh_group: None,
                priority: Some(0),
                is_active: true,
            })
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let cycle_id = run_cycle(&store, &config, CycleTrigger::Manual, &cancel).await.unwrap();
        let cycle = store.get_cycle(cycle_id).await.unwrap().unwrap();
        assert_eq!(cycle.skipped_sources, 1);
        assert_eq!(cycle.status, CycleStatus::Completed);

        let source = store.get_source(source_id).await.unwrap().unwrap();
        assert_eq!(source.last_status.as_deref(), Some("skipped"));
    }
}

//! Subcommands for the refresh-control HTTP surface: status, manual trigger, stop, cycles
//! and per-cycle logs. Source and group CRUD live in `sources.rs` /
//! `groups.rs`.

use crate::client::{get_json, post_json, print_json};
use clap::Parser;
use reqwest::Url;
use suppression_api_types::{
    CycleStatus, ListCyclesResponse, ListLogsResponse, LogStatus, RefreshCycle, RefreshStatusResponse,
    StopRefreshResponse, TriggerRefreshRequest, TriggerRefreshResponse,
};
use tabout::{Alignment, Column};
use uuid::Uuid;

/// Print the scheduler's current running/paused/window state.
#[derive(Debug, Parser)]
pub struct StatusCommand {
    #[arg(long)]
    json: bool,
}

impl StatusCommand {
    pub async fn run(&self, endpoint: &Url) -> anyhow::Result<()> {
        let result: RefreshStatusResponse = get_json(endpoint.join("/refresh/status")?).await?;
        if self.json {
            return print_json(&result);
        }
        println!("running: {}", result.running);
        if let Some(cycle) = &result.current_cycle {
            print_cycle_line(cycle);
        }
        if let Some(next) = result.next_window_opens_at {
            println!("next_window_opens_at: {next}");
        }
        Ok(())
    }
}

/// Manually trigger a refresh cycle, bypassing the daily window and
/// cooldown gates (the exclusivity gate still applies).
#[derive(Debug, Parser)]
pub struct TriggerCommand {
    #[arg(long)]
    force: bool,
}

impl TriggerCommand {
    pub async fn run(&self, endpoint: &Url) -> anyhow::Result<()> {
        let result: TriggerRefreshResponse = post_json(
            endpoint.join("/refresh/trigger")?,
            &TriggerRefreshRequest { force: self.force },
        )
        .await?;
        print_json(&result)
    }
}

/// Stop the scheduler loop. Does not abort a cycle already in progress.
#[derive(Debug, Parser)]
pub struct StopCommand {}

impl StopCommand {
    pub async fn run(&self, endpoint: &Url) -> anyhow::Result<()> {
        let result: StopRefreshResponse =
            post_json(endpoint.join("/refresh/stop")?, &serde_json::json!({})).await?;
        print_json(&result)
    }
}

/// List recent refresh cycles.
#[derive(Debug, Parser)]
pub struct CyclesCommand {
    #[arg(long, value_enum)]
    status: Option<CycleStatusArg>,
    #[arg(long)]
    limit: Option<usize>,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CycleStatusArg {
    Running,
    Completed,
    Failed,
    Paused,
    Cancelled,
}

impl From<CycleStatusArg> for CycleStatus {
    fn from(value: CycleStatusArg) -> Self {
        match value {
            CycleStatusArg::Running => CycleStatus::Running,
            CycleStatusArg::Completed => CycleStatus::Completed,
            CycleStatusArg::Failed => CycleStatus::Failed,
            CycleStatusArg::Paused => CycleStatus::Paused,
            CycleStatusArg::Cancelled => CycleStatus::Cancelled,
        }
    }
}

impl CyclesCommand {
    pub async fn run(&self, endpoint: &Url) -> anyhow::Result<()> {
        let mut url = endpoint.join("/refresh/cycles")?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(status) = self.status {
                query.append_pair("status", status_query_value(status.into()));
            }
            if let Some(limit) = self.limit {
                query.append_pair("limit", &limit.to_string());
            }
        }
        let result: ListCyclesResponse = get_json(url).await?;
        if self.json {
            return print_json(&result);
        }
        let columns = [
            Column {
                name: "ID".to_string(),
                alignment: Alignment::Left,
            },
            Column {
                name: "STATUS".to_string(),
                alignment: Alignment::Left,
            },
            Column {
                name: "TRIGGER".to_string(),
                alignment: Alignment::Left,
            },
            Column {
                name: "STARTED".to_string(),
                alignment: Alignment::Left,
            },
            Column {
                name: "SOURCES (ok/fail/skip)".to_string(),
                alignment: Alignment::Left,
            },
            Column {
                name: "NEW".to_string(),
                alignment: Alignment::Right,
            },
        ];
        let rows = result
            .cycles
            .iter()
            .map(|cycle| {
                vec![
                    cycle.id.to_string(),
                    format!("{:?}", cycle.status),
                    format!("{:?}", cycle.trigger),
                    cycle.started_at.to_rfc3339(),
                    format!(
                        "{}/{}/{}",
                        cycle.completed_sources, cycle.failed_sources, cycle.skipped_sources
                    ),
                    cycle.new_entries.to_string(),
                ]
            })
            .collect::<Vec<_>>();
        tabout::tabulate_output(&columns, &rows, &mut std::io::stdout())?;
        Ok(())
    }
}

fn status_query_value(status: CycleStatus) -> &'static str {
    match status {
        CycleStatus::Running => "running",
        CycleStatus::Completed => "completed",
        CycleStatus::Failed => "failed",
        CycleStatus::Paused => "paused",
        CycleStatus::Cancelled => "cancelled",
    }
}

/// List per-source log entries for a single cycle.
#[derive(Debug, Parser)]
pub struct CycleLogsCommand {
    cycle_id: Uuid,
    #[arg(long)]
    source_id: Option<Uuid>,
    #[arg(long)]
    json: bool,
}

impl CycleLogsCommand {
    pub async fn run(&self, endpoint: &Url) -> anyhow::Result<()> {
        let mut url = endpoint.join(&format!("/refresh/cycles/{}/logs", self.cycle_id))?;
        if let Some(source_id) = self.source_id {
            url.query_pairs_mut().append_pair("source_id", &source_id.to_string());
        }
        let result: ListLogsResponse = get_json(url).await?;
        if self.json {
            return print_json(&result);
        }
        let columns = [
            Column {
                name: "SOURCE".to_string(),
                alignment: Alignment::Left,
            },
            Column {
                name: "STATUS".to_string(),
                alignment: Alignment::Left,
            },
            Column {
                name: "DOWNLOADED".to_string(),
                alignment: Alignment::Right,
            },
            Column {
                name: "NEW".to_string(),
                alignment: Alignment::Right,
            },
            Column {
                name: "HTTP".to_string(),
                alignment: Alignment::Right,
            },
            Column {
                name: "ERROR".to_string(),
                alignment: Alignment::Left,
            },
        ];
        let rows = result
            .logs
            .iter()
            .map(|log| {
                let status = match log.status {
                    LogStatus::Downloading => "downloading",
                    LogStatus::Success => "success",
                    LogStatus::Failed => "failed",
                    LogStatus::Skipped => "skipped",
                };
                vec![
                    log.source_id.to_string(),
                    status.to_string(),
                    log.entries_downloaded.to_string(),
                    log.entries_new.to_string(),
                    log.http_status.map(|s| s.to_string()).unwrap_or_default(),
                    log.error.clone().unwrap_or_default(),
                ]
            })
            .collect::<Vec<_>>();
        tabout::tabulate_output(&columns, &rows, &mut std::io::stdout())?;
        Ok(())
    }
}

fn print_cycle_line(cycle: &RefreshCycle) {
    println!(
        "cycle {} status={:?} trigger={:?} sources(ok/fail/skip)={}/{}/{} new_entries={}",
        cycle.id,
        cycle.status,
        cycle.trigger,
        cycle.completed_sources,
        cycle.failed_sources,
        cycle.skipped_sources,
        cycle.new_entries
    );
}

//! An operator CLI client for the suppression daemon's HTTP surface
//!, modeled on `crates/kcli`'s `main.rs` dispatch pattern.

mod client;
mod groups;
mod hub;
mod refresh;
mod sources;

use clap::Parser;
use groups::GroupsCommand;
use reqwest::Url;
use sources::SourcesCommand;

/// Suppression refresh / global suppression CLI.
#[derive(Debug, Parser)]
#[command(about, version=version_info::kumo_version())]
struct Opt {
    /// URL to reach the suppression daemon's HTTP API.
    #[arg(long, default_value = "http://127.0.0.1:8008")]
    endpoint: String,

    #[command(subcommand)]
    cmd: SubCommand,
}

#[derive(Debug, Parser)]
enum SubCommand {
    Stats(hub::StatsCommand),
    Count(hub::CountCommand),
    Check(hub::CheckCommand),
    CheckHash(hub::CheckHashCommand),
    CheckBatch(hub::CheckBatchCommand),
    CheckBatchMd5(hub::CheckBatchMd5Command),
    Suppress(hub::SuppressCommand),
    SuppressBulk(hub::SuppressBulkCommand),
    Remove(hub::RemoveCommand),
    Export(hub::ExportCommand),
    Scrub(hub::ScrubCommand),
    RefreshStatus(refresh::StatusCommand),
    RefreshTrigger(refresh::TriggerCommand),
    RefreshStop(refresh::StopCommand),
    Cycles(refresh::CyclesCommand),
    CycleLogs(refresh::CycleLogsCommand),
    #[command(subcommand)]
    Sources(SourcesCommand),
    #[command(subcommand)]
    Groups(GroupsCommand),
}

impl SubCommand {
    async fn run(&self, endpoint: &Url) -> anyhow::Result<()> {
        match self {
            Self::Stats(cmd) => cmd.run(endpoint).await,
            Self::Count(cmd) => cmd.run(endpoint).await,
            Self::Check(cmd) => cmd.run(endpoint).await,
            Self::CheckHash(cmd) => cmd.run(endpoint).await,
            Self::CheckBatch(cmd) => cmd.run(endpoint).await,
            Self::CheckBatchMd5(cmd) => cmd.run(endpoint).await,
            Self::Suppress(cmd) => cmd.run(endpoint).await,
            Self::SuppressBulk(cmd) => cmd.run(endpoint).await,
            Self::Remove(cmd) => cmd.run(endpoint).await,
            Self::Export(cmd) => cmd.run(endpoint).await,
            Self::Scrub(cmd) => cmd.run(endpoint).await,
            Self::RefreshStatus(cmd) => cmd.run(endpoint).await,
            Self::RefreshTrigger(cmd) => cmd.run(endpoint).await,
            Self::RefreshStop(cmd) => cmd.run(endpoint).await,
            Self::Cycles(cmd) => cmd.run(endpoint).await,
            Self::CycleLogs(cmd) => cmd.run(endpoint).await,
            Self::Sources(cmd) => cmd.run(endpoint).await,
            Self::Groups(cmd) => cmd.run(endpoint).await,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opts = Opt::parse();
    let endpoint = Url::parse(&opts.endpoint)?;
    opts.cmd.run(&endpoint).await
}

//! Subcommands for the Hub HTTP surface, one `clap::Parser` struct per endpoint, following
//! `kcli`'s one-file-per-subcommand layout.

use crate::client::{delete_json, get_json, get_text, post_json, print_json};
use clap::Parser;
use num_format::{Locale, ToFormattedString};
use reqwest::Url;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use suppression_api_types::{
    ExportFormat, HubCheckBatchMd5Request, HubCheckBatchMd5Response, HubCheckBatchRequest,
    HubCheckBatchResponse, HubCheckHashResponse, HubCheckResponse, HubCountResponse, HubRemoveResponse,
    HubStatsResponse, HubSuppressBulkRequest, HubSuppressBulkResponse, HubSuppressRequest, HubSuppressResponse,
    ScrubListRequest, ScrubListResponse,
};
use tabout::{Alignment, Column};

/// Print aggregate hub statistics: total, per-category, per-source,
/// recent 24h counts.
#[derive(Debug, Parser)]
pub struct StatsCommand {
    #[arg(long)]
    json: bool,
}

impl StatsCommand {
    pub async fn run(&self, endpoint: &Url) -> anyhow::Result<()> {
        let result: HubStatsResponse = get_json(endpoint.join("/global-suppression/stats")?).await?;
        if self.json {
            return print_json(&result);
        }
        println!("total: {}", result.total.to_formatted_string(&Locale::en));
        println!("recent_24h: {}", result.recent_24h.to_formatted_string(&Locale::en));
        let mut categories: Vec<_> = result.per_category.into_iter().collect();
        categories.sort_by(|a, b| b.1.cmp(&a.1));
        for (category, count) in categories {
            println!("  category {category}: {}", count.to_formatted_string(&Locale::en));
        }
        let mut sources: Vec<_> = result.per_source.into_iter().collect();
        sources.sort_by(|a, b| b.1.cmp(&a.1));
        for (source, count) in sources {
            println!("  source {source}: {}", count.to_formatted_string(&Locale::en));
        }
        Ok(())
    }
}

/// Print the total number of fingerprints held in the hub.
#[derive(Debug, Parser)]
pub struct CountCommand {}

impl CountCommand {
    pub async fn run(&self, endpoint: &Url) -> anyhow::Result<()> {
        let result: HubCountResponse = get_json(endpoint.join("/global-suppression/count")?).await?;
        println!("{}", result.count);
        Ok(())
    }
}

/// Check whether a single email address is suppressed.
#[derive(Debug, Parser)]
pub struct CheckCommand {
    email: String,
}

impl CheckCommand {
    pub async fn run(&self, endpoint: &Url) -> anyhow::Result<()> {
        let path = format!("/global-suppression/check/{}", urlencode(&self.email));
        let result: HubCheckResponse = get_json(endpoint.join(&path)?).await?;
        print_json(&result)
    }
}

/// Check whether a raw MD5 fingerprint is suppressed.
#[derive(Debug, Parser)]
pub struct CheckHashCommand {
    fingerprint: String,
}

impl CheckHashCommand {
    pub async fn run(&self, endpoint: &Url) -> anyhow::Result<()> {
        let path = format!("/global-suppression/check-hash/{}", urlencode(&self.fingerprint));
        let result: HubCheckHashResponse = get_json(endpoint.join(&path)?).await?;
        print_json(&result)
    }
}

/// Check a batch of email addresses in one round trip.
#[derive(Debug, Parser)]
pub struct CheckBatchCommand {
    #[arg(required = true)]
    emails: Vec<String>,
}

impl CheckBatchCommand {
    pub async fn run(&self, endpoint: &Url) -> anyhow::Result<()> {
        let result: HubCheckBatchResponse = post_json(
            endpoint.join("/global-suppression/check-batch")?,
            &HubCheckBatchRequest {
                emails: self.emails.clone(),
            },
        )
        .await?;
        print_json(&result)
    }
}

/// Check a batch of MD5 fingerprints in one round trip.
#[derive(Debug, Parser)]
pub struct CheckBatchMd5Command {
    #[arg(required = true)]
    hashes: Vec<String>,
}

impl CheckBatchMd5Command {
    pub async fn run(&self, endpoint: &Url) -> anyhow::Result<()> {
        let result: HubCheckBatchMd5Response = post_json(
            endpoint.join("/global-suppression/check-batch-md5")?,
            &HubCheckBatchMd5Request {
                hashes: self.hashes.clone(),
            },
        )
        .await?;
        print_json(&result)
    }
}

/// Add a single address to the suppression hub.
#[derive(Debug, Parser)]
pub struct SuppressCommand {
    email: String,
    #[arg(long, default_value = "manual")]
    reason: String,
    #[arg(long, default_value = "cli")]
    source: String,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    list_id: Option<uuid::Uuid>,
}

impl SuppressCommand {
    pub async fn run(&self, endpoint: &Url) -> anyhow::Result<()> {
        let result: HubSuppressResponse = post_json(
            endpoint.join("/global-suppression/suppress")?,
            &HubSuppressRequest {
                email: self.email.clone(),
                reason: self.reason.clone(),
                source: self.source.clone(),
                category: self.category.clone(),
                list_id: self.list_id,
            },
        )
        .await?;
        print_json(&result)
    }
}

/// Add many addresses to the suppression hub in one request.
#[derive(Debug, Parser)]
pub struct SuppressBulkCommand {
    #[arg(required = true)]
    emails: Vec<String>,
    #[arg(long, default_value = "manual")]
    reason: String,
    #[arg(long, default_value = "cli")]
    source: String,
}

impl SuppressBulkCommand {
    pub async fn run(&self, endpoint: &Url) -> anyhow::Result<()> {
        let result: HubSuppressBulkResponse = post_json(
            endpoint.join("/global-suppression/suppress-bulk")?,
            &HubSuppressBulkRequest {
                emails: self.emails.clone(),
                reason: self.reason.clone(),
                source: self.source.clone(),
            },
        )
        .await?;
        print_json(&result)
    }
}

/// Remove an address from the suppression hub (admin override).
#[derive(Debug, Parser)]
pub struct RemoveCommand {
    email: String,
}

impl RemoveCommand {
    pub async fn run(&self, endpoint: &Url) -> anyhow::Result<()> {
        let path = format!("/global-suppression/remove/{}", urlencode(&self.email));
        let result: HubRemoveResponse = delete_json(endpoint.join(&path)?).await?;
        print_json(&result)
    }
}

/// Export every fingerprint currently held in the hub.
#[derive(Debug, Parser)]
pub struct ExportCommand {
    #[arg(long, value_enum, default_value = "text")]
    format: ExportFormatArg,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ExportFormatArg {
    Json,
    Text,
}

impl ExportCommand {
    pub async fn run(&self, endpoint: &Url) -> anyhow::Result<()> {
        let format = match self.format {
            ExportFormatArg::Json => ExportFormat::Json,
            ExportFormatArg::Text => ExportFormat::Text,
        };
        let mut url = endpoint.join("/global-suppression/export-md5")?;
        url.query_pairs_mut().append_pair(
            "format",
            match format {
                ExportFormat::Json => "json",
                ExportFormat::Text => "text",
            },
        );
        let body = get_text(url).await?;
        println!("{body}");
        Ok(())
    }
}

/// Split a mixed list of emails/hashes into deliverable and suppressed.
#[derive(Debug, Parser)]
pub struct ScrubCommand {
    #[arg(long)]
    emails: Vec<String>,
    #[arg(long = "hash")]
    md5_hashes: Vec<String>,
    #[arg(long)]
    json: bool,
}

impl ScrubCommand {
    pub async fn run(&self, endpoint: &Url) -> anyhow::Result<()> {
        let result: ScrubListResponse = post_json(
            endpoint.join("/global-suppression/scrub-list")?,
            &ScrubListRequest {
                emails: self.emails.clone(),
                md5_hashes: self.md5_hashes.clone(),
            },
        )
        .await?;
        if self.json {
            return print_json(&result);
        }
        println!(
            "total_input={} deliverable={} suppressed={} rate={:.2}%",
            result.total_input, result.deliverable_count, result.suppressed_count, result.suppression_rate
        );
        let columns = [
            Column {
                name: "RESULT".to_string(),
                alignment: Alignment::Left,
            },
            Column {
                name: "ENTRY".to_string(),
                alignment: Alignment::Left,
            },
        ];
        let mut rows = vec![];
        for entry in &result.deliverable {
            rows.push(vec!["deliverable".to_string(), entry.clone()]);
        }
        for entry in &result.suppressed {
            rows.push(vec!["suppressed".to_string(), entry.clone()]);
        }
        tabout::tabulate_output(&columns, &rows, &mut std::io::stdout())?;
        Ok(())
    }
}

fn urlencode(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

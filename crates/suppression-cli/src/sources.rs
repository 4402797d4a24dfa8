//! Subcommands for the refresh source CRUD + bulk update + CSV import
//! + test-preview surface.

use crate::client::{delete_no_content, get_json, post_body_text, post_json, print_json};
use clap::{Parser, Subcommand};
use reqwest::Url;
use suppression_api_types::{
    BulkUpdateSourcesRequest, BulkUpdateSourcesResponse, ImportSourcesResponse, ListSourcesResponse,
    RefreshSource, SourceUpsertRequest, TestSourceResponse,
};
use tabout::{Alignment, Column};
use uuid::Uuid;

#[derive(Debug, Subcommand)]
pub enum SourcesCommand {
    /// List configured sources.
    List {
        #[arg(long)]
        only_active: bool,
        #[arg(long)]
        json: bool,
    },
    /// Show one source by id.
    Get { id: Uuid },
    /// Create or update a source by URL identity.
    Create {
        url: String,
        #[arg(long)]
        campaign_name: String,
        #[arg(long)]
        offer_id: Option<String>,
        #[arg(long)]
        ga_id: Option<String>,
        #[arg(long)]
        internal_list_id: Option<Uuid>,
        #[arg(long)]
        refresh_group: Option<Uuid>,
        #[arg(long)]
        priority: Option<i32>,
        #[arg(long, default_value_t = true)]
        active: bool,
    },
    /// Delete a source by id.
    Delete { id: Uuid },
    /// Bulk-upsert sources from a JSON file (array of the same shape
    /// as `create`'s fields).
    Bulk { path: std::path::PathBuf },
    /// Import sources from a CSV file.
    Import { path: std::path::PathBuf },
    /// Download a 1 MB preview of a source and report the first 20
    /// parsed lines plus an estimated total entry count.
    Test { id: Uuid },
}

impl SourcesCommand {
    pub async fn run(&self, endpoint: &Url) -> anyhow::Result<()> {
        match self {
            Self::List { only_active, json } => list(endpoint, *only_active, *json).await,
            Self::Get { id } => get(endpoint, *id).await,
            Self::Create {
                url,
                campaign_name,
                offer_id,
                ga_id,
                internal_list_id,
                refresh_group,
                priority,
                active,
            } => {
                create(
                    endpoint,
                    SourceUpsertRequest {
                        offer_id: offer_id.clone(),
                        campaign_name: campaign_name.clone(),
                        url: url.clone(),
                        provider_tag: None,
                        ga_id: ga_id.clone(),
                        internal_list_id: *internal_list_id,
                        refresh_group: *refresh_group,
                        priority: *priority,
                        is_active: *active,
                    },
                )
                .await
            }
            Self::Delete { id } => delete(endpoint, *id).await,
            Self::Bulk { path } => bulk(endpoint, path).await,
            Self::Import { path } => import(endpoint, path).await,
            Self::Test { id } => test(endpoint, *id).await,
        }
    }
}

async fn list(endpoint: &Url, only_active: bool, json: bool) -> anyhow::Result<()> {
    let mut url = endpoint.join("/refresh/sources")?;
    url.query_pairs_mut()
        .append_pair("only_active", if only_active { "true" } else { "false" });
    let result: ListSourcesResponse = get_json(url).await?;
    if json {
        return print_json(&result);
    }
    print_sources_table(&result.sources);
    Ok(())
}

async fn get(endpoint: &Url, id: Uuid) -> anyhow::Result<()> {
    let result: RefreshSource = get_json(endpoint.join(&format!("/refresh/sources/{id}"))?).await?;
    print_json(&result)
}

async fn create(endpoint: &Url, request: SourceUpsertRequest) -> anyhow::Result<()> {
    let result: RefreshSource = post_json(endpoint.join("/refresh/sources")?, &request).await?;
    print_json(&result)
}

async fn delete(endpoint: &Url, id: Uuid) -> anyhow::Result<()> {
    delete_no_content(endpoint.join(&format!("/refresh/sources/{id}"))?).await?;
    println!("deleted {id}");
    Ok(())
}

async fn bulk(endpoint: &Url, path: &std::path::Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path)?;
    let sources: Vec<SourceUpsertRequest> = serde_json::from_str(&text)?;
    let result: BulkUpdateSourcesResponse =
        post_json(endpoint.join("/refresh/sources/bulk")?, &BulkUpdateSourcesRequest { sources }).await?;
    print_json(&result)
}

async fn import(endpoint: &Url, path: &std::path::Path) -> anyhow::Result<()> {
    let csv = std::fs::read_to_string(path)?;
    let body = post_body_text(endpoint.join("/refresh/sources/import")?, csv).await?;
    let result: ImportSourcesResponse = serde_json::from_str(&body)?;
    print_json(&result)
}

async fn test(endpoint: &Url, id: Uuid) -> anyhow::Result<()> {
    let result: TestSourceResponse =
        post_json(endpoint.join(&format!("/refresh/sources/{id}/test"))?, &serde_json::json!({})).await?;
    println!(
        "http_status={:?} content_type={:?} estimated_count={:?} preview_bytes={}",
        result.http_status, result.content_type, result.estimated_count, result.preview_bytes
    );
    for line in &result.preview_lines {
        println!("  {line}");
    }
    Ok(())
}

fn print_sources_table(sources: &[RefreshSource]) {
    let columns = [
        Column {
            name: "ID".to_string(),
            alignment: Alignment::Left,
        },
        Column {
            name: "CAMPAIGN".to_string(),
            alignment: Alignment::Left,
        },
        Column {
            name: "PROVIDER".to_string(),
            alignment: Alignment::Left,
        },
        Column {
            name: "PRIORITY".to_string(),
            alignment: Alignment::Right,
        },
        Column {
            name: "ACTIVE".to_string(),
            alignment: Alignment::Left,
        },
        Column {
            name: "LAST STATUS".to_string(),
            alignment: Alignment::Left,
        },
    ];
    let rows = sources
        .iter()
        .map(|source| {
            vec![
                source.id.to_string(),
                source.campaign_name.clone(),
                source.provider_tag.as_str().to_string(),
                source.priority.to_string(),
                source.is_active.to_string(),
                source.last_status.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect::<Vec<_>>();
    tabout::tabulate_output(&columns, &rows, &mut std::io::stdout()).ok();
}

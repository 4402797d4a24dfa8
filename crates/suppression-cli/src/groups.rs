//! Subcommands for refresh-group CRUD.

use crate::client::{delete_no_content, get_json, post_json, print_json};
use clap::Subcommand;
use reqwest::Url;
use suppression_api_types::{GroupUpsertRequest, ListGroupsResponse, RefreshGroup};
use tabout::{Alignment, Column};
use uuid::Uuid;

#[derive(Debug, Subcommand)]
pub enum GroupsCommand {
    /// List configured refresh groups.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Create a refresh group.
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a refresh group by id.
    Delete { id: Uuid },
}

impl GroupsCommand {
    pub async fn run(&self, endpoint: &Url) -> anyhow::Result<()> {
        match self {
            Self::List { json } => list(endpoint, *json).await,
            Self::Create { name, description } => create(endpoint, name.clone(), description.clone()).await,
            Self::Delete { id } => delete(endpoint, *id).await,
        }
    }
}

async fn list(endpoint: &Url, json: bool) -> anyhow::Result<()> {
    let result: ListGroupsResponse = get_json(endpoint.join("/refresh/groups")?).await?;
    if json {
        return print_json(&result);
    }
    let columns = [
        Column {
            name: "ID".to_string(),
            alignment: Alignment::Left,
        },
        Column {
            name: "NAME".to_string(),
            alignment: Alignment::Left,
        },
        Column {
            name: "DESCRIPTION".to_string(),
            alignment: Alignment::Left,
        },
    ];
    let rows: Vec<Vec<String>> = result
        .groups
        .iter()
        .map(|group: &RefreshGroup| {
            vec![
                group.id.to_string(),
                group.name.clone(),
                group.description.clone().unwrap_or_default(),
            ]
        })
        .collect();
    tabout::tabulate_output(&columns, &rows, &mut std::io::stdout())?;
    Ok(())
}

async fn create(endpoint: &Url, name: String, description: Option<String>) -> anyhow::Result<()> {
    let result: RefreshGroup =
        post_json(endpoint.join("/refresh/groups")?, &GroupUpsertRequest { name, description }).await?;
    print_json(&result)
}

async fn delete(endpoint: &Url, id: Uuid) -> anyhow::Result<()> {
    delete_no_content(endpoint.join(&format!("/refresh/groups/{id}"))?).await?;
    println!("deleted {id}");
    Ok(())
}

//! Thin HTTP helpers shared by every subcommand, modeled on `kcli`'s
//! `request_with_json_response` / `request_with_text_response` free
//! functions in `crates/kcli/src/main.rs`.

use anyhow::Context;
use reqwest::{Method, Url};

pub async fn get_json<R: serde::de::DeserializeOwned>(url: Url) -> anyhow::Result<R> {
    request_with_json_response::<(), R>(Method::GET, url, None).await
}

pub async fn delete_json<R: serde::de::DeserializeOwned>(url: Url) -> anyhow::Result<R> {
    request_with_json_response::<(), R>(Method::DELETE, url, None).await
}

/// `DELETE` endpoints that respond with an empty 200 body rather than
/// a JSON object.
pub async fn delete_no_content(url: Url) -> anyhow::Result<()> {
    let response = reqwest::Client::builder().build()?.delete(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.bytes().await.unwrap_or_default();
        anyhow::bail!(
            "request status {}: {}. Response body: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            String::from_utf8_lossy(&body)
        );
    }
    Ok(())
}

pub async fn post_json<B: serde::Serialize, R: serde::de::DeserializeOwned>(
    url: Url,
    body: &B,
) -> anyhow::Result<R> {
    request_with_json_response(Method::POST, url, Some(body)).await
}

pub async fn post_body_text(url: Url, body: String) -> anyhow::Result<String> {
    let response = reqwest::Client::builder()
        .build()?
        .post(url)
        .header(reqwest::header::CONTENT_TYPE, "text/csv")
        .body(body)
        .send()
        .await?;
    response_text(response).await
}

pub async fn get_text(url: Url) -> anyhow::Result<String> {
    let response = reqwest::Client::builder().build()?.get(url).send().await?;
    response_text(response).await
}

async fn response_text(response: reqwest::Response) -> anyhow::Result<String> {
    let status = response.status();
    let body_bytes = response.bytes().await.with_context(|| {
        format!(
            "request status {}: {}, and failed to read response body",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        )
    })?;
    let body_text = String::from_utf8_lossy(&body_bytes).to_string();
    if !status.is_success() {
        anyhow::bail!(
            "request status {}: {}. Response body: {body_text}",
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
        );
    }
    Ok(body_text)
}

async fn request_with_json_response<B: serde::Serialize, R: serde::de::DeserializeOwned>(
    method: Method,
    url: Url,
    body: Option<&B>,
) -> anyhow::Result<R> {
    let client = reqwest::Client::builder().build()?;
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(body);
    }
    let response = request.send().await?;

    let status = response.status();
    if !status.is_success() {
        let body_bytes = response.bytes().await.with_context(|| {
            format!(
                "request status {}: {}, and failed to read response body",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            )
        })?;
        anyhow::bail!(
            "request status {}: {}. Response body: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            String::from_utf8_lossy(&body_bytes)
        );
    }

    let data = response.bytes().await.context("reading response body")?;
    serde_json::from_slice(&data).with_context(|| {
        format!(
            "parsing response as json: {}",
            String::from_utf8_lossy(&data)
        )
    })
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

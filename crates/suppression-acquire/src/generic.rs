//! The default acquisition strategy: a single HTTP GET.

use crate::{truncate_preview, AcquireContext, AcquireError, AcquireResult, Acquired, REQUEST_BUDGET, USER_AGENT};
use futures::TryStreamExt;
use tokio::io::BufReader;
use tokio_util::io::StreamReader;

const MAX_REDIRECTS: usize = 10;

fn client() -> AcquireResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .user_agent(USER_AGENT)
        .timeout(REQUEST_BUDGET)
        .build()?)
}

pub async fn acquire(url: &str, ctx: &AcquireContext) -> AcquireResult<Acquired> {
    let client = client()?;
    let request = client
        .get(url)
        // Liberal Accept: providers return plain text, CSV, or
        // octet-stream depending on mood.
        .header(reqwest::header::ACCEPT, "*/*");

    let response = tokio::select! {
        biased;
        _ = ctx.cancellation.cancelled() => return Err(AcquireError::Cancelled),
        result = request.send() => result?,
    };

    let status = response.status();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let content_length = response.content_length();

    if !status.is_success() {
        let body = response.bytes().await.unwrap_or_default();
        return Err(AcquireError::BadResponse {
            url: url.to_string(),
            status: status.as_u16(),
            content_type,
            body_preview: truncate_preview(&body),
        });
    }

    tracing::debug!(url, status = status.as_u16(), ?content_type, "generic HTTP GET succeeded");

    let byte_stream = response
        .bytes_stream()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err));
    let reader = StreamReader::new(byte_stream);

    Ok(Acquired {
        reader: Box::new(BufReader::new(reader)),
        content_type,
        http_status: Some(status.as_u16()),
        content_length,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn successful_get_streams_body() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/list.txt")
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body("alice@example.com\n#comment\nBOB@test.com\n")
            .create_async()
            .await;

        let ctx = AcquireContext::new("token");
        let url = format!("{}/list.txt", server.url());
        let acquired = acquire(&url, &ctx).await.unwrap();
        assert_eq!(acquired.http_status, Some(200));
        assert_eq!(acquired.content_type.as_deref(), Some("text/plain"));

        let (mut stream, _counter) = suppression_parser::parse_stream(acquired.reader, "test");
        let mut entries = 0;
        while let Some(outcome) = stream.next().await {
            if matches!(outcome, suppression_parser::LineOutcome::Entry(_)) {
                entries += 1;
            }
        }
        assert_eq!(entries, 2);
    }

    #[tokio::test]
    async fn non_2xx_fails_with_body_preview() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/missing.txt")
            .with_status(404)
            .with_body("not found here")
            .create_async()
            .await;

        let ctx = AcquireContext::new("token");
        let url = format!("{}/missing.txt", server.url());
        let err = acquire(&url, &ctx).await.unwrap_err();
        match err {
            AcquireError::BadResponse { status, body_preview, .. } => {
                assert_eq!(status, 404);
                assert_eq!(body_preview, "not found here");
            }
            other => panic!("expected BadResponse, got {other:?}"),
        }
    }
}

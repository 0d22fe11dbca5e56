//! Shared JSON-over-HTTP plumbing for the hosted model providers.
//!
//! Retry strategy (same for embeddings and generation):
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use std::time::Duration;

pub fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Send the request built by `make_request`, retrying transient failures,
/// and return the parsed JSON body of the first successful response.
pub async fn post_json_with_retry<F>(
    label: &str,
    max_retries: u32,
    make_request: F,
) -> Result<serde_json::Value>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = backoff_delay(attempt);
            tracing::debug!(provider = label, attempt, ?delay, "retrying request");
            tokio::time::sleep(delay).await;
        }

        match make_request().send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                let body_text = response.text().await.unwrap_or_default();

                // Rate limited or server error: retry
                if status.as_u16() == 429 || status.is_server_error() {
                    tracing::warn!(provider = label, %status, "transient API error");
                    last_err = Some(anyhow::anyhow!(
                        "{} API error {}: {}",
                        label,
                        status,
                        body_text
                    ));
                    continue;
                }

                // Client error (not 429): fail fast
                bail!("{} API error {}: {}", label, status, body_text);
            }
            Err(e) => {
                tracing::warn!(provider = label, error = %e, "request failed");
                last_err = Some(anyhow::anyhow!("{} request failed: {}", label, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} request failed after retries", label)))
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt - 1).min(5))
}

pub fn require_env(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => bail!("{} environment variable not set", var),
    }
}


#[cfg(test)]
mod tests {
    use super::stub::StubServer;
    use super::*;
    use serde_json::json;

    async fn post_to(server: &StubServer, max_retries: u32) -> Result<serde_json::Value> {
        let client = build_client(5).unwrap();
        let url = format!("{}/v1/echo", server.url);
        post_json_with_retry("Stub", max_retries, || {
            client.post(&url).json(&json!({ "ping": true }))
        })
        .await
    }

    #[tokio::test]
    async fn rate_limit_is_retried_until_success() {
        let server = StubServer::start(vec![
            (429, json!({ "error": "slow down" })),
            (200, json!({ "ok": true })),
        ])
        .await;

        let json = post_to(&server, 3).await.unwrap();
        assert_eq!(json["ok"], true);
        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].body["ping"], true);
    }

    #[tokio::test]
    async fn client_error_fails_after_one_call() {
        let server = StubServer::start(vec![(400, json!({ "error": "bad input" }))]).await;

        let err = post_to(&server, 3).await.unwrap_err();
        assert!(err.to_string().contains("400"));
        assert!(err.to_string().contains("bad input"));
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn server_errors_exhaust_retries() {
        let server = StubServer::start(vec![(503, json!({ "error": "unavailable" }))]).await;

        let err = post_to(&server, 1).await.unwrap_err();
        assert!(err.to_string().contains("503"));
        assert_eq!(server.requests().len(), 2);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(4), Duration::from_secs(8));
        assert_eq!(backoff_delay(6), Duration::from_secs(32));
        assert_eq!(backoff_delay(12), Duration::from_secs(32));
    }
}

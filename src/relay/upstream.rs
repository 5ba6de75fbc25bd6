use reqwest::{Client, RequestBuilder, header};
use serde::Serialize;
use std::time::Duration;

use crate::config::UpstreamConfig;
use crate::constants::UPSTREAM_CONNECT_TIMEOUT_SECS;
use crate::error::RelayError;

/// Body of the single outbound request.
#[derive(Debug, Serialize)]
pub struct UpstreamRequest<'a> {
    pub prompt: &'a str,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a str>,
}

/// Shared HTTP client with connection pooling.
///
/// Only connect and per-read timeouts are set: a total request timeout
/// would also cut off long but healthy streams.
pub fn build_client(upstream: &UpstreamConfig) -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(UPSTREAM_CONNECT_TIMEOUT_SECS))
        .read_timeout(upstream.timeout)
        .pool_max_idle_per_host(10)
        .build()
}

pub fn build_upstream_request(
    client: &Client,
    upstream: &UpstreamConfig,
    prompt: &str,
) -> RequestBuilder {
    let body = UpstreamRequest {
        prompt,
        stream: true,
        model: upstream.model.as_deref(),
    };

    client
        .post(upstream.url.clone())
        .bearer_auth(upstream.api_key.expose())
        .header(header::ACCEPT, "text/event-stream, application/json")
        .json(&body)
}

/// Send the request and insist on a success status before any relaying.
pub async fn send(request: RequestBuilder) -> Result<reqwest::Response, RelayError> {
    let response = request.send().await?;

    let status = response.status();
    if !status.is_success() {
        // Body is discarded; it may echo the prompt or credentials
        return Err(RelayError::UpstreamStatus(status));
    }

    Ok(response)
}

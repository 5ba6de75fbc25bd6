//! Streaming relay: one upstream call, one length-capped downstream body.
//!
//! - `decoder`: incremental UTF-8 decoding across chunk boundaries
//! - `capped`: the per-chunk accounting and the relay stream itself
//! - `upstream`: outbound request construction and status check

pub mod capped;
pub mod decoder;
pub mod upstream;

pub use capped::cap_stream;

use axum::{
    body::Body,
    http::{HeaderValue, header},
    response::Response,
};
use reqwest::Client;

use crate::config::Config;
use crate::constants::RELAY_CONTENT_TYPE;
use crate::error::RelayError;
use crate::gate::{ValidatedPrompt, allow_origin};

/// Call the upstream and, once it has accepted, start streaming its body back.
///
/// Any failure before the upstream returns a success status is reported as a
/// `RelayError`; no partial relay is attempted.
pub async fn relay_prompt(
    client: &Client,
    config: &Config,
    prompt: &ValidatedPrompt,
) -> Result<Response, RelayError> {
    let request = upstream::build_upstream_request(client, &config.upstream, prompt.as_str());
    let upstream_response = upstream::send(request).await?;

    let body = cap_stream(
        upstream_response.bytes_stream(),
        config.limits.max_response_length,
    );

    let mut response = Response::new(Body::from_stream(body));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(RELAY_CONTENT_TYPE),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    allow_origin(headers, &config.allowed_origin);

    Ok(response)
}

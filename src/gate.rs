//! Request gate: everything that can reject a request before the upstream is contacted.
//!
//! Checks run in a fixed order and the first failure wins:
//! origin, preflight, method, JSON, prompt presence, prompt length.

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;
use serde_json::Value;

use crate::config::{Config, Limits};
use crate::constants::{ALLOWED_HEADERS, ALLOWED_METHODS};
use crate::error::RelayError;

/// A prompt that passed every gate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPrompt(String);

impl ValidatedPrompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Require the `Origin` header to match the allowed origin exactly.
pub fn check_origin(headers: &HeaderMap, allowed_origin: &HeaderValue) -> Result<(), RelayError> {
    match headers.get(header::ORIGIN) {
        Some(origin) if origin == allowed_origin => Ok(()),
        _ => Err(RelayError::Forbidden),
    }
}

/// Empty 204 advertising the allowed origin, methods and headers.
pub fn preflight_response(config: &Config) -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();
    allow_origin(headers, &config.allowed_origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    response
}

pub fn allow_origin(headers: &mut HeaderMap, allowed_origin: &HeaderValue) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allowed_origin.clone());
}

/// Read the whole body. Size is bounded by the prompt length check, which
/// must see every prompt so it can report the actual length.
pub async fn read_body(body: Body) -> Result<Bytes, RelayError> {
    body.collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|err| {
            tracing::debug!("Failed to read request body: {err}");
            RelayError::UnreadableBody
        })
}

/// Parse the JSON body and extract a prompt within the configured length.
pub fn parse_prompt(body: &[u8], limits: &Limits) -> Result<ValidatedPrompt, RelayError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| RelayError::InvalidJson)?;

    let prompt = value
        .get("prompt")
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
        .ok_or(RelayError::MissingPrompt)?;

    let actual = prompt.chars().count();
    if actual > limits.max_prompt_length {
        return Err(RelayError::PromptTooLong {
            actual,
            max: limits.max_prompt_length,
        });
    }

    Ok(ValidatedPrompt(prompt.to_string()))
}

use axum::{
    body::Body,
    extract::{Request, State},
    http::{Method, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::AppState;
use crate::error::RelayError;
use crate::gate::{allow_origin, check_origin, parse_prompt, preflight_response, read_body};
use crate::relay::relay_prompt;

pub async fn relay(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let config = &state.config;
    let (parts, body) = request.into_parts();

    if let Err(err) = check_origin(&parts.headers, &config.allowed_origin) {
        debug!(
            origin = ?parts.headers.get(header::ORIGIN),
            "Rejected request from disallowed origin"
        );
        return err.into_response();
    }

    if parts.method == Method::OPTIONS {
        return preflight_response(config);
    }

    match forward(&state, &parts.method, body).await {
        Ok(response) => response,
        Err(err) => {
            match &err {
                RelayError::Upstream(e) => warn!("Failed to contact upstream: {e}"),
                RelayError::UpstreamStatus(status) => warn!("Upstream rejected request: {status}"),
                other => debug!("Rejected request: {other:?}"),
            }
            let mut response = err.into_response();
            allow_origin(response.headers_mut(), &config.allowed_origin);
            response
        }
    }
}

async fn forward(state: &AppState, method: &Method, body: Body) -> Result<Response, RelayError> {
    if method != Method::POST {
        return Err(RelayError::MethodNotAllowed);
    }

    let limits = &state.config.limits;
    let bytes = read_body(body).await?;
    let prompt = parse_prompt(&bytes, limits)?;

    debug!(
        prompt_chars = prompt.as_str().chars().count(),
        "Forwarding prompt upstream"
    );
    relay_prompt(&state.http_client, &state.config, &prompt).await
}

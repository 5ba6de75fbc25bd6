pub mod relay;

use axum::{Router, body::Body, http::Request};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info_span;
use uuid::Uuid;

use crate::AppState;

/// Every path and method lands on the relay handler; the gate decides.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(relay::relay)
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http().make_span_with(
                |request: &Request<Body>| {
                    info_span!(
                        "request",
                        request_id = %Uuid::new_v4(),
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            )),
        )
        .with_state(state)
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Request-level failures. Every variant is resolved before the response
/// headers are sent; once streaming has started, errors travel through the
/// body stream instead.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Forbidden")]
    Forbidden,

    #[error("Method Not Allowed")]
    MethodNotAllowed,

    #[error("Bad Request: Unreadable body")]
    UnreadableBody,

    #[error("Bad Request: Invalid JSON")]
    InvalidJson,

    #[error("Bad Request: Missing prompt")]
    MissingPrompt,

    // The unbalanced parenthesis is part of the client-facing contract.
    #[error("Bad Request: Max prompt length exceeded ({actual}>{max}")]
    PromptTooLong { actual: usize, max: usize },

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Upstream returned {0}")]
    UpstreamStatus(reqwest::StatusCode),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::Forbidden => StatusCode::FORBIDDEN,
            RelayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::UnreadableBody
            | RelayError::InvalidJson
            | RelayError::MissingPrompt
            | RelayError::PromptTooLong { .. } => StatusCode::BAD_REQUEST,
            RelayError::Upstream(_) | RelayError::UpstreamStatus(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            RelayError::MethodNotAllowed => String::new(),
            // Upstream details stay in the logs
            RelayError::Upstream(_) | RelayError::UpstreamStatus(_) => {
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_status_mapping() {
        assert_eq!(RelayError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            RelayError::MethodNotAllowed.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(RelayError::InvalidJson.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            RelayError::UpstreamStatus(reqwest::StatusCode::TOO_MANY_REQUESTS).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_prompt_too_long_message() {
        let err = RelayError::PromptTooLong {
            actual: 1234,
            max: 1000,
        };
        assert_eq!(
            err.to_string(),
            "Bad Request: Max prompt length exceeded (1234>1000"
        );
    }

    #[tokio::test]
    async fn test_method_not_allowed_has_empty_body() {
        let err = RelayError::MethodNotAllowed;
        assert_eq!(err.to_string(), "Method Not Allowed");

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_upstream_details_not_exposed() {
        let response =
            RelayError::UpstreamStatus(reqwest::StatusCode::UNAUTHORIZED).into_response();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"Internal Server Error");
    }
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use shared::endpoints::EndpointError;
use shared::ErrorEnvelope;
use thiserror::Error;
use tracing::error;

/// Failures of the proxy routes, rendered as `{error, details, timestamp}`
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Missing required fields")]
    MissingFields(Vec<&'static str>),

    #[error("Invalid request")]
    InvalidRequest(String),

    #[error("Failed to reach backend")]
    Upstream(#[from] reqwest::Error),

    #[error("Backend returned status {status}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Invalid response from backend")]
    InvalidBody(#[from] serde_json::Error),

    #[error("Invalid backend URL")]
    BackendUrl(EndpointError),
}

impl From<EndpointError> for ProxyError {
    fn from(e: EndpointError) -> Self {
        match e {
            EndpointError::InvalidSegment(_) => ProxyError::InvalidRequest(e.to_string()),
            other => ProxyError::BackendUrl(other),
        }
    }
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::MissingFields(_) | ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> String {
        match self {
            ProxyError::MissingFields(fields) => format!("Required: {}", fields.join(", ")),
            ProxyError::InvalidRequest(reason) => reason.clone(),
            ProxyError::Upstream(e) => e.to_string(),
            ProxyError::UpstreamStatus { body, .. } if !body.trim().is_empty() => body.clone(),
            ProxyError::UpstreamStatus { status, .. } => format!("Upstream status {}", status),
            ProxyError::InvalidBody(e) => e.to_string(),
            ProxyError::BackendUrl(e) => e.to_string(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let details = self.details();
        if status.is_server_error() {
            error!("{}: {}", self, details);
        }
        (status, Json(ErrorEnvelope::new(self.to_string(), Some(details)))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_is_bad_request() {
        let err = ProxyError::MissingFields(vec!["guardianId", "relationship"]);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.details(), "Required: guardianId, relationship");
    }

    #[test]
    fn test_upstream_status_is_internal_error() {
        let err = ProxyError::UpstreamStatus { status: 502, body: String::new() };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.details(), "Upstream status 502");
    }

    #[test]
    fn test_bad_path_segment_is_bad_request() {
        let err = ProxyError::from(EndpointError::InvalidSegment("..".to_string()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.details(), "Invalid path segment: \"..\"");
    }
}

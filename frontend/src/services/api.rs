use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use shared::endpoints::{
    endpoint_url, guardian_relations_url, EndpointError, GUARDIAN_STUDENT_PATH, LEGACY_CHILDREN_PATH,
};
use shared::CreateRelationRequest;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::retry::{RetryPolicy, RetryableError};
use super::session::SessionStore;

#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request failed with status {status}")]
    Status { status: u16, body: Option<Value> },

    #[error("Failed to parse response: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<EndpointError> for ApiError {
    fn from(e: EndpointError) -> Self {
        ApiError::InvalidRequest(e.to_string())
    }
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND.as_u16())
    }

    /// `message` (or `error`) string from the backend's JSON error body
    pub fn backend_message(&self) -> Option<&str> {
        let ApiError::Status { body: Some(body), .. } = self else {
            return None;
        };
        ["message", "error"]
            .iter()
            .filter_map(|field| body.get(*field).and_then(Value::as_str))
            .map(str::trim)
            .find(|message| !message.is_empty())
    }
}

impl RetryableError for ApiError {
    fn status(&self) -> Option<u16> {
        ApiError::status(self)
    }
}

/// The two backend sources of a guardian's children
#[async_trait]
pub trait GuardianApi: Send + Sync {
    /// `GET /guardian-student/guardian/{guardianId}`
    async fn guardian_relations(&self, guardian_id: &str) -> Result<Value, ApiError>;

    /// `GET /users/children`
    async fn legacy_children(&self) -> Result<Value, ApiError>;
}

/// API client for communicating with the LMS backend
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    session: Option<SessionStore>,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            session: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Attach the session whose token is sent as a bearer credential
    pub fn with_session(mut self, session: SessionStore) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `path` is a fixed route; ids must go through `get_url` with an encoded URL
    pub async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        let url = endpoint_url(&self.base_url, path)?;
        self.get_url(&url).await
    }

    pub async fn get_url(&self, url: &Url) -> Result<Value, ApiError> {
        self.retry.run(|| self.send(Method::GET, url, None)).await
    }

    pub async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
        let url = endpoint_url(&self.base_url, path)?;
        let body = serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.retry
            .run(|| self.send(Method::POST, &url, Some(&body)))
            .await
    }

    /// `POST /guardian-student`
    pub async fn create_relation(&self, request: &CreateRelationRequest) -> Result<Value, ApiError> {
        self.post_json(GUARDIAN_STUDENT_PATH, request).await
    }

    async fn send(&self, method: Method, url: &Url, body: Option<&Value>) -> Result<Value, ApiError> {
        debug!("{} {}", method, url);

        let mut request = self.http.request(method, url.clone());
        if let Some(token) = self.session.as_ref().and_then(SessionStore::token) {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: serde_json::from_str(&text).ok(),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl GuardianApi for ApiClient {
    async fn guardian_relations(&self, guardian_id: &str) -> Result<Value, ApiError> {
        let url = guardian_relations_url(&self.base_url, guardian_id)?;
        self.get_url(&url).await
    }

    async fn legacy_children(&self) -> Result<Value, ApiError> {
        self.get_json(LEGACY_CHILDREN_PATH).await
    }
}

//! # Upstream Client
//!
//! Thin reqwest wrapper around the external REST backend. Calls carry the
//! caller's `Authorization` header through unchanged. Path ids are encoded as
//! a single segment of the relation endpoint.

use axum::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
use serde_json::Value;
use shared::endpoints::{endpoint_url, guardian_relations_url, GUARDIAN_STUDENT_PATH};
use std::sync::Arc;
use tracing::debug;

use crate::config::BackendConfig;
use crate::error::ProxyError;

#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    config: Arc<BackendConfig>,
}

impl UpstreamClient {
    pub fn new(config: Arc<BackendConfig>) -> Result<Self, ProxyError> {
        let http = reqwest::Client::builder()
            .timeout(config.upstream_timeout())
            .build()?;
        Ok(Self { http, config })
    }

    /// `GET /guardian-student/guardian/{guardianId}`; any non-2xx is an error
    pub async fn guardian_relations(
        &self,
        guardian_id: &str,
        authorization: Option<&HeaderValue>,
    ) -> Result<Value, ProxyError> {
        let url = guardian_relations_url(&self.config.backend_url, guardian_id)?;
        debug!("Forwarding GET {}", url);

        let mut request = self.http.get(url);
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value.clone());
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ProxyError::UpstreamStatus {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// `POST /guardian-student`; the upstream status is returned for relaying
    pub async fn create_relation(
        &self,
        body: &Value,
        authorization: Option<&HeaderValue>,
    ) -> Result<(StatusCode, Value), ProxyError> {
        let url = endpoint_url(&self.config.backend_url, GUARDIAN_STUDENT_PATH)?;
        debug!("Forwarding POST {}", url);

        let mut request = self.http.post(url).json(body);
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value.clone());
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };
        Ok((status, body))
    }
}

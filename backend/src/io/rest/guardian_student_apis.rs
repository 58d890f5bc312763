//! # REST API for Guardian-Student Relations
//!
//! Proxies the relation endpoints of the external backend. Listing maps the
//! relations into `ChildrenListResult` with the shared child mapper so the
//! server and the client hook produce the same shape.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde_json::Value;
use shared::children::parse_relations;
use shared::ChildSource;
use tracing::{error, info};

use crate::error::ProxyError;
use crate::AppState;

const REQUIRED_RELATION_FIELDS: [&str; 3] = ["guardianId", "studentId", "relationship"];

/// List a guardian's children
pub async fn get_guardian_children(
    State(state): State<AppState>,
    Path(guardian_id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    info!("GET /api/guardian-student/guardian/{}", guardian_id);

    let relations = match state
        .upstream
        .guardian_relations(&guardian_id, headers.get(AUTHORIZATION))
        .await
        .and_then(|body| parse_relations(body).map_err(ProxyError::from))
    {
        Ok(relations) => relations,
        Err(e) => {
            error!("Failed to fetch children for guardian {}: {}", guardian_id, e);
            return e.into_response();
        }
    };

    let result = state
        .mapper
        .map_all(relations.into_iter().map(ChildSource::Primary));
    info!(
        "Returning {} children for guardian {}",
        result.total_children, guardian_id
    );
    (StatusCode::OK, Json(result)).into_response()
}

/// Create a guardian-student relation
pub async fn create_guardian_student_relation(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> impl IntoResponse {
    info!("POST /api/guardian-student");

    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => return ProxyError::InvalidRequest(rejection.body_text()).into_response(),
    };

    let missing = missing_fields(&body);
    if !missing.is_empty() {
        info!("Rejecting relation request, missing {:?}", missing);
        return ProxyError::MissingFields(missing).into_response();
    }

    match state
        .upstream
        .create_relation(&body, headers.get(AUTHORIZATION))
        .await
    {
        Ok((status, upstream_body)) => (status, Json(upstream_body)).into_response(),
        Err(e) => {
            error!("Failed to create guardian-student relation: {}", e);
            e.into_response()
        }
    }
}

/// Required fields that are absent, null, or blank strings. Numeric ids count as present.
fn missing_fields(body: &Value) -> Vec<&'static str> {
    REQUIRED_RELATION_FIELDS
        .into_iter()
        .filter(|field| match body.get(*field) {
            None | Some(Value::Null) => true,
            Some(Value::String(value)) => value.trim().is_empty(),
            Some(_) => false,
        })
        .collect()
}

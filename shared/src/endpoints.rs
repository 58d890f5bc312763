//! Paths of the external backend's guardian-student endpoints.
//!
//! Ids taken from a request path are appended as one percent-encoded segment,
//! so an id can never walk the URL onto another endpoint.

use thiserror::Error;
use url::Url;

pub const GUARDIAN_RELATIONS_PATH: &str = "/guardian-student/guardian";
pub const GUARDIAN_STUDENT_PATH: &str = "/guardian-student";
pub const LEGACY_CHILDREN_PATH: &str = "/users/children";

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("Invalid base URL: {0}")]
    InvalidBase(#[from] url::ParseError),

    #[error("Base URL cannot carry a path: {0}")]
    CannotBeABase(String),

    #[error("Invalid path segment: {0:?}")]
    InvalidSegment(String),
}

/// `{base}{path}`
pub fn endpoint_url(base: &str, path: &str) -> Result<Url, EndpointError> {
    Ok(Url::parse(&format!("{}{}", base.trim_end_matches('/'), path))?)
}

/// `{base}{path}/{segment}` with `segment` encoded as exactly one path segment
pub fn endpoint_url_with_segment(base: &str, path: &str, segment: &str) -> Result<Url, EndpointError> {
    if segment.is_empty() {
        return Err(EndpointError::InvalidSegment(segment.to_string()));
    }

    let mut url = endpoint_url(base, path)?;
    let expected_segments = url.path_segments().map_or(0, |s| s.filter(|p| !p.is_empty()).count()) + 1;

    url.path_segments_mut()
        .map_err(|_| EndpointError::CannotBeABase(base.to_string()))?
        .pop_if_empty()
        .push(segment);

    // `.` and `..` are dropped by the URL path rules instead of being appended
    let appended = url.path_segments().map_or(0, |s| s.count());
    if appended != expected_segments {
        return Err(EndpointError::InvalidSegment(segment.to_string()));
    }
    Ok(url)
}

/// Relation list endpoint for one guardian
pub fn guardian_relations_url(base: &str, guardian_id: &str) -> Result<Url, EndpointError> {
    endpoint_url_with_segment(base, GUARDIAN_RELATIONS_PATH, guardian_id)
}

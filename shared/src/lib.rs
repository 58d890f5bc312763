use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;

pub mod access;
pub mod children;
pub mod endpoints;

pub use access::{AccessPolicy, Decision, RedirectReason, RouteRule};
pub use children::{
    ChildMapper, ChildSource, PlaceholderStrategy, RandomPlaceholders, SeededPlaceholders,
    SyntheticMetrics,
};

/// Account type as reported by the backend in `user.type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Admin,
    Teacher,
    Parent,
    Student,
    Guardian,
    /// Any type string the client does not know about
    #[serde(other)]
    Unknown,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Admin => "admin",
            UserType::Teacher => "teacher",
            UserType::Parent => "parent",
            UserType::Student => "student",
            UserType::Guardian => "guardian",
            UserType::Unknown => "unknown",
        }
    }

    /// Parents and guardians share the same dashboard and verification rules
    pub fn is_parent_like(&self) -> bool {
        matches!(self, UserType::Parent | UserType::Guardian)
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AptitudeTestStatus {
    #[serde(default)]
    pub attempted: bool,
    #[serde(default)]
    pub passed: bool,
}

/// Backend ids arrive as strings from some endpoints and as integers from others
#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Unsigned(u64),
    Signed(i64),
}

impl From<WireId> for String {
    fn from(id: WireId) -> Self {
        match id {
            WireId::Text(text) => text,
            WireId::Unsigned(n) => n.to_string(),
            WireId::Signed(n) => n.to_string(),
        }
    }
}

fn string_or_number_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    WireId::deserialize(deserializer).map(String::from)
}

fn optional_string_or_number_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Option::<WireId>::deserialize(deserializer).map(|id| id.map(String::from))
}

/// Snapshot of the signed-in user, persisted client-side at login/registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
    #[serde(deserialize_with = "string_or_number_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub user_type: UserType,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aptitude_test_status: Option<AptitudeTestStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
}

impl UserSnapshot {
    pub fn has_passed_aptitude_test(&self) -> bool {
        self.aptitude_test_status.map(|s| s.passed).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    View,
    Limited,
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    #[serde(deserialize_with = "string_or_number_id")]
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Link between a guardian account and a student account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardianStudentRelation {
    #[serde(deserialize_with = "string_or_number_id")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number_id")]
    pub guardian_id: String,
    pub student: StudentSummary,
    pub relationship: String,
    #[serde(default)]
    pub is_primary: bool,
    pub permission_level: PermissionLevel,
    #[serde(default)]
    pub is_active: bool,
    /// RFC 3339
    pub created_at: String,
    /// RFC 3339
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacySubject {
    #[serde(
        default,
        deserialize_with = "optional_string_or_number_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    pub name: String,
}

/// Child record as returned by the older `/users/children` endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyChild {
    #[serde(deserialize_with = "string_or_number_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    /// Percentage, not guaranteed to be within 0..=100
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub subjects: Vec<LegacySubject>,
    #[serde(default)]
    pub last_active: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivity {
    pub subject: String,
    pub activity: String,
    /// RFC 3339
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingAssessment {
    pub title: String,
    pub subject: String,
    /// RFC 3339
    pub due_date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickStats {
    pub subjects_enrolled: u32,
    pub assessments_pending: u32,
    pub study_streak_days: u32,
}

/// Child as rendered on the guardian dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Child {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    pub is_active: bool,
    pub enrolled_since: String,
    pub last_activity: String,
    /// Always within 0..=100
    pub overall_progress: u8,
    pub recent_activity: RecentActivity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upcoming_assessment: Option<UpcomingAssessment>,
    pub quick_stats: QuickStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildrenMetadata {
    /// RFC 3339
    pub last_updated: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildrenListResult {
    pub children: Vec<Child>,
    pub total_children: usize,
    pub metadata: ChildrenMetadata,
}

impl ChildrenListResult {
    /// Build a result, dropping any child whose id was already seen.
    pub fn from_children(children: Vec<Child>) -> Self {
        let mut seen = HashSet::new();
        let children: Vec<Child> = children
            .into_iter()
            .filter(|child| {
                let fresh = seen.insert(child.id.clone());
                if !fresh {
                    tracing::warn!("Dropping duplicate child id {}", child.id);
                }
                fresh
            })
            .collect();

        Self {
            total_children: children.len(),
            children,
            metadata: ChildrenMetadata {
                last_updated: chrono::Utc::now().to_rfc3339(),
            },
        }
    }

    pub fn empty() -> Self {
        Self::from_children(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// Body of `POST /guardian-student`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRelationRequest {
    pub guardian_id: String,
    pub student_id: String,
    pub relationship: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_primary: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_level: Option<PermissionLevel>,
}

/// Error body returned by the proxy routes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub timestamp: String,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            error: error.into(),
            details,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

//! # Guardian Children Mapping
//!
//! Turns the two backend child shapes into the single `Child` view model.
//!
//! The backend does not yet supply progress, quick stats or upcoming
//! assessments, so those fields come from a `PlaceholderStrategy`. The default
//! strategy is random per call; `SeededPlaceholders` derives the same values
//! from an entity id every time. Both go away once the backend reports real
//! progress data.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::warn;

use crate::{
    Child, ChildrenListResult, GuardianStudentRelation, LegacyChild, QuickStats, RecentActivity,
    UpcomingAssessment,
};

const SUBJECTS: &[&str] = &["Mathematics", "Science", "English", "History", "Geography"];
const ACTIVITIES: &[&str] = &[
    "Completed a lesson",
    "Submitted an assignment",
    "Attempted a quiz",
    "Watched a lecture",
];
const ASSESSMENT_TITLES: &[&str] = &["Unit Test", "Weekly Quiz", "Chapter Review", "Mid-term Assessment"];
const LEGACY_DEFAULT_SUBJECT: &str = "General";
const SYNTHETIC_EMAIL_DOMAIN: &str = "student.lms.local";

/// Where a child record came from
#[derive(Debug, Clone, PartialEq)]
pub enum ChildSource {
    Primary(GuardianStudentRelation),
    Legacy(LegacyChild),
}

impl ChildSource {
    pub fn entity_id(&self) -> &str {
        match self {
            ChildSource::Primary(relation) => &relation.student.id,
            ChildSource::Legacy(legacy) => &legacy.id,
        }
    }
}

/// Values the backend does not provide yet
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticMetrics {
    /// 60..=100
    pub overall_progress: u8,
    pub quick_stats: QuickStats,
    pub upcoming_assessment: Option<UpcomingAssessment>,
    pub activity_subject: String,
    pub activity: String,
}

pub trait PlaceholderStrategy: Send + Sync {
    fn synthesize(&self, entity_id: &str) -> SyntheticMetrics;
}

/// Fresh random values on every call
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPlaceholders;

impl PlaceholderStrategy for RandomPlaceholders {
    fn synthesize(&self, _entity_id: &str) -> SyntheticMetrics {
        sample_metrics(&mut rand::thread_rng())
    }
}

/// Values derived from a SHA-256 of the entity id, stable across calls.
/// Due dates are still relative to the current day.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeededPlaceholders;

impl PlaceholderStrategy for SeededPlaceholders {
    fn synthesize(&self, entity_id: &str) -> SyntheticMetrics {
        let digest = Sha256::digest(entity_id.as_bytes());
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&digest);
        sample_metrics(&mut StdRng::from_seed(seed))
    }
}

fn pick<R: Rng>(rng: &mut R, items: &[&str]) -> String {
    items[rng.gen_range(0..items.len())].to_string()
}

fn sample_metrics<R: Rng>(rng: &mut R) -> SyntheticMetrics {
    let overall_progress = rng.gen_range(60..=100u8);
    let quick_stats = QuickStats {
        subjects_enrolled: rng.gen_range(3..=5),
        assessments_pending: rng.gen_range(0..=3),
        study_streak_days: rng.gen_range(1..=30),
    };
    let upcoming_assessment = if rng.gen_bool(0.5) {
        let due_in_days = rng.gen_range(1..=14);
        Some(UpcomingAssessment {
            title: pick(rng, ASSESSMENT_TITLES),
            subject: pick(rng, SUBJECTS),
            due_date: (Utc::now() + chrono::Duration::days(due_in_days)).to_rfc3339(),
        })
    } else {
        None
    };

    SyntheticMetrics {
        overall_progress,
        quick_stats,
        upcoming_assessment,
        activity_subject: pick(rng, SUBJECTS),
        activity: pick(rng, ACTIVITIES),
    }
}

/// Maps `ChildSource` records into `Child` view models.
#[derive(Clone)]
pub struct ChildMapper {
    placeholders: Arc<dyn PlaceholderStrategy>,
    image_base_url: Option<String>,
}

impl Default for ChildMapper {
    fn default() -> Self {
        Self::new(Arc::new(RandomPlaceholders))
    }
}

impl ChildMapper {
    pub fn new(placeholders: Arc<dyn PlaceholderStrategy>) -> Self {
        Self {
            placeholders,
            image_base_url: None,
        }
    }

    /// Fill `avatar_url` for primary records from `{base}/avatars/{student_id}.png`
    pub fn with_image_base_url(mut self, image_base_url: Option<String>) -> Self {
        self.image_base_url = image_base_url
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        self
    }

    pub fn map(&self, source: ChildSource) -> Child {
        match source {
            ChildSource::Primary(relation) => self.from_relation(relation),
            ChildSource::Legacy(legacy) => self.from_legacy(legacy),
        }
    }

    pub fn map_all<I>(&self, sources: I) -> ChildrenListResult
    where
        I: IntoIterator<Item = ChildSource>,
    {
        ChildrenListResult::from_children(sources.into_iter().map(|s| self.map(s)).collect())
    }

    fn from_relation(&self, relation: GuardianStudentRelation) -> Child {
        let metrics = self.placeholders.synthesize(&relation.student.id);
        let avatar_url = self
            .image_base_url
            .as_ref()
            .map(|base| format!("{}/avatars/{}.png", base, relation.student.id));

        Child {
            id: relation.student.id,
            name: relation.student.name,
            email: relation.student.email,
            age: None,
            grade: None,
            is_active: relation.is_active,
            enrolled_since: relation.created_at,
            last_activity: relation.updated_at.clone(),
            overall_progress: metrics.overall_progress,
            recent_activity: RecentActivity {
                subject: metrics.activity_subject,
                activity: metrics.activity,
                timestamp: relation.updated_at,
            },
            upcoming_assessment: metrics.upcoming_assessment,
            quick_stats: metrics.quick_stats,
            avatar_url,
        }
    }

    fn from_legacy(&self, legacy: LegacyChild) -> Child {
        let metrics = self.placeholders.synthesize(&legacy.id);
        let last_activity = legacy
            .last_active
            .clone()
            .unwrap_or_else(|| Utc::now().to_rfc3339());
        let subject = legacy
            .subjects
            .first()
            .map(|s| s.name.clone())
            .unwrap_or_else(|| LEGACY_DEFAULT_SUBJECT.to_string());
        let mut quick_stats = metrics.quick_stats;
        if !legacy.subjects.is_empty() {
            quick_stats.subjects_enrolled = legacy.subjects.len() as u32;
        }

        Child {
            email: email_from_name(&legacy.name),
            id: legacy.id,
            name: legacy.name,
            age: legacy.age,
            grade: legacy.grade,
            is_active: true,
            enrolled_since: last_activity.clone(),
            last_activity: last_activity.clone(),
            overall_progress: legacy.progress.map(clamp_progress).unwrap_or(0),
            recent_activity: RecentActivity {
                subject,
                activity: metrics.activity,
                timestamp: last_activity,
            },
            upcoming_assessment: metrics.upcoming_assessment,
            quick_stats,
            avatar_url: None,
        }
    }
}

fn clamp_progress(progress: f64) -> u8 {
    if progress.is_nan() {
        return 0;
    }
    progress.round().clamp(0.0, 100.0) as u8
}

/// `"Jane Q. Public"` -> `"jane.q.public@student.lms.local"`
pub fn email_from_name(name: &str) -> String {
    let local = name
        .split_whitespace()
        .map(|part| {
            part.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(".");
    let local = if local.is_empty() { "student".to_string() } else { local };
    format!("{}@{}", local, SYNTHETIC_EMAIL_DOMAIN)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RelationPayload {
    List(Vec<GuardianStudentRelation>),
    Envelope { data: Vec<GuardianStudentRelation> },
}

/// Accepts a bare relation array or a `{ "data": [...] }` envelope.
pub fn parse_relations(body: Value) -> Result<Vec<GuardianStudentRelation>, serde_json::Error> {
    match serde_json::from_value(body)? {
        RelationPayload::List(relations) => Ok(relations),
        RelationPayload::Envelope { data } => Ok(data),
    }
}

/// `None` when the body is not an array. Elements that do not parse are skipped.
pub fn parse_legacy_children(body: Value) -> Option<Vec<LegacyChild>> {
    let Value::Array(items) = body else {
        return None;
    };

    let children = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<LegacyChild>(item) {
            Ok(child) => Some(child),
            Err(e) => {
                warn!("Skipping malformed legacy child record: {}", e);
                None
            }
        })
        .collect();
    Some(children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LegacySubject, PermissionLevel, StudentSummary};
    use serde_json::json;

    fn relation(student_id: &str, name: &str) -> GuardianStudentRelation {
        GuardianStudentRelation {
            id: format!("rel-{}", student_id),
            guardian_id: "g1".to_string(),
            student: StudentSummary {
                id: student_id.to_string(),
                name: name.to_string(),
                email: format!("{}@example.com", student_id),
            },
            relationship: "mother".to_string(),
            is_primary: true,
            permission_level: PermissionLevel::View,
            is_active: true,
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-03-01T00:00:00Z".to_string(),
        }
    }

    fn jane() -> LegacyChild {
        LegacyChild {
            id: "c1".to_string(),
            name: "Jane".to_string(),
            grade: Some("5th".to_string()),
            age: Some(10),
            progress: Some(50.0),
            subjects: vec![],
            last_active: None,
        }
    }

    #[test]
    fn test_relation_mapping_copies_identity_and_synthesizes_ranges() {
        let mapper = ChildMapper::default();
        for _ in 0..50 {
            let child = mapper.map(ChildSource::Primary(relation("s1", "John Doe")));
            assert_eq!(child.id, "s1");
            assert_eq!(child.name, "John Doe");
            assert_eq!(child.email, "s1@example.com");
            assert!(child.is_active);
            assert_eq!(child.enrolled_since, "2024-01-01T00:00:00Z");
            assert_eq!(child.last_activity, "2024-03-01T00:00:00Z");
            assert!((60..=100).contains(&child.overall_progress));
            assert!((3..=5).contains(&child.quick_stats.subjects_enrolled));
            assert!(child.quick_stats.assessments_pending <= 3);
            assert!((1..=30).contains(&child.quick_stats.study_streak_days));
            assert!(child.avatar_url.is_none());
        }
    }

    #[test]
    fn test_legacy_mapping() {
        let child = ChildMapper::default().map(ChildSource::Legacy(jane()));
        assert_eq!(child.id, "c1");
        assert_eq!(child.overall_progress, 50);
        assert_eq!(child.email, "jane@student.lms.local");
        assert_eq!(child.grade.as_deref(), Some("5th"));
        assert_eq!(child.age, Some(10));
        assert!(child.is_active);
        assert_eq!(child.recent_activity.subject, LEGACY_DEFAULT_SUBJECT);
    }

    #[test]
    fn test_legacy_first_subject_becomes_recent_subject() {
        let legacy = LegacyChild {
            subjects: vec![
                LegacySubject { id: None, name: "Physics".to_string() },
                LegacySubject { id: None, name: "Art".to_string() },
            ],
            ..jane()
        };
        let child = ChildMapper::default().map(ChildSource::Legacy(legacy));
        assert_eq!(child.recent_activity.subject, "Physics");
        assert_eq!(child.quick_stats.subjects_enrolled, 2);
    }

    #[test]
    fn test_legacy_progress_is_clamped() {
        let mapper = ChildMapper::default();
        let over = mapper.map(ChildSource::Legacy(LegacyChild { progress: Some(140.0), ..jane() }));
        let under = mapper.map(ChildSource::Legacy(LegacyChild { progress: Some(-3.0), ..jane() }));
        let missing = mapper.map(ChildSource::Legacy(LegacyChild { progress: None, ..jane() }));
        assert_eq!(over.overall_progress, 100);
        assert_eq!(under.overall_progress, 0);
        assert_eq!(missing.overall_progress, 0);
    }

    #[test]
    fn test_seeded_placeholders_are_stable_per_id() {
        let strategy = SeededPlaceholders;
        let a = strategy.synthesize("student-1");
        let b = strategy.synthesize("student-1");
        assert_eq!(a.overall_progress, b.overall_progress);
        assert_eq!(a.quick_stats, b.quick_stats);
        assert_eq!(a.activity, b.activity);
        assert_eq!(a.upcoming_assessment.is_some(), b.upcoming_assessment.is_some());
    }

    #[test]
    fn test_avatar_url_from_image_base() {
        let mapper = ChildMapper::new(Arc::new(SeededPlaceholders))
            .with_image_base_url(Some("https://img.example.com/".to_string()));
        let child = mapper.map(ChildSource::Primary(relation("s9", "Ann")));
        assert_eq!(
            child.avatar_url.as_deref(),
            Some("https://img.example.com/avatars/s9.png")
        );
    }

    #[test]
    fn test_email_from_name() {
        assert_eq!(email_from_name("Jane Q. Public"), "jane.q.public@student.lms.local");
        assert_eq!(email_from_name("   "), "student@student.lms.local");
    }

    #[test]
    fn test_parse_relations_accepts_envelope() {
        let body = json!({"data": [serde_json::to_value(relation("s1", "A")).unwrap()]});
        assert_eq!(parse_relations(body).unwrap().len(), 1);
        assert!(parse_relations(json!({"message": "nope"})).is_err());
    }

    #[test]
    fn test_parse_legacy_requires_array() {
        assert!(parse_legacy_children(json!({"children": []})).is_none());
        let parsed = parse_legacy_children(json!([
            {"id": "c1", "name": "Jane", "progress": 50},
            {"unexpected": true}
        ]))
        .unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn test_parse_legacy_keeps_numeric_ids() {
        let parsed = parse_legacy_children(json!([
            {"id": 1, "name": "Jane", "progress": 50},
            {"id": 2, "name": "Max"}
        ]))
        .unwrap();

        let ids: Vec<_> = parsed.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_parse_relations_keeps_numeric_ids() {
        let body = json!([{
            "id": 10,
            "guardianId": 7,
            "student": {"id": 42, "name": "John Doe", "email": "john@example.com"},
            "relationship": "father",
            "permissionLevel": "full",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-10T00:00:00Z"
        }]);

        let relations = parse_relations(body).unwrap();
        assert_eq!(relations[0].guardian_id, "7");

        let result = ChildMapper::default().map_all(relations.into_iter().map(ChildSource::Primary));
        assert_eq!(result.total_children, 1);
        assert_eq!(result.children[0].id, "42");
    }
}

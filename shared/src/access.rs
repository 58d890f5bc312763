//! # Role Gate
//!
//! Decides whether a navigation to a protected route may proceed for the
//! current user snapshot, or where the user should be sent instead.
//!
//! The gate is a pure function over `(Option<&UserSnapshot>, path)`. Callers
//! perform the navigation and any user-visible notification themselves.

use serde::{Deserialize, Serialize};

use crate::{UserSnapshot, UserType};

pub const LOGIN_PATH: &str = "/login";
pub const APTITUDE_TEST_PATH: &str = "/aptitude-test";
pub const VERIFY_OTP_PATH: &str = "/verify-otp";
pub const STUDENT_AREA: &str = "/student";
pub const PARENT_AREA: &str = "/parent";

/// Why the gate redirected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RedirectReason {
    NotAuthenticated,
    RoleNotAllowed,
    AptitudeTestPending,
    VerificationPending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Decision {
    Allow,
    RedirectTo { path: String, reason: RedirectReason },
}

impl Decision {
    fn redirect(path: &str, reason: RedirectReason) -> Self {
        Decision::RedirectTo {
            path: path.to_string(),
            reason,
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn redirect_path(&self) -> Option<&str> {
        match self {
            Decision::Allow => None,
            Decision::RedirectTo { path, .. } => Some(path),
        }
    }
}

/// A protected area of the app and the roles that may enter it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    pub prefix: String,
    pub allowed_roles: Vec<UserType>,
}

impl RouteRule {
    pub fn new(prefix: impl Into<String>, allowed_roles: &[UserType]) -> Self {
        Self {
            prefix: prefix.into(),
            allowed_roles: allowed_roles.to_vec(),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        path_is_under(path, &self.prefix)
    }

    pub fn allows(&self, user_type: UserType) -> bool {
        self.allowed_roles.contains(&user_type)
    }
}

/// `path` equals `prefix` or continues it with a `/`, `?` or `#`
pub fn path_is_under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with(|c| matches!(c, '/' | '?' | '#')),
        None => false,
    }
}

/// Landing page for each account type
pub fn default_dashboard_for(user_type: UserType) -> &'static str {
    match user_type {
        UserType::Admin => "/admin/dashboard",
        UserType::Teacher => "/teacher/dashboard",
        UserType::Parent | UserType::Guardian => "/parent/dashboard",
        UserType::Student => "/student/dashboard",
        UserType::Unknown => LOGIN_PATH,
    }
}

/// Ordered table of protected route prefixes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    rules: Vec<RouteRule>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::new(vec![
            RouteRule::new("/admin", &[UserType::Admin]),
            RouteRule::new("/teacher", &[UserType::Teacher]),
            RouteRule::new(PARENT_AREA, &[UserType::Parent, UserType::Guardian]),
            RouteRule::new(STUDENT_AREA, &[UserType::Student]),
            RouteRule::new(APTITUDE_TEST_PATH, &[UserType::Student]),
        ])
    }
}

impl AccessPolicy {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// First rule whose prefix covers `path`; `None` means the route is public
    pub fn rule_for(&self, path: &str) -> Option<&RouteRule> {
        self.rules.iter().find(|rule| rule.matches(path))
    }

    pub fn decide(&self, user: Option<&UserSnapshot>, requested_path: &str) -> Decision {
        let Some(rule) = self.rule_for(requested_path) else {
            return Decision::Allow;
        };

        let Some(user) = user else {
            return Decision::redirect(LOGIN_PATH, RedirectReason::NotAuthenticated);
        };

        if !rule.allows(user.user_type) {
            return Decision::redirect(
                default_dashboard_for(user.user_type),
                RedirectReason::RoleNotAllowed,
            );
        }

        if user.user_type == UserType::Student
            && !user.has_passed_aptitude_test()
            && path_is_under(requested_path, STUDENT_AREA)
            && !path_is_under(requested_path, APTITUDE_TEST_PATH)
        {
            return Decision::redirect(APTITUDE_TEST_PATH, RedirectReason::AptitudeTestPending);
        }

        if user.user_type.is_parent_like()
            && !user.is_verified
            && path_is_under(requested_path, PARENT_AREA)
        {
            return Decision::redirect(VERIFY_OTP_PATH, RedirectReason::VerificationPending);
        }

        Decision::Allow
    }
}

/// Role Gate with the default route table
pub fn decide(user: Option<&UserSnapshot>, requested_path: &str) -> Decision {
    AccessPolicy::default().decide(user, requested_path)
}

use shared::{AccessPolicy, Decision, RedirectReason};
use std::sync::Arc;

use crate::services::logging::Logger;
use crate::services::notifications::{NotificationSink, Toast};
use crate::services::session::SessionStore;

const COMPONENT: &str = "role-gate";

pub fn redirect_message(reason: RedirectReason) -> &'static str {
    match reason {
        RedirectReason::NotAuthenticated => "Please log in to continue.",
        RedirectReason::RoleNotAllowed => "You do not have access to that page.",
        RedirectReason::AptitudeTestPending => {
            "Please complete your aptitude test to unlock your dashboard."
        }
        RedirectReason::VerificationPending => "Please verify your account to continue.",
    }
}

/// Runs the role gate against the current session before a protected render
#[derive(Clone)]
pub struct NavigationGuard {
    session: SessionStore,
    policy: AccessPolicy,
    notifications: Option<Arc<dyn NotificationSink>>,
}

impl NavigationGuard {
    pub fn new(session: SessionStore) -> Self {
        Self {
            session,
            policy: AccessPolicy::default(),
            notifications: None,
        }
    }

    pub fn with_policy(mut self, policy: AccessPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Show an info toast whenever a navigation is redirected
    pub fn with_notifications(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notifications = Some(sink);
        self
    }

    pub fn check(&self, requested_path: &str) -> Decision {
        let user = self.session.current_user();
        let decision = self.policy.decide(user.as_ref(), requested_path);

        match &decision {
            Decision::Allow => {
                Logger::debug_with_component(COMPONENT, &format!("Allowing {}", requested_path));
            }
            Decision::RedirectTo { path, reason } => {
                Logger::info_with_component(
                    COMPONENT,
                    &format!("Redirecting {} -> {} ({:?})", requested_path, path, reason),
                );
                if let Some(sink) = &self.notifications {
                    sink.show(Toast::info(redirect_message(*reason)));
                }
            }
        }

        decision
    }
}

/// One-off gate check with the default route table
pub fn use_role_gate(session: &SessionStore, requested_path: &str) -> Decision {
    NavigationGuard::new(session.clone()).check(requested_path)
}

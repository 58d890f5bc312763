//! # Session Store
//!
//! Explicit session context: the auth token and the signed-in user's snapshot,
//! set at login, replaced on refresh and cleared at logout.

use shared::UserSnapshot;
use std::sync::Arc;
use tracing::{info, warn};

use super::storage::{ClientStorage, StorageError};

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

#[derive(Debug, Clone)]
pub struct SessionStore {
    storage: Arc<ClientStorage>,
}

impl SessionStore {
    pub fn new(storage: Arc<ClientStorage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<ClientStorage> {
        &self.storage
    }

    pub fn login(&self, token: &str, user: &UserSnapshot) -> Result<(), StorageError> {
        self.storage.set(TOKEN_KEY, token)?;
        self.storage.set(USER_KEY, serde_json::to_string(user)?)?;
        info!("Session started for {} user {}", user.user_type, user.id);
        Ok(())
    }

    /// Replace the stored snapshot, e.g. after the aptitude test is passed
    pub fn refresh_user(&self, user: &UserSnapshot) -> Result<(), StorageError> {
        self.storage.set(USER_KEY, serde_json::to_string(user)?)
    }

    pub fn logout(&self) -> Result<(), StorageError> {
        self.storage.remove(TOKEN_KEY)?;
        self.storage.remove(USER_KEY)?;
        info!("Session cleared");
        Ok(())
    }

    pub fn token(&self) -> Option<String> {
        self.storage.get(TOKEN_KEY).filter(|t| !t.is_empty())
    }

    /// `None` when no user is stored or the stored value does not parse
    pub fn current_user(&self) -> Option<UserSnapshot> {
        let raw = self.storage.get(USER_KEY)?;
        match serde_json::from_str::<UserSnapshot>(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!("Ignoring malformed user snapshot in client storage: {}", e);
                None
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some() && self.current_user().is_some()
    }
}

//! # Toast Notifications
//!
//! Surfaces failures to the user as transient toasts without interrupting the
//! flow that produced them.

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::api::ApiError;
use super::storage::ClientStorage;

pub const FALLBACK_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";
pub const PAGE_LOAD_TOAST_KEY: &str = "pageLoadErrorToast";

const DEFAULT_TOAST_DURATION: Duration = Duration::from_secs(4);
const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(3);
const DEFAULT_QUEUE_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
    /// How long the toast stays on screen
    pub duration: Duration,
}

impl Toast {
    pub fn new(kind: ToastKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            duration: DEFAULT_TOAST_DURATION,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(ToastKind::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ToastKind::Error, message)
    }
}

pub trait NotificationSink: Send + Sync {
    fn show(&self, toast: Toast);
}

#[derive(Debug)]
struct QueuedToast {
    toast: Toast,
    shown_at: Instant,
}

impl QueuedToast {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.shown_at) >= self.toast.duration
    }
}

/// In-memory toast queue drained by whatever renders notifications.
///
/// Toasts past their `duration` are dropped, and once `capacity` toasts are
/// queued the oldest one makes room for the next.
#[derive(Debug, Clone)]
pub struct ToastQueue {
    toasts: Arc<Mutex<VecDeque<QueuedToast>>>,
    capacity: usize,
}

impl Default for ToastQueue {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}

impl ToastQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            toasts: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
        }
    }

    /// Take every toast that is still on screen
    pub fn drain(&self) -> Vec<Toast> {
        let now = Instant::now();
        self.toasts
            .lock()
            .drain(..)
            .filter(|queued| !queued.is_expired(now))
            .map(|queued| queued.toast)
            .collect()
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        let mut toasts = self.toasts.lock();
        toasts.retain(|queued| !queued.is_expired(now));
        toasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationSink for ToastQueue {
    fn show(&self, toast: Toast) {
        info!("Toast ({:?}): {}", toast.kind, toast.message);
        let now = Instant::now();
        let mut toasts = self.toasts.lock();
        toasts.retain(|queued| !queued.is_expired(now));
        while toasts.len() >= self.capacity {
            if let Some(dropped) = toasts.pop_front() {
                debug!("Toast queue full, dropping: {}", dropped.toast.message);
            }
        }
        toasts.push_back(QueuedToast { toast, shown_at: now });
    }
}

/// User-facing text for an error: backend message, then the error's own
/// message, then a static fallback.
pub fn user_message(error: &(dyn Error + 'static)) -> String {
    if let Some(message) = error
        .downcast_ref::<ApiError>()
        .and_then(ApiError::backend_message)
    {
        return message.to_string();
    }

    let generic = error.to_string();
    if generic.trim().is_empty() {
        FALLBACK_ERROR_MESSAGE.to_string()
    } else {
        generic
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageLoadToastFlag {
    message: String,
    shown_at: i64,
}

#[derive(Clone)]
pub struct ErrorReporter {
    sink: Arc<dyn NotificationSink>,
    storage: Arc<ClientStorage>,
    dedup_window: Duration,
}

impl ErrorReporter {
    pub fn new(sink: Arc<dyn NotificationSink>, storage: Arc<ClientStorage>) -> Self {
        Self {
            sink,
            storage,
            dedup_window: DEFAULT_DEDUP_WINDOW,
        }
    }

    pub fn with_dedup_window(mut self, dedup_window: Duration) -> Self {
        self.dedup_window = dedup_window;
        self
    }

    pub fn sink(&self) -> &Arc<dyn NotificationSink> {
        &self.sink
    }

    /// Show exactly one error toast for `error`
    pub fn report(&self, error: &(dyn Error + 'static)) {
        let message = user_message(error);
        warn!("Reporting error to user: {}", message);
        self.sink.show(Toast::error(message));
    }

    /// Like `report`, but suppresses an identical message already shown within
    /// the de-dup window. Returns whether a toast was shown.
    pub fn report_page_load(&self, error: &(dyn Error + 'static)) -> bool {
        let message = user_message(error);
        let now = Utc::now().timestamp_millis();

        if let Some(flag) = self
            .storage
            .get(PAGE_LOAD_TOAST_KEY)
            .and_then(|raw| serde_json::from_str::<PageLoadToastFlag>(&raw).ok())
        {
            let age_ms = now.saturating_sub(flag.shown_at).max(0);
            if flag.message == message && (age_ms as u128) < self.dedup_window.as_millis() {
                info!("Suppressing repeated page-load error toast: {}", message);
                return false;
            }
        }

        let flag = PageLoadToastFlag {
            message: message.clone(),
            shown_at: now,
        };
        match serde_json::to_string(&flag) {
            Ok(raw) => {
                if let Err(e) = self.storage.set(PAGE_LOAD_TOAST_KEY, raw) {
                    warn!("Failed to persist page-load toast flag: {}", e);
                }
            }
            Err(e) => warn!("Failed to encode page-load toast flag: {}", e),
        }

        self.sink.show(Toast::error(message));
        true
    }
}

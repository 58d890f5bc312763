//! # Guardian Children
//!
//! Loads a guardian's children from the relationship endpoint, falling back to
//! the legacy `/users/children` endpoint, and always resolves to a well-formed
//! `ChildrenListResult`.
//!
//! The two sources are tried strictly one after the other so a single source
//! wins each call. Results are cached per guardian id; concurrent requests for
//! the same guardian share one in-flight fetch.

use moka::future::Cache;
use shared::children::{parse_legacy_children, parse_relations};
use shared::{ChildMapper, ChildSource, ChildrenListResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::services::api::{ApiError, GuardianApi};
use crate::services::logging::Logger;

const COMPONENT: &str = "use-children";
const DEFAULT_CACHE_CAPACITY: u64 = 256;
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

/// Both children sources failed
#[derive(Debug, Clone, Error)]
#[error("Unable to load children: {fallback}")]
pub struct FetchError {
    pub primary: ApiError,
    pub fallback: ApiError,
}

#[derive(Debug, Clone)]
pub struct ChildrenFetch {
    pub result: ChildrenListResult,
    /// Set only when both sources failed with something other than a 404
    pub error: Option<FetchError>,
}

impl ChildrenFetch {
    fn resolved(result: ChildrenListResult) -> Self {
        Self { result, error: None }
    }

    pub fn empty() -> Self {
        Self::resolved(ChildrenListResult::empty())
    }
}

#[derive(Clone)]
pub struct ChildrenFetcher {
    api: Arc<dyn GuardianApi>,
    mapper: ChildMapper,
    cache: Cache<String, ChildrenFetch>,
}

impl ChildrenFetcher {
    pub fn new(api: Arc<dyn GuardianApi>) -> Self {
        Self {
            api,
            mapper: ChildMapper::default(),
            cache: Cache::builder()
                .max_capacity(DEFAULT_CACHE_CAPACITY)
                .time_to_live(DEFAULT_CACHE_TTL)
                .build(),
        }
    }

    pub fn with_mapper(mut self, mapper: ChildMapper) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = Cache::builder()
            .max_capacity(DEFAULT_CACHE_CAPACITY)
            .time_to_live(ttl)
            .build();
        self
    }

    /// Fetch without the cache. Never fails.
    pub async fn fetch_children(&self, guardian_id: &str) -> ChildrenFetch {
        let primary_error = match self.api.guardian_relations(guardian_id).await {
            Ok(body) => match parse_relations(body) {
                Ok(relations) => {
                    Logger::info_with_component(
                        COMPONENT,
                        &format!("Loaded {} relations for guardian {}", relations.len(), guardian_id),
                    );
                    return ChildrenFetch::resolved(
                        self.mapper.map_all(relations.into_iter().map(ChildSource::Primary)),
                    );
                }
                Err(e) => ApiError::Decode(e.to_string()),
            },
            Err(e) => e,
        };

        Logger::warn_with_component(
            COMPONENT,
            &format!(
                "Relationship endpoint failed for guardian {} ({}), trying legacy endpoint",
                guardian_id, primary_error
            ),
        );

        match self.api.legacy_children().await {
            Ok(body) => match parse_legacy_children(body) {
                Some(legacy) => {
                    Logger::info_with_component(
                        COMPONENT,
                        &format!("Loaded {} legacy children", legacy.len()),
                    );
                    ChildrenFetch::resolved(
                        self.mapper.map_all(legacy.into_iter().map(ChildSource::Legacy)),
                    )
                }
                None => {
                    Logger::warn_with_component(
                        COMPONENT,
                        "Legacy endpoint returned a non-array body, treating as no children",
                    );
                    ChildrenFetch::empty()
                }
            },
            Err(fallback_error) => {
                Logger::error_with_component(
                    COMPONENT,
                    &format!("Legacy endpoint failed as well: {}", fallback_error),
                );
                let error = (!primary_error.is_not_found() && !fallback_error.is_not_found())
                    .then(|| FetchError {
                        primary: primary_error,
                        fallback: fallback_error,
                    });
                ChildrenFetch {
                    result: ChildrenListResult::empty(),
                    error,
                }
            }
        }
    }

    /// Cached fetch; concurrent callers for the same guardian share one fetch.
    /// Outcomes carrying an error are not kept.
    pub async fn get(&self, guardian_id: &str) -> ChildrenFetch {
        let key = guardian_id.to_string();
        let outcome = self
            .cache
            .get_with(key.clone(), self.fetch_children(guardian_id))
            .await;
        if outcome.error.is_some() {
            self.cache.invalidate(&key).await;
        }
        outcome
    }

    pub async fn invalidate(&self, guardian_id: &str) {
        self.cache.invalidate(guardian_id).await;
    }

    /// Drop the cached entry and fetch again
    pub async fn refetch(&self, guardian_id: &str) -> ChildrenFetch {
        Logger::debug_with_component(COMPONENT, &format!("Refetching children for {}", guardian_id));
        self.invalidate(guardian_id).await;
        self.get(guardian_id).await
    }
}

/// Mounted flag shared between a `ChildrenHandle` and the consumer owning it
#[derive(Debug, Clone)]
pub struct MountState(Arc<AtomicBool>);

impl MountState {
    fn mounted() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn unmount(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_mounted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A consumer's view of one in-flight children load.
///
/// The load runs on its own task. Unmounting, before or during `resolve`,
/// discards the result for this consumer while the task still completes and
/// fills the shared cache.
pub struct ChildrenHandle {
    mount: MountState,
    task: JoinHandle<ChildrenFetch>,
}

impl ChildrenHandle {
    /// Clone of the mounted flag, for unmounting while `resolve` is pending
    pub fn mount_state(&self) -> MountState {
        self.mount.clone()
    }

    pub fn unmount(&self) {
        self.mount.unmount();
    }

    pub fn is_mounted(&self) -> bool {
        self.mount.is_mounted()
    }

    /// `None` if the consumer unmounted before the load finished
    pub async fn resolve(self) -> Option<ChildrenFetch> {
        if !self.is_mounted() {
            return None;
        }

        let outcome = match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                Logger::error_with_component(COMPONENT, &format!("Children task failed: {}", e));
                ChildrenFetch::empty()
            }
        };

        self.mount.is_mounted().then_some(outcome)
    }
}

pub fn use_children(fetcher: &ChildrenFetcher, guardian_id: &str) -> ChildrenHandle {
    let fetcher = fetcher.clone();
    let guardian_id = guardian_id.to_string();
    let task = tokio::spawn(async move { fetcher.get(&guardian_id).await });

    ChildrenHandle {
        mount: MountState::mounted(),
        task,
    }
}

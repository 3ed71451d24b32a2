//! Lesson bundle resolution
//!
//! Resolution order: the active in-memory bundle, then the content store, then
//! the session cache slot left by a previous screen. The loader only assembles
//! and validates; it never touches the scene or fetches assets.

use super::model::{CachedLesson, LessonBundle, LessonIds, LessonRecord};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Session cache slot holding the lesson handed over by a previous screen
pub const ACTIVE_LESSON_KEY: &str = "activeLesson";

/// Backing store of lesson records
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Look up a lesson. `Ok(None)` when the store has no such lesson.
    async fn fetch(&self, ids: &LessonIds) -> Result<Option<LessonRecord>>;
}

/// Short-lived key/value slots shared between screens (read-only here)
#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<CachedLesson>>;
}

pub struct BundleLoader {
    store: Arc<dyn ContentStore>,
    cache: Arc<dyn SessionCache>,
    cache_ttl: chrono::Duration,
    active: RwLock<Option<Arc<LessonBundle>>>,
}

impl BundleLoader {
    pub fn new(store: Arc<dyn ContentStore>, cache: Arc<dyn SessionCache>) -> Self {
        Self {
            store,
            cache,
            cache_ttl: chrono::Duration::seconds(900),
            active: RwLock::new(None),
        }
    }

    /// How long a cached lesson stays acceptable
    pub fn with_cache_ttl(mut self, ttl: std::time::Duration) -> Self {
        self.cache_ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365));
        self
    }

    /// Currently active bundle, if any
    pub async fn active(&self) -> Option<Arc<LessonBundle>> {
        self.active.read().await.clone()
    }

    /// Forget the active bundle so the next load goes back to the store
    pub async fn clear_active(&self) {
        *self.active.write().await = None;
    }

    /// Resolve and validate a bundle
    ///
    /// # Errors
    /// - `Error::NotFound` when no source yields a lesson
    /// - `Error::IncompleteContent` when the lesson has neither an
    ///   environment nor any narration text
    pub async fn load(&self, ids: Option<&LessonIds>) -> Result<Arc<LessonBundle>> {
        if let Some(active) = self.active.read().await.as_ref() {
            if ids.map_or(true, |ids| active.ids() == *ids) {
                debug!(lesson = %active.ids(), "Using active lesson bundle");
                return Ok(active.clone());
            }
        }

        let record = match ids {
            Some(ids) => match self.store.fetch(ids).await {
                Ok(Some(record)) => {
                    debug!(lesson = %ids, "Lesson fetched from content store");
                    Some(record)
                }
                Ok(None) => {
                    debug!(lesson = %ids, "Lesson not in content store");
                    None
                }
                Err(e) => {
                    warn!(lesson = %ids, error = %e, "Content store lookup failed, trying session cache");
                    None
                }
            },
            None => None,
        };

        let record = match record {
            Some(record) => record,
            None => self.from_session_cache(ids).await.ok_or_else(|| {
                Error::NotFound(match ids {
                    Some(ids) => format!("no lesson for {}", ids),
                    None => "no lesson identifiers and no cached lesson".to_string(),
                })
            })?,
        };

        let bundle = LessonBundle::from_record(record, ids);
        if !bundle.is_playable() {
            return Err(Error::IncompleteContent(format!(
                "lesson {} has no environment and no narration text",
                bundle.ids()
            )));
        }

        let bundle = Arc::new(bundle);
        *self.active.write().await = Some(bundle.clone());
        info!(
            lesson = %bundle.ids(),
            title = %bundle.topic.title,
            assets = bundle.topic.assets.len(),
            "Lesson bundle loaded"
        );
        Ok(bundle)
    }

    async fn from_session_cache(&self, ids: Option<&LessonIds>) -> Option<LessonRecord> {
        let cached = match self.cache.read(ACTIVE_LESSON_KEY).await {
            Ok(Some(cached)) => cached,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Session cache read failed");
                return None;
            }
        };

        if cached.is_expired(self.cache_ttl) {
            debug!(lesson = %cached.ids, "Cached lesson expired");
            return None;
        }
        if let Some(ids) = ids {
            if cached.ids != *ids {
                debug!(cached = %cached.ids, requested = %ids, "Cached lesson is for a different topic");
                return None;
            }
        }
        info!(lesson = %cached.ids, "Recovered lesson from session cache");
        Some(cached.lesson)
    }
}

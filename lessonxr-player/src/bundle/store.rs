//! Content store and session cache implementations

use super::loader::{ContentStore, SessionCache};
use super::model::{CachedLesson, LessonIds, LessonRecord};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Reject identifiers that could escape a directory or break a URL path
fn validate_segment(value: &str) -> Result<&str> {
    let ok = !value.is_empty()
        && value != "."
        && value != ".."
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(value)
    } else {
        Err(Error::InvalidInput(format!("invalid lesson identifier '{}'", value)))
    }
}

/// Directory of `<chapter>/<topic>.json` lesson records
#[derive(Debug, Clone)]
pub struct FileContentStore {
    root: PathBuf,
}

impl FileContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, ids: &LessonIds) -> Result<PathBuf> {
        let chapter = validate_segment(&ids.chapter_id)?;
        let topic = validate_segment(&ids.topic_id)?;
        Ok(self.root.join(chapter).join(format!("{}.json", topic)))
    }
}

#[async_trait]
impl ContentStore for FileContentStore {
    async fn fetch(&self, ids: &LessonIds) -> Result<Option<LessonRecord>> {
        let path = self.record_path(ids)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), "Read lesson record");
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}

/// Lesson records served over HTTP at `{base}/chapters/{chapter}/topics/{topic}`
#[derive(Debug, Clone)]
pub struct HttpContentStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpContentStore {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(concat!("lessonxr-player/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Fetch(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn record_url(&self, ids: &LessonIds) -> Result<String> {
        Ok(format!(
            "{}/chapters/{}/topics/{}",
            self.base_url,
            validate_segment(&ids.chapter_id)?,
            validate_segment(&ids.topic_id)?
        ))
    }
}

#[async_trait]
impl ContentStore for HttpContentStore {
    async fn fetch(&self, ids: &LessonIds) -> Result<Option<LessonRecord>> {
        let url = self.record_url(ids)?;
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("{}: {}", url, e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::Fetch(format!("{}: HTTP {}", url, response.status())));
        }

        let record = response
            .json::<LessonRecord>()
            .await
            .map_err(|e| Error::Fetch(format!("{}: invalid lesson record: {}", url, e)))?;
        Ok(Some(record))
    }
}

/// Session cache persisted as a JSON object of slots
#[derive(Debug, Clone)]
pub struct FileSessionCache {
    path: PathBuf,
}

impl FileSessionCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_slots(&self) -> Result<BTreeMap<String, CachedLesson>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Seed a slot, for fixtures and hand-over tooling
    ///
    /// The player only reads the cache; nothing in the load path calls this.
    pub async fn seed(&self, key: &str, lesson: &CachedLesson) -> Result<()> {
        let mut slots = self.read_slots().await?;
        slots.insert(key.to_string(), lesson.clone());
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, serde_json::to_vec_pretty(&slots)?).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionCache for FileSessionCache {
    async fn read(&self, key: &str) -> Result<Option<CachedLesson>> {
        Ok(self.read_slots().await?.remove(key))
    }
}

/// In-process session cache
#[derive(Debug, Default)]
pub struct MemorySessionCache {
    slots: Mutex<HashMap<String, CachedLesson>>,
}

impl MemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, lesson: CachedLesson) {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), lesson);
    }
}

#[async_trait]
impl SessionCache for MemorySessionCache {
    async fn read(&self, key: &str) -> Result<Option<CachedLesson>> {
        Ok(self
            .slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_validation() {
        assert!(validate_segment("chapter-1").is_ok());
        assert!(validate_segment("topic_2.v3").is_ok());
        assert!(validate_segment("").is_err());
        assert!(validate_segment("..").is_err());
        assert!(validate_segment("a/b").is_err());
    }

    #[test]
    fn test_http_record_url() {
        let store = HttpContentStore::new("https://lessons.example.org/api/").unwrap();
        let url = store.record_url(&LessonIds::new("physics", "optics")).unwrap();
        assert_eq!(url, "https://lessons.example.org/api/chapters/physics/topics/optics");
    }

    #[tokio::test]
    async fn test_file_store_missing_record_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileContentStore::new(dir.path());
        let result = store.fetch(&LessonIds::new("a", "b")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_file_session_cache_roundtrip_slot() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileSessionCache::new(dir.path().join("nested/session.json"));
        assert!(cache.read("activeLesson").await.unwrap().is_none());

        let lesson = CachedLesson::new(LessonIds::new("a", "b"), LessonRecord::default());
        cache.seed("activeLesson", &lesson).await.unwrap();
        let read = cache.read("activeLesson").await.unwrap().unwrap();
        assert_eq!(read.ids, lesson.ids);
        assert!(cache.read("other").await.unwrap().is_none());
    }
}

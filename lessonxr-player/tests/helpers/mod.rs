//! Test helpers for lessonxr-player integration tests
//!
//! - FakeFetcher: scripted asset facts with per-URI failures
//! - FakeAudio: audio resource whose events the test sends by hand
//! - MemoryStore: in-memory content store with a lookup counter
//! - TestPlayer: a LessonPlayer wired to all of the above

#![allow(dead_code)]

use async_trait::async_trait;
use lessonxr_common::events::EventBus;
use lessonxr_player::bundle::{
    AssetRecord, ChapterRecord, ContentStore, EnvironmentRecord, LessonIds, LessonRecord,
    MemorySessionCache, NarrationEntryRecord, NarrationRecord, TopicRecord,
};
use lessonxr_player::config::PlayerSettings;
use lessonxr_player::fetch::{AssetFetcher, ImageInfo, ModelInfo};
use lessonxr_player::narration::{AudioEvent, AudioEventKind, AudioResource, SourceToken};
use lessonxr_player::scene::{Aabb, HeadlessSurface};
use lessonxr_player::xr::SimulatedXrPlatform;
use lessonxr_player::{Error, LessonPlayer, PlayerDeps, Result};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const CHAPTER: &str = "biology";
pub const TOPIC: &str = "heart";

pub fn ids() -> LessonIds {
    LessonIds::new(CHAPTER, TOPIC)
}

// ---- Asset fetcher ----

/// Every URI succeeds unless marked failing
///
/// Images are 2:1, models are a unit cube with one mesh, audio lasts 3 s.
#[derive(Default)]
pub struct FakeFetcher {
    failing: Mutex<HashSet<String>>,
    requests: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, uri: &str) {
        self.failing.lock().unwrap().insert(uri.to_string());
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn check(&self, uri: &str) -> Result<()> {
        self.requests.lock().unwrap().push(uri.to_string());
        if self.failing.lock().unwrap().contains(uri) {
            return Err(Error::Fetch(format!("{}: 404 Not Found", uri)));
        }
        Ok(())
    }
}

#[async_trait]
impl AssetFetcher for FakeFetcher {
    async fn fetch_image(&self, uri: &str) -> Result<ImageInfo> {
        self.check(uri)?;
        Ok(ImageInfo {
            width: 2048,
            height: 1024,
        })
    }

    async fn fetch_model(&self, uri: &str) -> Result<ModelInfo> {
        self.check(uri)?;
        Ok(ModelInfo {
            bounds: Aabb::unit(),
            mesh_count: 1,
        })
    }

    async fn probe_audio(&self, uri: &str) -> Result<f64> {
        self.check(uri)?;
        Ok(3.0)
    }
}

// ---- Audio resource ----

/// Audio resource that never plays by itself
///
/// `finish_current` / `fail_current` send the event a media element would
/// send for the current source.
pub struct FakeAudio {
    next_token: AtomicUsize,
    current: Mutex<Option<SourceToken>>,
    sources: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    tx: mpsc::UnboundedSender<AudioEvent>,
}

impl FakeAudio {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<AudioEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let audio = Arc::new(Self {
            next_token: AtomicUsize::new(1),
            current: Mutex::new(None),
            sources: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            tx,
        });
        (audio, rx)
    }

    pub fn fail(&self, uri: &str) {
        self.failing.lock().unwrap().insert(uri.to_string());
    }

    /// URIs passed to `set_source`, in order
    pub fn sources(&self) -> Vec<String> {
        self.sources.lock().unwrap().clone()
    }

    pub fn current_token(&self) -> Option<SourceToken> {
        *self.current.lock().unwrap()
    }

    pub fn send(&self, token: SourceToken, kind: AudioEventKind) {
        let _ = self.tx.send(AudioEvent { token, kind });
    }

    /// Send `Ended` for the current source; returns its token
    pub fn finish_current(&self) -> Option<SourceToken> {
        let token = self.current_token()?;
        self.send(token, AudioEventKind::Ended);
        Some(token)
    }

    pub fn fail_current(&self, message: &str) -> Option<SourceToken> {
        let token = self.current_token()?;
        self.send(token, AudioEventKind::Error(message.to_string()));
        Some(token)
    }
}

#[async_trait]
impl AudioResource for FakeAudio {
    async fn probe(&self, uri: &str) -> Result<f64> {
        if self.failing.lock().unwrap().contains(uri) {
            return Err(Error::Playback(format!("{}: unsupported format", uri)));
        }
        Ok(3.0)
    }

    async fn set_source(&self, uri: &str) -> Result<SourceToken> {
        self.sources.lock().unwrap().push(uri.to_string());
        if self.failing.lock().unwrap().contains(uri) {
            *self.current.lock().unwrap() = None;
            return Err(Error::Playback(format!("{}: unsupported format", uri)));
        }
        let token = self.next_token.fetch_add(1, Ordering::SeqCst) as SourceToken;
        *self.current.lock().unwrap() = Some(token);
        Ok(token)
    }

    async fn play(&self) -> Result<()> {
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) {
        *self.current.lock().unwrap() = None;
    }

    fn current_time(&self) -> f64 {
        0.0
    }

    fn duration(&self) -> Option<f64> {
        self.current_token().map(|_| 3.0)
    }
}

// ---- Content store ----

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<LessonIds, LessonRecord>>,
    lookups: AtomicUsize,
    unreachable: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with(ids: LessonIds, record: LessonRecord) -> Arc<Self> {
        let store = Self::new();
        store.put(ids, record);
        store
    }

    pub fn put(&self, ids: LessonIds, record: LessonRecord) {
        self.records.lock().unwrap().insert(ids, record);
    }

    pub fn remove(&self, ids: &LessonIds) {
        self.records.lock().unwrap().remove(ids);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn fetch(&self, ids: &LessonIds) -> Result<Option<LessonRecord>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(Error::Fetch("content store unreachable".to_string()));
        }
        Ok(self.records.lock().unwrap().get(ids).cloned())
    }
}

// ---- Lesson records ----

pub fn entry(audio: Option<&str>, text: Option<&str>) -> NarrationEntryRecord {
    NarrationEntryRecord {
        audio_url: audio.map(str::to_string),
        text: text.map(str::to_string),
    }
}

pub fn asset(id: &str, url: &str) -> AssetRecord {
    AssetRecord {
        id: Some(id.to_string()),
        url: Some(url.to_string()),
        kind: None,
        name: None,
    }
}

/// Lesson with a panorama, three narrated sections and two models
pub fn full_record() -> LessonRecord {
    LessonRecord {
        chapter: Some(ChapterRecord {
            id: Some(CHAPTER.to_string()),
            title: Some("Biology".to_string()),
            subject: Some("Science".to_string()),
            grade: Some("8".to_string()),
        }),
        topic: Some(TopicRecord {
            id: Some(TOPIC.to_string()),
            title: Some("The Human Heart".to_string()),
            learning_objective: Some("Name the four chambers".to_string()),
            environment: Some(EnvironmentRecord {
                url: Some("env/classroom.jpg".to_string()),
                kind: Some("panorama".to_string()),
            }),
            narration: Some(NarrationRecord {
                intro: Some(entry(Some("audio/intro.mp3"), Some("Welcome to the heart."))),
                explanation: Some(entry(
                    Some("audio/explanation.mp3"),
                    Some("The heart has four chambers."),
                )),
                outro: Some(entry(Some("audio/outro.mp3"), Some("That is all for today."))),
            }),
            assets: Some(vec![
                asset("heart", "models/heart.glb"),
                asset("valve", "models/valve.glb"),
            ]),
        }),
    }
}

/// Lesson with only an environment
pub fn environment_only(url: &str) -> LessonRecord {
    let mut record = full_record();
    if let Some(topic) = record.topic.as_mut() {
        topic.environment = Some(EnvironmentRecord {
            url: Some(url.to_string()),
            kind: None,
        });
        topic.narration = None;
        topic.assets = None;
    }
    record
}

// ---- Player ----

pub struct TestPlayer {
    pub player: Arc<LessonPlayer>,
    pub platform: Arc<SimulatedXrPlatform>,
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemorySessionCache>,
    pub fetcher: Arc<FakeFetcher>,
    pub audio: Arc<FakeAudio>,
    pub surface: Arc<HeadlessSurface>,
}

pub struct TestPlayerBuilder {
    platform: SimulatedXrPlatform,
    store: Arc<MemoryStore>,
    cache: Arc<MemorySessionCache>,
    fetcher: Arc<FakeFetcher>,
    audio: (Arc<FakeAudio>, mpsc::UnboundedReceiver<AudioEvent>),
    settings: PlayerSettings,
}

impl TestPlayerBuilder {
    pub fn new() -> Self {
        Self {
            platform: SimulatedXrPlatform::quest(),
            store: MemoryStore::with(ids(), full_record()),
            cache: Arc::new(MemorySessionCache::new()),
            fetcher: FakeFetcher::new(),
            audio: FakeAudio::new(),
            settings: PlayerSettings::default(),
        }
    }

    pub fn platform(mut self, platform: SimulatedXrPlatform) -> Self {
        self.platform = platform;
        self
    }

    pub fn record(self, record: LessonRecord) -> Self {
        self.store.put(ids(), record);
        self
    }

    pub fn store(mut self, store: Arc<MemoryStore>) -> Self {
        self.store = store;
        self
    }

    pub fn settings(mut self, settings: PlayerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> TestPlayer {
        let platform = Arc::new(self.platform);
        let surface = Arc::new(HeadlessSurface::default());
        let (audio, audio_events) = self.audio;

        let deps = PlayerDeps {
            platform: platform.clone(),
            store: self.store.clone(),
            cache: self.cache.clone(),
            fetcher: self.fetcher.clone(),
            audio: audio.clone(),
            audio_events,
            surface: surface.clone(),
        };
        let player = Arc::new(LessonPlayer::new(deps, self.settings, EventBus::new(256)));

        TestPlayer {
            player,
            platform,
            store: self.store,
            cache: self.cache,
            fetcher: self.fetcher,
            audio,
            surface,
        }
    }
}

impl TestPlayer {
    pub fn builder() -> TestPlayerBuilder {
        TestPlayerBuilder::new()
    }
}

/// Poll `check` until it returns true or two seconds pass
pub async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

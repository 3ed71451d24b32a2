//! Lesson player
//!
//! Composition root: wires capability detection, bundle loading, the scene,
//! the loading pipeline, narration and the immersive session together, and
//! implements mount, retry and unmount.

use crate::assets::AssetLoader;
use crate::bundle::{BundleLoader, ContentStore, LessonBundle, LessonIds, SessionCache};
use crate::capability::CapabilityDetector;
use crate::config::PlayerSettings;
use crate::environment::EnvironmentLoader;
use crate::error::{Error, Result};
use crate::fetch::AssetFetcher;
use crate::narration::{AudioEvent, AudioResource, NarrationController};
use crate::pipeline::{Orchestrator, PipelineReport, StatusTracker};
use crate::scene::{RenderSurface, SceneHandle, SceneManager};
use crate::session::{ImmersiveSessionHandle, ImmersiveSessionManager, SessionStatus};
use crate::xr::XrPlatform;
use lessonxr_common::events::{CapabilityDescriptor, EventBus, PlayerEvent, Stage, StageStatus};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// External collaborators the player runs against
pub struct PlayerDeps {
    pub platform: Arc<dyn XrPlatform>,
    pub store: Arc<dyn ContentStore>,
    pub cache: Arc<dyn SessionCache>,
    pub fetcher: Arc<dyn AssetFetcher>,
    pub audio: Arc<dyn AudioResource>,
    pub audio_events: mpsc::UnboundedReceiver<AudioEvent>,
    pub surface: Arc<dyn RenderSurface>,
}

/// Resources that live from mount to unmount
struct Mounted {
    ids: Option<LessonIds>,
    bundle: Arc<LessonBundle>,
    scene: SceneHandle,
    session: ImmersiveSessionManager,
    cancel: CancellationToken,
    audio_pump: JoinHandle<mpsc::UnboundedReceiver<AudioEvent>>,
}

pub struct LessonPlayer {
    settings: PlayerSettings,
    events: EventBus,
    platform: Arc<dyn XrPlatform>,
    surface: Arc<dyn RenderSurface>,
    detector: CapabilityDetector,
    loader: BundleLoader,
    narration: Arc<NarrationController>,
    tracker: Arc<StatusTracker>,
    orchestrator: Orchestrator,
    audio_events: Mutex<Option<mpsc::UnboundedReceiver<AudioEvent>>>,
    mounted: Mutex<Option<Mounted>>,
    last_ids: RwLock<Option<LessonIds>>,
    last_report: RwLock<Option<PipelineReport>>,
}

impl LessonPlayer {
    pub fn new(deps: PlayerDeps, settings: PlayerSettings, events: EventBus) -> Self {
        let tracker = Arc::new(StatusTracker::new(events.clone()));
        let narration = Arc::new(NarrationController::new(deps.audio, events.clone()));
        let orchestrator = Orchestrator::new(
            Arc::clone(&tracker),
            EnvironmentLoader::new(Arc::clone(&deps.fetcher), &settings),
            Arc::clone(&narration),
            AssetLoader::new(deps.fetcher, events.clone(), &settings),
        );
        let loader = BundleLoader::new(deps.store, deps.cache).with_cache_ttl(
            std::time::Duration::from_secs(settings.session_cache_ttl_secs),
        );

        Self {
            detector: CapabilityDetector::new(Arc::clone(&deps.platform)).with_events(events.clone()),
            platform: deps.platform,
            surface: deps.surface,
            loader,
            narration,
            tracker,
            orchestrator,
            audio_events: Mutex::new(Some(deps.audio_events)),
            mounted: Mutex::new(None),
            last_ids: RwLock::new(None),
            last_report: RwLock::new(None),
            settings,
            events,
        }
    }

    /// Load and present a lesson
    ///
    /// Capability detection and bundle loading run concurrently. Returns the
    /// pipeline report once the pipeline settles; recoverable stage failures
    /// are inside the report. A mounted lesson is unmounted first.
    ///
    /// # Errors
    /// The bundle error (`NotFound`, `IncompleteContent`) when no playable
    /// lesson resolves, or the surface error when the scene cannot attach.
    /// Status is `Failed` in both cases.
    pub async fn mount(&self, ids: Option<LessonIds>) -> Result<PipelineReport> {
        self.unmount().await;
        *self.last_ids.write().await = ids.clone();

        let (capability, bundle) =
            tokio::join!(self.detector.detect(), self.loader.load(ids.as_ref()));
        info!(
            lesson = %ids.as_ref().map(ToString::to_string).unwrap_or_else(|| "cached".to_string()),
            immersive = capability.immersive_supported,
            "Mounting lesson"
        );

        let bundle = match bundle {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!(error = %e, "Lesson could not be loaded");
                let report = self.orchestrator.run(None, None, CancellationToken::new()).await;
                *self.last_report.write().await = Some(report);
                return Err(e);
            }
        };

        let scene = match SceneManager::attach(Arc::clone(&self.surface), &self.settings) {
            Ok(scene) => scene,
            Err(e) => {
                warn!(error = %e, "Render surface unavailable");
                let report = self
                    .orchestrator
                    .run(Some(bundle), None, CancellationToken::new())
                    .await;
                *self.last_report.write().await = Some(report);
                return Err(e);
            }
        };

        let cancel = CancellationToken::new();
        let audio_pump = match self.audio_events.lock().await.take() {
            Some(rx) => self.narration.spawn_event_pump(rx, cancel.child_token()),
            None => {
                scene.detach().await;
                return Err(Error::InvalidState(
                    "narration audio events are already being consumed".to_string(),
                ));
            }
        };
        let session = ImmersiveSessionManager::new(
            Arc::clone(&self.platform),
            scene.clone(),
            self.events.clone(),
        );

        *self.mounted.lock().await = Some(Mounted {
            ids,
            bundle: Arc::clone(&bundle),
            scene: scene.clone(),
            session,
            cancel: cancel.clone(),
            audio_pump,
        });

        let report = self.orchestrator.run(Some(bundle), Some(&scene), cancel).await;
        *self.last_report.write().await = Some(report.clone());

        if report.status.stage == Stage::Complete
            && self.settings.narration_autoplay
            && !report.segments.is_empty()
        {
            if let Err(e) = self.narration.play().await {
                warn!(error = %e, "Narration autoplay failed");
            }
        }
        Ok(report)
    }

    /// Tear down and run a fresh attempt for the same lesson
    ///
    /// The lesson is fetched again rather than reused from memory.
    pub async fn retry(&self) -> Result<PipelineReport> {
        let ids = match self.mounted.lock().await.as_ref() {
            Some(mounted) => mounted.ids.clone(),
            None => self.last_ids.read().await.clone(),
        };
        self.loader.clear_active().await;
        self.mount(ids).await
    }

    /// Release everything acquired by `mount`
    ///
    /// Cancels the pipeline, stops narration, removes the audio listener, ends
    /// any immersive session and detaches the scene. Safe to call when nothing
    /// is mounted.
    pub async fn unmount(&self) {
        let Some(mounted) = self.mounted.lock().await.take() else {
            return;
        };

        mounted.cancel.cancel();
        self.narration.stop().await;
        match mounted.audio_pump.await {
            Ok(rx) => *self.audio_events.lock().await = Some(rx),
            Err(e) => warn!(error = %e, "Narration event pump did not stop cleanly"),
        }
        mounted.session.shutdown().await;
        mounted.scene.detach().await;

        info!(lesson = %mounted.bundle.ids(), "Lesson unmounted");
    }

    pub async fn enter_immersive(&self) -> Result<ImmersiveSessionHandle> {
        let session = self.session_manager().await?;
        let capability = self
            .detector
            .cached()
            .unwrap_or_else(|| CapabilityDescriptor::unsupported("capability not detected yet"));
        session.enter(self.tracker.current().stage, &capability).await
    }

    /// Returns false when no session was active
    pub async fn exit_immersive(&self) -> Result<bool> {
        Ok(self.session_manager().await?.exit().await)
    }

    pub async fn session_status(&self) -> Option<SessionStatus> {
        match self.session_manager().await {
            Ok(session) => Some(session.status().await),
            Err(_) => None,
        }
    }

    async fn session_manager(&self) -> Result<ImmersiveSessionManager> {
        self.mounted
            .lock()
            .await
            .as_ref()
            .map(|m| m.session.clone())
            .ok_or_else(|| Error::InvalidState("no lesson is mounted".to_string()))
    }

    pub async fn is_mounted(&self) -> bool {
        self.mounted.lock().await.is_some()
    }

    pub async fn scene(&self) -> Option<SceneHandle> {
        self.mounted.lock().await.as_ref().map(|m| m.scene.clone())
    }

    pub async fn bundle(&self) -> Option<Arc<LessonBundle>> {
        self.mounted.lock().await.as_ref().map(|m| Arc::clone(&m.bundle))
    }

    pub fn narration(&self) -> &Arc<NarrationController> {
        &self.narration
    }

    pub fn status(&self) -> StageStatus {
        self.tracker.current()
    }

    pub fn watch_status(&self) -> watch::Receiver<StageStatus> {
        self.tracker.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Descriptor from detection (runs detection on first call)
    pub async fn capability(&self) -> CapabilityDescriptor {
        self.detector.detect().await
    }

    pub async fn last_report(&self) -> Option<PipelineReport> {
        self.last_report.read().await.clone()
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }
}

//! Scene lifecycle and render loop
//!
//! `SceneManager::attach` mounts a surface and starts a fixed-rate render task.
//! The task holds only a weak reference to the scene, reads a snapshot of the
//! graph each tick and never waits on loaders. Loaders mutate the graph through
//! `SceneHandle`; once the scene is detached those mutations are no-ops.

use super::camera::{Camera, OrbitControls};
use super::graph::{NodeKind, SceneGraph, Transform};
use super::surface::{FrameInfo, RenderSurface};
use crate::config::PlayerSettings;
use crate::error::Result;
use glam::{Vec2, Vec3};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Camera, controls and presentation mode
#[derive(Debug)]
struct ViewState {
    camera: Camera,
    controls: OrbitControls,
    immersive: bool,
}

struct SceneInner {
    graph: RwLock<SceneGraph>,
    view: Mutex<ViewState>,
    surface: Arc<dyn RenderSurface>,
    attached: AtomicBool,
    frames: AtomicU64,
    cancel: CancellationToken,
    render_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl SceneInner {
    async fn render_frame(&self) {
        let (camera, immersive) = {
            let mut view = self.view.lock().await;
            let ViewState {
                camera,
                controls,
                immersive,
            } = &mut *view;
            if !*immersive {
                controls.update(camera);
            }
            (*camera, *immersive)
        };

        let node_count = self.graph.read().await.len();
        let frame = self.frames.fetch_add(1, Ordering::SeqCst) + 1;
        let info = FrameInfo {
            frame,
            node_count,
            immersive,
            camera_position: camera.position,
            view_projection: camera.projection() * camera.view(),
        };

        if let Err(e) = self.surface.present(&info) {
            warn!(frame, error = %e, "Failed to present frame");
        }
    }

    /// Stop the loop and unmount. Returns false if already released.
    fn release(&self) -> bool {
        if !self.attached.swap(false, Ordering::SeqCst) {
            return false;
        }
        self.cancel.cancel();
        if let Some(task) = self
            .render_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.abort();
        }
        self.surface.unmount();
        true
    }
}

impl Drop for SceneInner {
    fn drop(&mut self) {
        if self.release() {
            debug!("Scene released on drop");
        }
    }
}

/// Creates attached scenes
pub struct SceneManager;

impl SceneManager {
    /// Mount `surface`, build an empty scene and start the render loop
    ///
    /// Must be called from within a tokio runtime.
    pub fn attach(surface: Arc<dyn RenderSurface>, settings: &PlayerSettings) -> Result<SceneHandle> {
        surface.mount()?;

        let (width, height) = surface.size();
        let mut camera = Camera::new(1.0);
        camera.set_viewport(width, height);

        let mut graph = SceneGraph::new();
        graph.insert(
            NodeKind::Light { intensity: 1.0 },
            Transform::from_translation(Vec3::new(0.0, 10.0, 0.0)),
            None,
        );

        let inner = Arc::new(SceneInner {
            graph: RwLock::new(graph),
            view: Mutex::new(ViewState {
                camera,
                controls: OrbitControls::default(),
                immersive: false,
            }),
            surface,
            attached: AtomicBool::new(true),
            frames: AtomicU64::new(0),
            cancel: CancellationToken::new(),
            render_task: std::sync::Mutex::new(None),
        });

        let task = tokio::spawn(render_loop(
            Arc::downgrade(&inner),
            inner.cancel.clone(),
            settings.frame_period(),
        ));
        *inner
            .render_task
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(task);

        info!(
            width,
            height,
            fps = settings.render_fps,
            "Scene attached, render loop started"
        );
        Ok(SceneHandle { inner })
    }
}

async fn render_loop(scene: Weak<SceneInner>, cancel: CancellationToken, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(inner) = scene.upgrade() else {
            break;
        };
        inner.render_frame().await;
    }
    debug!("Render loop stopped");
}

/// Shared handle to an attached scene
///
/// Cloning is cheap. The scene is released by `detach()` or when the last
/// handle is dropped, whichever comes first.
#[derive(Clone)]
pub struct SceneHandle {
    inner: Arc<SceneInner>,
}

impl SceneHandle {
    pub fn is_attached(&self) -> bool {
        self.inner.attached.load(Ordering::SeqCst)
    }

    /// Mutate the graph. Returns `None` once the scene is detached.
    pub async fn with_graph_mut<R>(&self, f: impl FnOnce(&mut SceneGraph) -> R) -> Option<R> {
        let mut graph = self.inner.graph.write().await;
        if !self.is_attached() {
            return None;
        }
        Some(f(&mut graph))
    }

    /// Read the graph (also allowed after detach, when it is empty)
    pub async fn with_graph<R>(&self, f: impl FnOnce(&SceneGraph) -> R) -> R {
        let graph = self.inner.graph.read().await;
        f(&graph)
    }

    /// Enable or disable preview orbit controls
    pub async fn set_interaction_enabled(&self, enabled: bool) -> bool {
        if !self.is_attached() {
            return false;
        }
        self.inner.view.lock().await.controls.enabled = enabled;
        debug!(enabled, "Preview interaction toggled");
        true
    }

    pub async fn interaction_enabled(&self) -> bool {
        self.inner.view.lock().await.controls.enabled
    }

    /// Switch between preview and head-mounted presentation
    pub async fn set_immersive(&self, immersive: bool) -> bool {
        if !self.is_attached() {
            return false;
        }
        self.inner.view.lock().await.immersive = immersive;
        true
    }

    pub async fn is_immersive(&self) -> bool {
        self.inner.view.lock().await.immersive
    }

    /// Update the camera for a new surface size
    pub async fn resize(&self, width: u32, height: u32) -> bool {
        if !self.is_attached() {
            return false;
        }
        self.inner.view.lock().await.camera.set_viewport(width, height);
        true
    }

    /// Feed preview drag/zoom input
    pub async fn orbit(&self, rotate: Vec2, zoom: f32) {
        self.inner.view.lock().await.controls.push_input(rotate, zoom);
    }

    pub async fn camera(&self) -> Camera {
        self.inner.view.lock().await.camera
    }

    /// Point the preview camera at `target`
    pub async fn look_at(&self, target: Vec3) {
        self.inner.view.lock().await.camera.target = target;
    }

    /// Frames rendered since attach
    pub fn frames_rendered(&self) -> u64 {
        self.inner.frames.load(Ordering::SeqCst)
    }

    /// Stop the render loop, unmount the surface and clear the graph
    ///
    /// Safe to call more than once.
    pub async fn detach(&self) {
        if self.inner.release() {
            self.inner.graph.write().await.clear();
            info!(
                frames = self.frames_rendered(),
                "Scene detached"
            );
        }
    }
}

impl std::fmt::Debug for SceneHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneHandle")
            .field("attached", &self.is_attached())
            .field("frames", &self.frames_rendered())
            .finish()
    }
}

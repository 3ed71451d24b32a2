//! Asset stage
//!
//! Fetches lesson models and images with bounded concurrency and places them
//! in a row facing the viewer. Each asset settles independently; a failed
//! asset keeps its descriptor (with the error) and still counts as completed.

use crate::bundle::AssetRef;
use crate::config::PlayerSettings;
use crate::fetch::AssetFetcher;
use crate::scene::{Aabb, NodeId, NodeKind, SceneHandle, Transform};
use futures::stream::{self, StreamExt};
use glam::Vec3;
use lessonxr_common::events::{AssetKind, EventBus, PlayerEvent};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Height of the asset row above the floor
const ROW_HEIGHT: f32 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetDescriptor {
    pub id: String,
    pub uri: String,
    pub kind: AssetKind,
    pub display_name: String,
    pub loaded: bool,
    pub error: Option<String>,
    pub node: Option<NodeId>,
}

impl AssetDescriptor {
    fn pending(asset: &AssetRef) -> Self {
        Self {
            id: asset.id.clone(),
            uri: asset.uri.clone(),
            kind: asset.kind,
            display_name: asset.display_name.clone(),
            loaded: false,
            error: None,
            node: None,
        }
    }
}

/// Row position of asset `index` out of `count`, centred on the origin
pub fn layout_position(index: usize, count: usize, spacing: f32) -> Vec3 {
    let offset = index as f32 - (count.saturating_sub(1)) as f32 / 2.0;
    Vec3::new(offset * spacing, ROW_HEIGHT, 0.0)
}

/// Uniform scale that fits `bounds` within `max_size`, never enlarging
pub fn normalized_scale(bounds: &Aabb, max_size: f32) -> f32 {
    if bounds.is_degenerate() {
        return 1.0;
    }
    (max_size / bounds.max_dimension()).min(1.0)
}

pub struct AssetLoader {
    fetcher: Arc<dyn AssetFetcher>,
    events: EventBus,
    max_size: f32,
    spacing: f32,
    concurrency: usize,
}

impl AssetLoader {
    pub fn new(fetcher: Arc<dyn AssetFetcher>, events: EventBus, settings: &PlayerSettings) -> Self {
        Self {
            fetcher,
            events,
            max_size: settings.max_asset_size,
            spacing: settings.asset_spacing,
            concurrency: settings.asset_concurrency.max(1),
        }
    }

    /// Load every asset; `on_progress(completed, total)` runs after each one settles
    pub async fn load_all<F>(
        &self,
        assets: &[AssetRef],
        scene: &SceneHandle,
        mut on_progress: F,
    ) -> Vec<AssetDescriptor>
    where
        F: FnMut(usize, usize) + Send,
    {
        let total = assets.len();
        let mut descriptors: Vec<AssetDescriptor> = assets.iter().map(AssetDescriptor::pending).collect();
        if total == 0 {
            return descriptors;
        }

        let mut settled = stream::iter(assets.iter().cloned().enumerate())
            .map(|(index, asset)| {
                let scene = scene.clone();
                async move { (index, self.load_one(index, total, asset, scene).await) }
            })
            .buffer_unordered(self.concurrency);

        let mut completed = 0;
        while let Some((index, result)) = settled.next().await {
            completed += 1;
            let descriptor = &mut descriptors[index];
            match result {
                Ok(node) => {
                    descriptor.loaded = true;
                    descriptor.node = Some(node);
                    debug!(asset_id = %descriptor.id, completed, total, "Asset placed");
                    self.events.emit_lossy(PlayerEvent::AssetLoaded {
                        asset_id: descriptor.id.clone(),
                        display_name: descriptor.display_name.clone(),
                        completed,
                        total,
                        timestamp: chrono::Utc::now(),
                    });
                }
                Err(error) => {
                    warn!(asset_id = %descriptor.id, uri = %descriptor.uri, error = %error, "Asset failed to load");
                    self.events.emit_lossy(PlayerEvent::AssetFailed {
                        asset_id: descriptor.id.clone(),
                        error: error.clone(),
                        completed,
                        total,
                        timestamp: chrono::Utc::now(),
                    });
                    descriptor.error = Some(error);
                }
            }
            on_progress(completed, total);
        }

        let failed = descriptors.iter().filter(|d| d.error.is_some()).count();
        info!(total, failed, "Asset stage settled");
        descriptors
    }

    async fn load_one(
        &self,
        index: usize,
        total: usize,
        asset: AssetRef,
        scene: SceneHandle,
    ) -> std::result::Result<NodeId, String> {
        let position = layout_position(index, total, self.spacing);

        let (kind, transform, bounds) = match asset.kind {
            AssetKind::Model => {
                let model = self
                    .fetcher
                    .fetch_model(&asset.uri)
                    .await
                    .map_err(|e| e.to_string())?;
                let scale = normalized_scale(&model.bounds, self.max_size);
                let transform = Transform::from_translation(position - model.bounds.center() * scale)
                    .with_uniform_scale(scale);
                (
                    NodeKind::Model {
                        asset_id: asset.id.clone(),
                        source: asset.uri.clone(),
                    },
                    transform,
                    model.bounds,
                )
            }
            AssetKind::Image => {
                let image = self
                    .fetcher
                    .fetch_image(&asset.uri)
                    .await
                    .map_err(|e| e.to_string())?;
                let aspect = image.aspect();
                let (width, height) = if aspect >= 1.0 {
                    (self.max_size, self.max_size / aspect)
                } else {
                    (self.max_size * aspect, self.max_size)
                };
                let half = Vec3::new(width / 2.0, height / 2.0, 0.0);
                (
                    NodeKind::Panel {
                        asset_id: asset.id.clone(),
                        source: asset.uri.clone(),
                        width,
                        height,
                    },
                    Transform::from_translation(position),
                    Aabb::new(-half, half),
                )
            }
        };

        scene
            .with_graph_mut(|graph| graph.insert(kind, transform, Some(bounds)))
            .await
            .ok_or_else(|| "scene detached".to_string())
    }
}

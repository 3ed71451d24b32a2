//! Environment stage
//!
//! Installs the surrounding environment: an equirectangular panorama mapped
//! onto the inside of a sphere, or a model scaled around the viewer. Any
//! failure installs a neutral solid-colour sphere instead, so the stage always
//! settles with something around the viewer.

use crate::bundle::EnvironmentRef;
use crate::config::PlayerSettings;
use crate::fetch::{uri_extension, AssetFetcher};
use crate::scene::{NodeId, NodeKind, SceneHandle, Transform};
use glam::Vec3;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SCENE_DETACHED: &str = "scene detached";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentKind {
    Panorama,
    Model,
    Unknown,
}

impl EnvironmentKind {
    /// Declared type wins; otherwise the file extension decides
    pub fn classify(env: &EnvironmentRef) -> Self {
        if let Some(declared) = env.declared_type.as_deref() {
            let declared = declared.to_ascii_lowercase();
            match declared.as_str() {
                "panorama" | "image" | "equirectangular" | "360" | "skybox" => {
                    return EnvironmentKind::Panorama
                }
                "model" | "gltf" | "glb" | "model/gltf-binary" | "model/gltf+json" => {
                    return EnvironmentKind::Model
                }
                d if d.starts_with("image/") => return EnvironmentKind::Panorama,
                _ => {}
            }
        }
        match uri_extension(&env.uri).as_deref() {
            Some("jpg" | "jpeg" | "png" | "webp" | "hdr" | "exr") => EnvironmentKind::Panorama,
            Some("glb" | "gltf") => EnvironmentKind::Model,
            _ => EnvironmentKind::Unknown,
        }
    }
}

/// Result of the environment stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentOutcome {
    /// Kind that was attempted (`Unknown` when there was no reference)
    pub kind: EnvironmentKind,
    /// The neutral fallback sphere was installed
    pub fallback: bool,
    /// Installed node; `None` when the scene was detached (nothing loaded)
    pub node: Option<NodeId>,
    /// Why the requested environment could not be used
    pub error: Option<String>,
}

pub struct EnvironmentLoader {
    fetcher: Arc<dyn AssetFetcher>,
    radius: f32,
    model_scale: f32,
    fallback_color: [f32; 3],
}

impl EnvironmentLoader {
    pub fn new(fetcher: Arc<dyn AssetFetcher>, settings: &PlayerSettings) -> Self {
        Self {
            fetcher,
            radius: settings.environment_radius,
            model_scale: settings.environment_model_scale,
            fallback_color: settings.fallback_color,
        }
    }

    /// Load the environment into `scene`; never fails
    pub async fn load(&self, env: Option<&EnvironmentRef>, scene: &SceneHandle) -> EnvironmentOutcome {
        if !scene.is_attached() {
            debug!("Scene detached, skipping environment");
            return EnvironmentOutcome {
                kind: env.map(EnvironmentKind::classify).unwrap_or(EnvironmentKind::Unknown),
                fallback: false,
                node: None,
                error: Some(SCENE_DETACHED.to_string()),
            };
        }

        let Some(env) = env else {
            info!("Lesson has no environment, using neutral backdrop");
            return self
                .install_fallback(
                    scene,
                    EnvironmentKind::Unknown,
                    Some("lesson has no environment reference".to_string()),
                )
                .await;
        };

        let kind = EnvironmentKind::classify(env);
        let result = match kind {
            EnvironmentKind::Panorama => self.load_panorama(env, scene).await,
            EnvironmentKind::Model => self.load_model(env, scene).await,
            EnvironmentKind::Unknown => Err(format!(
                "unrecognised environment type for '{}'",
                env.uri
            )),
        };

        match result {
            Ok(node) => EnvironmentOutcome {
                kind,
                fallback: false,
                node: Some(node),
                error: None,
            },
            Err(error) => {
                warn!(uri = %env.uri, ?kind, error = %error, "Environment failed, using fallback sphere");
                self.install_fallback(scene, kind, Some(error)).await
            }
        }
    }

    async fn load_panorama(
        &self,
        env: &EnvironmentRef,
        scene: &SceneHandle,
    ) -> std::result::Result<NodeId, String> {
        let image = self
            .fetcher
            .fetch_image(&env.uri)
            .await
            .map_err(|e| e.to_string())?;

        if (image.aspect() - 2.0).abs() > 0.01 {
            warn!(
                uri = %env.uri,
                width = image.width,
                height = image.height,
                "Panorama is not 2:1, it will look stretched"
            );
        }

        let radius = self.radius;
        let uri = env.uri.clone();
        let node = scene
            .with_graph_mut(|graph| {
                graph.set_environment(
                    NodeKind::EnvironmentSphere {
                        radius,
                        texture: Some(uri),
                        color: [1.0, 1.0, 1.0],
                        fallback: false,
                    },
                    // Mirrored on X so the texture faces inward
                    Transform {
                        scale: Vec3::new(-1.0, 1.0, 1.0),
                        ..Default::default()
                    },
                    None,
                )
            })
            .await
            .ok_or_else(|| SCENE_DETACHED.to_string())?;

        info!(uri = %env.uri, width = image.width, height = image.height, "Panorama environment loaded");
        Ok(node)
    }

    async fn load_model(
        &self,
        env: &EnvironmentRef,
        scene: &SceneHandle,
    ) -> std::result::Result<NodeId, String> {
        let model = self
            .fetcher
            .fetch_model(&env.uri)
            .await
            .map_err(|e| e.to_string())?;

        let scale = self.model_scale;
        let uri = env.uri.clone();
        let node = scene
            .with_graph_mut(|graph| {
                graph.set_environment(
                    NodeKind::EnvironmentModel { source: uri },
                    Transform::default().with_uniform_scale(scale),
                    Some(model.bounds),
                )
            })
            .await
            .ok_or_else(|| SCENE_DETACHED.to_string())?;

        info!(uri = %env.uri, meshes = model.mesh_count, "Model environment loaded");
        Ok(node)
    }

    async fn install_fallback(
        &self,
        scene: &SceneHandle,
        kind: EnvironmentKind,
        error: Option<String>,
    ) -> EnvironmentOutcome {
        let radius = self.radius;
        let color = self.fallback_color;
        let node = scene
            .with_graph_mut(|graph| {
                graph.set_environment(
                    NodeKind::EnvironmentSphere {
                        radius,
                        texture: None,
                        color,
                        fallback: true,
                    },
                    Transform {
                        scale: Vec3::new(-1.0, 1.0, 1.0),
                        ..Default::default()
                    },
                    None,
                )
            })
            .await;

        match node {
            Some(node) => EnvironmentOutcome {
                kind,
                fallback: true,
                node: Some(node),
                error,
            },
            None => EnvironmentOutcome {
                kind,
                fallback: false,
                node: None,
                error: Some(SCENE_DETACHED.to_string()),
            },
        }
    }
}

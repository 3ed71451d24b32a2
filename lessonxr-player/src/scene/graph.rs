//! Scene graph
//!
//! A flat node table keyed by `NodeId`. The environment occupies a single slot
//! that is replaced wholesale; lesson assets and lights are ordinary nodes.

use glam::{Quat, Vec3};
use serde::Serialize;
use std::collections::BTreeMap;

/// Scene node identifier (unique within one scene)
pub type NodeId = u64;

/// Axis-aligned bounding box in model space
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Unit cube centred on the origin
    pub fn unit() -> Self {
        Self::new(Vec3::splat(-0.5), Vec3::splat(0.5))
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Largest extent along any axis
    pub fn max_dimension(&self) -> f32 {
        self.size().max_element()
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb::new(self.min.min(other.min), self.max.max(other.max))
    }

    /// Zero, negative or non-finite extent
    pub fn is_degenerate(&self) -> bool {
        let d = self.max_dimension();
        !d.is_finite() || d <= f32::EPSILON
    }
}

/// Node placement
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }
}

/// What a node draws
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// Sphere viewed from the inside: a panorama or the neutral fallback
    EnvironmentSphere {
        radius: f32,
        /// Panorama source; `None` for the solid-colour fallback
        texture: Option<String>,
        color: [f32; 3],
        fallback: bool,
    },
    /// Model that surrounds the viewer
    EnvironmentModel { source: String },
    /// Lesson 3D model
    Model { asset_id: String, source: String },
    /// Flat textured quad for image-type lesson assets
    Panel {
        asset_id: String,
        source: String,
        width: f32,
        height: f32,
    },
    Light { intensity: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub transform: Transform,
    /// Model-space bounds, when known
    pub bounds: Option<Aabb>,
}

/// Scene content
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: BTreeMap<NodeId, SceneNode>,
    environment: Option<NodeId>,
    next_id: NodeId,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its id
    pub fn insert(&mut self, kind: NodeKind, transform: Transform, bounds: Option<Aabb>) -> NodeId {
        self.next_id += 1;
        let id = self.next_id;
        self.nodes.insert(
            id,
            SceneNode {
                id,
                kind,
                transform,
                bounds,
            },
        );
        id
    }

    /// Install the environment node, replacing any previous one
    pub fn set_environment(
        &mut self,
        kind: NodeKind,
        transform: Transform,
        bounds: Option<Aabb>,
    ) -> NodeId {
        if let Some(old) = self.environment.take() {
            self.nodes.remove(&old);
        }
        let id = self.insert(kind, transform, bounds);
        self.environment = Some(id);
        id
    }

    pub fn environment(&self) -> Option<&SceneNode> {
        self.environment.and_then(|id| self.nodes.get(&id))
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    pub fn remove(&mut self, id: NodeId) -> Option<SceneNode> {
        if self.environment == Some(id) {
            self.environment = None;
        }
        self.nodes.remove(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &SceneNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop every node (ids keep increasing)
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.environment = None;
    }
}

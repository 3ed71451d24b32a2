//! Scene graph, camera and render loop

pub mod camera;
pub mod graph;
pub mod manager;
pub mod surface;

pub use camera::{Camera, OrbitControls};
pub use graph::{Aabb, NodeId, NodeKind, SceneGraph, SceneNode, Transform};
pub use manager::{SceneHandle, SceneManager};
pub use surface::{FrameInfo, HeadlessSurface, RenderSurface};

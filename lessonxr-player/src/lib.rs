//! # LessonXR Player Library (lessonxr-player)
//!
//! Immersive lesson playback pipeline.
//!
//! **Purpose:** Turn a lesson record into a rendered, narrated scene that can
//! be viewed in preview mode or in a head-mounted immersive session.
//!
//! **Architecture:** Capability detection and bundle loading run at mount; a
//! sequential stage machine then loads the environment, narration and 3D
//! assets into a scene that a separate render loop presents every frame.

pub mod api;
pub mod assets;
pub mod bundle;
pub mod capability;
pub mod config;
pub mod environment;
pub mod error;
pub mod fetch;
pub mod narration;
pub mod pipeline;
pub mod player;
pub mod scene;
pub mod session;
pub mod xr;

pub use error::{Error, Result};
pub use player::{LessonPlayer, PlayerDeps};

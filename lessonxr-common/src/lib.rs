//! # LessonXR Common Library
//!
//! Shared code for the LessonXR crates including:
//! - Event types (PlayerEvent enum) and the EventBus
//! - Pipeline, capability, narration and session status types
//! - Bootstrap configuration loading

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{EventBus, PlayerEvent};

//! HTTP control interface
//!
//! Status, narration and immersive-session controls over a running player,
//! plus an SSE stream of player events.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{build_router, run, AppContext};

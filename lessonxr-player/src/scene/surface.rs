//! Render surface abstraction
//!
//! The scene manager presents one `FrameInfo` per render-loop tick to whatever
//! surface it was attached to. Surfaces are synchronous: presenting a frame
//! must not block on I/O.

use crate::error::{Error, Result};
use glam::{Mat4, Vec3};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// Per-frame data handed to the surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// 1-based frame counter for this attachment
    pub frame: u64,
    pub node_count: usize,
    pub immersive: bool,
    pub camera_position: Vec3,
    pub view_projection: Mat4,
}

/// Something frames can be presented to (a window, a canvas, a headset view)
pub trait RenderSurface: Send + Sync {
    /// Drawable size in pixels
    fn size(&self) -> (u32, u32);

    /// Attach rendering output to the surface
    fn mount(&self) -> Result<()>;

    /// Present one frame
    fn present(&self, frame: &FrameInfo) -> Result<()>;

    /// Detach rendering output; must tolerate repeated calls
    fn unmount(&self);
}

/// Surface that records frames without drawing anything
///
/// Used by the CLI and tests to observe the render loop.
#[derive(Debug)]
pub struct HeadlessSurface {
    size: Mutex<(u32, u32)>,
    mounted: AtomicBool,
    frames: AtomicU64,
    last_frame: Mutex<Option<FrameInfo>>,
}

impl HeadlessSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Mutex::new((width, height)),
            mounted: AtomicBool::new(false),
            frames: AtomicU64::new(0),
            last_frame: Mutex::new(None),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Frames presented over the surface's lifetime
    pub fn frames_presented(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn last_frame(&self) -> Option<FrameInfo> {
        *self.last_frame.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Simulate a window resize
    pub fn set_size(&self, width: u32, height: u32) {
        *self.size.lock().unwrap_or_else(|e| e.into_inner()) = (width, height);
    }
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

impl RenderSurface for HeadlessSurface {
    fn size(&self) -> (u32, u32) {
        *self.size.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn mount(&self) -> Result<()> {
        if self.mounted.swap(true, Ordering::SeqCst) {
            return Err(Error::InvalidState(
                "render surface is already mounted".to_string(),
            ));
        }
        Ok(())
    }

    fn present(&self, frame: &FrameInfo) -> Result<()> {
        if !self.is_mounted() {
            return Err(Error::InvalidState("render surface is not mounted".to_string()));
        }
        self.frames.fetch_add(1, Ordering::SeqCst);
        *self.last_frame.lock().unwrap_or_else(|e| e.into_inner()) = Some(*frame);
        Ok(())
    }

    fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }
}

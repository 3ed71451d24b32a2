//! Perspective camera and orbit-style preview controls

use glam::{Mat4, Vec2, Vec3};

/// Standing eye height used for the preview camera
pub const EYE_HEIGHT: f32 = 1.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    /// Vertical field of view in radians
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Camera looking at the lesson origin from just in front of it
    pub fn new(aspect: f32) -> Self {
        Self {
            position: Vec3::new(0.0, EYE_HEIGHT, 3.0),
            target: Vec3::new(0.0, EYE_HEIGHT * 0.75, 0.0),
            fov_y: 70f32.to_radians(),
            aspect,
            near: 0.1,
            far: 2000.0,
        }
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }
}

/// Orbit controls for the non-immersive preview
///
/// Input deltas accumulate between frames and are applied on `update`.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub enabled: bool,
    /// Radians per input unit
    pub rotate_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Fraction of the pending delta applied per update
    pub damping: f32,
    pending_rotate: Vec2,
    pending_zoom: f32,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            enabled: true,
            rotate_speed: 0.005,
            min_distance: 0.5,
            max_distance: 20.0,
            damping: 0.25,
            pending_rotate: Vec2::ZERO,
            pending_zoom: 0.0,
        }
    }
}

impl OrbitControls {
    /// Queue a drag (`rotate`, in input units) and zoom (positive = closer)
    pub fn push_input(&mut self, rotate: Vec2, zoom: f32) {
        if !self.enabled {
            return;
        }
        self.pending_rotate += rotate;
        self.pending_zoom += zoom;
    }

    /// Apply damped input to the camera. Returns true when the camera moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        if !self.enabled {
            self.pending_rotate = Vec2::ZERO;
            self.pending_zoom = 0.0;
            return false;
        }
        if self.pending_rotate.length_squared() < 1e-8 && self.pending_zoom.abs() < 1e-6 {
            return false;
        }

        let step_rotate = self.pending_rotate * self.damping;
        let step_zoom = self.pending_zoom * self.damping;
        self.pending_rotate -= step_rotate;
        self.pending_zoom -= step_zoom;

        let offset = camera.position - camera.target;
        let radius = offset.length().max(f32::EPSILON);
        let mut yaw = offset.x.atan2(offset.z);
        let mut pitch = (offset.y / radius).clamp(-1.0, 1.0).asin();

        yaw -= step_rotate.x * self.rotate_speed;
        pitch = (pitch + step_rotate.y * self.rotate_speed).clamp(-1.45, 1.45);
        let radius = (radius - step_zoom).clamp(self.min_distance, self.max_distance);

        camera.position = camera.target
            + Vec3::new(
                radius * pitch.cos() * yaw.sin(),
                radius * pitch.sin(),
                radius * pitch.cos() * yaw.cos(),
            );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_controls_ignore_input() {
        let mut camera = Camera::new(16.0 / 9.0);
        let before = camera.position;
        let mut controls = OrbitControls {
            enabled: false,
            ..Default::default()
        };
        controls.push_input(Vec2::new(100.0, 0.0), 0.0);
        assert!(!controls.update(&mut camera));
        assert_eq!(camera.position, before);
    }

    #[test]
    fn test_orbit_keeps_distance_within_limits() {
        let mut camera = Camera::new(1.0);
        let mut controls = OrbitControls::default();
        controls.push_input(Vec2::new(200.0, 50.0), 100.0);
        for _ in 0..50 {
            controls.update(&mut camera);
        }
        let distance = (camera.position - camera.target).length();
        assert!(distance >= controls.min_distance - 1e-4);
        assert!(distance <= controls.max_distance + 1e-4);
    }

    #[test]
    fn test_viewport_sets_aspect() {
        let mut camera = Camera::new(1.0);
        camera.set_viewport(1920, 1080);
        assert!((camera.aspect - 16.0 / 9.0).abs() < 1e-5);
        camera.set_viewport(10, 0);
        assert!((camera.aspect - 16.0 / 9.0).abs() < 1e-5);
    }
}

use std::f32::consts::FRAC_PI_2;

use glam::{Vec2, Vec3};

use crate::camera::PerspectiveCamera;
use crate::config::CameraConfig;

const ROTATE_SPEED: f32 = 0.005;
const ZOOM_FACTOR: f32 = 0.95;
const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.01;

/// Mouse orbit around a target point: left drag rotates, wheel zooms.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Vec3,
    distance: f32,
    yaw: f32,
    pitch: f32,
    min_distance: f32,
    max_distance: f32,
    dragging: bool,
    last_cursor: Option<Vec2>,
}

impl OrbitControls {
    pub fn new(camera: &PerspectiveCamera, config: &CameraConfig) -> Self {
        let target = Vec3::from(config.target);
        let offset = camera.position - target;
        let distance = offset.length().max(1e-3);

        let mut controls = Self {
            target,
            distance,
            yaw: offset.x.atan2(offset.z),
            pitch: (offset.y / distance).clamp(-1.0, 1.0).asin(),
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            dragging: false,
            last_cursor: None,
        };
        controls.distance = controls.clamp_distance(distance);
        controls
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    fn clamp_distance(&self, distance: f32) -> f32 {
        distance.clamp(self.min_distance, self.max_distance)
    }

    pub fn set_dragging(&mut self, dragging: bool) {
        self.dragging = dragging;
    }

    /// Returns true when the orbit changed.
    pub fn cursor_moved(&mut self, position: Vec2) -> bool {
        let previous = self.last_cursor.replace(position);
        let Some(previous) = previous.filter(|_| self.dragging) else {
            return false;
        };

        let delta = position - previous;
        self.yaw -= delta.x * ROTATE_SPEED;
        self.pitch = (self.pitch + delta.y * ROTATE_SPEED).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        true
    }

    /// Positive `lines` zooms in.
    pub fn scroll(&mut self, lines: f32) {
        self.distance = self.clamp_distance(self.distance * ZOOM_FACTOR.powf(lines));
    }

    pub fn apply(&self, camera: &mut PerspectiveCamera) {
        let offset = Vec3::new(
            self.pitch.cos() * self.yaw.sin(),
            self.pitch.sin(),
            self.pitch.cos() * self.yaw.cos(),
        ) * self.distance;

        camera.position = self.target + offset;
        camera.look_at(self.target);
    }
}

use glam::{Mat4, Quat, Vec3};

use crate::config::CameraConfig;

/// Right-handed perspective camera looking down its local -Z axis.
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub orientation: Quat,
    /// Vertical field of view in degrees
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl PerspectiveCamera {
    pub fn from_config(config: &CameraConfig, aspect: f32) -> Self {
        let mut camera = Self {
            position: Vec3::from(config.position),
            orientation: Quat::IDENTITY,
            fov: config.fov,
            aspect,
            near: config.near,
            far: config.far,
        };
        camera.look_at(Vec3::from(config.target));
        camera
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn look_at(&mut self, target: Vec3) {
        let forward = target - self.position;
        if forward.length_squared() < 1e-12 {
            return;
        }
        let view = Mat4::look_at_rh(self.position, target, Vec3::Y);
        self.orientation = Quat::from_mat4(&view.inverse()).normalize();
    }

    pub fn forward(&self) -> Vec3 {
        self.orientation * Vec3::NEG_Z
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position).inverse()
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

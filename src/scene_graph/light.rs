use glam::Vec3;

use crate::config::SceneConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub color: [f32; 3],
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub color: [f32; 3],
    pub intensity: f32,
    /// Position the light shines from, towards the origin
    pub position: Vec3,
}

impl DirectionalLight {
    pub fn direction(&self) -> Vec3 {
        (-self.position).normalize_or(Vec3::NEG_Y)
    }
}

/// Background and lights of the stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Environment {
    pub background: [f32; 3],
    pub ambient: AmbientLight,
    pub light: DirectionalLight,
}

impl Environment {
    pub fn from_config(config: &SceneConfig) -> Self {
        Self {
            background: config.background,
            ambient: AmbientLight {
                color: config.ambient_color,
                intensity: config.ambient_intensity,
            },
            light: DirectionalLight {
                color: config.light_color,
                intensity: config.light_intensity,
                position: Vec3::from(config.light_position),
            },
        }
    }
}

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use wgpu::util::DeviceExt;

use crate::camera::PerspectiveCamera;
use crate::effect::OutlineEffect;
use crate::scene_graph::light::Environment;

/// Per-frame values shared by every pass. Matches `Globals` in
/// `shared/globals.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct GlobalUniformState {
    pub view_proj: [[f32; 4]; 4],
    pub light_direction: [f32; 4],
    pub light_color: [f32; 4],
    pub ambient_color: [f32; 4],
    pub outline_color: [f32; 4],
    pub outline_thickness: [f32; 2],
    _padding: [f32; 2],
}

fn scaled(color: [f32; 3], intensity: f32) -> [f32; 4] {
    [
        color[0] * intensity,
        color[1] * intensity,
        color[2] * intensity,
        1.0,
    ]
}

impl GlobalUniformState {
    pub fn new(
        camera: &PerspectiveCamera,
        environment: Option<&Environment>,
        outline: &OutlineEffect,
    ) -> Self {
        let (light_direction, light_color, ambient_color) = match environment {
            Some(environment) => (
                environment.light.direction(),
                scaled(environment.light.color, environment.light.intensity),
                scaled(environment.ambient.color, environment.ambient.intensity),
            ),
            None => (Vec3::NEG_Y, [0.0; 4], [1.0; 4]),
        };

        Self {
            view_proj: camera.view_projection().to_cols_array_2d(),
            light_direction: light_direction.extend(0.0).to_array(),
            light_color,
            ambient_color,
            outline_color: outline.color,
            outline_thickness: outline.ndc_thickness(),
            _padding: [0.0; 2],
        }
    }
}

pub struct GlobalUniform {
    buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl GlobalUniform {
    pub fn new(device: &wgpu::Device, initial_state: GlobalUniformState) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Global uniform buffer"),
            contents: bytemuck::cast_slice(&[initial_state]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Global uniform bind group layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Global uniform bind group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        Self {
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    pub fn update(&self, queue: &wgpu::Queue, state: GlobalUniformState) {
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[state]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CameraConfig, OutlineConfig, SceneConfig};

    #[test]
    fn test_state_layout_is_uniform_compatible() {
        assert_eq!(std::mem::size_of::<GlobalUniformState>() % 16, 0);
    }

    #[test]
    fn test_state_from_stage_values() {
        let camera = PerspectiveCamera::from_config(&CameraConfig::default(), 2.0);
        let environment = Environment::from_config(&SceneConfig::default());
        let outline = OutlineEffect::new(&OutlineConfig::default(), 1600, 800);

        let state = GlobalUniformState::new(&camera, Some(&environment), &outline);

        assert_eq!(state.view_proj, camera.view_projection().to_cols_array_2d());
        assert_eq!(state.light_color, [1.0, 1.0, 1.0, 1.0]);
        let ambient = 0xbb as f32 / 255.0;
        assert!((state.ambient_color[1] - ambient).abs() < 1e-6);
        assert_eq!(state.outline_color, [0.0, 0.0, 0.0, 1.0]);
        assert!((state.outline_thickness[0] - 0.003).abs() < 1e-6);
        assert!((state.outline_thickness[1] - 0.006).abs() < 1e-6);
    }

    #[test]
    fn test_state_without_environment_is_unlit() {
        let camera = PerspectiveCamera::from_config(&CameraConfig::default(), 1.0);
        let outline = OutlineEffect::new(&OutlineConfig::default(), 800, 800);

        let state = GlobalUniformState::new(&camera, None, &outline);
        assert_eq!(state.light_color, [0.0; 4]);
        assert_eq!(state.ambient_color, [1.0; 4]);
    }
}

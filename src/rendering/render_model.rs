use std::collections::HashMap;
use std::mem::offset_of;

use wgpu::util::DeviceExt;

use crate::animation::skinning::{skin_model, SkinnedVertex};
use crate::scene_graph::scene::Scene;
use crate::scene_graph::scene_model::{SceneModel, SceneModelId};

/// GPU buffers of one primitive. Vertices are rewritten every frame after
/// CPU skinning; indices never change.
pub struct RenderPrimitive {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_indices: u32,
}

impl RenderPrimitive {
    fn new(device: &wgpu::Device, model: &SceneModel, index: usize) -> Self {
        let primitive = &model.primitives[index];

        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("Vertex buffer ({}, primitive {})", model.name, index)),
            size: (primitive.vertex_count().max(1) * std::mem::size_of::<SkinnedVertex>())
                as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("Index buffer ({}, primitive {})", model.name, index)),
            contents: bytemuck::cast_slice(&primitive.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex_buffer,
            index_buffer,
            num_indices: primitive.indices.len() as u32,
        }
    }
}

pub struct RenderModel {
    pub primitives: Vec<RenderPrimitive>,
}

impl RenderModel {
    pub fn from_model(device: &wgpu::Device, model: &SceneModel) -> Self {
        let primitives = (0..model.primitives.len())
            .map(|index| RenderPrimitive::new(device, model, index))
            .collect();

        RenderModel { primitives }
    }
}

/// Render models for every scene model, created the first frame a model is seen.
#[derive(Default)]
pub struct RenderModels {
    models: HashMap<SceneModelId, RenderModel>,
}

impl RenderModels {
    pub fn sync(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, scene: &Scene) {
        for (id, scene_model) in scene.models.iter() {
            let render_model = self.models.entry(id).or_insert_with(|| {
                log::info!(
                    "Uploading model {} with {} primitives ({} vertices)",
                    scene_model.name,
                    scene_model.primitives.len(),
                    scene_model.vertex_count()
                );
                RenderModel::from_model(device, scene_model)
            });

            for (primitive, vertices) in render_model
                .primitives
                .iter()
                .zip(skin_model(scene, scene_model))
            {
                if vertices.is_empty() {
                    continue;
                }
                queue.write_buffer(&primitive.vertex_buffer, 0, bytemuck::cast_slice(&vertices));
            }
        }
    }

    pub fn primitives(&self) -> impl Iterator<Item = &RenderPrimitive> {
        self.models.values().flat_map(|model| model.primitives.iter())
    }
}

pub fn draw_primitives<'a>(
    render_pass: &mut wgpu::RenderPass<'_>,
    primitives: impl Iterator<Item = &'a RenderPrimitive>,
) {
    for primitive in primitives {
        if primitive.num_indices == 0 {
            continue;
        }
        render_pass.set_vertex_buffer(0, primitive.vertex_buffer.slice(..));
        render_pass.set_index_buffer(primitive.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        render_pass.draw_indexed(0..primitive.num_indices, 0, 0..1);
    }
}

pub const RENDER_MODEL_VBL: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<SkinnedVertex>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &[
        wgpu::VertexAttribute {
            offset: offset_of!(SkinnedVertex, position) as wgpu::BufferAddress,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: offset_of!(SkinnedVertex, normal) as wgpu::BufferAddress,
            shader_location: 1,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: offset_of!(SkinnedVertex, color) as wgpu::BufferAddress,
            shader_location: 2,
            format: wgpu::VertexFormat::Float32x4,
        },
    ],
};

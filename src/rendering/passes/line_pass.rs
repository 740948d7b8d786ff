use std::mem::offset_of;
use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use wgpu::{
    DepthBiasState, Device, MultisampleState, PipelineCompilationOptions, RenderPassDescriptor,
    ShaderSource, StencilState,
};

use crate::debug_lines::Line;
use crate::rendering::{
    passes::render_pass_context::{PassCreationContext, RenderPassContext},
    shader_loader::{PipelineId, ShaderDefinition},
    texture::DepthTexture,
};

// Both pipelines share one shader file
const GRID_SHADER: ShaderDefinition = ShaderDefinition {
    name: "Grid Lines",
    path: "lines.wgsl",
};
const OVERLAY_SHADER: ShaderDefinition = ShaderDefinition {
    name: "Overlay Lines",
    path: "lines.wgsl",
};

const INITIAL_CAPACITY: usize = 4096;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

const LINE_VBL: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<LineVertex>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &[
        wgpu::VertexAttribute {
            offset: offset_of!(LineVertex, position) as wgpu::BufferAddress,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: offset_of!(LineVertex, color) as wgpu::BufferAddress,
            shader_location: 1,
            format: wgpu::VertexFormat::Float32x4,
        },
    ],
};

/// Appends two vertices per line.
pub fn push_line_vertices<'a>(vertices: &mut Vec<LineVertex>, lines: impl Iterator<Item = &'a Line>) {
    for line in lines {
        vertices.push(LineVertex {
            position: line.start.to_array(),
            color: line.color,
        });
        vertices.push(LineVertex {
            position: line.end.to_array(),
            color: line.color,
        });
    }
}

fn line_pipeline_factory(
    layout: wgpu::PipelineLayout,
    format: wgpu::TextureFormat,
    depth_tested: bool,
) -> crate::rendering::shader_loader::PipelineFactory {
    Box::new(
        move |device: &Device, shader_def: &ShaderDefinition, source: &str| {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(shader_def.name),
                source: ShaderSource::Wgsl(source.into()),
            });

            Ok(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(shader_def.name),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[LINE_VBL],
                    compilation_options: PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::LineList,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DepthTexture::DEPTH_FORMAT,
                    depth_write_enabled: false,
                    depth_compare: if depth_tested {
                        wgpu::CompareFunction::LessEqual
                    } else {
                        wgpu::CompareFunction::Always
                    },
                    stencil: StencilState::default(),
                    bias: DepthBiasState::default(),
                }),
                multisample: MultisampleState::default(),
                multiview: None,
                cache: None,
            }))
        },
    )
}

/// Draws the floor grid depth tested, then the debug overlays on top.
pub struct LinePass {
    grid_pipeline_id: PipelineId,
    overlay_pipeline_id: PipelineId,
    vertex_buffer: wgpu::Buffer,
    capacity: usize,
    vertices: Vec<LineVertex>,
    grid_range: Range<u32>,
    overlay_range: Range<u32>,
}

impl LinePass {
    pub fn create(context: &mut PassCreationContext) -> Self {
        let format = context.surface_format;
        let grid_pipeline_id = context.cache_builder.add_shader(
            GRID_SHADER,
            line_pipeline_factory(context.global_pipeline_layout("Grid line layout"), format, true),
        );
        let overlay_pipeline_id = context.cache_builder.add_shader(
            OVERLAY_SHADER,
            line_pipeline_factory(
                context.global_pipeline_layout("Overlay line layout"),
                format,
                false,
            ),
        );

        Self {
            grid_pipeline_id,
            overlay_pipeline_id,
            vertex_buffer: create_vertex_buffer(context.device, INITIAL_CAPACITY),
            capacity: INITIAL_CAPACITY,
            vertices: Vec::with_capacity(INITIAL_CAPACITY),
            grid_range: 0..0,
            overlay_range: 0..0,
        }
    }

    /// Uploads this frame's lines. Must run before the encoder's passes are recorded.
    pub fn prepare<'a>(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        grid: &[Line],
        overlays: impl Iterator<Item = &'a Line>,
    ) {
        self.vertices.clear();
        push_line_vertices(&mut self.vertices, grid.iter());
        let grid_end = self.vertices.len() as u32;
        push_line_vertices(&mut self.vertices, overlays);
        let overlay_end = self.vertices.len() as u32;

        self.grid_range = 0..grid_end;
        self.overlay_range = grid_end..overlay_end;

        if self.vertices.is_empty() {
            return;
        }

        if self.vertices.len() > self.capacity {
            self.capacity = self.vertices.len().next_power_of_two();
            log::debug!("Growing line buffer to {} vertices", self.capacity);
            self.vertex_buffer = create_vertex_buffer(device, self.capacity);
        }

        queue.write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&self.vertices));
    }

    pub fn render(&self, context: &mut RenderPassContext) {
        if self.vertices.is_empty() {
            return;
        }

        let mut render_pass = context.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Line Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: context.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: context.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        render_pass.set_bind_group(0, context.global_bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));

        let draws = [
            (self.grid_pipeline_id, &self.grid_range),
            (self.overlay_pipeline_id, &self.overlay_range),
        ];
        for (pipeline_id, range) in draws {
            if range.is_empty() {
                continue;
            }
            if let Some(pipeline) = context.pipeline_cache.get(pipeline_id) {
                render_pass.set_pipeline(pipeline);
                render_pass.draw(range.clone(), 0..1);
            }
        }
    }
}

fn create_vertex_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Line vertex buffer"),
        size: (capacity * std::mem::size_of::<LineVertex>()) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

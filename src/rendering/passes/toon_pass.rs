use wgpu::{
    DepthBiasState, Device, MultisampleState, PipelineCompilationOptions, RenderPassDescriptor,
    ShaderSource, StencilState,
};

use crate::rendering::{
    passes::render_pass_context::{PassCreationContext, RenderPassContext},
    render_model::{draw_primitives, RenderPrimitive, RENDER_MODEL_VBL},
    shader_loader::{PipelineId, ShaderDefinition},
    texture::DepthTexture,
};

const TOON_SHADER: ShaderDefinition = ShaderDefinition {
    name: "Toon Shader",
    path: "toon.wgsl",
};

/// Clears the frame to the background color and draws the skinned models
/// with banded diffuse lighting.
pub struct ToonPass {
    pipeline_id: PipelineId,
}

impl ToonPass {
    pub fn create(context: &mut PassCreationContext) -> Self {
        let layout = context.global_pipeline_layout("Toon pipeline layout");
        let format = context.surface_format;

        let pipeline_id = context.cache_builder.add_shader(
            TOON_SHADER,
            Box::new(
                move |device: &Device, shader_def: &ShaderDefinition, source: &str| {
                    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                        label: Some(shader_def.name),
                        source: ShaderSource::Wgsl(source.into()),
                    });

                    Ok(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                        label: Some("Toon pipeline"),
                        layout: Some(&layout),
                        vertex: wgpu::VertexState {
                            module: &shader,
                            entry_point: Some("vs_main"),
                            buffers: &[RENDER_MODEL_VBL],
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
                            topology: wgpu::PrimitiveTopology::TriangleList,
                            front_face: wgpu::FrontFace::Ccw,
                            cull_mode: Some(wgpu::Face::Back),
                            ..Default::default()
                        },
                        depth_stencil: Some(wgpu::DepthStencilState {
                            format: DepthTexture::DEPTH_FORMAT,
                            depth_write_enabled: true,
                            depth_compare: wgpu::CompareFunction::Less,
                            stencil: StencilState::default(),
                            bias: DepthBiasState::default(),
                        }),
                        multisample: MultisampleState::default(),
                        multiview: None,
                        cache: None,
                    }))
                },
            ),
        );

        Self { pipeline_id }
    }

    pub fn render<'a>(
        &self,
        context: &mut RenderPassContext,
        background: [f32; 3],
        primitives: impl Iterator<Item = &'a RenderPrimitive>,
    ) {
        let mut render_pass = context.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Toon Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: context.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: background[0] as f64,
                        g: background[1] as f64,
                        b: background[2] as f64,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: context.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        let Some(pipeline) = context.pipeline_cache.get(self.pipeline_id) else {
            return;
        };
        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, context.global_bind_group, &[]);
        draw_primitives(&mut render_pass, primitives);
    }
}

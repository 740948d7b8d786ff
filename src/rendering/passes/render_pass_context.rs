use crate::rendering::shader_loader::{PipelineCache, PipelineCacheBuilder};

pub struct PassCreationContext<'a> {
    pub device: &'a wgpu::Device,
    pub surface_format: wgpu::TextureFormat,
    pub global_uniform_layout: &'a wgpu::BindGroupLayout,
    pub cache_builder: &'a mut PipelineCacheBuilder,
}

impl PassCreationContext<'_> {
    /// Layout with only the global uniform at group 0.
    pub fn global_pipeline_layout(&self, label: &str) -> wgpu::PipelineLayout {
        self.device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[self.global_uniform_layout],
                push_constant_ranges: &[],
            })
    }
}

pub struct RenderPassContext<'a> {
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub pipeline_cache: &'a PipelineCache,
    pub global_bind_group: &'a wgpu::BindGroup,
    pub color: &'a wgpu::TextureView,
    pub depth: &'a wgpu::TextureView,
}

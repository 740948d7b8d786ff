use std::sync::Arc;

use anyhow::Context;
use wgpu::CommandEncoderDescriptor;
use winit::{dpi::PhysicalSize, window::Window};

use crate::{
    rendering::{
        global_uniform::{GlobalUniform, GlobalUniformState},
        imgui_renderer::ImguiRendererState,
        passes::{
            line_pass::LinePass,
            outline_pass::OutlinePass,
            render_pass_context::{PassCreationContext, RenderPassContext},
            toon_pass::ToonPass,
        },
        render_model::RenderModels,
        shader_loader::{PipelineCacheBuilder, ShaderLoader},
        texture::DepthTexture,
    },
    stage::Stage,
};

const SPLASH_BACKGROUND: [f32; 3] = [0.1, 0.1, 0.1];

pub struct Renderer {
    pub window: Arc<Window>,
    pub size: PhysicalSize<u32>,

    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    device: wgpu::Device,
    queue: wgpu::Queue,

    depth_texture: DepthTexture,
    global_uniform: GlobalUniform,
    render_models: RenderModels,

    shader_loader: ShaderLoader,

    toon_pass: ToonPass,
    outline_pass: OutlinePass,
    line_pass: LinePass,
    imgui: ImguiRendererState,
}

impl Renderer {
    pub async fn new(
        window: Arc<Window>,
        stage: &Stage,
        imgui_context: &mut imgui::Context,
    ) -> anyhow::Result<Renderer> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window.clone())
            .context("Failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable graphics adapter")?;
        log::info!("Using adapter {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                label: None,
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("Failed to create device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .context("Surface reports no formats")?;

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let depth_texture = DepthTexture::new(&device, size.width, size.height, "Depth Texture");
        let global_uniform = GlobalUniform::new(
            &device,
            GlobalUniformState::new(stage.camera(), stage.environment(), stage.effect()),
        );

        let mut cache_builder = PipelineCacheBuilder::new();
        let mut creation_context = PassCreationContext {
            device: &device,
            surface_format,
            global_uniform_layout: &global_uniform.bind_group_layout,
            cache_builder: &mut cache_builder,
        };
        let toon_pass = ToonPass::create(&mut creation_context);
        let outline_pass = OutlinePass::create(&mut creation_context);
        let line_pass = LinePass::create(&mut creation_context);

        let shader_loader = ShaderLoader::new(device.clone(), cache_builder)?;
        let imgui = ImguiRendererState::new(&device, &queue, surface_format, imgui_context);

        Ok(Self {
            window,
            size,
            surface,
            surface_config,
            device,
            queue,
            depth_texture,
            global_uniform,
            render_models: RenderModels::default(),
            shader_loader,
            toon_pass,
            outline_pass,
            line_pass,
            imgui,
        })
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.surface_config.width = new_size.width;
            self.surface_config.height = new_size.height;
            self.surface.configure(&self.device, &self.surface_config);
            self.depth_texture
                .resize(&self.device, new_size.width, new_size.height);
        }
    }

    pub fn render(
        &mut self,
        stage: &Stage,
        imgui_context: &mut imgui::Context,
    ) -> Result<(), wgpu::SurfaceError> {
        self.shader_loader.load_pending_shaders();

        self.global_uniform.update(
            &self.queue,
            GlobalUniformState::new(stage.camera(), stage.environment(), stage.effect()),
        );
        self.render_models
            .sync(&self.device, &self.queue, stage.scene());
        self.line_pass.prepare(
            &self.device,
            &self.queue,
            stage.grid_lines(),
            stage.overlay_lines(),
        );

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut context = RenderPassContext {
                encoder: &mut encoder,
                pipeline_cache: &self.shader_loader.cache,
                global_bind_group: &self.global_uniform.bind_group,
                color: &view,
                depth: self.depth_texture.view(),
            };

            let background = stage
                .environment()
                .map_or(SPLASH_BACKGROUND, |environment| environment.background);
            self.toon_pass
                .render(&mut context, background, self.render_models.primitives());

            if stage.effect().enabled {
                self.outline_pass
                    .render(&mut context, self.render_models.primitives());
            }

            self.line_pass.render(&mut context);
        }

        self.imgui
            .render(&view, imgui_context, &self.device, &self.queue, &mut encoder);

        self.queue.submit([encoder.finish()]);
        output.present();

        Ok(())
    }
}

use std::{sync::Arc, time::Instant};

use anyhow::Context;
use glam::Vec2;
use imgui::{FontConfig, FontSource};
use imgui_winit_support::WinitPlatform;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

use crate::{
    config::StageConfig,
    rendering::renderer::Renderer,
    runtime::{StageEvent, StageRuntime},
    stage::Stage,
    ui::{self, UiAction},
};

const INITIAL_SIZE: LogicalSize<f64> = LogicalSize::new(1280.0, 720.0);
/// Pixels of touchpad scroll treated as one wheel line
const PIXELS_PER_LINE: f32 = 50.0;

struct ImguiState {
    context: imgui::Context,
    platform: WinitPlatform,
}

struct App {
    renderer: Option<Renderer>,
    stage: Stage,
    runtime: StageRuntime,
    imgui: Option<ImguiState>,
    last_frame: Instant,
}

impl App {
    fn new(stage: Stage, runtime: StageRuntime) -> Self {
        Self {
            renderer: None,
            stage,
            runtime,
            imgui: None,
            last_frame: Instant::now(),
        }
    }

    fn setup_imgui(window: &Window) -> ImguiState {
        let mut context = imgui::Context::create();
        let mut platform = WinitPlatform::new(&mut context);
        platform.attach_window(
            context.io_mut(),
            window,
            imgui_winit_support::HiDpiMode::Default,
        );

        let font_size = 14.0;
        context.fonts().add_font(&[FontSource::DefaultFontData {
            config: Some(FontConfig {
                oversample_h: 1,
                pixel_snap_h: true,
                size_pixels: font_size,
                ..Default::default()
            }),
        }]);

        // Disable INI support because it's broken in the published version of imgui
        context.set_ini_filename(None);

        ImguiState { context, platform }
    }

    fn create_renderer(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window_attributes = Window::default_attributes()
            .with_title("toonstage")
            .with_inner_size(INITIAL_SIZE);
        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .context("Failed to create window")?,
        );

        let mut imgui = Self::setup_imgui(&window);
        let renderer = pollster::block_on(Renderer::new(
            window.clone(),
            &self.stage,
            &mut imgui.context,
        ))?;

        let size = window.inner_size();
        self.stage.resize(size.width, size.height);
        self.renderer = Some(renderer);
        self.imgui = Some(imgui);

        Ok(())
    }

    fn apply(&mut self, action: UiAction) {
        match action {
            UiAction::Start => {
                if let Err(error) = self.stage.start(&mut self.runtime) {
                    log::error!("Failed to start stage: {}", error);
                }
            }
            UiAction::Toggle(toggle, value) => self.stage.apply_toggle(toggle, value),
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(renderer), Some(imgui)) = (self.renderer.as_mut(), self.imgui.as_mut()) else {
            return;
        };

        let now = Instant::now();
        let delta_time = now - self.last_frame;
        self.last_frame = now;
        imgui.context.io_mut().update_delta_time(delta_time);

        self.stage.tick(delta_time);

        renderer.window.request_redraw();

        if let Err(error) = imgui
            .platform
            .prepare_frame(imgui.context.io_mut(), &renderer.window)
        {
            log::error!("Failed to prepare Imgui frame: {}", error);
            return;
        }

        let ui = imgui.context.new_frame();
        let actions = ui::draw(ui, &self.stage);
        imgui.platform.prepare_render(ui, &renderer.window);

        match renderer.render(&self.stage, &mut imgui.context) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                renderer.resize(renderer.size);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Out of memory");
                event_loop.exit();
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Timeout");
            }
            Err(other) => {
                log::error!("Unexpected error: {:?}", other);
            }
        }

        for action in actions {
            self.apply(action);
        }
    }

    fn wants_mouse(&self) -> bool {
        self.imgui
            .as_ref()
            .is_some_and(|imgui| imgui.context.io().want_capture_mouse)
    }
}

impl ApplicationHandler<StageEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            return;
        }

        if let Err(error) = self.create_renderer(event_loop) {
            log::error!("Failed to set up renderer: {:?}", error);
            event_loop.exit();
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: StageEvent) {
        match event {
            StageEvent::Load(event) => {
                let Some(audio) = self.runtime.audio_backend() else {
                    log::warn!("Dropping {:?}: audio backend not initialized", event);
                    return;
                };
                // The stage logs the failure and shows it on the splash overlay
                if let Err(error) = self.stage.handle_load_event(event, audio) {
                    log::debug!("Load event rejected: {:?}", error);
                }
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        match &event {
            WindowEvent::CloseRequested => {
                self.stage.shutdown();
                self.runtime.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(*new_size);
                }
                self.stage.resize(new_size.width, new_size.height);
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                let pressed = *state == ElementState::Pressed;
                if !pressed || !self.wants_mouse() {
                    self.stage.orbit_drag(pressed);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.stage
                    .orbit_cursor(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::MouseWheel { delta, .. } if !self.wants_mouse() => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(position) => position.y as f32 / PIXELS_PER_LINE,
                };
                self.stage.orbit_scroll(lines);
            }
            _ => (),
        }

        if let (Some(renderer), Some(imgui)) = (self.renderer.as_ref(), self.imgui.as_mut()) {
            imgui.platform.handle_event::<StageEvent>(
                imgui.context.io_mut(),
                &renderer.window,
                &Event::WindowEvent { window_id, event },
            );
        }
    }
}

pub async fn run(config: StageConfig) -> anyhow::Result<()> {
    let event_loop = EventLoop::<StageEvent>::with_user_event()
        .build()
        .context("Failed to create event loop")?;
    let runtime = StageRuntime::new(event_loop.create_proxy());

    let size = INITIAL_SIZE.to_physical::<u32>(1.0);
    let stage = Stage::new(config, size.width, size.height);

    let mut app = App::new(stage, runtime);
    event_loop.run_app(&mut app)?;

    Ok(())
}

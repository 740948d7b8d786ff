//! The stage orchestrator: lifecycle, load-event handling, readiness gate,
//! settings toggles and the per-frame tick.

use std::fmt;
use std::time::Duration;

use glam::Vec2;

use crate::animation::helper::{AnimationHelper, Feature};
use crate::animation::ik::IkSolver;
use crate::animation::physics::SpringBoneSimulator;
use crate::assets::audio::AudioAsset;
use crate::assets::load_chain::{LoadEvent, LoadStep, LoadedModel};
use crate::assets::motion::CameraMotion;
use crate::assets::source::Progress;
use crate::audio::AudioBackend;
use crate::camera::PerspectiveCamera;
use crate::config::{AssetConfig, StageConfig};
use crate::debug_lines::{DebugOverlay, Line, PolarGrid};
use crate::effect::OutlineEffect;
use crate::error::{InitError, LoadError, StageError};
use crate::orbit::OrbitControls;
use crate::scene_graph::light::Environment;
use crate::scene_graph::scene::{Scene, SpawnedModel};
use crate::settings::{Settings, Toggle};
use crate::stats::FrameStats;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    NotStarted,
    Loading(LoadStep),
    Ready,
    Failed(String),
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Readiness::NotStarted => f.write_str("not started"),
            Readiness::Loading(step) => write!(f, "loading {}", step),
            Readiness::Ready => f.write_str("ready"),
            Readiness::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Services the stage needs from whoever hosts it.
pub trait StageHost {
    /// One-time heavy initialization: async runtime and audio device.
    fn initialize(&mut self) -> Result<(), InitError>;
    /// Starts the load chain. Its events come back through `handle_load_event`.
    fn start_loading(&mut self, assets: &AssetConfig);
}

pub struct Stage {
    config: StageConfig,
    readiness: Readiness,
    started: bool,
    scene: Scene,
    environment: Option<Environment>,
    grid: Vec<Line>,
    camera: PerspectiveCamera,
    controls: OrbitControls,
    effect: OutlineEffect,
    stats: FrameStats,
    helper: AnimationHelper,
    model: Option<SpawnedModel>,
    settings: Settings,
    panel_built: bool,
    ik_overlay: Option<DebugOverlay>,
    physics_overlay: Option<DebugOverlay>,
    progress: Option<(LoadStep, Progress)>,
}

fn aspect_ratio(width: u32, height: u32) -> f32 {
    if height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}

impl Stage {
    pub fn new(config: StageConfig, width: u32, height: u32) -> Self {
        let camera = PerspectiveCamera::from_config(&config.camera, aspect_ratio(width, height));
        let controls = OrbitControls::new(&camera, &config.camera);

        Self {
            readiness: Readiness::NotStarted,
            started: false,
            scene: Scene::new(),
            environment: None,
            grid: Vec::new(),
            camera,
            controls,
            effect: OutlineEffect::new(&config.outline, width, height),
            stats: FrameStats::new(),
            helper: AnimationHelper::new(config.animation.afterglow),
            model: None,
            settings: Settings::default(),
            panel_built: false,
            ik_overlay: None,
            physics_overlay: None,
            progress: None,
            config,
        }
    }

    /// Runs host initialization and then `init`. Only the first call does anything.
    pub fn start(&mut self, host: &mut dyn StageHost) -> Result<(), StageError> {
        if self.started {
            return Err(StageError::AlreadyStarted);
        }
        self.started = true;

        if let Err(error) = host.initialize() {
            log::error!("Initialization failed: {}", error);
            self.readiness = Readiness::Failed(error.to_string());
            return Err(error.into());
        }

        self.init(host);
        Ok(())
    }

    fn init(&mut self, host: &mut dyn StageHost) {
        let (width, height) = self.effect.size();

        self.camera = PerspectiveCamera::from_config(&self.config.camera, aspect_ratio(width, height));
        self.controls = OrbitControls::new(&self.camera, &self.config.camera);
        self.environment = Some(Environment::from_config(&self.config.scene));
        self.grid = PolarGrid::from_config(&self.config.scene).lines();
        self.stats = FrameStats::new();

        log::info!("Stage initialized ({}x{}), starting load chain", width, height);
        self.readiness = Readiness::Loading(LoadStep::Model);
        host.start_loading(&self.config.assets);
    }

    /// Consumes one event from the load chain. Completions must arrive for
    /// the step currently being loaded.
    pub fn handle_load_event(
        &mut self,
        event: LoadEvent,
        audio: &dyn AudioBackend,
    ) -> Result<(), StageError> {
        let waiting_for = match self.readiness {
            Readiness::Loading(step) => step,
            Readiness::Failed(_) => {
                log::debug!("Ignoring {:?} after failure", event);
                return Ok(());
            }
            _ => {
                if let Some(got) = event.completed_step() {
                    return self.fail(LoadError::UnexpectedStep {
                        expected: self.readiness.to_string(),
                        got,
                    });
                }
                return Ok(());
            }
        };

        if let Some(got) = event.completed_step() {
            if got != waiting_for {
                return self.fail(LoadError::UnexpectedStep {
                    expected: waiting_for.to_string(),
                    got,
                });
            }
        }

        match event {
            LoadEvent::Progress { step, progress } => {
                if step == waiting_for {
                    self.progress = Some((step, progress));
                }
                return Ok(());
            }
            LoadEvent::Failed(error) => return self.fail(error),
            LoadEvent::ModelLoaded(loaded) => self.attach_model(*loaded),
            LoadEvent::CameraMotionLoaded(motion) => self.attach_camera(*motion),
            LoadEvent::AudioLoaded(asset) => {
                if let Err(error) = self.attach_audio(asset, audio) {
                    return self.fail(error);
                }
            }
        }

        self.progress = None;
        match waiting_for.next() {
            Some(next) => self.readiness = Readiness::Loading(next),
            None => {
                self.readiness = Readiness::Ready;
                self.panel_built = true;
                log::info!(
                    "Stage ready (camera motion {}, audio {})",
                    if self.helper.has_camera() { "bound" } else { "missing" },
                    if self.helper.has_audio() { "bound" } else { "missing" }
                );
            }
        }

        Ok(())
    }

    fn fail(&mut self, error: LoadError) -> Result<(), StageError> {
        log::error!("Loading failed: {}", error);
        self.readiness = Readiness::Failed(error.to_string());
        Err(error.into())
    }

    fn attach_model(&mut self, loaded: LoadedModel) {
        let LoadedModel { model, motion } = loaded;
        let spawned = self.scene.spawn_model(model);
        self.scene.update_world_transforms();

        let scene = &self.scene;
        let resolve = |name: &str| spawned.find_node(scene, name);
        let ik = IkSolver::from_config(&self.config.ik, resolve);
        let physics = SpringBoneSimulator::from_config(&self.config.physics, scene, resolve);

        self.helper.add_mesh(scene, &spawned, motion, ik, Some(physics));
        self.model = Some(spawned);
    }

    fn attach_camera(&mut self, motion: CameraMotion) {
        self.helper.add_camera(motion);
        self.ik_overlay = Some(DebugOverlay::new(self.settings.get(Toggle::ShowIkBones)));
        self.physics_overlay = Some(DebugOverlay::new(
            self.settings.get(Toggle::ShowRigidBodies),
        ));
    }

    fn attach_audio(&mut self, asset: AudioAsset, audio: &dyn AudioBackend) -> Result<(), LoadError> {
        let output = audio.create_output(&asset, self.config.audio.volume)?;
        self.helper.add_audio(output, self.config.audio.delay_time());
        Ok(())
    }

    /// Advances one frame. Animation state only moves once the stage is ready.
    pub fn tick(&mut self, elapsed: Duration) {
        self.stats.record(elapsed);

        if self.readiness != Readiness::Ready {
            return;
        }

        self.helper
            .update(elapsed.as_secs_f32(), &mut self.scene, &mut self.camera);

        if let Some(overlay) = self.ik_overlay.as_mut().filter(|overlay| overlay.visible) {
            overlay.lines.clear();
            self.helper.ik_overlay_lines(&self.scene, &mut overlay.lines);
        }
        if let Some(overlay) = self.physics_overlay.as_mut().filter(|overlay| overlay.visible) {
            overlay.lines.clear();
            self.helper
                .physics_overlay_lines(&self.scene, &mut overlay.lines);
        }
    }

    /// Zero heights come from minimized windows and are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if height == 0 {
            return;
        }
        self.camera.set_aspect(aspect_ratio(width, height));
        self.effect.set_size(width, height);
    }

    pub fn apply_toggle(&mut self, toggle: Toggle, value: bool) {
        self.settings.set(toggle, value);

        match toggle {
            Toggle::Animation => self.helper.enable(Feature::Animation, value),
            Toggle::Ik => self.helper.enable(Feature::Ik, value),
            Toggle::Physics => self.helper.enable(Feature::Physics, value),
            Toggle::Outline => self.effect.enabled = value,
            Toggle::ShowIkBones => set_overlay_visible(&mut self.ik_overlay, value),
            Toggle::ShowRigidBodies => set_overlay_visible(&mut self.physics_overlay, value),
        }
    }

    pub fn orbit_drag(&mut self, dragging: bool) {
        self.controls.set_dragging(dragging);
    }

    pub fn orbit_cursor(&mut self, position: Vec2) {
        if self.controls.cursor_moved(position) {
            self.controls.apply(&mut self.camera);
        }
    }

    pub fn orbit_scroll(&mut self, lines: f32) {
        self.controls.scroll(lines);
        self.controls.apply(&mut self.camera);
    }

    pub fn shutdown(&mut self) {
        log::info!("Shutting down stage ({})", self.readiness);
        self.helper.stop_audio();
    }

    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    pub fn progress(&self) -> Option<(LoadStep, Progress)> {
        self.progress
    }

    pub fn panel_built(&self) -> bool {
        self.panel_built
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn environment(&self) -> Option<&Environment> {
        self.environment.as_ref()
    }

    pub fn grid_lines(&self) -> &[Line] {
        &self.grid
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn effect(&self) -> &OutlineEffect {
        &self.effect
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn helper(&self) -> &AnimationHelper {
        &self.helper
    }

    pub fn model(&self) -> Option<&SpawnedModel> {
        self.model.as_ref()
    }

    /// Visible overlay lines, IK first.
    pub fn overlay_lines(&self) -> impl Iterator<Item = &Line> {
        [&self.ik_overlay, &self.physics_overlay]
            .into_iter()
            .flatten()
            .filter(|overlay| overlay.visible)
            .flat_map(|overlay| overlay.lines.iter())
    }

    pub fn ik_overlay(&self) -> Option<&DebugOverlay> {
        self.ik_overlay.as_ref()
    }

    pub fn physics_overlay(&self) -> Option<&DebugOverlay> {
        self.physics_overlay.as_ref()
    }
}

fn set_overlay_visible(overlay: &mut Option<DebugOverlay>, visible: bool) {
    if let Some(overlay) = overlay {
        overlay.visible = visible;
        if !visible {
            overlay.lines.clear();
        }
    }
}

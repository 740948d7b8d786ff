use std::{
    path::Path,
    sync::{
        mpsc::{self, channel},
        Arc, RwLock,
    },
    time::Duration,
};

use anyhow::Context;
use id_arena::{Arena, Id};
use naga::{
    back::wgsl::WriterFlags,
    valid::{Capabilities, ValidationFlags},
};
use naga_oil::compose::{
    ComposableModuleDescriptor, Composer, NagaModuleDescriptor, ShaderLanguage,
};
use notify_debouncer_mini::{
    new_debouncer_opt, notify::*, DebounceEventResult, DebouncedEventKind, Debouncer,
};
use pollster::block_on;
use wgpu::{naga, PollType, RenderPipeline};

const SHADER_FOLDER: &str = "assets/shaders";
const SHARED_SHADER_MODULES_FOLDER: &str = "assets/shaders/shared";

pub type PipelineFactory = Box<
    dyn Sync
        + Send
        + Fn(&wgpu::Device, &ShaderDefinition, &str) -> anyhow::Result<wgpu::RenderPipeline>,
>;

#[derive(Debug, Clone)]
pub struct ShaderDefinition {
    pub name: &'static str,
    pub path: &'static str,
}

struct ShaderEntry {
    pipeline_id: PipelineId,
    def: ShaderDefinition,
    factory: PipelineFactory,
}

pub type PipelineId = Id<PipelineCacheEntry>;

#[derive(Default)]
pub struct PipelineCacheEntry(Option<wgpu::RenderPipeline>);

pub struct PipelineCacheBuilder {
    shaders: Arena<ShaderEntry>,
    pipelines: Arena<PipelineCacheEntry>,
}

impl PipelineCacheBuilder {
    pub fn new() -> Self {
        Self {
            shaders: Arena::new(),
            pipelines: Arena::new(),
        }
    }

    pub fn add_shader(&mut self, def: ShaderDefinition, factory: PipelineFactory) -> PipelineId {
        let pipeline_id = self.pipelines.alloc(PipelineCacheEntry::default());
        self.shaders.alloc(ShaderEntry {
            pipeline_id,
            def,
            factory,
        });
        pipeline_id
    }

    fn build(self) -> PipelineCache {
        PipelineCache {
            shaders: Arc::new(self.shaders),
            pipelines: self.pipelines,
        }
    }
}

pub struct PipelineCache {
    shaders: Arc<Arena<ShaderEntry>>,
    pipelines: Arena<PipelineCacheEntry>,
}

impl PipelineCache {
    /// None until the pipeline's shader has compiled at least once.
    pub fn get(&self, id: PipelineId) -> Option<&RenderPipeline> {
        self.pipelines.get(id).and_then(|entry| entry.0.as_ref())
    }

    fn set(&mut self, id: PipelineId, pipeline: RenderPipeline) {
        if let Some(entry) = self.pipelines.get_mut(id) {
            entry.0 = Some(pipeline);
        }
    }
}

type CompiledPipeline = (&'static str, PipelineId, wgpu::RenderPipeline);

/// Compiles shaders to pipelines and recompiles them when their files change.
pub struct ShaderLoader {
    pub cache: PipelineCache,
    device: wgpu::Device,
    receiver: mpsc::Receiver<CompiledPipeline>,
    composer: Arc<RwLock<Composer>>,
    _debouncer: Debouncer<RecommendedWatcher>,
}

impl ShaderLoader {
    pub fn new(device: wgpu::Device, cache_builder: PipelineCacheBuilder) -> anyhow::Result<Self> {
        let cache = cache_builder.build();
        let (send_new_pipelines, recv_new_pipelines) = channel();

        let composer = Arc::new(RwLock::new(
            create_composer().context("Failed to create shader composer")?,
        ));

        let device_loader = device.clone();
        let shaders = cache.shaders.clone();
        let composer_loader = composer.clone();
        let mut debouncer = new_debouncer_opt(
            notify_debouncer_mini::Config::default().with_timeout(Duration::from_millis(100)),
            move |res: DebounceEventResult| match res {
                Ok(events) => {
                    for event in events {
                        if event.kind != DebouncedEventKind::Any {
                            continue;
                        }

                        // Several pipelines may share one shader file
                        let entries = shaders
                            .iter()
                            .map(|(_, entry)| entry)
                            .filter(|entry| event.path.ends_with(entry.def.path));

                        for entry in entries {
                            match compile_file(&device_loader, &entry.def, &entry.factory, &composer_loader) {
                                Ok(pipeline) => {
                                    if send_new_pipelines
                                        .send((entry.def.name, entry.pipeline_id, pipeline))
                                        .is_err()
                                    {
                                        log::debug!("Renderer gone, dropping reloaded {}", entry.def.name);
                                    }
                                }
                                Err(e) => log::error!("Failed to reload shader: {:?}", e),
                            }
                        }
                    }
                }
                Err(e) => log::error!("Error debouncing shader changes: {}", e),
            },
        )
        .context("Failed to create shader watcher")?;

        let absolute_shader_folder = Path::new(SHADER_FOLDER)
            .canonicalize()
            .with_context(|| format!("Shader folder {} not found", SHADER_FOLDER))?;
        debouncer
            .watcher()
            .watch(&absolute_shader_folder, RecursiveMode::Recursive)
            .context("Failed to watch shader folder")?;

        let mut shader_loader = Self {
            device,
            cache,
            receiver: recv_new_pipelines,
            composer,
            _debouncer: debouncer,
        };
        shader_loader.create_all_pipelines()?;

        Ok(shader_loader)
    }

    fn create_all_pipelines(&mut self) -> anyhow::Result<()> {
        let shaders = self.cache.shaders.clone();
        for (_, shader) in shaders.iter() {
            let pipeline = compile_file(&self.device, &shader.def, &shader.factory, &self.composer)
                .with_context(|| format!("Failed to compile shader: {}", shader.def.name))?;
            self.cache.set(shader.pipeline_id, pipeline);
        }
        Ok(())
    }

    /// Swaps in pipelines recompiled since the last frame.
    pub fn load_pending_shaders(&mut self) {
        while let Ok((name, pipeline_id, pipeline)) = self.receiver.try_recv() {
            log::info!("Shader reloaded: {}", name);
            self.cache.set(pipeline_id, pipeline);
        }
    }
}

fn compile_file(
    device: &wgpu::Device,
    shader_def: &ShaderDefinition,
    factory: &PipelineFactory,
    composer: &RwLock<Composer>,
) -> anyhow::Result<wgpu::RenderPipeline> {
    let path = Path::new(SHADER_FOLDER).join(shader_def.path);
    let shader_code = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read shader file {}", path.display()))?;
    let file_path = path.to_string_lossy().to_string();

    let module = {
        let mut composer = composer
            .write()
            .map_err(|_| anyhow::anyhow!("Shader composer lock poisoned"))?;
        composer
            .make_naga_module(NagaModuleDescriptor {
                file_path: &file_path,
                source: &shader_code,
                ..Default::default()
            })
            .context("Failed to create Naga module from shader code")?
    };

    // wgpu validates again when the module is created
    let info = naga::valid::Validator::new(ValidationFlags::empty(), Capabilities::all())
        .validate(&module)
        .context("Failed to validate Naga module")?;

    let shader_code = naga::back::wgsl::write_string(&module, &info, WriterFlags::empty())
        .context("Failed to convert Naga module to WGSL string")?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pipeline = factory(device, shader_def, &shader_code);
    device
        .poll(PollType::Wait)
        .context("Failed to poll device after shader compilation")?;

    if let Some(error) = block_on(device.pop_error_scope()) {
        return Err(anyhow::anyhow!(
            "Shader compilation failed for {}: {}",
            shader_def.name,
            error
        ));
    }

    pipeline
}

fn create_composer() -> anyhow::Result<Composer> {
    let shared_files = std::fs::read_dir(SHARED_SHADER_MODULES_FOLDER)
        .context("Failed to read shared shader modules directory")?;
    let mut composer = Composer::default();

    for entry in shared_files {
        let path = entry
            .context("Failed to read entry in shared shader modules directory")?
            .path();
        if !path.is_file() || path.extension().is_none_or(|ext| ext != "wgsl") {
            continue;
        }

        let source = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read shared shader module {}", path.display()))?;
        let file_path = path.to_string_lossy().to_string();

        composer
            .add_composable_module(ComposableModuleDescriptor {
                source: &source,
                file_path: &file_path,
                language: ShaderLanguage::Wgsl,
                ..Default::default()
            })
            .with_context(|| format!("Failed to add shared shader module: {}", file_path))?;
    }

    Ok(composer)
}

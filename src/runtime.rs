//! Host services for the stage: the tokio runtime running the load chain and
//! the audio device.

use tokio::runtime::Runtime;
use winit::event_loop::EventLoopProxy;

use crate::assets::load_chain::{run_load_chain, LoadEvent};
use crate::assets::source::FileSource;
use crate::audio::{AudioBackend, RodioBackend};
use crate::config::AssetConfig;
use crate::error::InitError;
use crate::stage::StageHost;

/// Events delivered to the window's event loop from other threads.
#[derive(Debug)]
pub enum StageEvent {
    Load(LoadEvent),
}

pub struct StageRuntime {
    proxy: EventLoopProxy<StageEvent>,
    runtime: Option<Runtime>,
    audio: Option<RodioBackend>,
}

impl StageRuntime {
    pub fn new(proxy: EventLoopProxy<StageEvent>) -> Self {
        Self {
            proxy,
            runtime: None,
            audio: None,
        }
    }

    pub fn audio_backend(&self) -> Option<&dyn AudioBackend> {
        self.audio.as_ref().map(|audio| audio as &dyn AudioBackend)
    }

    /// Drops the loader runtime without waiting for a pending load.
    pub fn shutdown(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
            log::info!("Loader runtime stopped");
        }
        self.audio = None;
    }
}

impl StageHost for StageRuntime {
    fn initialize(&mut self) -> Result<(), InitError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("toonstage-loader")
            .enable_all()
            .build()
            .map_err(InitError::Runtime)?;
        let audio = RodioBackend::new()?;

        self.runtime = Some(runtime);
        self.audio = Some(audio);
        Ok(())
    }

    fn start_loading(&mut self, assets: &AssetConfig) {
        let Some(runtime) = &self.runtime else {
            log::error!("Cannot start loading before the runtime is initialized");
            return;
        };

        let assets = assets.clone();
        let proxy = self.proxy.clone();
        runtime.spawn(async move {
            let source = FileSource::new(&assets.root);
            let event_proxy = proxy.clone();
            let send = move |event: LoadEvent| {
                if event_proxy.send_event(StageEvent::Load(event)).is_err() {
                    log::warn!("Event loop closed, dropping load event");
                }
            };

            if let Err(error) = run_load_chain(&source, &assets, send).await {
                // Logged by the stage when it handles the event
                if proxy.send_event(StageEvent::Load(LoadEvent::Failed(error))).is_err() {
                    log::warn!("Event loop closed before load failure was delivered");
                }
            }
        });
    }
}

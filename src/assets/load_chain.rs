//! The sequential asset pipeline: model and motions, then camera motions, then audio.

use std::fmt;
use std::path::Path;

use crate::animation::clip::AnimationClip;
use crate::assets::audio::AudioAsset;
use crate::assets::model::ModelAsset;
use crate::assets::motion::{clip_from_gltf_slice, CameraMotion};
use crate::assets::source::{AssetSource, Progress};
use crate::config::AssetConfig;
use crate::error::LoadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStep {
    Model,
    CameraMotion,
    Audio,
}

impl LoadStep {
    pub fn next(self) -> Option<LoadStep> {
        match self {
            LoadStep::Model => Some(LoadStep::CameraMotion),
            LoadStep::CameraMotion => Some(LoadStep::Audio),
            LoadStep::Audio => None,
        }
    }
}

impl fmt::Display for LoadStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadStep::Model => "model",
            LoadStep::CameraMotion => "camera motion",
            LoadStep::Audio => "audio",
        };
        f.write_str(name)
    }
}

pub struct LoadedModel {
    pub model: ModelAsset,
    pub motion: AnimationClip,
}

pub enum LoadEvent {
    Progress { step: LoadStep, progress: Progress },
    ModelLoaded(Box<LoadedModel>),
    CameraMotionLoaded(Box<CameraMotion>),
    AudioLoaded(AudioAsset),
    Failed(LoadError),
}

impl LoadEvent {
    /// The step this event completes, if any.
    pub fn completed_step(&self) -> Option<LoadStep> {
        match self {
            LoadEvent::ModelLoaded(_) => Some(LoadStep::Model),
            LoadEvent::CameraMotionLoaded(_) => Some(LoadStep::CameraMotion),
            LoadEvent::AudioLoaded(_) => Some(LoadStep::Audio),
            LoadEvent::Progress { .. } | LoadEvent::Failed(_) => None,
        }
    }
}

impl fmt::Debug for LoadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadEvent::Progress { step, progress } => f
                .debug_struct("Progress")
                .field("step", step)
                .field("progress", progress)
                .finish(),
            LoadEvent::ModelLoaded(loaded) => f.debug_tuple("ModelLoaded").field(&loaded.model.name).finish(),
            LoadEvent::CameraMotionLoaded(motion) => {
                f.debug_tuple("CameraMotionLoaded").field(&motion.node_name).finish()
            }
            LoadEvent::AudioLoaded(audio) => f.debug_tuple("AudioLoaded").field(&audio.name).finish(),
            LoadEvent::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
        }
    }
}

async fn fetch_with_progress<S, F>(
    source: &S,
    step: LoadStep,
    path: &Path,
    emit: &mut F,
) -> Result<Vec<u8>, LoadError>
where
    S: AssetSource,
    F: FnMut(LoadEvent) + Send,
{
    let mut last_percent = None;
    let mut on_progress = |progress: Progress| {
        if let Some(percent) = progress.percent() {
            let rounded = percent.round() as u32;
            if last_percent != Some(rounded) {
                log::info!("{}% downloaded", rounded);
                last_percent = Some(rounded);
            }
        }
        emit(LoadEvent::Progress { step, progress });
    };

    source.fetch(path, &mut on_progress).await
}

async fn load_model<S, F>(source: &S, config: &AssetConfig, emit: &mut F) -> Result<LoadedModel, LoadError>
where
    S: AssetSource,
    F: FnMut(LoadEvent) + Send,
{
    if config.motions.is_empty() {
        return Err(LoadError::NoFiles(LoadStep::Model));
    }

    let bytes = fetch_with_progress(source, LoadStep::Model, &config.model, emit).await?;
    let model = ModelAsset::from_gltf_slice(&config.model, &bytes)?;

    let mut clips = Vec::with_capacity(config.motions.len());
    for path in &config.motions {
        let bytes = fetch_with_progress(source, LoadStep::Model, path, emit).await?;
        clips.push(clip_from_gltf_slice(path, &bytes)?);
    }
    let motion = AnimationClip::merge(model.name.clone(), clips);

    Ok(LoadedModel { model, motion })
}

async fn load_camera_motion<S, F>(
    source: &S,
    config: &AssetConfig,
    emit: &mut F,
) -> Result<CameraMotion, LoadError>
where
    S: AssetSource,
    F: FnMut(LoadEvent) + Send,
{
    let mut motions = Vec::with_capacity(config.camera_motions.len());
    for path in &config.camera_motions {
        let bytes = fetch_with_progress(source, LoadStep::CameraMotion, path, emit).await?;
        motions.push(CameraMotion::from_gltf_slice(path, &bytes)?);
    }

    CameraMotion::merge(motions).ok_or(LoadError::NoFiles(LoadStep::CameraMotion))
}

/// Runs every load step in order, emitting progress and one completion per
/// step. The first failing step ends the chain.
pub async fn run_load_chain<S, F>(source: &S, config: &AssetConfig, mut emit: F) -> Result<(), LoadError>
where
    S: AssetSource,
    F: FnMut(LoadEvent) + Send,
{
    log::info!("Loading model {}", config.model.display());
    let model = load_model(source, config, &mut emit).await?;
    emit(LoadEvent::ModelLoaded(Box::new(model)));

    log::info!("Loading {} camera motion(s)", config.camera_motions.len());
    let camera = load_camera_motion(source, config, &mut emit).await?;
    emit(LoadEvent::CameraMotionLoaded(Box::new(camera)));

    log::info!("Loading audio {}", config.audio.display());
    let bytes = fetch_with_progress(source, LoadStep::Audio, &config.audio, &mut emit).await?;
    emit(LoadEvent::AudioLoaded(AudioAsset::new(&config.audio, bytes)));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, MockSource};
    use std::path::PathBuf;

    fn collect(source: &MockSource, config: &AssetConfig) -> (Result<(), LoadError>, Vec<LoadEvent>) {
        let mut events = Vec::new();
        let result = pollster::block_on(run_load_chain(source, config, |event| events.push(event)));
        (result, events)
    }

    fn completions(events: &[LoadEvent]) -> Vec<LoadStep> {
        events.iter().filter_map(LoadEvent::completed_step).collect()
    }

    #[test]
    fn test_steps_complete_in_order() {
        let source = MockSource::with_default_assets();
        let config = AssetConfig::default();

        let (result, events) = collect(&source, &config);
        assert!(result.is_ok());
        assert_eq!(
            completions(&events),
            vec![LoadStep::Model, LoadStep::CameraMotion, LoadStep::Audio]
        );
        assert_eq!(
            source.fetched(),
            vec![
                PathBuf::from("models/character.glb"),
                PathBuf::from("motions/dance.glb"),
                PathBuf::from("motions/dance_camera.glb"),
                PathBuf::from("audio/dance.mp3"),
            ]
        );

        let Some(LoadEvent::ModelLoaded(loaded)) = events
            .iter()
            .find(|event| matches!(event, LoadEvent::ModelLoaded(_)))
        else {
            panic!("model completion missing");
        };
        assert_eq!(loaded.model.name, "character");
        assert_eq!(loaded.motion.channels.len(), 1);
    }

    #[test]
    fn test_progress_precedes_each_completion() {
        let source = MockSource::with_default_assets();
        let (_, events) = collect(&source, &AssetConfig::default());

        let mut current = None;
        for event in &events {
            match event {
                LoadEvent::Progress { step, .. } => current = Some(*step),
                other => assert_eq!(other.completed_step(), current),
            }
        }
    }

    #[test]
    fn test_failing_step_stops_later_steps() {
        let mut source = MockSource::with_default_assets();
        source.remove("motions/dance_camera.glb");

        let (result, events) = collect(&source, &AssetConfig::default());
        assert!(matches!(result, Err(LoadError::Io { .. })));
        assert_eq!(completions(&events), vec![LoadStep::Model]);
        assert!(!source
            .fetched()
            .contains(&PathBuf::from("audio/dance.mp3")));
    }

    #[test]
    fn test_corrupt_model_fails_first_step() {
        let mut source = MockSource::with_default_assets();
        source.insert("models/character.glb", b"garbage".to_vec());

        let (result, events) = collect(&source, &AssetConfig::default());
        assert!(matches!(result, Err(LoadError::Gltf { .. })));
        assert!(completions(&events).is_empty());
        assert_eq!(source.fetched().len(), 1);
    }

    #[test]
    fn test_missing_camera_list_is_reported() {
        let source = MockSource::with_default_assets();
        let config = AssetConfig {
            camera_motions: Vec::new(),
            ..AssetConfig::default()
        };

        let (result, _) = collect(&source, &config);
        assert!(matches!(
            result,
            Err(LoadError::NoFiles(LoadStep::CameraMotion))
        ));
    }

    #[test]
    fn test_multiple_motions_are_merged() {
        let mut source = MockSource::with_default_assets();
        source.insert("motions/extra.glb", test_support::motion_glb());
        let config = AssetConfig {
            motions: vec![
                PathBuf::from("motions/dance.glb"),
                PathBuf::from("motions/extra.glb"),
            ],
            ..AssetConfig::default()
        };

        let (result, events) = collect(&source, &config);
        assert!(result.is_ok());
        let merged = events.iter().find_map(|event| match event {
            LoadEvent::ModelLoaded(loaded) => Some(loaded.motion.channels.len()),
            _ => None,
        });
        assert_eq!(merged, Some(2));
    }
}

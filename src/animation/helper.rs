//! Drives every bound mesh, the camera and the audio track from one clock.

use std::collections::HashMap;

use glam::{Mat4, Quat, Vec3};

use crate::animation::clip::{AnimationClip, Sample};
use crate::animation::ik::IkSolver;
use crate::animation::physics::SpringBoneSimulator;
use crate::assets::motion::CameraMotion;
use crate::audio::AudioOutput;
use crate::camera::PerspectiveCamera;
use crate::debug_lines::Line;
use crate::scene_graph::object3d::ObjectId;
use crate::scene_graph::scene::{Scene, SpawnedModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Animation,
    Ik,
    Physics,
}

struct RestPose {
    object_id: ObjectId,
    translation: Vec3,
    rotation: Quat,
    scale: f32,
}

struct MeshBinding {
    clip: AnimationClip,
    /// Scene object driven by each clip channel
    channel_targets: Vec<Option<ObjectId>>,
    rest_pose: Vec<RestPose>,
    ik: IkSolver,
    physics: Option<SpringBoneSimulator>,
}

struct CameraBinding {
    motion: CameraMotion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AudioState {
    Waiting,
    Playing,
    Paused,
}

struct AudioBinding {
    output: Box<dyn AudioOutput>,
    delay_time: f32,
    state: AudioState,
}

pub struct AnimationHelper {
    meshes: HashMap<ObjectId, MeshBinding>,
    camera: Option<CameraBinding>,
    audio: Option<AudioBinding>,
    enabled: HashMap<Feature, bool>,
    afterglow: f32,
    time: f32,
}

impl AnimationHelper {
    pub fn new(afterglow: f32) -> Self {
        Self {
            meshes: HashMap::new(),
            camera: None,
            audio: None,
            enabled: HashMap::from([
                (Feature::Animation, true),
                (Feature::Ik, true),
                (Feature::Physics, true),
            ]),
            afterglow,
            time: 0.0,
        }
    }

    /// Binds a spawned model to its clip. Channels are matched to nodes by name.
    pub fn add_mesh(
        &mut self,
        scene: &Scene,
        model: &SpawnedModel,
        clip: AnimationClip,
        ik: IkSolver,
        physics: Option<SpringBoneSimulator>,
    ) {
        let channel_targets: Vec<Option<ObjectId>> = clip
            .channels
            .iter()
            .map(|channel| model.find_node(scene, &channel.target))
            .collect();

        let unmatched = channel_targets.iter().filter(|target| target.is_none()).count();
        if unmatched > 0 {
            log::warn!(
                "{} of {} channels in {} match no node",
                unmatched,
                channel_targets.len(),
                clip.name
            );
        }

        let rest_pose = model
            .nodes
            .iter()
            .filter_map(|&object_id| {
                let transform = scene.get_object_transform(object_id)?;
                Some(RestPose {
                    object_id,
                    translation: transform.translation(),
                    rotation: transform.rotation(),
                    scale: transform.scale(),
                })
            })
            .collect();

        log::info!(
            "Bound mesh motion {} ({:.2}s, {} IK chains, {} spring chains)",
            clip.name,
            clip.duration,
            ik.chains().len(),
            physics.as_ref().map_or(0, SpringBoneSimulator::chain_count)
        );

        self.meshes.insert(
            model.root,
            MeshBinding {
                clip,
                channel_targets,
                rest_pose,
                ik,
                physics,
            },
        );
    }

    pub fn add_camera(&mut self, motion: CameraMotion) {
        log::info!(
            "Bound camera motion {} ({:.2}s)",
            motion.clip.name,
            motion.clip.duration
        );
        self.camera = Some(CameraBinding { motion });
    }

    pub fn add_audio(&mut self, output: Box<dyn AudioOutput>, delay_time: f32) {
        self.audio = Some(AudioBinding {
            output,
            delay_time,
            state: AudioState::Waiting,
        });
    }

    pub fn has_camera(&self) -> bool {
        self.camera.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    pub fn enable(&mut self, feature: Feature, enabled: bool) {
        log::debug!("{:?} {}", feature, if enabled { "enabled" } else { "disabled" });
        self.enabled.insert(feature, enabled);
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.enabled.get(&feature).copied().unwrap_or(false)
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    /// Length of one loop: the longest clip or delayed audio track, plus afterglow.
    pub fn loop_duration(&self) -> f32 {
        let clips = self
            .meshes
            .values()
            .map(|mesh| mesh.clip.duration)
            .chain(self.camera.iter().map(|camera| camera.motion.clip.duration));
        let audio = self.audio.iter().map(|audio| {
            audio.delay_time + audio.output.duration().unwrap_or(0.0)
        });

        clips.chain(audio).fold(0.0, f32::max) + self.afterglow
    }

    pub fn update(&mut self, dt: f32, scene: &mut Scene, camera: &mut PerspectiveCamera) {
        let animating = self.is_enabled(Feature::Animation);
        let mut wrapped = false;

        if animating {
            self.time += dt;
            let loop_duration = self.loop_duration();
            if loop_duration > 0.0 && self.time >= loop_duration {
                self.time %= loop_duration;
                wrapped = true;
                log::debug!("Timeline looped after {:.2}s", loop_duration);
            }
        }

        for mesh in self.meshes.values() {
            apply_pose(mesh, scene, self.time);
        }
        scene.update_world_transforms();

        if self.is_enabled(Feature::Ik) {
            for mesh in self.meshes.values() {
                mesh.ik.solve(scene);
            }
        }

        let simulating = self.is_enabled(Feature::Physics);
        for physics in self.meshes.values_mut().filter_map(|mesh| mesh.physics.as_mut()) {
            // Reset even while disabled so re-enabling starts from the looped pose
            if wrapped {
                physics.reset(scene);
            }
            if simulating {
                physics.step(scene, dt);
            }
        }

        if let Some(binding) = &self.camera {
            apply_camera(&binding.motion, self.time, camera);
        }

        if let Some(audio) = &mut self.audio {
            sync_audio(audio, self.time, animating, wrapped);
        }
    }

    pub fn ik_overlay_lines(&self, scene: &Scene, lines: &mut Vec<Line>) {
        for mesh in self.meshes.values() {
            mesh.ik.overlay_lines(scene, lines);
        }
    }

    pub fn physics_overlay_lines(&self, scene: &Scene, lines: &mut Vec<Line>) {
        for physics in self.meshes.values().filter_map(|mesh| mesh.physics.as_ref()) {
            physics.overlay_lines(scene, lines);
        }
    }

    pub fn stop_audio(&mut self) {
        if let Some(audio) = &mut self.audio {
            audio.output.stop();
            audio.state = AudioState::Waiting;
        }
    }
}

fn apply_pose(mesh: &MeshBinding, scene: &mut Scene, time: f32) {
    for rest in &mesh.rest_pose {
        if let Some(object) = scene.objects.get_mut(rest.object_id) {
            object
                .transform
                .set_transform(rest.translation, rest.rotation, rest.scale);
        }
    }

    for (channel, target) in mesh.clip.channels.iter().zip(&mesh.channel_targets) {
        let Some(object) = target.and_then(|id| scene.objects.get_mut(id)) else {
            continue;
        };
        match channel.sample(time) {
            Some(Sample::Translation(translation)) => object.transform.set_translation(translation),
            Some(Sample::Rotation(rotation)) => object.transform.set_rotation(rotation),
            Some(Sample::Scale(scale)) => object.transform.set_scale(scale),
            None => {}
        }
    }
}

fn apply_camera(motion: &CameraMotion, time: f32, camera: &mut PerspectiveCamera) {
    let mut translation = motion.translation;
    let mut rotation = motion.rotation;
    let mut scale = 1.0;

    for channel in &motion.clip.channels {
        match channel.sample(time) {
            Some(Sample::Translation(value)) => translation = value,
            Some(Sample::Rotation(value)) => rotation = value,
            Some(Sample::Scale(value)) => scale = value,
            None => {}
        }
    }

    let world = motion.parent_matrix
        * Mat4::from_scale_rotation_translation(Vec3::splat(scale), rotation, translation);
    let (_, world_rotation, world_translation) = world.to_scale_rotation_translation();

    camera.position = world_translation;
    camera.orientation = world_rotation.normalize();
    if let Some(fov) = motion.fov {
        camera.fov = fov;
    }
}

fn sync_audio(audio: &mut AudioBinding, time: f32, animating: bool, wrapped: bool) {
    if wrapped {
        audio.output.stop();
        audio.state = AudioState::Waiting;
    }

    if !animating {
        if audio.state == AudioState::Playing {
            audio.output.pause();
            audio.state = AudioState::Paused;
        }
        return;
    }

    let due = match audio.state {
        AudioState::Waiting => time >= audio.delay_time,
        AudioState::Paused => true,
        AudioState::Playing => false,
    };

    if due {
        match audio.output.play() {
            Ok(()) => audio.state = AudioState::Playing,
            Err(error) => log::warn!("Audio playback failed: {}", error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::model::ModelAsset;
    use crate::assets::motion::clip_from_gltf_slice;
    use crate::config::{CameraConfig, PhysicsConfig, SpringChainConfig};
    use crate::test_support::{self, AudioCall};
    use std::f32::consts::FRAC_PI_2;
    use std::path::Path;

    struct Fixture {
        scene: Scene,
        model: SpawnedModel,
        camera: PerspectiveCamera,
        helper: AnimationHelper,
    }

    fn fixture() -> Fixture {
        let mut scene = Scene::new();
        let bytes = test_support::character_glb();
        let asset = ModelAsset::from_gltf_slice(Path::new("character.glb"), &bytes).unwrap();
        let model = scene.spawn_model(asset);
        let clip = clip_from_gltf_slice(Path::new("dance.glb"), &test_support::motion_glb()).unwrap();

        let mut helper = AnimationHelper::new(2.0);
        helper.add_mesh(&scene, &model, clip, IkSolver::default(), None);

        Fixture {
            scene,
            model,
            camera: PerspectiveCamera::from_config(&CameraConfig::default(), 1.0),
            helper,
        }
    }

    fn hips_rotation(fixture: &Fixture) -> Quat {
        let hips = fixture.model.find_node(&fixture.scene, "Hips").unwrap();
        fixture.scene.get_object_transform(hips).unwrap().rotation()
    }

    #[test]
    fn test_update_advances_clock_and_samples_clip() {
        let mut f = fixture();

        f.helper.update(0.5, &mut f.scene, &mut f.camera);
        assert!((f.helper.time() - 0.5).abs() < 1e-6);
        assert!(hips_rotation(&f).abs_diff_eq(Quat::from_rotation_y(FRAC_PI_2 / 2.0), 1e-4));

        f.helper.update(0.5, &mut f.scene, &mut f.camera);
        assert!(hips_rotation(&f).abs_diff_eq(test_support::hips_end_rotation(), 1e-4));
    }

    #[test]
    fn test_disabled_animation_freezes_clock() {
        let mut f = fixture();
        f.helper.update(0.25, &mut f.scene, &mut f.camera);

        f.helper.enable(Feature::Animation, false);
        assert!(!f.helper.is_enabled(Feature::Animation));
        f.helper.update(0.5, &mut f.scene, &mut f.camera);

        assert!((f.helper.time() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_loop_includes_afterglow_and_wraps() {
        let mut f = fixture();
        assert!((f.helper.loop_duration() - 3.0).abs() < 1e-6);

        f.helper.update(3.5, &mut f.scene, &mut f.camera);
        assert!((f.helper.time() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_loop_covers_delayed_audio() {
        let mut f = fixture();
        let (output, _) = test_support::mock_output(Some(10.0));
        f.helper.add_audio(output, 160.0 / 30.0);

        let expected = 160.0 / 30.0 + 10.0 + 2.0;
        assert!((f.helper.loop_duration() - expected).abs() < 1e-5);
    }

    #[test]
    fn test_loop_covers_delay_when_audio_length_unknown() {
        let mut f = fixture();
        let (output, _) = test_support::mock_output(None);
        f.helper.add_audio(output, 5.0);

        assert!((f.helper.loop_duration() - 7.0).abs() < 1e-5);
    }

    #[test]
    fn test_audio_waits_for_delay_and_pauses_with_animation() {
        let mut f = fixture();
        let (output, calls) = test_support::mock_output(Some(10.0));
        f.helper.add_audio(output, 1.0);

        f.helper.update(0.5, &mut f.scene, &mut f.camera);
        assert!(calls.borrow().is_empty());

        f.helper.update(0.6, &mut f.scene, &mut f.camera);
        assert_eq!(*calls.borrow(), vec![AudioCall::Play]);

        f.helper.update(0.1, &mut f.scene, &mut f.camera);
        assert_eq!(calls.borrow().len(), 1);

        f.helper.enable(Feature::Animation, false);
        f.helper.update(0.1, &mut f.scene, &mut f.camera);
        f.helper.enable(Feature::Animation, true);
        f.helper.update(0.1, &mut f.scene, &mut f.camera);
        assert_eq!(
            *calls.borrow(),
            vec![AudioCall::Play, AudioCall::Pause, AudioCall::Play]
        );
    }

    #[test]
    fn test_audio_restarts_on_loop() {
        let mut f = fixture();
        let (output, calls) = test_support::mock_output(Some(1.0));
        f.helper.add_audio(output, 0.0);

        // Loop is 1s of clip or audio plus 2s of afterglow
        f.helper.update(0.1, &mut f.scene, &mut f.camera);
        f.helper.update(3.0, &mut f.scene, &mut f.camera);

        assert_eq!(
            *calls.borrow(),
            vec![AudioCall::Play, AudioCall::Stop, AudioCall::Play]
        );
    }

    #[test]
    fn test_loop_resets_springs_while_physics_disabled() {
        let mut scene = Scene::new();
        let bytes = test_support::character_glb();
        let asset = ModelAsset::from_gltf_slice(Path::new("character.glb"), &bytes).unwrap();
        let model = scene.spawn_model(asset);
        let clip = clip_from_gltf_slice(Path::new("dance.glb"), &test_support::motion_glb()).unwrap();

        // Sideways gravity so the Spine -> Hair bone droops off its rest pose
        let config = PhysicsConfig {
            gravity_dir: [1.0, 0.0, 0.0],
            chains: vec![SpringChainConfig {
                root: "Spine".to_string(),
                stiffness: 0.0,
                gravity_power: 1.0,
                drag: 0.4,
                hit_radius: 0.02,
            }],
            ..PhysicsConfig::default()
        };
        let physics =
            SpringBoneSimulator::from_config(&config, &scene, |name| model.find_node(&scene, name));

        let mut helper = AnimationHelper::new(2.0);
        helper.add_mesh(&scene, &model, clip, IkSolver::default(), Some(physics));
        let mut camera = PerspectiveCamera::from_config(&CameraConfig::default(), 1.0);

        let tail = |helper: &AnimationHelper, scene: &Scene| {
            let mut lines = Vec::new();
            helper.physics_overlay_lines(scene, &mut lines);
            lines[0].end
        };

        for _ in 0..30 {
            helper.update(1.0 / 60.0, &mut scene, &mut camera);
        }
        assert!(tail(&helper, &scene).x > 0.05);

        helper.enable(Feature::Physics, false);
        helper.update(3.0, &mut scene, &mut camera);

        let hair = model.find_node(&scene, "Hair").unwrap();
        assert!(tail(&helper, &scene).abs_diff_eq(scene.world_position(hair), 1e-4));
    }

    #[test]
    fn test_camera_follows_motion() {
        let mut f = fixture();
        let motion =
            CameraMotion::from_gltf_slice(Path::new("camera.glb"), &test_support::camera_glb())
                .unwrap();
        f.helper.add_camera(motion);

        f.helper.update(1.0, &mut f.scene, &mut f.camera);
        assert!(f
            .camera
            .position
            .abs_diff_eq(Vec3::new(0.0, 10.0, 40.0), 1e-4));
        assert!((f.camera.fov - 0.5f32.to_degrees()).abs() < 1e-3);
    }

    #[test]
    fn test_feature_flags_default_on() {
        let helper = AnimationHelper::new(0.0);
        assert!(helper.is_enabled(Feature::Animation));
        assert!(helper.is_enabled(Feature::Ik));
        assert!(helper.is_enabled(Feature::Physics));
        assert!(!helper.has_camera());
        assert!(!helper.has_audio());
    }
}

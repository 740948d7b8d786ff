//! Fixtures for unit tests: small glTF binaries built in memory plus mock
//! asset source and audio backend.

use std::cell::RefCell;
use std::collections::HashMap;
use std::f32::consts::FRAC_PI_2;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use glam::{Mat4, Quat, Vec3};

use crate::assets::audio::AudioAsset;
use crate::assets::source::{AssetSource, Progress};
use crate::audio::{AudioBackend, AudioOutput};
use crate::error::{AudioError, LoadError};
use crate::scene_graph::object3d::ObjectId;
use crate::scene_graph::scene::Scene;

const GLB_MAGIC: &[u8; 4] = b"glTF";
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

const FLOAT: u32 = 5126;
const UNSIGNED_SHORT: u32 = 5123;
const UNSIGNED_INT: u32 = 5125;

/// Bind-pose vertices of the character's single triangle. Each vertex is
/// fully weighted to the joint with the same index.
pub const CHARACTER_VERTICES: [Vec3; 3] = [
    Vec3::new(1.0, 1.0, 0.0),
    Vec3::new(0.0, 1.5, 0.5),
    Vec3::new(0.0, 2.0, -0.5),
];

/// Builds the binary chunk and accessor tables of a GLB file.
#[derive(Default)]
struct GlbBuilder {
    bin: Vec<u8>,
    views: Vec<String>,
    accessors: Vec<String>,
}

impl GlbBuilder {
    fn push_view(&mut self, bytes: &[u8]) -> usize {
        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }
        let offset = self.bin.len();
        self.bin.extend_from_slice(bytes);
        self.views.push(format!(
            r#"{{"buffer":0,"byteOffset":{},"byteLength":{}}}"#,
            offset,
            bytes.len()
        ));
        self.views.len() - 1
    }

    fn floats(&mut self, values: &[f32], kind: &str, components: usize) -> usize {
        let view = self.push_view(bytemuck::cast_slice(values));
        let count = values.len() / components;

        let mut min = vec![f32::MAX; components];
        let mut max = vec![f32::MIN; components];
        for element in values.chunks(components) {
            for (i, &value) in element.iter().enumerate() {
                min[i] = min[i].min(value);
                max[i] = max[i].max(value);
            }
        }

        self.accessors.push(format!(
            r#"{{"bufferView":{view},"componentType":{FLOAT},"count":{count},"type":"{kind}","min":{min:?},"max":{max:?}}}"#
        ));
        self.accessors.len() - 1
    }

    fn vec3s(&mut self, values: &[Vec3]) -> usize {
        let flat: Vec<f32> = values.iter().flat_map(|v| v.to_array()).collect();
        self.floats(&flat, "VEC3", 3)
    }

    fn joints(&mut self, values: &[[u16; 4]]) -> usize {
        let view = self.push_view(bytemuck::cast_slice(values));
        self.accessors.push(format!(
            r#"{{"bufferView":{view},"componentType":{UNSIGNED_SHORT},"count":{},"type":"VEC4"}}"#,
            values.len()
        ));
        self.accessors.len() - 1
    }

    fn indices(&mut self, values: &[u32]) -> usize {
        let view = self.push_view(bytemuck::cast_slice(values));
        self.accessors.push(format!(
            r#"{{"bufferView":{view},"componentType":{UNSIGNED_INT},"count":{},"type":"SCALAR"}}"#,
            values.len()
        ));
        self.accessors.len() - 1
    }

    /// `body` holds the remaining top-level JSON members, comma separated.
    fn finish(mut self, body: &str) -> Vec<u8> {
        let json = if self.bin.is_empty() {
            format!(r#"{{"asset":{{"version":"2.0"}},{body}}}"#)
        } else {
            while self.bin.len() % 4 != 0 {
                self.bin.push(0);
            }
            format!(
                r#"{{"asset":{{"version":"2.0"}},{body},"buffers":[{{"byteLength":{}}}],"bufferViews":[{}],"accessors":[{}]}}"#,
                self.bin.len(),
                self.views.join(","),
                self.accessors.join(",")
            )
        };

        let mut json = json.into_bytes();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }

        let mut total = 12 + 8 + json.len();
        if !self.bin.is_empty() {
            total += 8 + self.bin.len();
        }

        let mut glb = Vec::with_capacity(total);
        glb.extend_from_slice(GLB_MAGIC);
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&(total as u32).to_le_bytes());

        glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
        glb.extend_from_slice(&CHUNK_JSON.to_le_bytes());
        glb.extend_from_slice(&json);

        if !self.bin.is_empty() {
            glb.extend_from_slice(&(self.bin.len() as u32).to_le_bytes());
            glb.extend_from_slice(&CHUNK_BIN.to_le_bytes());
            glb.extend_from_slice(&self.bin);
        }

        glb
    }
}

/// First object in the scene with the given name.
pub fn find_object(scene: &Scene, name: &str) -> Option<ObjectId> {
    scene
        .objects
        .iter()
        .find(|(_, object)| object.name == name)
        .map(|(id, _)| id)
}

/// Rotation the Hips node reaches at the end of the motion fixture.
pub fn hips_end_rotation() -> Quat {
    Quat::from_rotation_y(FRAC_PI_2)
}

/// Hips -> Spine -> Hair chain with a skinned triangle on a separate Body node.
pub fn character_glb() -> Vec<u8> {
    let mut builder = GlbBuilder::default();

    let positions = builder.vec3s(&CHARACTER_VERTICES);
    let normals = builder.vec3s(&[Vec3::Z; 3]);
    let joints = builder.joints(&[[0, 0, 0, 0], [1, 0, 0, 0], [2, 0, 0, 0]]);
    let weights = builder.floats(
        &[
            1.0, 0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, 0.0,
        ],
        "VEC4",
        4,
    );
    let indices = builder.indices(&[0, 1, 2]);

    let inverse_binds: Vec<f32> = [1.0, 1.5, 2.0]
        .iter()
        .flat_map(|&y| Mat4::from_translation(Vec3::new(0.0, -y, 0.0)).to_cols_array())
        .collect();
    let inverse_binds = builder.floats(&inverse_binds, "MAT4", 16);

    let body = format!(
        r#""scene":0,"scenes":[{{"nodes":[0,3]}}],
"nodes":[
{{"name":"Hips","translation":[0,1,0],"children":[1]}},
{{"name":"Spine","translation":[0,0.5,0],"children":[2]}},
{{"name":"Hair","translation":[0,0.5,0]}},
{{"name":"Body","mesh":0,"skin":0}}],
"meshes":[{{"name":"Body","primitives":[{{"attributes":{{"POSITION":{positions},"NORMAL":{normals},"JOINTS_0":{joints},"WEIGHTS_0":{weights}}},"indices":{indices}}}]}}],
"skins":[{{"joints":[0,1,2],"inverseBindMatrices":{inverse_binds}}}]"#
    );

    builder.finish(&body)
}

/// A one-second motion turning Hips a quarter turn around Y.
pub fn motion_glb() -> Vec<u8> {
    let mut builder = GlbBuilder::default();

    let times = builder.floats(&[0.0, 1.0], "SCALAR", 1);
    let rotations: Vec<f32> = [Quat::IDENTITY, hips_end_rotation()]
        .iter()
        .flat_map(|q| q.to_array())
        .collect();
    let rotations = builder.floats(&rotations, "VEC4", 4);

    let body = format!(
        r#""scene":0,"scenes":[{{"nodes":[0]}}],
"nodes":[{{"name":"Hips","translation":[0,1,0]}}],
"animations":[{{"name":"dance","channels":[{{"sampler":0,"target":{{"node":0,"path":"rotation"}}}}],
"samplers":[{{"input":{times},"output":{rotations},"interpolation":"LINEAR"}}]}}]"#
    );

    builder.finish(&body)
}

/// A camera dollying from z=50 to z=30 over two seconds.
pub fn camera_glb() -> Vec<u8> {
    let mut builder = GlbBuilder::default();

    let times = builder.floats(&[0.0, 2.0], "SCALAR", 1);
    let translations = builder.vec3s(&[Vec3::new(0.0, 10.0, 50.0), Vec3::new(0.0, 10.0, 30.0)]);

    let body = format!(
        r#""scene":0,"scenes":[{{"nodes":[0]}}],
"nodes":[{{"name":"Camera","camera":0,"translation":[0,10,50]}}],
"cameras":[{{"type":"perspective","perspective":{{"yfov":0.5,"znear":0.1,"zfar":1000}}}}],
"animations":[{{"channels":[{{"sampler":0,"target":{{"node":0,"path":"translation"}}}}],
"samplers":[{{"input":{times},"output":{translations}}}]}}]"#
    );

    builder.finish(&body)
}

/// A single unanimated node and no buffers.
pub fn static_glb() -> Vec<u8> {
    GlbBuilder::default().finish(r#""scene":0,"scenes":[{"nodes":[0]}],"nodes":[{"name":"Stage"}]"#)
}

/// A file without any nodes.
pub fn empty_glb() -> Vec<u8> {
    GlbBuilder::default().finish(r#""scenes":[]"#)
}

/// Mono 16-bit PCM WAV of silence.
pub fn silent_wav(sample_rate: u32, samples: u32) -> Vec<u8> {
    let data_len = samples * 2;
    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.resize(44 + data_len as usize, 0);
    wav
}

/// In-memory asset source recording every fetch.
#[derive(Default)]
pub struct MockSource {
    files: HashMap<PathBuf, Vec<u8>>,
    fetched: Arc<Mutex<Vec<PathBuf>>>,
}

impl MockSource {
    /// Serves the fixtures at the default configured asset paths.
    pub fn with_default_assets() -> Self {
        let mut source = Self::default();
        source.insert("models/character.glb", character_glb());
        source.insert("motions/dance.glb", motion_glb());
        source.insert("motions/dance_camera.glb", camera_glb());
        source.insert("audio/dance.mp3", silent_wav(8000, 8000));
        source
    }

    pub fn insert(&mut self, path: &str, bytes: Vec<u8>) {
        self.files.insert(PathBuf::from(path), bytes);
    }

    pub fn remove(&mut self, path: &str) {
        self.files.remove(Path::new(path));
    }

    pub fn fetched(&self) -> Vec<PathBuf> {
        self.fetched.lock().map(|log| log.clone()).unwrap_or_default()
    }
}

impl AssetSource for MockSource {
    fn fetch(
        &self,
        path: &Path,
        on_progress: &mut (dyn FnMut(Progress) + Send),
    ) -> impl Future<Output = Result<Vec<u8>, LoadError>> + Send {
        if let Ok(mut log) = self.fetched.lock() {
            log.push(path.to_path_buf());
        }

        let result = match self.files.get(path) {
            Some(bytes) => {
                let total = bytes.len() as u64;
                on_progress(Progress {
                    loaded: total / 2,
                    total: Some(total),
                });
                on_progress(Progress {
                    loaded: total,
                    total: Some(total),
                });
                Ok(bytes.clone())
            }
            None => Err(LoadError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such fixture"),
            }),
        };

        std::future::ready(result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCall {
    Play,
    Pause,
    Stop,
}

/// Audio output that records calls instead of making sound.
pub struct MockOutput {
    calls: Rc<RefCell<Vec<AudioCall>>>,
    duration: Option<f32>,
}

impl AudioOutput for MockOutput {
    fn play(&mut self) -> Result<(), AudioError> {
        self.calls.borrow_mut().push(AudioCall::Play);
        Ok(())
    }

    fn pause(&mut self) {
        self.calls.borrow_mut().push(AudioCall::Pause);
    }

    fn stop(&mut self) {
        self.calls.borrow_mut().push(AudioCall::Stop);
    }

    fn duration(&self) -> Option<f32> {
        self.duration
    }
}

#[derive(Default)]
pub struct MockBackend {
    pub calls: Rc<RefCell<Vec<AudioCall>>>,
    pub duration: Option<f32>,
    pub fail: bool,
}

impl MockBackend {
    pub fn with_duration(duration: f32) -> Self {
        Self {
            duration: Some(duration),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<AudioCall> {
        self.calls.borrow().clone()
    }
}

impl AudioBackend for MockBackend {
    fn create_output(
        &self,
        _asset: &AudioAsset,
        _volume: f32,
    ) -> Result<Box<dyn AudioOutput>, AudioError> {
        if self.fail {
            return Err(AudioError::Decode("mock decode failure".to_string()));
        }

        Ok(Box::new(MockOutput {
            calls: Rc::clone(&self.calls),
            duration: self.duration,
        }))
    }
}

/// A bare output for tests that drive the helper directly.
pub fn mock_output(duration: Option<f32>) -> (Box<dyn AudioOutput>, Rc<RefCell<Vec<AudioCall>>>) {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let output = MockOutput {
        calls: Rc::clone(&calls),
        duration,
    };
    (Box::new(output), calls)
}

//! Stage configuration, loaded from TOML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_CONFIG_FILE: &str = "toonstage.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    pub assets: AssetConfig,
    pub audio: AudioConfig,
    pub animation: AnimationConfig,
    pub camera: CameraConfig,
    pub scene: SceneConfig,
    pub outline: OutlineConfig,
    pub ik: IkConfig,
    pub physics: PhysicsConfig,
}

impl StageConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml(&contents)
    }

    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: StageConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `explicit` if given, otherwise `toonstage.toml` from the working
    /// directory, otherwise the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            log::info!("Loading config from {}", path.display());
            return Self::from_file(path);
        }

        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            log::info!("Loading config from {}", default_path.display());
            return Self::from_file(default_path);
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audio.frame_rate <= 0.0 {
            return Err(ConfigError::invalid(
                "audio.frame_rate",
                "frame rate must be greater than 0",
            ));
        }

        if !(0.0..=1.0).contains(&self.audio.volume) {
            return Err(ConfigError::invalid(
                "audio.volume",
                "volume must be between 0 and 1",
            ));
        }

        if self.animation.afterglow < 0.0 {
            return Err(ConfigError::invalid(
                "animation.afterglow",
                "afterglow cannot be negative",
            ));
        }

        if !(self.camera.fov > 0.0 && self.camera.fov < 180.0) {
            return Err(ConfigError::invalid(
                "camera.fov",
                "field of view must be between 0 and 180 degrees",
            ));
        }

        if self.camera.near <= 0.0 || self.camera.far <= self.camera.near {
            return Err(ConfigError::invalid(
                "camera.far",
                "far plane must be beyond a positive near plane",
            ));
        }

        if self.camera.min_distance > self.camera.max_distance {
            return Err(ConfigError::invalid(
                "camera.min_distance",
                "orbit minimum distance exceeds maximum distance",
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory relative asset paths are resolved against
    pub root: PathBuf,
    pub model: PathBuf,
    pub motions: Vec<PathBuf>,
    pub camera_motions: Vec<PathBuf>,
    pub audio: PathBuf,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("assets"),
            model: PathBuf::from("models/character.glb"),
            motions: vec![PathBuf::from("motions/dance.glb")],
            camera_motions: vec![PathBuf::from("motions/dance_camera.glb")],
            audio: PathBuf::from("audio/dance.mp3"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Motion frames to wait before the audio starts
    pub delay_frames: f32,
    pub frame_rate: f32,
    pub volume: f32,
}

impl AudioConfig {
    pub fn delay_time(&self) -> f32 {
        self.delay_frames / self.frame_rate
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            delay_frames: 160.0,
            frame_rate: 30.0,
            volume: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub afterglow: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self { afterglow: 2.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 45.0,
            near: 1.0,
            far: 2000.0,
            position: [0.0, 10.0, 50.0],
            target: [0.0, 10.0, 0.0],
            min_distance: 10.0,
            max_distance: 100.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub background: [f32; 3],
    pub ambient_color: [f32; 3],
    pub ambient_intensity: f32,
    pub light_color: [f32; 3],
    pub light_intensity: f32,
    /// Direction the light shines from, normalized on use
    pub light_position: [f32; 3],
    pub grid_radius: f32,
    pub grid_sectors: u32,
    pub grid_rings: u32,
    pub grid_divisions: u32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        let ambient = 0xbb as f32 / 255.0;
        Self {
            background: [1.0, 1.0, 1.0],
            ambient_color: [ambient, ambient, ambient],
            ambient_intensity: 1.0,
            light_color: [1.0, 1.0, 1.0],
            light_intensity: 1.0,
            light_position: [-1.0, 1.0, 1.0],
            grid_radius: 30.0,
            grid_sectors: 0,
            grid_rings: 8,
            grid_divisions: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineConfig {
    pub thickness: f32,
    pub color: [f32; 3],
    pub alpha: f32,
}

impl Default for OutlineConfig {
    fn default() -> Self {
        Self {
            thickness: 0.003,
            color: [0.0, 0.0, 0.0],
            alpha: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IkConfig {
    pub chains: Vec<IkChainConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IkChainConfig {
    pub target: String,
    pub effector: String,
    /// Links ordered from the effector's parent towards the chain root
    pub links: Vec<IkLinkConfig>,
    #[serde(default = "default_ik_iterations")]
    pub iterations: u32,
    /// Maximum rotation per link per iteration, in radians
    #[serde(default)]
    pub max_angle: Option<f32>,
}

fn default_ik_iterations() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IkLinkConfig {
    pub node: String,
    /// Restricts the link to rotate around this local axis only (knees)
    #[serde(default)]
    pub limitation: Option<[f32; 3]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity_dir: [f32; 3],
    /// Longest step the simulation takes, in seconds
    pub max_step: f32,
    pub chains: Vec<SpringChainConfig>,
    pub colliders: Vec<ColliderConfig>,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity_dir: [0.0, -1.0, 0.0],
            max_step: 0.05,
            chains: Vec::new(),
            colliders: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpringChainConfig {
    /// First bone of the chain; the chain follows first children to a leaf
    pub root: String,
    #[serde(default = "default_stiffness")]
    pub stiffness: f32,
    #[serde(default)]
    pub gravity_power: f32,
    #[serde(default = "default_drag")]
    pub drag: f32,
    #[serde(default = "default_hit_radius")]
    pub hit_radius: f32,
}

fn default_stiffness() -> f32 {
    1.0
}

fn default_drag() -> f32 {
    0.4
}

fn default_hit_radius() -> f32 {
    0.02
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColliderConfig {
    pub node: String,
    #[serde(default)]
    pub offset: [f32; 3],
    pub radius: f32,
}

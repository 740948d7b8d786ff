//! Error types for toonstage

use std::path::PathBuf;

use thiserror::Error;

use crate::assets::load_chain::LoadStep;

/// Top-level error for the stage orchestrator
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Initialization error: {0}")]
    Init(#[from] InitError),

    #[error("Stage was already started")]
    AlreadyStarted,
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Errors raised while fetching or decoding assets
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse glTF {path}: {source}")]
    Gltf { path: PathBuf, source: gltf::Error },

    #[error("{path} contains no nodes")]
    EmptyModel { path: PathBuf },

    #[error("{path} contains no animations")]
    MissingAnimation { path: PathBuf },

    #[error("{path} contains no camera or animated node")]
    MissingCamera { path: PathBuf },

    #[error("No files configured for {0}")]
    NoFiles(LoadStep),

    #[error("Received {got} while waiting for {expected}")]
    UnexpectedStep { expected: String, got: LoadStep },

    #[error("Audio asset could not be bound: {0}")]
    Audio(#[from] AudioError),
}

/// Errors raised by the one-time runtime initialization
#[derive(Error, Debug)]
pub enum InitError {
    #[error("Failed to start async runtime: {0}")]
    Runtime(std::io::Error),

    #[error("Failed to open audio output: {0}")]
    AudioDevice(String),
}

/// Audio playback errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to create sink: {0}")]
    Sink(String),

    #[error("Failed to decode audio: {0}")]
    Decode(String),
}

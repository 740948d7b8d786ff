use std::path::Path;
use std::sync::Arc;

/// Encoded audio, decoded by the audio backend when bound.
#[derive(Debug, Clone)]
pub struct AudioAsset {
    pub name: String,
    pub bytes: Arc<[u8]>,
}

impl AudioAsset {
    pub fn new(path: &Path, bytes: Vec<u8>) -> Self {
        Self {
            name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "audio".to_string()),
            bytes: bytes.into(),
        }
    }
}

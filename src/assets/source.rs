use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::io::AsyncReadExt;

use crate::error::LoadError;

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub loaded: u64,
    /// Unknown when the source cannot tell the size up front
    pub total: Option<u64>,
}

impl Progress {
    pub fn percent(&self) -> Option<f32> {
        match self.total {
            Some(total) if total > 0 => Some(self.loaded as f32 / total as f32 * 100.0),
            _ => None,
        }
    }
}

/// Where asset bytes come from.
pub trait AssetSource: Send + Sync {
    fn fetch(
        &self,
        path: &Path,
        on_progress: &mut (dyn FnMut(Progress) + Send),
    ) -> impl Future<Output = Result<Vec<u8>, LoadError>> + Send;
}

/// Reads assets from a directory on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetSource for FileSource {
    fn fetch(
        &self,
        path: &Path,
        on_progress: &mut (dyn FnMut(Progress) + Send),
    ) -> impl Future<Output = Result<Vec<u8>, LoadError>> + Send {
        let full_path = self.root.join(path);

        async move {
            let io_error = |source| LoadError::Io {
                path: full_path.clone(),
                source,
            };

            let mut file = tokio::fs::File::open(&full_path).await.map_err(io_error)?;
            let total = file.metadata().await.ok().map(|metadata| metadata.len());

            let mut bytes = Vec::with_capacity(total.unwrap_or(0) as usize);
            let mut chunk = vec![0u8; CHUNK_SIZE];
            on_progress(Progress { loaded: 0, total });

            loop {
                let read = file.read(&mut chunk).await.map_err(io_error)?;
                if read == 0 {
                    break;
                }
                bytes.extend_from_slice(&chunk[..read]);
                on_progress(Progress {
                    loaded: bytes.len() as u64,
                    total,
                });
            }

            log::debug!("Read {} bytes from {}", bytes.len(), full_path.display());
            Ok(bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_on<F: Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[test]
    fn test_percent() {
        let progress = Progress {
            loaded: 25,
            total: Some(100),
        };
        assert_eq!(progress.percent(), Some(25.0));
        assert_eq!(Progress { loaded: 25, total: None }.percent(), None);
        assert_eq!(Progress { loaded: 0, total: Some(0) }.percent(), None);
    }

    #[test]
    fn test_file_source_reads_in_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let contents: Vec<u8> = (0..CHUNK_SIZE * 2 + 10).map(|i| i as u8).collect();
        std::fs::write(dir.path().join("clip.bin"), &contents).unwrap();

        let source = FileSource::new(dir.path());
        let mut reports = Vec::new();
        let bytes = block_on(source.fetch(Path::new("clip.bin"), &mut |progress| {
            reports.push(progress)
        }))
        .unwrap();

        assert_eq!(bytes, contents);
        assert_eq!(reports.first().unwrap().loaded, 0);
        let last = reports.last().unwrap();
        assert_eq!(last.loaded, contents.len() as u64);
        assert_eq!(last.percent(), Some(100.0));
        assert!(reports.len() >= 3);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSource::new(dir.path());

        let result = block_on(source.fetch(Path::new("missing.glb"), &mut |_| {}));
        match result {
            Err(LoadError::Io { path, .. }) => assert!(path.ends_with("missing.glb")),
            other => panic!("expected io error, got {:?}", other.map(|bytes| bytes.len())),
        }
    }
}

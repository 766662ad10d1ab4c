use std::io::ErrorKind;
use std::path::Path;

use crate::error::WriteError;

/// Destination for generated artifacts. Each write is independent; a failed
/// write leaves earlier ones in place.
pub trait ArtifactWriter: Send + Sync {
    /// Current contents of `path`, or `None` when it does not exist.
    fn read(&self, path: &Path) -> Result<Option<String>, WriteError>;

    fn write(&self, path: &Path, contents: &str) -> Result<(), WriteError>;
}

/// Writes straight to the filesystem, creating parent directories.
#[derive(Debug, Default, Clone)]
pub struct FsWriter;

impl ArtifactWriter for FsWriter {
    fn read(&self, path: &Path) -> Result<Option<String>, WriteError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(WriteError {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), WriteError> {
        let wrap = |source| WriteError {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(wrap)?;
        }
        std::fs::write(path, contents).map_err(wrap)
    }
}

use std::path::PathBuf;

use thiserror::Error;

use crate::recording::action_model::ParsedRecording;

/// The recording produced no action of a recognised kind. Carries the partial
/// parse so callers can still report the line diagnostics.
#[derive(Debug, Clone, Error)]
#[error("recording contains no recognizable actions ({} line(s) could not be parsed)", .recording.parse_errors.len())]
pub struct EmptyRecordingError {
    pub recording: ParsedRecording,
}

/// Failure to index one source file. Recoverable: the file is skipped.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {reason}", .path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

impl ScanError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ScanError::Io { path, .. } | ScanError::Malformed { path, .. } => path,
        }
    }
}

/// Contract violations on registry use. Never raised for malformed input data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("{0} registry used before initialize()")]
    NotInitialized(&'static str),

    #[error("project root {} does not exist", .0.display())]
    ProjectRootMissing(PathBuf),

    #[error("no step definition at {}:{line_number}", .file_path.display())]
    UnknownStep { file_path: PathBuf, line_number: usize },
}

/// Failure reported by the external generation collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// Worth retrying (network hiccup, overloaded backend).
    #[error("transient generation failure: {0}")]
    Transient(String),

    /// Retrying will not help (bad response, rejected request).
    #[error("generation failed: {0}")]
    Permanent(String),
}

impl GenerationError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GenerationError::Transient(_))
    }
}

#[derive(Debug, Error)]
#[error("failed to write {}: {source}", .path.display())]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("another conversion holds the project lock {} (remove it if no conversion is running)", .0.display())]
    Held(PathBuf),

    #[error("cannot create lock file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Single structured error surfaced by the conversion coordinator.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("{}", empty_recording_message(.0))]
    EmptyRecording(EmptyRecordingError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("generating artifacts for scenario '{scenario}' failed: {source}; {}", generation_hint(.source))]
    Generation {
        scenario: String,
        #[source]
        source: GenerationError,
    },

    #[error("conversion cancelled while waiting for the generation service; nothing was written")]
    Cancelled,
}

impl From<EmptyRecordingError> for ConversionError {
    fn from(e: EmptyRecordingError) -> Self {
        ConversionError::EmptyRecording(e)
    }
}

fn empty_recording_message(e: &EmptyRecordingError) -> String {
    let mut msg = format!("{}", e);
    if let Some(first) = e.recording.parse_errors.first() {
        msg.push_str(&format!(
            "; first problem at line {}: {} (`{}`)",
            first.source_line, first.reason, first.raw_text
        ));
    }
    msg.push_str("; re-record the script or check that it was exported as Playwright Python");
    msg
}

fn generation_hint(e: &GenerationError) -> &'static str {
    if e.is_transient() {
        "try again once the generation service is reachable"
    } else {
        "check the generator configuration and model output"
    }
}

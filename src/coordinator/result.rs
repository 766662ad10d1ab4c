use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::components::component_model::{MergeConflict, MergeStrategy};
use crate::coordinator::artifacts::ArtifactKind;
use crate::recording::action_model::ParseDiagnostic;
use crate::steps::step_model::{BatchDuplicate, NewStep, ReusedStep};

/// Stages of one `convert` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversionState {
    Parsing,
    RegistriesReady,
    Generating,
    Reconciling,
    Writing,
    Done,
    Failed,
}

impl ConversionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConversionState::Done | ConversionState::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentOutcome {
    pub name: String,
    pub strategy: MergeStrategy,
    /// File the component was (or would have been) written to. `None` for a
    /// NOOP unless a conflict names the file that needs review.
    pub file_path: Option<PathBuf>,
    pub added_locators: Vec<String>,
    pub extended_fallbacks: Vec<String>,
    pub added_methods: Vec<String>,
    pub conflicts: Vec<MergeConflict>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WriteStatus {
    Written,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOutcome {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: WriteStatus,
}

/// Summary of a finished conversion. Partial success is expressed through
/// `parse_errors`, conflicts and failed writes rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub scenario: String,
    pub total_steps: usize,
    pub new_steps: Vec<NewStep>,
    pub reused_steps: Vec<ReusedStep>,
    pub duplicate_steps: Vec<BatchDuplicate>,
    pub components: Vec<ComponentOutcome>,
    pub parse_errors: Vec<ParseDiagnostic>,
    /// Files skipped while scanning the registries.
    pub skipped_files: Vec<String>,
    pub writes: Vec<WriteOutcome>,
    pub states: Vec<ConversionState>,
}

impl ConversionResult {
    pub fn new_step_count(&self) -> usize {
        self.new_steps.len()
    }

    pub fn reused_step_count(&self) -> usize {
        self.reused_steps.len()
    }

    pub fn component(&self, name: &str) -> Option<&ComponentOutcome> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn failed_writes(&self) -> impl Iterator<Item = &WriteOutcome> {
        self.writes
            .iter()
            .filter(|w| matches!(w.status, WriteStatus::Failed { .. }))
    }

    /// True when everything parsed and every artifact was written.
    pub fn is_clean(&self) -> bool {
        self.parse_errors.is_empty() && self.failed_writes().next().is_none()
    }
}

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ============================================================================
// Step registry data model
// ============================================================================

/// One indexed step definition (`@given("...")` and friends).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition {
    /// Step text as written, possibly with embedded literals.
    pub raw_pattern: String,
    /// Lower-cased, whitespace-collapsed, placeholders collapsed to `{}`.
    pub normalized_pattern: String,
    pub parameters: Vec<String>,
    pub file_path: PathBuf,
    pub line_number: usize,
    pub usage_count: u32,
    /// Decorator keyword (`given`, `when`, `then`, `step`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    /// Name of the decorated function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
}

impl StepDefinition {
    pub fn step_ref(&self) -> StepRef {
        StepRef {
            file_path: self.file_path.clone(),
            line_number: self.line_number,
        }
    }
}

/// Stable handle to a registry entry: where it is declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRef {
    pub file_path: PathBuf,
    pub line_number: usize,
}

/// An existing step proposed as equivalent to a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReuseCandidate {
    pub target: StepRef,
    pub raw_pattern: String,
    pub similarity_score: f64,
    pub can_reuse_directly: bool,
    pub adaptation_needed: Vec<String>,
}

/// A batch candidate that maps onto an existing step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReusedStep {
    pub index: usize,
    pub pattern: String,
    pub target: StepRef,
    pub similarity_score: f64,
}

/// A batch candidate that needs a new definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStep {
    pub index: usize,
    pub pattern: String,
    pub param_count: usize,
    /// Near matches that were not close enough to reuse directly.
    pub near_matches: Vec<ReuseCandidate>,
}

/// A batch candidate that normalizes identically to an earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDuplicate {
    pub index: usize,
    pub pattern: String,
    pub duplicate_of: usize,
}

/// Result of `StepRegistry::analyze_steps`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepAnalysis {
    pub total_steps: usize,
    pub reusable_steps: Vec<ReusedStep>,
    pub new_steps_needed: Vec<NewStep>,
    pub duplicates_within_batch: Vec<BatchDuplicate>,
}

/// Similarity cut-offs used by `find_reusable`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchThresholds {
    /// Candidates below this score are discarded.
    pub min_similarity: f64,
    /// At or above this score (and equal arity) a candidate is reusable as-is.
    pub exact_threshold: f64,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            min_similarity: 0.75,
            exact_threshold: 0.95,
        }
    }
}

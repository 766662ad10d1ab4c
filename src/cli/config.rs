use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::project::ProjectLayout;
use crate::steps::step_model::MatchThresholds;

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "bdd-recon",
    version,
    about = "Turn recorded Playwright scripts into BDD suites without duplicating steps or page objects"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Ollama API endpoint
    #[arg(long, global = true)]
    pub ollama_endpoint: Option<String>,

    /// Ollama model name
    #[arg(long, global = true)]
    pub ollama_model: Option<String>,

    /// Path to config file (default: bdd-recon.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a recording into feature, step and page object files
    Convert {
        /// Recorded Playwright Python script
        #[arg(long)]
        recording: String,

        /// Scenario name, used for the generated file names
        #[arg(long)]
        scenario: String,

        /// Project root
        #[arg(long, default_value = ".")]
        project: String,

        /// Generator: mock or llm (default from config)
        #[arg(long)]
        generator: Option<String>,

        /// Append a JSONL conversion trace to this file
        #[arg(long)]
        trace: Option<String>,
    },

    /// Parse a recording and print the normalized actions
    Parse {
        /// Recorded Playwright Python script
        #[arg(long)]
        recording: String,

        /// Output format: json or yaml
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Export the step and component registries of a project
    Export {
        /// Project root
        #[arg(long, default_value = ".")]
        project: String,

        /// Output format: json or yaml
        #[arg(long, default_value = "json")]
        format: String,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Show existing steps that match a proposed step pattern
    MatchStep {
        /// Proposed step text
        #[arg(long)]
        pattern: String,

        /// Number of parameters the proposed step takes
        #[arg(long, default_value_t = 0)]
        params: usize,

        /// Project root
        #[arg(long, default_value = ".")]
        project: String,
    },
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

/// Optional YAML config file: `bdd-recon.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default = "default_steps_dir")]
    pub steps_dir: String,

    #[serde(default = "default_components_dir")]
    pub components_dir: String,

    #[serde(default = "default_features_dir")]
    pub features_dir: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            steps_dir: default_steps_dir(),
            components_dir: default_components_dir(),
            features_dir: default_features_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,

    #[serde(default = "default_exact_threshold")]
    pub exact_threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_similarity: default_min_similarity(),
            exact_threshold: default_exact_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_mock")]
    pub kind: String,

    #[serde(default = "default_two")]
    pub max_retries: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            kind: default_mock(),
            max_retries: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OllamaConfig {
    pub endpoint: Option<String>,
    pub model: Option<String>,
}

// Serde default helpers
fn default_steps_dir() -> String { "features/steps".to_string() }
fn default_components_dir() -> String { "pages".to_string() }
fn default_features_dir() -> String { "features".to_string() }
fn default_min_similarity() -> f64 { 0.75 }
fn default_exact_threshold() -> f64 { 0.95 }
fn default_mock() -> String { "mock".to_string() }
fn default_two() -> u32 { 2 }

// ============================================================================
// Config File Loading
// ============================================================================

/// Load config from a YAML file. Returns defaults if file is missing or malformed.
pub fn load_config(path: Option<&str>) -> AppConfig {
    let config_path = path.unwrap_or("bdd-recon.yaml");
    match std::fs::read_to_string(config_path) {
        Ok(content) => serde_yaml::from_str(&content).unwrap_or_else(|e| {
            warn!(path = config_path, error = %e, "malformed config file, using defaults");
            AppConfig::default()
        }),
        Err(_) => AppConfig::default(),
    }
}

// ============================================================================
// Config Builders (merge CLI args with config file)
// ============================================================================

/// Project layout rooted at `root` with the configured directories.
pub fn build_layout(root: &str, project: &ProjectConfig) -> ProjectLayout {
    ProjectLayout {
        root: PathBuf::from(root),
        steps_dir: PathBuf::from(&project.steps_dir),
        components_dir: PathBuf::from(&project.components_dir),
        features_dir: PathBuf::from(&project.features_dir),
    }
}

pub fn build_thresholds(matching: &MatchingConfig) -> MatchThresholds {
    MatchThresholds {
        min_similarity: matching.min_similarity,
        exact_threshold: matching.exact_threshold,
    }
}

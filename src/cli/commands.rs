use std::sync::Arc;

use crate::cli::config::{AppConfig, build_layout, build_thresholds};
use crate::components::registry::ComponentRegistry;
use crate::coordinator::coordinator::{CancellationToken, Coordinator};
use crate::coordinator::generation::{GenerationCollaborator, MockGenerator};
use crate::coordinator::lock::ProjectLock;
use crate::coordinator::ollama::{DEFAULT_ENDPOINT, DEFAULT_MODEL, LlmGenerator, OllamaBackend};
use crate::coordinator::result::{ConversionResult, WriteStatus};
use crate::export::snapshot::RegistrySnapshot;
use crate::recording::python_parser::{PythonScriptParser, ScriptParser};
use crate::steps::registry::StepRegistry;
use crate::trace::logger::TraceLogger;

// ============================================================================
// convert subcommand
// ============================================================================

/// Convert one recording and print a summary. Returns whether the conversion
/// was clean (no parse diagnostics, no failed writes).
pub fn cmd_convert(
    recording_path: &str,
    scenario: &str,
    project: &str,
    generator_name: Option<&str>,
    trace: Option<&str>,
    config: &AppConfig,
    verbose: u8,
    ollama_endpoint: Option<&str>,
    ollama_model: Option<&str>,
) -> Result<bool, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(recording_path)?;
    let layout = build_layout(project, &config.project);
    let generator = build_generator(
        generator_name.unwrap_or(&config.generator.kind),
        config.generator.max_retries,
        ollama_endpoint,
        ollama_model,
    );

    let _lock = ProjectLock::acquire(&layout.root)?;

    let mut steps = StepRegistry::new(&layout.steps_dir).with_thresholds(build_thresholds(&config.matching));
    let mut components = ComponentRegistry::new(&layout.components_dir);

    let mut coordinator = Coordinator::new(layout, &mut steps, &mut components, generator);
    if let Some(path) = trace {
        coordinator = coordinator.with_tracer(TraceLogger::new(path));
    }

    if verbose > 0 {
        eprintln!("Converting {} as '{}'...", recording_path, scenario);
    }

    let result = coordinator.convert(&raw, scenario, &CancellationToken::new())?;
    print_summary(&result, verbose);
    Ok(result.is_clean())
}

fn print_summary(result: &ConversionResult, verbose: u8) {
    println!(
        "Scenario '{}': {} steps ({} new, {} reused, {} duplicate in batch)",
        result.scenario,
        result.total_steps,
        result.new_step_count(),
        result.reused_step_count(),
        result.duplicate_steps.len()
    );

    for component in &result.components {
        println!("  {:?} {}", component.strategy, component.name);
        for conflict in &component.conflicts {
            println!("    conflict: {}", conflict.describe());
        }
    }

    for write in &result.writes {
        match &write.status {
            WriteStatus::Written if verbose > 0 => println!("  wrote {}", write.path.display()),
            WriteStatus::Written => {}
            WriteStatus::Failed { reason } => eprintln!("  FAILED {}: {}", write.path.display(), reason),
        }
    }

    for diag in &result.parse_errors {
        eprintln!("  line {}: {} (`{}`)", diag.source_line, diag.reason, diag.raw_text);
    }
    for skipped in &result.skipped_files {
        eprintln!("  skipped {}", skipped);
    }
}

// ============================================================================
// parse subcommand
// ============================================================================

pub fn cmd_parse(recording_path: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(recording_path)?;
    let recording = PythonScriptParser.parse(&raw)?;

    let output = match format {
        "yaml" => serde_yaml::to_string(&recording)?,
        _ => serde_json::to_string_pretty(&recording)?,
    };
    println!("{}", output);
    Ok(())
}

// ============================================================================
// export subcommand
// ============================================================================

pub fn cmd_export(
    project: &str,
    format: &str,
    output: Option<&str>,
    config: &AppConfig,
    verbose: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    let layout = build_layout(project, &config.project);
    let mut steps = StepRegistry::new(&layout.steps_dir);
    let mut components = ComponentRegistry::new(&layout.components_dir);

    let step_report = steps.initialize(&layout.root)?;
    let component_report = components.initialize(&layout.root)?;
    if verbose > 0 {
        eprintln!(
            "Indexed {} steps from {} files, {} components from {} files",
            step_report.entries,
            step_report.files_scanned,
            component_report.entries,
            component_report.files_scanned
        );
    }

    let snapshot = RegistrySnapshot::from_registries(&steps, &components)?;
    let content = match format {
        "yaml" => snapshot.to_yaml()?,
        _ => snapshot.to_json()?,
    };

    // Write or print
    match output {
        Some(path) => std::fs::write(path, &content)?,
        None => println!("{}", content),
    }
    Ok(())
}

// ============================================================================
// match-step subcommand
// ============================================================================

pub fn cmd_match_step(
    pattern: &str,
    params: usize,
    project: &str,
    config: &AppConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let layout = build_layout(project, &config.project);
    let mut steps = StepRegistry::new(&layout.steps_dir).with_thresholds(build_thresholds(&config.matching));
    steps.initialize(&layout.root)?;

    let candidates = steps.find_reusable(pattern, params)?;
    if candidates.is_empty() {
        println!("No existing step matches '{}' (normalized: '{}')", pattern, steps.normalize(pattern));
        return Ok(());
    }

    for candidate in &candidates {
        println!(
            "{:.2} {} {}:{}  {}",
            candidate.similarity_score,
            if candidate.can_reuse_directly { "REUSE" } else { "ADAPT" },
            candidate.target.file_path.display(),
            candidate.target.line_number,
            candidate.raw_pattern
        );
        for note in &candidate.adaptation_needed {
            println!("       - {}", note);
        }
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Build the generation collaborator based on name.
pub fn build_generator(
    name: &str,
    max_retries: u32,
    ollama_endpoint: Option<&str>,
    ollama_model: Option<&str>,
) -> Arc<dyn GenerationCollaborator> {
    match name {
        "llm" => {
            let endpoint = ollama_endpoint.unwrap_or(DEFAULT_ENDPOINT);
            let model = ollama_model.unwrap_or(DEFAULT_MODEL);
            let backend = OllamaBackend::new(endpoint, model);
            Arc::new(LlmGenerator::new(Box::new(backend)).with_max_retries(max_retries))
        }
        _ => Arc::new(MockGenerator),
    }
}

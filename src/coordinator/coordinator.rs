use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::components::component_model::{MergeConflict, MergeResult, MergeStrategy};
use crate::components::registry::ComponentRegistry;
use crate::components::render::{patch_component, render_component};
use crate::components::scanner::{declares_class, scan_component_source};
use crate::coordinator::artifacts::{ArtifactKind, component_path, feature_path, merge_step_file, steps_path};
use crate::coordinator::generation::{ComponentCandidate, GenerationCollaborator, GenerationOutput};
use crate::coordinator::result::{ComponentOutcome, ConversionResult, ConversionState, WriteOutcome, WriteStatus};
use crate::coordinator::writer::{ArtifactWriter, FsWriter};
use crate::error::{ConversionError, GenerationError, WriteError};
use crate::project::{ProjectLayout, ScanReport};
use crate::recording::action_model::ParsedRecording;
use crate::recording::python_parser::{PythonScriptParser, ScriptParser};
use crate::steps::registry::StepRegistry;
use crate::trace::logger::TraceLogger;
use crate::trace::trace::TraceEvent;

// ============================================================================
// Cooperative cancellation
// ============================================================================

/// Shared flag checked while the coordinator waits on the generation call.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Runs one recording through parse → registries → generation → reconcile
/// → write. Holds the registries of a single project root by exclusive
/// reference for its whole lifetime.
pub struct Coordinator<'r> {
    layout: ProjectLayout,
    steps: &'r mut StepRegistry,
    components: &'r mut ComponentRegistry,
    parser: Box<dyn ScriptParser>,
    generator: Arc<dyn GenerationCollaborator>,
    writer: Box<dyn ArtifactWriter>,
    tracer: Arc<TraceLogger>,
    poll_interval: Duration,
    /// Component files skipped by the last scan.
    unindexed_components: Vec<PathBuf>,
}

struct Run {
    scenario: String,
    tracer: Arc<TraceLogger>,
    states: Vec<ConversionState>,
}

impl Run {
    fn enter(&mut self, state: ConversionState, detail: impl ToString) {
        let detail = detail.to_string();
        info!(scenario = %self.scenario, state = ?state, %detail, "conversion state");
        self.tracer.log(
            &TraceEvent::now(self.states.len() as u64, &self.scenario, state).with_detail(detail),
        );
        self.states.push(state);
    }

    fn fail(&mut self, error: ConversionError) -> ConversionError {
        warn!(scenario = %self.scenario, error = %error, "conversion failed");
        self.tracer.log(
            &TraceEvent::now(self.states.len() as u64, &self.scenario, ConversionState::Failed).with_error(&error),
        );
        self.states.push(ConversionState::Failed);
        error
    }
}

impl<'r> Coordinator<'r> {
    pub fn new(
        layout: ProjectLayout,
        steps: &'r mut StepRegistry,
        components: &'r mut ComponentRegistry,
        generator: Arc<dyn GenerationCollaborator>,
    ) -> Self {
        Self {
            layout,
            steps,
            components,
            parser: Box::new(PythonScriptParser),
            generator,
            writer: Box::new(FsWriter),
            tracer: Arc::new(TraceLogger::disabled()),
            poll_interval: Duration::from_millis(50),
            unindexed_components: Vec::new(),
        }
    }

    pub fn with_parser(mut self, parser: Box<dyn ScriptParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_writer(mut self, writer: Box<dyn ArtifactWriter>) -> Self {
        self.writer = writer;
        self
    }

    pub fn with_tracer(mut self, tracer: TraceLogger) -> Self {
        self.tracer = Arc::new(tracer);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Convert one recording. Errors are fatal to this conversion only;
    /// everything recoverable is reported in the returned result.
    pub fn convert(
        &mut self,
        raw: &str,
        scenario: &str,
        cancel: &CancellationToken,
    ) -> Result<ConversionResult, ConversionError> {
        let mut run = Run {
            scenario: scenario.to_string(),
            tracer: Arc::clone(&self.tracer),
            states: Vec::new(),
        };

        // ---- parse ----
        run.enter(ConversionState::Parsing, self.parser.dialect());
        let recording = match self.parser.parse(raw) {
            Ok(recording) => recording,
            Err(e) => return Err(run.fail(e.into())),
        };

        // ---- registries ----
        let root = self.layout.root.clone();
        let step_report = match self.steps.initialize(&root) {
            Ok(report) => report,
            Err(e) => return Err(run.fail(e.into())),
        };
        let component_report = match self.components.initialize(&root) {
            Ok(report) => report,
            Err(e) => return Err(run.fail(e.into())),
        };
        self.unindexed_components = component_report.skipped.iter().map(|e| e.path().clone()).collect();
        run.enter(
            ConversionState::RegistriesReady,
            format!(
                "{} steps, {} components",
                step_report.entries, component_report.entries
            ),
        );

        // ---- generation ----
        run.enter(ConversionState::Generating, format!("{} actions", recording.actions.len()));
        let output = match generate_cancellable(
            Arc::clone(&self.generator),
            &recording,
            scenario,
            cancel,
            self.poll_interval,
        ) {
            Ok(output) => output,
            Err(Interrupted::Cancelled) => return Err(run.fail(ConversionError::Cancelled)),
            Err(Interrupted::Failed(source)) => {
                return Err(run.fail(ConversionError::Generation {
                    scenario: scenario.to_string(),
                    source,
                }));
            }
        };

        // ---- reconcile steps ----
        run.enter(
            ConversionState::Reconciling,
            format!(
                "{} step candidates, {} component candidates",
                output.step_candidates.len(),
                output.component_candidates.len()
            ),
        );
        let batch: Vec<(String, usize)> = output
            .step_candidates
            .iter()
            .map(|c| (c.pattern.clone(), c.param_count))
            .collect();
        let analysis = match self.steps.analyze_steps(&batch) {
            Ok(analysis) => analysis,
            Err(e) => return Err(run.fail(e.into())),
        };
        for reused in &analysis.reusable_steps {
            if let Err(e) = self.steps.record_reuse(&reused.target) {
                return Err(run.fail(e.into()));
            }
        }

        let mut result = ConversionResult {
            scenario: scenario.to_string(),
            total_steps: analysis.total_steps,
            parse_errors: recording.parse_errors.clone(),
            skipped_files: skipped(&step_report, &component_report),
            ..ConversionResult::default()
        };

        // ---- write ----
        run.enter(ConversionState::Writing, format!("{} new steps", analysis.new_steps_needed.len()));

        if !output.feature_text.trim().is_empty() {
            let path = feature_path(&self.layout, scenario);
            let outcome = self.writer.write(&path, &output.feature_text);
            result.writes.push(write_outcome(ArtifactKind::Feature, path, outcome));
        }

        if !analysis.new_steps_needed.is_empty() {
            let definitions: Vec<&str> = analysis
                .new_steps_needed
                .iter()
                .filter_map(|s| output.step_candidates.get(s.index))
                .map(|c| c.code.as_str())
                .collect();
            let path = steps_path(&self.layout, scenario);
            let outcome = self
                .writer
                .read(&path)
                .map(|existing| merge_step_file(existing.as_deref(), &output.step_imports, &definitions))
                .and_then(|text| self.writer.write(&path, &text));
            result.writes.push(write_outcome(ArtifactKind::Steps, path, outcome));
        }

        for candidate in &output.component_candidates {
            match self.reconcile_component(candidate) {
                Ok((outcome, write)) => {
                    result.components.push(outcome);
                    result.writes.extend(write);
                }
                Err(e) => return Err(run.fail(e)),
            }
        }

        result.new_steps = analysis.new_steps_needed;
        result.reused_steps = analysis.reusable_steps;
        result.duplicate_steps = analysis.duplicates_within_batch;

        let failed = result.failed_writes().count();
        run.enter(
            ConversionState::Done,
            format!(
                "{} new, {} reused, {} failed writes",
                result.new_steps.len(),
                result.reused_steps.len(),
                failed
            ),
        );
        result.states = run.states;
        Ok(result)
    }

    /// Merge one proposed component and write it unless nothing changed.
    fn reconcile_component(
        &mut self,
        candidate: &ComponentCandidate,
    ) -> Result<(ComponentOutcome, Option<WriteOutcome>), ConversionError> {
        let methods = candidate.method_entries();
        let merge = self.components.merge(&candidate.name, &candidate.locators, &methods)?;

        for conflict in &merge.conflicts {
            warn!(component = %candidate.name, "{}", conflict.describe());
        }

        let mut outcome = ComponentOutcome {
            name: candidate.name.clone(),
            strategy: merge.strategy,
            file_path: None,
            added_locators: merge.added_locators.clone(),
            extended_fallbacks: merge.extended_fallbacks.clone(),
            added_methods: merge.added_methods.clone(),
            conflicts: merge.conflicts.clone(),
        };

        let (path, base_type, written) = match merge.strategy {
            MergeStrategy::Noop => {
                debug!(component = %candidate.name, "component unchanged");
                return Ok((outcome, None));
            }
            MergeStrategy::Create => {
                let path = component_path(&self.layout, &candidate.name);
                if let Some(declared_in) = self.unindexed_declaration(&path, &candidate.name) {
                    warn!(
                        component = %candidate.name,
                        file = %declared_in.display(),
                        "component declared in a file that could not be indexed, not writing"
                    );
                    outcome.strategy = MergeStrategy::Noop;
                    outcome.added_locators.clear();
                    outcome.extended_fallbacks.clear();
                    outcome.added_methods.clear();
                    outcome.conflicts.push(MergeConflict::UnindexedDeclaration {
                        path: declared_in.clone(),
                    });
                    outcome.file_path = Some(declared_in);
                    return Ok((outcome, None));
                }
                let rendered = render_component(&candidate.name, candidate.base_type.as_deref(), &merge);
                let written = self.writer.read(&path).and_then(|existing| {
                    let text = match existing {
                        Some(existing) => format!("{}\n\n{}", existing.trim_end(), rendered),
                        None => rendered,
                    };
                    self.writer.write(&path, &text)
                });
                (path, candidate.base_type.clone(), written)
            }
            MergeStrategy::Merge => {
                let (path, base_type) = match self.components.get(&candidate.name)? {
                    Some(existing) => (existing.file_path.clone(), existing.base_type.clone()),
                    None => (component_path(&self.layout, &candidate.name), None),
                };
                let written = self.patch_file(&path, &candidate.name, &merge);
                (path, base_type, written)
            }
        };

        outcome.file_path = Some(path.clone());
        if written.is_ok() {
            self.components.apply_merge(&candidate.name, base_type, &path, &merge)?;
        }
        Ok((outcome, Some(write_outcome(ArtifactKind::Component, path, written))))
    }

    /// The target file or a skipped component file that already declares `name`.
    fn unindexed_declaration(&self, target: &Path, name: &str) -> Option<PathBuf> {
        std::iter::once(target)
            .chain(self.unindexed_components.iter().map(PathBuf::as_path))
            .find(|path| matches!(self.writer.read(path), Ok(Some(source)) if declares_class(&source, name)))
            .map(Path::to_path_buf)
    }

    fn patch_file(
        &self,
        path: &Path,
        name: &str,
        merge: &MergeResult,
    ) -> Result<(), WriteError> {
        let source = self.writer.read(path)?.unwrap_or_default();
        let layout = scan_component_source(path, &source)
            .ok()
            .and_then(|scanned| scanned.into_iter().find(|c| c.definition.name == name))
            .map(|c| c.layout);

        let text = match layout {
            Some(layout) => patch_component(&source, &layout, merge),
            // class vanished since the scan; write it out fresh
            None => format!("{}\n\n{}", source.trim_end(), render_component(name, None, merge)),
        };
        self.writer.write(path, &text)
    }
}

enum Interrupted {
    Cancelled,
    Failed(GenerationError),
}

/// Run the generation call on a worker thread and wait for it while polling
/// the cancellation token. A cancelled call is abandoned; its result is dropped.
fn generate_cancellable(
    generator: Arc<dyn GenerationCollaborator>,
    recording: &ParsedRecording,
    scenario: &str,
    cancel: &CancellationToken,
    poll_interval: Duration,
) -> Result<GenerationOutput, Interrupted> {
    if cancel.is_cancelled() {
        return Err(Interrupted::Cancelled);
    }

    let (tx, rx) = mpsc::channel();
    let recording = recording.clone();
    let scenario = scenario.to_string();
    std::thread::spawn(move || {
        let outcome = generator.generate(&recording, &scenario);
        // receiver may be gone after cancellation
        let _ = tx.send(outcome);
    });

    loop {
        match rx.recv_timeout(poll_interval) {
            Ok(outcome) => {
                if cancel.is_cancelled() {
                    return Err(Interrupted::Cancelled);
                }
                return outcome.map_err(Interrupted::Failed);
            }
            Err(RecvTimeoutError::Timeout) => {
                if cancel.is_cancelled() {
                    return Err(Interrupted::Cancelled);
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(Interrupted::Failed(GenerationError::Permanent(
                    "generation worker exited without a result".to_string(),
                )));
            }
        }
    }
}

fn write_outcome(kind: ArtifactKind, path: PathBuf, outcome: Result<(), WriteError>) -> WriteOutcome {
    let status = match outcome {
        Ok(()) => {
            debug!(path = %path.display(), ?kind, "artifact written");
            WriteStatus::Written
        }
        Err(e) => {
            warn!(error = %e, ?kind, "artifact write failed");
            WriteStatus::Failed { reason: e.to_string() }
        }
    };
    WriteOutcome { kind, path, status }
}

fn skipped(steps: &ScanReport, components: &ScanReport) -> Vec<String> {
    steps
        .skipped
        .iter()
        .chain(&components.skipped)
        .map(|e| e.to_string())
        .collect()
}

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{RegistryError, ScanError};
use crate::project::{ScanReport, python_files};
use crate::steps::normalize::{normalize, similarity, word_diff};
use crate::steps::scanner::scan_step_file;
use crate::steps::step_model::{
    BatchDuplicate, MatchThresholds, NewStep, ReuseCandidate, ReusedStep, StepAnalysis,
    StepDefinition, StepRef,
};

/// Index of the step definitions of one project.
///
/// Constructed explicitly per project and passed by reference; it exclusively
/// owns its entries. Queries take `&self`; `initialize` and `record_reuse`
/// take `&mut self`, so the borrow checker rules out concurrent writers.
#[derive(Debug)]
pub struct StepRegistry {
    steps_dir: PathBuf,
    thresholds: MatchThresholds,
    entries: Vec<StepDefinition>,
    initialized: bool,
}

impl StepRegistry {
    /// `steps_dir` is relative to the project root passed to `initialize`.
    pub fn new(steps_dir: impl Into<PathBuf>) -> Self {
        Self {
            steps_dir: steps_dir.into(),
            thresholds: MatchThresholds::default(),
            entries: Vec::new(),
            initialized: false,
        }
    }

    pub fn with_thresholds(mut self, thresholds: MatchThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Initialised registry over in-memory definitions (no filesystem).
    pub fn seeded(definitions: Vec<StepDefinition>) -> Self {
        Self {
            steps_dir: PathBuf::new(),
            thresholds: MatchThresholds::default(),
            entries: definitions,
            initialized: true,
        }
    }

    /// Scan the step tree and rebuild the index from scratch. Files that
    /// cannot be read or parsed are logged and skipped. Usage counts survive
    /// for entries that are still declared at the same place.
    pub fn initialize(&mut self, project_root: &Path) -> Result<ScanReport, RegistryError> {
        if !project_root.is_dir() {
            return Err(RegistryError::ProjectRootMissing(project_root.to_path_buf()));
        }

        let dir = project_root.join(&self.steps_dir);
        let mut report = ScanReport::default();
        let files = match python_files(&dir) {
            Ok(files) => files,
            Err(source) => {
                warn!(dir = %dir.display(), error = %source, "cannot list step directory");
                report.skipped.push(ScanError::Io { path: dir, source });
                Vec::new()
            }
        };

        let previous: HashMap<(PathBuf, usize, String), u32> = self
            .entries
            .drain(..)
            .map(|e| ((e.file_path, e.line_number, e.normalized_pattern), e.usage_count))
            .collect();

        let mut entries = Vec::new();
        for file in files {
            report.files_scanned += 1;
            match scan_step_file(&file) {
                Ok(defs) => {
                    debug!(file = %file.display(), steps = defs.len(), "indexed step file");
                    entries.extend(defs);
                }
                Err(e) => {
                    warn!(error = %e, "skipping step file");
                    report.skipped.push(e);
                }
            }
        }

        for entry in &mut entries {
            let key = (entry.file_path.clone(), entry.line_number, entry.normalized_pattern.clone());
            if let Some(count) = previous.get(&key) {
                entry.usage_count = *count;
            }
        }

        report.entries = entries.len();
        self.entries = entries;
        self.initialized = true;

        info!(
            entries = report.entries,
            files = report.files_scanned,
            skipped = report.skipped.len(),
            "step registry initialized"
        );
        Ok(report)
    }

    /// See [`crate::steps::normalize::normalize`].
    pub fn normalize(&self, pattern: &str) -> String {
        normalize(pattern)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn entries(&self) -> Result<&[StepDefinition], RegistryError> {
        self.ensure_initialized()?;
        Ok(&self.entries)
    }

    pub fn get(&self, step: &StepRef) -> Option<&StepDefinition> {
        self.entries
            .iter()
            .find(|e| e.file_path == step.file_path && e.line_number == step.line_number)
    }

    /// Ranked reuse candidates for a proposed step pattern.
    pub fn find_reusable(
        &self,
        candidate_pattern: &str,
        candidate_param_count: usize,
    ) -> Result<Vec<ReuseCandidate>, RegistryError> {
        self.ensure_initialized()?;
        let normalized = normalize(candidate_pattern);

        let mut candidates: Vec<ReuseCandidate> = self
            .entries
            .iter()
            .filter_map(|entry| self.score(entry, &normalized, candidate_param_count))
            .collect();

        candidates.sort_by(|a, b| {
            b.similarity_score
                .total_cmp(&a.similarity_score)
                .then_with(|| b.can_reuse_directly.cmp(&a.can_reuse_directly))
                .then_with(|| a.target.cmp(&b.target))
        });

        Ok(candidates)
    }

    fn score(&self, entry: &StepDefinition, normalized: &str, param_count: usize) -> Option<ReuseCandidate> {
        let arity_matches = entry.parameters.len() == param_count;

        let score = if entry.normalized_pattern == normalized {
            1.0
        } else {
            similarity(&entry.normalized_pattern, normalized)
        };
        if score < self.thresholds.min_similarity {
            return None;
        }

        let can_reuse_directly = score >= self.thresholds.exact_threshold && arity_matches;

        let mut adaptation_needed = Vec::new();
        if entry.normalized_pattern != normalized {
            adaptation_needed.extend(word_diff(&entry.normalized_pattern, normalized));
        }
        if !arity_matches {
            adaptation_needed.push(format!(
                "parameter count differs: existing step takes {}, candidate needs {}",
                entry.parameters.len(),
                param_count
            ));
        }
        if !can_reuse_directly && adaptation_needed.is_empty() {
            adaptation_needed.push(format!(
                "similarity {:.2} is below the reuse threshold {:.2}",
                score, self.thresholds.exact_threshold
            ));
        }

        Some(ReuseCandidate {
            target: entry.step_ref(),
            raw_pattern: entry.raw_pattern.clone(),
            similarity_score: score,
            can_reuse_directly,
            adaptation_needed,
        })
    }

    /// Batch form of `find_reusable` that also folds candidates which
    /// normalize identically within the batch.
    pub fn analyze_steps(&self, candidates: &[(String, usize)]) -> Result<StepAnalysis, RegistryError> {
        self.ensure_initialized()?;

        let mut analysis = StepAnalysis {
            total_steps: candidates.len(),
            ..StepAnalysis::default()
        };
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (index, (pattern, param_count)) in candidates.iter().enumerate() {
            let normalized = normalize(pattern);
            if let Some(&first) = seen.get(&normalized) {
                analysis.duplicates_within_batch.push(BatchDuplicate {
                    index,
                    pattern: pattern.clone(),
                    duplicate_of: first,
                });
                continue;
            }
            seen.insert(normalized, index);

            let ranked = self.find_reusable(pattern, *param_count)?;
            match ranked.first() {
                Some(best) if best.can_reuse_directly => analysis.reusable_steps.push(ReusedStep {
                    index,
                    pattern: pattern.clone(),
                    target: best.target.clone(),
                    similarity_score: best.similarity_score,
                }),
                _ => analysis.new_steps_needed.push(NewStep {
                    index,
                    pattern: pattern.clone(),
                    param_count: *param_count,
                    near_matches: ranked,
                }),
            }
        }

        Ok(analysis)
    }

    /// Increment the usage count of one entry.
    pub fn record_reuse(&mut self, step: &StepRef) -> Result<(), RegistryError> {
        self.ensure_initialized()?;
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.file_path == step.file_path && e.line_number == step.line_number)
            .ok_or_else(|| RegistryError::UnknownStep {
                file_path: step.file_path.clone(),
                line_number: step.line_number,
            })?;
        entry.usage_count += 1;
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<(), RegistryError> {
        if self.initialized {
            Ok(())
        } else {
            Err(RegistryError::NotInitialized("step"))
        }
    }
}

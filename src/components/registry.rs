use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::components::component_model::{
    ComponentDefinition, LocatorEntry, MergeConflict, MergeResult, MergeStrategy, MethodEntry,
};
use crate::components::scanner::scan_component_file;
use crate::error::{RegistryError, ScanError};
use crate::project::{ScanReport, python_files};

/// Index of the UI component definitions (page objects) of one project.
///
/// Constructed explicitly per project root; exclusively owns its entries.
/// `merge` is a pure computation over the index and never writes files.
#[derive(Debug)]
pub struct ComponentRegistry {
    components_dir: PathBuf,
    entries: BTreeMap<String, ComponentDefinition>,
    initialized: bool,
}

impl ComponentRegistry {
    /// `components_dir` is relative to the project root passed to `initialize`.
    pub fn new(components_dir: impl Into<PathBuf>) -> Self {
        Self {
            components_dir: components_dir.into(),
            entries: BTreeMap::new(),
            initialized: false,
        }
    }

    /// Initialised registry over in-memory definitions (no filesystem).
    pub fn seeded(definitions: Vec<ComponentDefinition>) -> Self {
        Self {
            components_dir: PathBuf::new(),
            entries: definitions.into_iter().map(|d| (d.name.clone(), d)).collect(),
            initialized: true,
        }
    }

    /// Scan the component tree and rebuild the index from scratch.
    pub fn initialize(&mut self, project_root: &Path) -> Result<ScanReport, RegistryError> {
        if !project_root.is_dir() {
            return Err(RegistryError::ProjectRootMissing(project_root.to_path_buf()));
        }

        let dir = project_root.join(&self.components_dir);
        let mut report = ScanReport::default();
        let files = match python_files(&dir) {
            Ok(files) => files,
            Err(source) => {
                warn!(dir = %dir.display(), error = %source, "cannot list component directory");
                report.skipped.push(ScanError::Io { path: dir, source });
                Vec::new()
            }
        };

        let mut entries: BTreeMap<String, ComponentDefinition> = BTreeMap::new();
        for file in files {
            report.files_scanned += 1;
            let scanned = match scan_component_file(&file) {
                Ok(scanned) => scanned,
                Err(e) => {
                    warn!(error = %e, "skipping component file");
                    report.skipped.push(e);
                    continue;
                }
            };

            debug!(file = %file.display(), components = scanned.len(), "indexed component file");
            for component in scanned {
                let def = component.definition;
                if let Some(existing) = entries.get(&def.name) {
                    warn!(
                        component = %def.name,
                        first = %existing.file_path.display(),
                        duplicate = %def.file_path.display(),
                        "duplicate component name, keeping the first declaration"
                    );
                    continue;
                }
                entries.insert(def.name.clone(), def);
            }
        }

        report.entries = entries.len();
        self.entries = entries;
        self.initialized = true;

        info!(
            entries = report.entries,
            files = report.files_scanned,
            skipped = report.skipped.len(),
            "component registry initialized"
        );
        Ok(report)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn exists(&self, name: &str) -> Result<bool, RegistryError> {
        self.ensure_initialized()?;
        Ok(self.entries.contains_key(name))
    }

    pub fn get(&self, name: &str) -> Result<Option<&ComponentDefinition>, RegistryError> {
        self.ensure_initialized()?;
        Ok(self.entries.get(name))
    }

    /// All components, ordered by name.
    pub fn components(&self) -> Result<impl Iterator<Item = &ComponentDefinition>, RegistryError> {
        self.ensure_initialized()?;
        Ok(self.entries.values())
    }

    /// Merge a proposal into the existing definition of `name`.
    ///
    /// Primary descriptors are never replaced: a differing descriptor for a
    /// known element becomes a fallback. Items that would duplicate an element
    /// or overwrite a method body are excluded and reported as conflicts.
    /// A proposal for an unknown component goes through the same rules
    /// against an empty definition, so repeated names inside it collapse.
    pub fn merge(
        &self,
        name: &str,
        proposed_locators: &[LocatorEntry],
        proposed_methods: &[MethodEntry],
    ) -> Result<MergeResult, RegistryError> {
        self.ensure_initialized()?;

        let existing = self.entries.get(name);
        let mut merged_locators = existing.map(|e| e.locators.clone()).unwrap_or_default();
        let mut merged_methods = existing.map(|e| e.methods.clone()).unwrap_or_default();
        let mut added_locators: Vec<String> = Vec::new();
        let mut extended_fallbacks = Vec::new();
        let mut added_methods = Vec::new();
        let mut conflicts = Vec::new();

        for proposed in proposed_locators {
            if let Some(entry) = merged_locators
                .iter_mut()
                .find(|l| l.element_name == proposed.element_name)
            {
                let mut extended = false;
                for descriptor in std::iter::once(&proposed.descriptor).chain(&proposed.fallbacks) {
                    if *descriptor != entry.descriptor && !entry.fallbacks.contains(descriptor) {
                        entry.fallbacks.push(descriptor.clone());
                        extended = true;
                    }
                }
                if extended
                    && !added_locators.contains(&proposed.element_name)
                    && !extended_fallbacks.contains(&proposed.element_name)
                {
                    extended_fallbacks.push(proposed.element_name.clone());
                }
                continue;
            }

            if let Some(other) = merged_locators
                .iter()
                .find(|l| l.descriptor == proposed.descriptor)
            {
                conflicts.push(MergeConflict::DuplicateLocator {
                    element_name: proposed.element_name.clone(),
                    existing_element: other.element_name.clone(),
                    descriptor: proposed.descriptor.clone(),
                });
                continue;
            }

            merged_locators.push(proposed.clone());
            added_locators.push(proposed.element_name.clone());
        }

        for proposed in proposed_methods {
            match merged_methods
                .iter()
                .find(|m| m.method_name == proposed.method_name)
            {
                Some(current) if current.body_hash == proposed.body_hash => {}
                Some(current) => conflicts.push(MergeConflict::MethodBodyConflict {
                    method_name: proposed.method_name.clone(),
                    existing_hash: current.body_hash.clone(),
                    proposed_hash: proposed.body_hash.clone(),
                }),
                None => {
                    merged_methods.push(proposed.clone());
                    added_methods.push(proposed.method_name.clone());
                }
            }
        }

        let strategy = if existing.is_none() {
            MergeStrategy::Create
        } else if !added_locators.is_empty() || !extended_fallbacks.is_empty() || !added_methods.is_empty() {
            MergeStrategy::Merge
        } else {
            MergeStrategy::Noop
        };

        Ok(MergeResult {
            strategy,
            merged_locators,
            merged_methods,
            added_locators,
            extended_fallbacks,
            added_methods,
            conflicts,
        })
    }

    /// Record a merge outcome in the index once it has been written, so later
    /// proposals in the same run see it.
    pub fn apply_merge(
        &mut self,
        name: &str,
        base_type: Option<String>,
        file_path: &Path,
        result: &MergeResult,
    ) -> Result<(), RegistryError> {
        self.ensure_initialized()?;

        match result.strategy {
            MergeStrategy::Noop => {}
            MergeStrategy::Create => {
                self.entries.insert(
                    name.to_string(),
                    ComponentDefinition {
                        name: name.to_string(),
                        base_type,
                        locators: result.merged_locators.clone(),
                        methods: result.merged_methods.clone(),
                        file_path: file_path.to_path_buf(),
                    },
                );
            }
            MergeStrategy::Merge => {
                if let Some(entry) = self.entries.get_mut(name) {
                    entry.locators = result.merged_locators.clone();
                    entry.methods = result.merged_methods.clone();
                }
            }
        }
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<(), RegistryError> {
        if self.initialized {
            Ok(())
        } else {
            Err(RegistryError::NotInitialized("component"))
        }
    }
}

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::recording::action_model::LocatorDescriptor;

// ============================================================================
// Component (page object) registry data model
// ============================================================================

/// A named element locator with its ordered fallbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocatorEntry {
    pub element_name: String,
    pub descriptor: LocatorDescriptor,
    #[serde(default)]
    pub fallbacks: Vec<LocatorDescriptor>,
}

impl LocatorEntry {
    pub fn new(element_name: impl Into<String>, descriptor: LocatorDescriptor) -> Self {
        Self {
            element_name: element_name.into(),
            descriptor,
            fallbacks: Vec::new(),
        }
    }
}

/// An interaction method. Equivalence is decided by `body_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodEntry {
    pub method_name: String,
    pub parameter_names: Vec<String>,
    pub body_hash: String,
    /// Dedented body text, kept so merged methods can be written back.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
}

impl MethodEntry {
    pub fn from_body(method_name: impl Into<String>, parameter_names: Vec<String>, body: &str) -> Self {
        Self {
            method_name: method_name.into(),
            parameter_names,
            body_hash: body_hash(body),
            body: body.to_string(),
        }
    }
}

/// One UI component declaration (e.g. a page object class).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_type: Option<String>,
    pub locators: Vec<LocatorEntry>,
    pub methods: Vec<MethodEntry>,
    pub file_path: PathBuf,
}

impl ComponentDefinition {
    pub fn locator(&self, element_name: &str) -> Option<&LocatorEntry> {
        self.locators.iter().find(|l| l.element_name == element_name)
    }

    pub fn method(&self, method_name: &str) -> Option<&MethodEntry> {
        self.methods.iter().find(|m| m.method_name == method_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeStrategy {
    Create,
    Merge,
    Noop,
}

/// A proposed item excluded from a merge because it would lose or duplicate data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MergeConflict {
    /// A new element name points at an element that already has a name.
    DuplicateLocator {
        element_name: String,
        existing_element: String,
        descriptor: LocatorDescriptor,
    },

    /// Same method name, different body. Needs manual review.
    MethodBodyConflict {
        method_name: String,
        existing_hash: String,
        proposed_hash: String,
    },

    /// The component is already declared in a file that could not be indexed.
    UnindexedDeclaration { path: PathBuf },
}

impl MergeConflict {
    pub fn describe(&self) -> String {
        match self {
            MergeConflict::DuplicateLocator {
                element_name,
                existing_element,
                ..
            } => format!(
                "locator '{}' targets the same element as existing '{}'; not added",
                element_name, existing_element
            ),
            MergeConflict::MethodBodyConflict { method_name, .. } => format!(
                "method '{}' already exists with a different body; review manually",
                method_name
            ),
            MergeConflict::UnindexedDeclaration { path } => format!(
                "already declared in {}, which could not be indexed; not written, review manually",
                path.display()
            ),
        }
    }
}

/// Result of `ComponentRegistry::merge`. `merged_*` hold the full resulting
/// sets; the `added_*` lists name what is net-new.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    pub strategy: MergeStrategy,
    pub merged_locators: Vec<LocatorEntry>,
    pub merged_methods: Vec<MethodEntry>,
    pub added_locators: Vec<String>,
    pub extended_fallbacks: Vec<String>,
    pub added_methods: Vec<String>,
    pub conflicts: Vec<MergeConflict>,
}

/// SHA-1 of a method body with blank lines and comments removed, dedented to
/// its least indented line. Relative indentation is part of the hash.
pub fn body_hash(body: &str) -> String {
    use sha1::{Digest, Sha1};

    let code: Vec<&str> = body
        .lines()
        .map(str::trim_end)
        .filter(|l| {
            let t = l.trim_start();
            !t.is_empty() && !t.starts_with('#')
        })
        .collect();
    let indent = code
        .iter()
        .map(|l| l.len() - l.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);
    let canonical = code
        .iter()
        .map(|l| &l[indent..])
        .collect::<Vec<_>>()
        .join("\n");

    let mut hasher = Sha1::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

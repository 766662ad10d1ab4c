use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::project::{ProjectLayout, slugify};

/// Kind of file a conversion produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Feature,
    Steps,
    Component,
}

pub fn feature_path(layout: &ProjectLayout, scenario: &str) -> PathBuf {
    layout.features_path().join(format!("{}.feature", slugify(scenario)))
}

pub fn steps_path(layout: &ProjectLayout, scenario: &str) -> PathBuf {
    layout.steps_path().join(format!("{}_steps.py", slugify(scenario)))
}

pub fn component_path(layout: &ProjectLayout, component: &str) -> PathBuf {
    layout.components_path().join(format!("{}.py", slugify(component)))
}

fn is_import(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("import ") || t.starts_with("from ")
}

/// Step definitions file with `definitions` appended to `existing`.
///
/// Existing text is kept as is. Imports not yet present are inserted after
/// the leading import block (or at the top of a new file).
pub fn merge_step_file(existing: Option<&str>, imports: &[String], definitions: &[&str]) -> String {
    let existing = existing.unwrap_or("");
    let mut lines: Vec<String> = existing.lines().map(str::to_string).collect();

    let missing: Vec<&String> = imports
        .iter()
        .filter(|imp| !lines.iter().any(|l| l.trim() == imp.trim()))
        .collect();

    if !missing.is_empty() {
        // end of the leading block of imports, comments and blank lines
        let mut insert_at = 0;
        for (idx, line) in lines.iter().enumerate() {
            let t = line.trim();
            if is_import(line) {
                insert_at = idx + 1;
            } else if !(t.is_empty() || t.starts_with('#')) {
                break;
            }
        }
        let needs_gap = insert_at == 0 && !lines.is_empty();
        let mut block: Vec<String> = missing.iter().map(|s| s.trim().to_string()).collect();
        if needs_gap {
            block.push(String::new());
        }
        lines.splice(insert_at..insert_at, block);
    }

    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }

    for definition in definitions {
        lines.push(String::new());
        lines.push(String::new());
        lines.extend(definition.trim_end().lines().map(str::to_string));
    }

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

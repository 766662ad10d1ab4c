use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Where a BDD project keeps its generated artifacts, relative to the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub steps_dir: PathBuf,
    pub components_dir: PathBuf,
    pub features_dir: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            steps_dir: PathBuf::from("features/steps"),
            components_dir: PathBuf::from("pages"),
            features_dir: PathBuf::from("features"),
        }
    }

    pub fn steps_path(&self) -> PathBuf {
        self.root.join(&self.steps_dir)
    }

    pub fn components_path(&self) -> PathBuf {
        self.root.join(&self.components_dir)
    }

    pub fn features_path(&self) -> PathBuf {
        self.root.join(&self.features_dir)
    }
}

/// Outcome of a registry scan.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub files_scanned: usize,
    pub entries: usize,
    pub skipped: Vec<ScanError>,
}

/// All `*.py` files below `dir`, recursively, in sorted order. A missing
/// directory yields an empty list.
pub fn python_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !dir.is_dir() {
        return Ok(files);
    }

    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                let hidden = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with('.') || n == "__pycache__");
                if !hidden {
                    pending.push(path);
                }
            } else if path.extension().is_some_and(|e| e == "py") {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Turn a scenario or component name into a safe snake_case file stem.
pub fn slugify(name: &str) -> String {
    let mut out = String::new();
    let mut prev_lower = false;

    for c in name.chars() {
        if c.is_alphanumeric() {
            if c.is_uppercase() && prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        } else {
            if !out.ends_with('_') && !out.is_empty() {
                out.push('_');
            }
            prev_lower = false;
        }
    }

    out.trim_matches('_').to_string()
}

/// Count of `open` minus `close` outside string literals.
pub(crate) fn bracket_balance(text: &str) -> i32 {
    let mut depth = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in text.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '#' => break,
            _ => {}
        }
    }

    depth
}

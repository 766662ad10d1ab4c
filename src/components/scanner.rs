use std::collections::HashMap;
use std::path::Path;

use crate::components::component_model::{ComponentDefinition, LocatorEntry, MethodEntry};
use crate::error::ScanError;
use crate::project::bracket_balance;
use crate::recording::call_chain::{Expr, parse_statement, signature_parameters};
use crate::recording::python_parser::{LOCATOR_BUILDERS, resolve_locator};

/// Line positions inside a component class, used to patch the source file
/// without re-rendering it. All line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLayout {
    pub header_line: usize,
    /// Last non-blank line belonging to the class.
    pub end_line: usize,
    /// Indentation of class members (`def`, class attributes).
    pub member_indent: usize,
    /// Last non-blank line of `__init__`, with the indentation of its body.
    pub init_end: Option<(usize, usize)>,
    /// Element name → (first line, last line) of its assignment.
    pub locator_lines: HashMap<String, (usize, usize)>,
    /// Receiver expression used by existing locators (`page`, `self.page`).
    pub page_expr: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScannedComponent {
    pub definition: ComponentDefinition,
    pub layout: ClassLayout,
}

/// Read and index one component source file.
pub fn scan_component_file(path: &Path) -> Result<Vec<ScannedComponent>, ScanError> {
    let source = std::fs::read_to_string(path).map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    scan_component_source(path, &source)
}

/// Extract one component per top-level `class` declaration in `source`.
pub fn scan_component_source(path: &Path, source: &str) -> Result<Vec<ScannedComponent>, ScanError> {
    let lines: Vec<&str> = source.lines().collect();
    let mut components = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if indentation(line) == 0 && line.starts_with("class ") {
            let end = class_end(&lines, i);
            components.push(scan_class(path, &lines, i, end)?);
            i = end + 1;
        } else {
            i += 1;
        }
    }

    Ok(components)
}

/// True when `source` has a top-level `class <name>` statement. Works on files
/// the scanner rejects.
pub fn declares_class(source: &str, name: &str) -> bool {
    source.lines().any(|line| {
        line.strip_prefix("class ")
            .and_then(|rest| rest.trim_start().strip_prefix(name))
            .is_some_and(|tail| tail.trim_start().starts_with(['(', ':']))
    })
}

fn malformed(path: &Path, line: usize, reason: impl Into<String>) -> ScanError {
    ScanError::Malformed {
        path: path.to_path_buf(),
        line,
        reason: reason.into(),
    }
}

/// Index (0-based) of the last non-blank line of the class starting at `start`.
fn class_end(lines: &[&str], start: usize) -> usize {
    let mut end = start;
    for (j, line) in lines.iter().enumerate().skip(start + 1) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if indentation(line) == 0 && !trimmed.starts_with('#') {
            break;
        }
        end = j;
    }
    end
}

fn scan_class(path: &Path, lines: &[&str], start: usize, end: usize) -> Result<ScannedComponent, ScanError> {
    let header = lines[start].trim();
    let (name, base_type) = parse_class_header(header).ok_or_else(|| malformed(path, start + 1, "malformed class header"))?;

    let member_indent = lines[start + 1..=end]
        .iter()
        .find(|l| !l.trim().is_empty() && !l.trim().starts_with('#'))
        .map(|l| indentation(l))
        .unwrap_or(4);

    let mut layout = ClassLayout {
        header_line: start + 1,
        end_line: end + 1,
        member_indent,
        init_end: None,
        locator_lines: HashMap::new(),
        page_expr: None,
    };
    let mut locators: Vec<LocatorEntry> = Vec::new();
    let mut methods: Vec<MethodEntry> = Vec::new();

    let mut i = start + 1;
    while i <= end {
        let line = lines[i];
        let trimmed = line.trim();

        if indentation(line) == member_indent && (trimmed.starts_with("def ") || trimmed.starts_with("async def ")) {
            // signature may span several lines
            let mut signature = trimmed.to_string();
            let mut sig_end = i;
            while (bracket_balance(&signature) > 0 || !without_comment(&signature).ends_with(':')) && sig_end < end {
                sig_end += 1;
                signature.push(' ');
                signature.push_str(lines[sig_end].trim());
            }

            let (method_name, params) = parse_signature(&signature)
                .ok_or_else(|| malformed(path, i + 1, "malformed method signature"))?;

            let body_start = sig_end + 1;
            let mut body_end = sig_end;
            for (j, l) in lines.iter().enumerate().take(end + 1).skip(body_start) {
                if l.trim().is_empty() {
                    continue;
                }
                if indentation(l) <= member_indent {
                    break;
                }
                body_end = j;
            }

            let body_lines: &[&str] = if body_end > sig_end {
                &lines[body_start..=body_end]
            } else {
                &[]
            };
            let body_indent = body_lines
                .iter()
                .filter(|l| !l.trim().is_empty())
                .map(|l| indentation(l))
                .min()
                .unwrap_or(member_indent + 4);

            // locators live anywhere in the class, most often in __init__
            for line_idx in body_start..body_start + body_lines.len() {
                if let Some(entry) = locator_assignment(path, lines, line_idx, end, &mut layout)? {
                    if !locators.iter().any(|e| e.element_name == entry.element_name) {
                        locators.push(entry);
                    }
                }
            }

            if method_name == "__init__" {
                if body_end > sig_end {
                    layout.init_end = Some((body_end + 1, body_indent));
                }
            } else {
                let body = dedent(body_lines, body_indent);
                methods.push(MethodEntry::from_body(method_name, params, &body));
            }

            i = body_end.max(sig_end) + 1;
            continue;
        }

        if let Some(entry) = locator_assignment(path, lines, i, end, &mut layout)? {
            if !locators.iter().any(|e| e.element_name == entry.element_name) {
                locators.push(entry);
            }
        }
        i += 1;
    }

    Ok(ScannedComponent {
        definition: ComponentDefinition {
            name,
            base_type,
            locators,
            methods,
            file_path: path.to_path_buf(),
        },
        layout,
    })
}

/// `self.<name> = <page>.<builder>(...)` → locator entry. Other assignments
/// are not locators and yield `None`.
fn locator_assignment(
    path: &Path,
    lines: &[&str],
    idx: usize,
    end: usize,
    layout: &mut ClassLayout,
) -> Result<Option<LocatorEntry>, ScanError> {
    let trimmed = lines[idx].trim();
    if !trimmed.starts_with("self.") || !trimmed.contains('=') {
        return Ok(None);
    }

    let mut text = trimmed.to_string();
    let mut last = idx;
    while bracket_balance(&text) > 0 && last < end {
        last += 1;
        text.push(' ');
        text.push_str(lines[last].trim());
    }

    let looks_like_locator = LOCATOR_BUILDERS
        .iter()
        .any(|b| text.contains(&format!(".{}(", b)));

    let statement = match parse_statement(&text) {
        Ok(s) => s,
        Err(e) if looks_like_locator => {
            return Err(malformed(path, idx + 1, format!("unreadable locator assignment: {}", e)));
        }
        Err(_) => return Ok(None),
    };

    let (Some(target), Expr::Chain(value)) = (statement.target, statement.value) else {
        return Ok(None);
    };
    if target.root() != "self" || target.len() != 2 {
        return Ok(None);
    }

    let Some(descriptor) = resolve_locator(&value.segments) else {
        return Ok(None);
    };

    let fallbacks = value
        .segments
        .iter()
        .filter(|s| s.name == "or_")
        .filter_map(|s| s.positional(0).and_then(Expr::as_chain))
        .filter_map(|inner| resolve_locator(&inner.segments))
        .collect();

    let element_name = target.segments[1].name.clone();

    if layout.page_expr.is_none() {
        let receiver: Vec<&str> = value
            .segments
            .iter()
            .take_while(|s| !s.is_call())
            .map(|s| s.name.as_str())
            .collect();
        if !receiver.is_empty() {
            layout.page_expr = Some(receiver.join("."));
        }
    }
    layout
        .locator_lines
        .entry(element_name.clone())
        .or_insert((idx + 1, last + 1));

    Ok(Some(LocatorEntry {
        element_name,
        descriptor,
        fallbacks,
    }))
}

fn parse_class_header(header: &str) -> Option<(String, Option<String>)> {
    let rest = header.strip_prefix("class ")?.trim_end();
    let rest = rest.strip_suffix(':')?;

    let (name, bases) = match rest.find('(') {
        Some(open) => {
            let close = rest.rfind(')')?;
            (&rest[..open], Some(&rest[open + 1..close]))
        }
        None => (rest, None),
    };

    let name = name.trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }

    let base_type = bases
        .and_then(|b| b.split(',').next())
        .map(str::trim)
        .filter(|b| !b.is_empty() && *b != "object" && !b.contains('='))
        .map(str::to_string);

    Some((name.to_string(), base_type))
}

fn parse_signature(signature: &str) -> Option<(String, Vec<String>)> {
    let rest = signature
        .strip_prefix("async def ")
        .or_else(|| signature.strip_prefix("def "))?;
    let open = rest.find('(')?;
    let name = rest[..open].trim().to_string();

    // matching close paren of the parameter list
    let mut depth = 0;
    let mut close = None;
    for (k, c) in rest[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(open + k);
                    break;
                }
            }
            _ => {}
        }
    }
    let params = signature_parameters(&rest[open + 1..close?]).ok()?;
    Some((name, params))
}

fn without_comment(text: &str) -> &str {
    text.split(" #").next().unwrap_or(text).trim_end()
}

fn dedent(lines: &[&str], indent: usize) -> String {
    let mut body: Vec<String> = lines
        .iter()
        .map(|l| {
            if l.trim().is_empty() {
                String::new()
            } else {
                l.chars().skip(indent).collect()
            }
        })
        .collect();
    while body.last().is_some_and(|l| l.is_empty()) {
        body.pop();
    }
    body.join("\n")
}

pub(crate) fn indentation(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::components::component_model::{LocatorEntry, MergeResult, MethodEntry};
use crate::components::scanner::{ClassLayout, indentation};
use crate::project::slugify;
use crate::recording::action_model::{LocatorDescriptor, LocatorStrategy};

// ============================================================================
// Python source rendering for component (page object) classes
// ============================================================================

const INDENT: usize = 4;

/// Python string literal with double quotes.
pub fn py_str(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// Builder call for one descriptor on `receiver`, e.g.
/// `page.get_by_role("button", name="Login")`.
pub fn descriptor_expr(receiver: &str, descriptor: &LocatorDescriptor) -> String {
    let value = py_str(&descriptor.value);
    let call = match descriptor.strategy {
        LocatorStrategy::Role => match &descriptor.qualifier {
            Some(name) => format!("get_by_role({}, name={})", value, py_str(name)),
            None => format!("get_by_role({})", value),
        },
        LocatorStrategy::Text => format!("get_by_text({})", value),
        LocatorStrategy::Label => format!("get_by_label({})", value),
        LocatorStrategy::Placeholder => format!("get_by_placeholder({})", value),
        LocatorStrategy::Testid => format!("get_by_test_id({})", value),
        LocatorStrategy::Css => format!("locator({})", value),
        LocatorStrategy::Xpath => format!("locator({})", py_str(&format!("xpath={}", descriptor.value))),
    };

    let mut expr = format!("{}.{}", receiver, call);
    if descriptor.strategy != LocatorStrategy::Role {
        if let Some(text) = &descriptor.qualifier {
            expr.push_str(&format!(".filter(has_text={})", py_str(text)));
        }
    }
    expr
}

/// Primary descriptor followed by `.or_(...)` for every fallback.
pub fn locator_expr(receiver: &str, entry: &LocatorEntry) -> String {
    let mut expr = descriptor_expr(receiver, &entry.descriptor);
    for fallback in &entry.fallbacks {
        expr.push_str(&format!(".or_({})", descriptor_expr(receiver, fallback)));
    }
    expr
}

fn locator_line(indent: usize, receiver: &str, entry: &LocatorEntry) -> String {
    format!(
        "{}self.{} = {}",
        " ".repeat(indent),
        entry.element_name,
        locator_expr(receiver, entry)
    )
}

fn method_lines(indent: usize, method: &MethodEntry) -> Vec<String> {
    let mut params = vec!["self".to_string()];
    params.extend(method.parameter_names.iter().cloned());

    let mut out = vec![format!(
        "{}def {}({}):",
        " ".repeat(indent),
        method.method_name,
        params.join(", ")
    )];

    let body_indent = " ".repeat(indent + INDENT);
    if method.body.trim().is_empty() {
        out.push(format!("{}pass", body_indent));
    } else {
        for line in method.body.lines() {
            if line.trim().is_empty() {
                out.push(String::new());
            } else {
                out.push(format!("{}{}", body_indent, line));
            }
        }
    }
    out
}

/// Source for a component that does not exist yet.
pub fn render_component(name: &str, base_type: Option<&str>, result: &MergeResult) -> String {
    let mut out = vec!["from playwright.sync_api import Page".to_string()];
    if let Some(base) = base_type {
        out.push(format!("from .{} import {}", slugify(base), base));
    }
    out.push(String::new());
    out.push(String::new());

    match base_type {
        Some(base) => out.push(format!("class {}({}):", name, base)),
        None => out.push(format!("class {}:", name)),
    }

    let body = " ".repeat(INDENT * 2);
    out.push(format!("{}def __init__(self, page: Page):", " ".repeat(INDENT)));
    if base_type.is_some() {
        out.push(format!("{}super().__init__(page)", body));
    }
    out.push(format!("{}self.page = page", body));
    for entry in &result.merged_locators {
        out.push(locator_line(INDENT * 2, "page", entry));
    }

    for method in &result.merged_methods {
        out.push(String::new());
        out.extend(method_lines(INDENT, method));
    }

    let mut text = out.join("\n");
    text.push('\n');
    text
}

/// Apply a merge to an existing source file in place. New locators go to the
/// end of `__init__`, extended locators are rewritten with their fallbacks,
/// new methods are appended to the class. All other lines are kept verbatim.
pub fn patch_component(source: &str, layout: &ClassLayout, result: &MergeResult) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let receiver = layout.page_expr.clone().unwrap_or_else(|| "self.page".to_string());

    let mut replacements: HashMap<usize, String> = HashMap::new();
    let mut skipped: HashSet<usize> = HashSet::new();
    let mut inserts: BTreeMap<usize, Vec<String>> = BTreeMap::new();

    for name in &result.extended_fallbacks {
        let (Some(entry), Some(&(first, last))) = (
            result.merged_locators.iter().find(|l| &l.element_name == name),
            layout.locator_lines.get(name),
        ) else {
            continue;
        };
        let indent = lines.get(first - 1).map(|l| indentation(l)).unwrap_or(INDENT * 2);
        replacements.insert(first, locator_line(indent, &receiver, entry));
        skipped.extend(first + 1..=last);
    }

    let added: Vec<&LocatorEntry> = result
        .merged_locators
        .iter()
        .filter(|l| result.added_locators.contains(&l.element_name))
        .collect();
    if !added.is_empty() {
        match layout.init_end {
            Some((line, body_indent)) => {
                inserts
                    .entry(line)
                    .or_default()
                    .extend(added.iter().map(|e| locator_line(body_indent, &receiver, e)));
            }
            None => {
                let member = " ".repeat(layout.member_indent);
                let body = layout.member_indent + INDENT;
                let block = inserts.entry(layout.header_line).or_default();
                block.push(format!("{}def __init__(self, page):", member));
                block.push(format!("{}self.page = page", " ".repeat(body)));
                block.extend(added.iter().map(|e| locator_line(body, "page", e)));
                block.push(String::new());
            }
        }
    }

    let methods: Vec<&MethodEntry> = result
        .merged_methods
        .iter()
        .filter(|m| result.added_methods.contains(&m.method_name))
        .collect();
    for method in methods {
        let block = inserts.entry(layout.end_line).or_default();
        block.push(String::new());
        block.extend(method_lines(layout.member_indent, method));
    }

    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        let number = idx + 1;
        if let Some(replacement) = replacements.remove(&number) {
            out.push(replacement);
        } else if !skipped.contains(&number) {
            out.push(line.to_string());
        }
        if let Some(block) = inserts.remove(&number) {
            out.extend(block);
        }
    }

    let mut text = out.join("\n");
    if source.ends_with('\n') || source.is_empty() {
        text.push('\n');
    }
    text
}

use std::path::Path;

use crate::error::ScanError;
use crate::project::bracket_balance;
use crate::recording::call_chain::{Expr, parse_expression};
use crate::steps::normalize::{extract_parameters, normalize};
use crate::steps::step_model::StepDefinition;

const STEP_KEYWORDS: &[&str] = &["given", "when", "then", "step", "and", "but"];

/// Read and index one step-definition file.
pub fn scan_step_file(path: &Path) -> Result<Vec<StepDefinition>, ScanError> {
    let source = std::fs::read_to_string(path).map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    scan_step_source(path, &source)
}

/// Extract one `StepDefinition` per step decorator in `source`.
///
/// Any step decorator whose pattern cannot be read makes the whole file
/// malformed, so a half-indexed file never shadows the real definitions.
pub fn scan_step_source(path: &Path, source: &str) -> Result<Vec<StepDefinition>, ScanError> {
    let lines: Vec<&str> = source.lines().collect();
    let mut definitions = Vec::new();
    let mut pending: Vec<StepDefinition> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line_no = i + 1;
        let trimmed = lines[i].trim();

        if let Some(decorator) = trimmed.strip_prefix('@') {
            // decorators may span several lines
            let mut text = decorator.to_string();
            while bracket_balance(&text) > 0 && i + 1 < lines.len() {
                i += 1;
                text.push(' ');
                text.push_str(lines[i].trim());
            }

            if let Some(def) = step_decorator(path, line_no, &text)? {
                pending.push(def);
            }
        } else if let Some(function) = function_name(trimmed) {
            for mut def in pending.drain(..) {
                def.function_name = Some(function.clone());
                definitions.push(def);
            }
        }

        i += 1;
    }

    definitions.extend(pending);
    Ok(definitions)
}

fn step_decorator(path: &Path, line: usize, text: &str) -> Result<Option<StepDefinition>, ScanError> {
    let head: String = text
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '.')
        .collect();
    let keyword = head.rsplit('.').next().unwrap_or("").to_lowercase();
    if !STEP_KEYWORDS.contains(&keyword.as_str()) {
        return Ok(None);
    }

    let malformed = |reason: String| ScanError::Malformed {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let chain = match parse_expression(text) {
        Ok(Expr::Chain(c)) => c,
        Ok(_) => return Err(malformed("step decorator is not a call".into())),
        Err(e) => return Err(malformed(format!("unreadable step decorator: {}", e))),
    };

    let call = chain.last();
    let pattern = match call.positional(0).or_else(|| call.keyword("name")) {
        Some(Expr::Str(s)) => s.clone(),
        // parsers.parse("..."), parsers.cfparse("..."), parsers.re(r"...")
        Some(Expr::Chain(inner)) => inner
            .last()
            .positional_text(0)
            .ok_or_else(|| malformed("step parser wrapper has no pattern".into()))?,
        _ => return Err(malformed(format!("@{} has no step pattern", keyword))),
    };

    Ok(Some(StepDefinition {
        normalized_pattern: normalize(&pattern),
        parameters: extract_parameters(&pattern),
        raw_pattern: pattern,
        file_path: path.to_path_buf(),
        line_number: line,
        usage_count: 0,
        keyword: Some(keyword),
        function_name: None,
    }))
}

fn function_name(trimmed: &str) -> Option<String> {
    let rest = trimmed
        .strip_prefix("async def ")
        .or_else(|| trimmed.strip_prefix("def "))?;
    let name: String = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    (!name.is_empty()).then_some(name)
}

use tracing::debug;

use crate::error::EmptyRecordingError;
use crate::recording::action_model::{
    Action, ActionKind, LocatorDescriptor, LocatorStrategy, ParseDiagnostic, ParsedRecording,
};
use crate::recording::call_chain::{Chain, Expr, Segment, parse_expression, parse_statement};

// ============================================================================
// ScriptParser trait: one implementation per recorded-script dialect
// ============================================================================

pub trait ScriptParser {
    /// Short dialect identifier, e.g. `playwright-python`.
    fn dialect(&self) -> &'static str;

    /// Parse raw script text. Malformed lines never abort the parse; they are
    /// reported in `parse_errors`. A recording with no recognised action is
    /// returned as `EmptyRecordingError` carrying the partial result.
    fn parse(&self, raw: &str) -> Result<ParsedRecording, EmptyRecordingError>;
}

/// Locator builder calls that establish the base strategy of a chain.
pub const LOCATOR_BUILDERS: &[&str] = &[
    "get_by_role",
    "get_by_text",
    "get_by_label",
    "get_by_placeholder",
    "get_by_test_id",
    "get_by_alt_text",
    "get_by_title",
    "locator",
];

const PAGE_WAITS: &[&str] = &[
    "wait_for_timeout",
    "wait_for_url",
    "wait_for_load_state",
    "wait_for_selector",
];

const EVENT_WAITS: &[&str] = &[
    "expect_navigation",
    "expect_download",
    "expect_response",
    "expect_request",
    "expect_file_chooser",
];

/// Parser for the Python dialect emitted by `playwright codegen --target python`
/// (sync and async flavours).
#[derive(Debug, Default, Clone)]
pub struct PythonScriptParser;

impl ScriptParser for PythonScriptParser {
    fn dialect(&self) -> &'static str {
        "playwright-python"
    }

    fn parse(&self, raw: &str) -> Result<ParsedRecording, EmptyRecordingError> {
        let mut state = ParseState::new();

        for (idx, line) in raw.lines().enumerate() {
            state.line(idx + 1, line);
        }

        let recording = state.finish();
        debug!(
            actions = recording.actions.len(),
            errors = recording.parse_errors.len(),
            "parsed recording"
        );

        if recording.known_actions().next().is_none() {
            return Err(EmptyRecordingError { recording });
        }
        Ok(recording)
    }
}

// ============================================================================
// Line scanner state
// ============================================================================

struct Block {
    indent: usize,
    awaits: String,
}

struct ParseState {
    pages: Vec<String>,
    page_declarations: usize,
    contexts: Vec<String>,
    handles: Vec<(String, String)>,
    blocks: Vec<Block>,
    recording: ParsedRecording,
}

impl ParseState {
    fn new() -> Self {
        Self {
            // `page` is implied so that snippets without setup still resolve
            pages: vec!["page".to_string()],
            page_declarations: 0,
            contexts: vec!["playwright".into(), "p".into(), "browser".into(), "context".into()],
            handles: Vec::new(),
            blocks: Vec::new(),
            recording: ParsedRecording::default(),
        }
    }

    fn finish(mut self) -> ParsedRecording {
        let meta = &mut self.recording.metadata;
        meta.start_url = self
            .recording
            .actions
            .iter()
            .find(|a| a.kind == ActionKind::Navigate)
            .and_then(|a| a.value.clone());
        meta.has_assertions = self
            .recording
            .actions
            .iter()
            .any(|a| a.kind == ActionKind::Expect);
        self.recording
    }

    fn line(&mut self, line_no: usize, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return;
        }

        let indent = indentation(line);
        while self.blocks.last().is_some_and(|b| indent <= b.indent) {
            self.blocks.pop();
        }

        let text = strip_await(trimmed);
        if is_boilerplate(&text) {
            return;
        }

        if let Some(rest) = text
            .strip_prefix("async with ")
            .or_else(|| text.strip_prefix("with "))
        {
            self.with_block(line_no, trimmed, indent, rest);
            return;
        }

        let statement = match parse_statement(&text) {
            Ok(s) => s,
            Err(e) => {
                self.unparsable(line_no, trimmed, &text, &e.to_string());
                return;
            }
        };

        match (statement.target, statement.value) {
            (Some(target), Expr::Chain(value)) => self.assignment(line_no, trimmed, &target, &value),
            (Some(_), _) => {}
            (None, Expr::Chain(chain)) => self.expression(line_no, trimmed, &chain),
            (None, _) => self.error(line_no, trimmed, "statement is not a call expression"),
        }
    }

    // ---- statements -------------------------------------------------------

    fn assignment(&mut self, line_no: usize, raw: &str, target: &Chain, value: &Chain) {
        let name = target.path();
        let last = value.last().name.as_str();

        match last {
            "new_page" => {
                self.page_declarations += 1;
                if self.page_declarations > 1 {
                    self.recording.metadata.has_multiple_pages = true;
                }
                self.declare_page(&name);
            }
            "launch" | "launch_persistent_context" | "new_context" | "connect" | "connect_over_cdp" => {
                self.contexts.push(name);
            }
            "value" if value.len() == 2 => {
                let handle = value.root();
                if let Some((_, page)) = self.handles.iter().find(|(h, _)| h == handle) {
                    let page = page.clone();
                    self.declare_page(&name);
                    if page != name {
                        self.declare_page(&page);
                    }
                }
            }
            _ => {
                if self.is_page(value.root()) || value.root() == "expect" {
                    // `x = page.get_by_role(...).inner_text()` style reads
                    self.expression(line_no, raw, value);
                } else {
                    self.error(line_no, raw, &format!("unrecognized assignment to `{}`", name));
                }
            }
        }
    }

    fn with_block(&mut self, line_no: usize, raw: &str, indent: usize, rest: &str) {
        let rest = rest.trim_end_matches(':').trim();
        let (expr_text, handle) = match rest.rsplit_once(" as ") {
            Some((e, h)) => (e.trim(), Some(h.trim().to_string())),
            None => (rest, None),
        };

        let chain = match parse_expression(expr_text) {
            Ok(Expr::Chain(c)) => c,
            Ok(_) => return self.error(line_no, raw, "with-statement is not a call expression"),
            Err(e) => return self.unparsable(line_no, raw, expr_text, &e.to_string()),
        };

        let owner = chain.root().to_string();
        let method = chain.last().name.clone();

        match method.as_str() {
            "expect_popup" | "expect_page" => {
                let awaited = handle
                    .as_deref()
                    .map(|h| h.strip_suffix("_info").unwrap_or(h).to_string())
                    .unwrap_or_else(|| format!("page{}", self.pages.len()));

                if let Some(h) = &handle {
                    self.handles.push((h.clone(), awaited.clone()));
                }
                self.recording.metadata.has_multiple_pages = true;
                if method == "expect_popup" {
                    self.recording.metadata.has_popups = true;
                }

                let page = if self.is_page(&owner) { owner } else { self.default_page() };
                let action = Action::new(ActionKind::Popup, &page, line_no, raw).with_value(awaited.clone());
                self.push(action);

                self.blocks.push(Block { indent, awaits: awaited });
            }
            m if EVENT_WAITS.contains(&m) => {
                let page = if self.is_page(&owner) { owner } else { self.default_page() };
                let action = Action::new(ActionKind::Wait, &page, line_no, raw).with_value(m.to_string());
                self.push(action);
            }
            _ => {
                if self.is_page(&owner) {
                    let action = Action::new(ActionKind::Unknown, &owner, line_no, raw);
                    self.push(action);
                }
                self.error(line_no, raw, &format!("unrecognized with-block `{}`", method));
            }
        }
    }

    fn expression(&mut self, line_no: usize, raw: &str, chain: &Chain) {
        let root = chain.root();

        if root == "expect" && chain.segments[0].is_call() {
            return self.assertion(line_no, raw, chain);
        }

        if self.contexts.iter().any(|c| c == root) && !self.is_page(root) {
            // context/browser housekeeping (close, tracing, timeouts)
            return;
        }

        let (page, segments): (String, &[Segment]) = if self.is_page(root) {
            (root.to_string(), &chain.segments[1..])
        } else if is_implicit_page_call(root) {
            (self.default_page(), &chain.segments[..])
        } else {
            return self.error(line_no, raw, &format!("unrecognized call target `{}`", root));
        };

        match classify_page_call(segments) {
            Classified::Action(kind, locator, value) => {
                let mut action = Action::new(kind, &page, line_no, raw);
                action.locator_descriptor = locator;
                action.value = value;
                self.push(action);
            }
            Classified::Unknown(locator, reason) => {
                let mut action = Action::new(ActionKind::Unknown, &page, line_no, raw);
                action.locator_descriptor = locator;
                self.push(action);
                self.error(line_no, raw, &reason);
            }
        }
    }

    fn assertion(&mut self, line_no: usize, raw: &str, chain: &Chain) {
        let subject = chain.segments[0].positional(0).and_then(Expr::as_chain);
        let matcher = chain.segments.get(1).filter(|s| s.is_call());

        let (page, locator) = match subject {
            Some(inner) if self.is_page(inner.root()) => {
                let locator = resolve_locator(&inner.segments[1..]);
                (inner.root().to_string(), locator)
            }
            Some(inner) if is_implicit_page_call(inner.root()) => {
                (self.default_page(), resolve_locator(&inner.segments))
            }
            _ => {
                let page = self.default_page();
                let action = Action::new(ActionKind::Unknown, &page, line_no, raw);
                self.push(action);
                return self.error(line_no, raw, "assertion subject is not a page or locator");
            }
        };

        let Some(matcher) = matcher else {
            let mut action = Action::new(ActionKind::Unknown, &page, line_no, raw);
            action.locator_descriptor = locator;
            self.push(action);
            return self.error(line_no, raw, "expect() without a matcher call");
        };

        let mut action = Action::new(ActionKind::Expect, &page, line_no, raw);
        action.locator_descriptor = locator;
        action.matcher = Some(matcher.name.clone());
        action.value = matcher.positional_text(0);
        self.push(action);
    }

    // ---- helpers ----------------------------------------------------------

    fn push(&mut self, mut action: Action) {
        if let Some(block) = self.blocks.last() {
            action.popup_block = Some(block.awaits.clone());
        }
        self.recording.actions.push(action);
    }

    fn error(&mut self, line_no: usize, raw: &str, reason: &str) {
        self.recording.parse_errors.push(ParseDiagnostic {
            source_line: line_no,
            raw_text: raw.to_string(),
            reason: reason.to_string(),
        });
    }

    /// A line that failed to tokenize/parse. If it still starts like a page
    /// call an `Unknown` action is kept so the step stays visible.
    fn unparsable(&mut self, line_no: usize, raw: &str, text: &str, reason: &str) {
        let head: String = text
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        let after = &text[head.len()..];

        if (self.is_page(&head) && after.starts_with('.')) || (head == "expect" && after.starts_with('(')) {
            let page = if self.is_page(&head) { head } else { self.default_page() };
            self.push(Action::new(ActionKind::Unknown, &page, line_no, raw));
        }
        self.error(line_no, raw, &format!("unparsable line: {}", reason));
    }

    fn declare_page(&mut self, name: &str) {
        if !self.is_page(name) {
            self.pages.push(name.to_string());
        }
    }

    fn is_page(&self, name: &str) -> bool {
        self.pages.iter().any(|p| p == name)
    }

    fn default_page(&self) -> String {
        self.pages[0].clone()
    }
}

// ============================================================================
// Call-chain classification
// ============================================================================

enum Classified {
    Action(ActionKind, Option<LocatorDescriptor>, Option<String>),
    Unknown(Option<LocatorDescriptor>, String),
}

/// Classify the segments after the page receiver by walking right-to-left:
/// the last call is the verb, anything before it builds the locator.
fn classify_page_call(segments: &[Segment]) -> Classified {
    let Some(last) = segments.last() else {
        return Classified::Unknown(None, "bare page reference".into());
    };

    // page-level verbs
    if segments.len() == 1 {
        let name = last.name.as_str();
        match name {
            "goto" => return Classified::Action(ActionKind::Navigate, None, last.positional_text(0).or_else(|| last.keyword_text("url"))),
            "reload" | "go_back" | "go_forward" => {
                let target = name.trim_start_matches("go_").to_string();
                return Classified::Action(ActionKind::Navigate, None, Some(target));
            }
            "close" => return Classified::Action(ActionKind::Close, None, None),
            n if PAGE_WAITS.contains(&n) => {
                return Classified::Action(ActionKind::Wait, None, last.positional_text(0));
            }
            _ => {}
        }
    }

    if segments.len() == 2 && segments[0].name == "keyboard" {
        return match last.name.as_str() {
            "press" => Classified::Action(ActionKind::Press, None, last.positional_text(0)),
            "type" | "insert_text" => Classified::Action(ActionKind::Fill, None, last.positional_text(0)),
            other => Classified::Unknown(None, format!("unrecognized keyboard call `{}`", other)),
        };
    }

    let builders = &segments[..segments.len() - 1];
    let locator = resolve_locator(builders);

    if LOCATOR_BUILDERS.contains(&last.name.as_str()) && last.is_call() {
        return Classified::Unknown(resolve_locator(segments), "locator without an action".into());
    }

    let Some(verb) = classify_verb(last) else {
        return Classified::Unknown(locator, format!("unrecognized action `.{}()`", last.name));
    };

    match locator {
        Some(locator) => Classified::Action(verb.0, Some(locator), verb.1),
        None => Classified::Unknown(None, format!("`.{}()` has no recognizable locator", last.name)),
    }
}

fn classify_verb(seg: &Segment) -> Option<(ActionKind, Option<String>)> {
    if !seg.is_call() {
        return None;
    }
    let v = match seg.name.as_str() {
        "click" | "tap" => (ActionKind::Click, None),
        "dblclick" => (ActionKind::Click, Some("double".to_string())),
        "fill" | "type" | "press_sequentially" => (ActionKind::Fill, seg.positional_text(0)),
        "select_option" => (
            ActionKind::Select,
            seg.positional_text(0)
                .or_else(|| seg.keyword_text("value"))
                .or_else(|| seg.keyword_text("label"))
                .or_else(|| seg.keyword_text("index")),
        ),
        "check" => (ActionKind::Check, None),
        "uncheck" => (ActionKind::Check, Some("false".to_string())),
        "set_checked" => (
            ActionKind::Check,
            seg.positional_text(0).map(|v| v.to_lowercase()),
        ),
        "press" => (ActionKind::Press, seg.positional_text(0)),
        "hover" => (ActionKind::Hover, None),
        _ => return None,
    };
    Some(v)
}

/// Resolve the base locator of a builder chain. The first builder sets the
/// strategy; `.filter(has_text=...)` fills in a missing qualifier; every
/// other modifier is ignored for classification.
pub fn resolve_locator(segments: &[Segment]) -> Option<LocatorDescriptor> {
    let mut descriptor: Option<LocatorDescriptor> = None;

    for seg in segments {
        match (&mut descriptor, seg.name.as_str()) {
            (None, name) if LOCATOR_BUILDERS.contains(&name) && seg.is_call() => {
                descriptor = builder_descriptor(seg);
            }
            (Some(d), "filter") if d.qualifier.is_none() => {
                d.qualifier = seg.keyword_text("has_text");
            }
            _ => {}
        }
    }

    descriptor
}

fn builder_descriptor(seg: &Segment) -> Option<LocatorDescriptor> {
    let value = seg.positional_text(0);

    let descriptor = match seg.name.as_str() {
        "get_by_role" => LocatorDescriptor {
            strategy: LocatorStrategy::Role,
            value: value?,
            qualifier: seg.keyword_text("name"),
        },
        "get_by_text" => LocatorDescriptor::new(LocatorStrategy::Text, value?),
        "get_by_label" => LocatorDescriptor::new(LocatorStrategy::Label, value?),
        "get_by_placeholder" => LocatorDescriptor::new(LocatorStrategy::Placeholder, value?),
        "get_by_test_id" => LocatorDescriptor::new(LocatorStrategy::Testid, value?),
        "get_by_alt_text" => LocatorDescriptor::new(LocatorStrategy::Css, format!("[alt=\"{}\"]", value?)),
        "get_by_title" => LocatorDescriptor::new(LocatorStrategy::Css, format!("[title=\"{}\"]", value?)),
        "locator" => selector_descriptor(&value?),
        _ => return None,
    };
    Some(descriptor)
}

/// Map a raw `locator()` selector to a descriptor by its engine prefix.
pub fn selector_descriptor(selector: &str) -> LocatorDescriptor {
    if let Some(x) = selector.strip_prefix("xpath=") {
        LocatorDescriptor::new(LocatorStrategy::Xpath, x)
    } else if selector.starts_with("//") || selector.starts_with("(//") {
        LocatorDescriptor::new(LocatorStrategy::Xpath, selector)
    } else if let Some(t) = selector.strip_prefix("text=") {
        LocatorDescriptor::new(LocatorStrategy::Text, t.trim_matches('"'))
    } else {
        LocatorDescriptor::new(LocatorStrategy::Css, selector.strip_prefix("css=").unwrap_or(selector))
    }
}

fn is_implicit_page_call(root: &str) -> bool {
    root == "goto" || LOCATOR_BUILDERS.contains(&root)
}

fn indentation(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// Drop `await` at the start of a statement or right after its assignment.
fn strip_await(text: &str) -> String {
    let text = text.strip_prefix("await ").unwrap_or(text);
    match assignment_split(text) {
        Some(eq) => match text[eq + 1..].trim_start().strip_prefix("await ") {
            Some(value) => format!("{}= {}", &text[..eq], value),
            None => text.to_string(),
        },
        None => text.to_string(),
    }
}

/// Byte offset of a top-level `=` outside string literals.
fn assignment_split(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut quote: Option<u8> = None;
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(_) if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                b'=' if depth == 0 => {
                    let prev = i.checked_sub(1).map(|p| bytes[p]);
                    let next = bytes.get(i + 1).copied();
                    let comparison = matches!(prev, Some(b'=' | b'!' | b'<' | b'>')) || next == Some(b'=');
                    if !comparison {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

fn is_boilerplate(text: &str) -> bool {
    const STATEMENTS: &[&str] = &["pass", "return", "main()"];
    const PREFIXES: &[&str] = &[
        "import ",
        "def ",
        "async def ",
        "return ",
        "if __name__",
        "with sync_playwright",
        "async with async_playwright",
        "run(",
        "asyncio.run(",
        "sys.exit(",
    ];
    if STATEMENTS.contains(&text) || PREFIXES.iter().any(|p| text.starts_with(p)) {
        return true;
    }
    text.starts_with("from ") && text.contains(" import ")
}

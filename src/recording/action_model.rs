use serde::{Deserialize, Serialize};

// ============================================================================
// Canonical action model produced by every script parser
// ============================================================================

/// How an element is located on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocatorStrategy {
    Role,
    Text,
    Label,
    Placeholder,
    Testid,
    Css,
    Xpath,
}

/// A strategy + value (+ optional qualifier such as the accessible name)
/// identifying one UI element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocatorDescriptor {
    pub strategy: LocatorStrategy,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
}

impl LocatorDescriptor {
    pub fn new(strategy: LocatorStrategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
            qualifier: None,
        }
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    pub fn role(role: &str, name: Option<&str>) -> Self {
        Self {
            strategy: LocatorStrategy::Role,
            value: role.to_string(),
            qualifier: name.map(str::to_string),
        }
    }

    /// Short human-readable label, preferring the accessible name.
    pub fn display_label(&self) -> &str {
        self.qualifier.as_deref().unwrap_or(&self.value)
    }
}

/// Closed set of interactions a recording can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Navigate,
    Click,
    Fill,
    Select,
    Check,
    Press,
    Hover,
    Expect,
    Wait,
    Popup,
    Close,
    Unknown,
}

impl ActionKind {
    /// Whether the action targets an element (and therefore needs a locator).
    pub fn targets_element(self) -> bool {
        match self {
            ActionKind::Click
            | ActionKind::Fill
            | ActionKind::Select
            | ActionKind::Check
            | ActionKind::Hover => true,
            ActionKind::Navigate
            | ActionKind::Press
            | ActionKind::Expect
            | ActionKind::Wait
            | ActionKind::Popup
            | ActionKind::Close
            | ActionKind::Unknown => false,
        }
    }
}

/// One normalized user/browser interaction.
///
/// `raw` and `source_line` are always present so diagnostics can be
/// reconstructed even for `Unknown` actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator_descriptor: Option<LocatorDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Assertion matcher for `Expect` actions, e.g. `to_have_text`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matcher: Option<String>,
    /// Page variable the action runs against (`page`, `page1`, ...).
    pub page: String,
    /// Page awaited by the enclosing expect-popup/expect-page block, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popup_block: Option<String>,
    pub source_line: usize,
    pub raw: String,
}

impl Action {
    pub fn new(kind: ActionKind, page: &str, source_line: usize, raw: &str) -> Self {
        Self {
            kind,
            locator_descriptor: None,
            value: None,
            matcher: None,
            page: page.to_string(),
            popup_block: None,
            source_line,
            raw: raw.to_string(),
        }
    }

    pub fn with_locator(mut self, descriptor: LocatorDescriptor) -> Self {
        self.locator_descriptor = Some(descriptor);
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Summary flags derived while parsing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,
    pub has_popups: bool,
    pub has_assertions: bool,
    pub has_multiple_pages: bool,
}

/// A line the parser could not turn into a known action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseDiagnostic {
    pub source_line: usize,
    pub raw_text: String,
    pub reason: String,
}

/// Output of a script parser. Treated as immutable once returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedRecording {
    pub actions: Vec<Action>,
    pub metadata: RecordingMetadata,
    pub parse_errors: Vec<ParseDiagnostic>,
}

impl ParsedRecording {
    /// Actions of a recognised kind (everything except `Unknown`).
    pub fn known_actions(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter().filter(|a| a.kind != ActionKind::Unknown)
    }

    /// Distinct page contexts in order of first appearance.
    pub fn page_contexts(&self) -> Vec<&str> {
        let mut pages: Vec<&str> = Vec::new();
        for action in &self.actions {
            if !pages.contains(&action.page.as_str()) {
                pages.push(&action.page);
            }
        }
        pages
    }
}

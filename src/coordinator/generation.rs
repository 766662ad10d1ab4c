use serde::{Deserialize, Serialize};

use crate::components::component_model::{LocatorEntry, MethodEntry};
use crate::components::render::{descriptor_expr, py_str};
use crate::error::GenerationError;
use crate::project::slugify;
use crate::recording::action_model::{Action, ActionKind, LocatorDescriptor, LocatorStrategy, ParsedRecording};

// ============================================================================
// GenerationCollaborator: turns a normalized recording into candidate artifacts
// ============================================================================

/// External service producing candidate feature text, steps and components.
/// Implementations own their retry and timeout policy.
pub trait GenerationCollaborator: Send + Sync {
    fn generate(&self, recording: &ParsedRecording, scenario: &str) -> Result<GenerationOutput, GenerationError>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutput {
    pub feature_text: String,
    /// Import lines the generated step code needs.
    #[serde(default)]
    pub step_imports: Vec<String>,
    #[serde(default)]
    pub step_candidates: Vec<StepCandidate>,
    #[serde(default)]
    pub component_candidates: Vec<ComponentCandidate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepCandidate {
    pub pattern: String,
    pub param_count: usize,
    /// Full Python definition, decorator included.
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedMethod {
    pub method_name: String,
    #[serde(default)]
    pub parameter_names: Vec<String>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentCandidate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_type: Option<String>,
    #[serde(default)]
    pub locators: Vec<LocatorEntry>,
    #[serde(default)]
    pub methods: Vec<ProposedMethod>,
}

impl ComponentCandidate {
    /// Methods with their body hashes, ready for `ComponentRegistry::merge`.
    pub fn method_entries(&self) -> Vec<MethodEntry> {
        self.methods
            .iter()
            .map(|m| MethodEntry::from_body(&m.method_name, m.parameter_names.clone(), &m.body))
            .collect()
    }
}

// ============================================================================
// MockGenerator: deterministic, offline
// ============================================================================

pub const BEHAVE_IMPORT: &str = "from behave import given, when, then";
pub const EXPECT_IMPORT: &str = "from playwright.sync_api import expect";

/// Rule-based generator: one step per recognised action, one page object per
/// page context. Needs no network and always produces the same output for the
/// same recording.
#[derive(Debug, Default, Clone)]
pub struct MockGenerator;

struct DraftStep {
    keyword: &'static str,
    pattern: String,
    text: String,
    params: Vec<String>,
    body: String,
}

impl GenerationCollaborator for MockGenerator {
    fn generate(&self, recording: &ParsedRecording, scenario: &str) -> Result<GenerationOutput, GenerationError> {
        let drafts: Vec<(String, DraftStep)> = recording
            .known_actions()
            .filter_map(|a| draft_step(a).map(|d| (a.page.clone(), d)))
            .collect();

        let mut feature = vec![
            format!("Feature: {}", scenario),
            String::new(),
            format!("  Scenario: {}", scenario),
        ];
        let mut previous_keyword = "";
        let mut current_page = "page".to_string();
        for (page, draft) in &drafts {
            if *page != current_page {
                feature.push(format!("    # on {}", page));
                current_page = page.clone();
            }
            let keyword = if draft.keyword == previous_keyword { "And" } else { draft.keyword };
            previous_keyword = draft.keyword;
            feature.push(format!("    {} {}", keyword, draft.text));
        }
        let mut feature_text = feature.join("\n");
        feature_text.push('\n');

        let step_candidates = drafts
            .iter()
            .map(|(_, d)| StepCandidate {
                pattern: d.pattern.clone(),
                param_count: d.params.len(),
                code: step_code(d),
            })
            .collect();

        let mut step_imports = vec![BEHAVE_IMPORT.to_string()];
        if drafts.iter().any(|(_, d)| d.body.starts_with("expect(")) {
            step_imports.push(EXPECT_IMPORT.to_string());
        }

        Ok(GenerationOutput {
            feature_text,
            step_imports,
            step_candidates,
            component_candidates: component_candidates(recording),
        })
    }
}

fn step_code(draft: &DraftStep) -> String {
    let mut params = vec!["context".to_string()];
    params.extend(draft.params.iter().cloned());
    format!(
        "@{}({})\ndef step_impl({}):\n    {}\n",
        draft.keyword.to_lowercase(),
        py_str(&draft.pattern),
        params.join(", "),
        draft.body
    )
}

/// Human label for an element: accessible name, lower-cased, plus the role
/// when it adds information ("login button").
fn element_phrase(descriptor: &LocatorDescriptor) -> String {
    let label = descriptor.display_label().to_lowercase();
    match descriptor.strategy {
        LocatorStrategy::Role if descriptor.qualifier.is_some() => {
            let noun = role_noun(&descriptor.value);
            if label.split_whitespace().any(|w| w == noun) {
                label
            } else {
                format!("{} {}", label, noun)
            }
        }
        LocatorStrategy::Label | LocatorStrategy::Placeholder => format!("{} field", label),
        _ => label,
    }
}

fn role_noun(role: &str) -> &str {
    match role {
        "textbox" | "searchbox" => "field",
        "combobox" | "listbox" => "dropdown",
        other => other,
    }
}

fn draft_step(action: &Action) -> Option<DraftStep> {
    let target = action.locator_descriptor.as_ref();
    let phrase = target.map(element_phrase);
    let element = target.map(|d| descriptor_expr("context.page", d));
    let value = action.value.clone().unwrap_or_default();

    let draft = match action.kind {
        ActionKind::Navigate => DraftStep {
            keyword: "Given",
            pattern: "I open \"{url}\"".to_string(),
            text: format!("I open {}", py_str(&value)),
            params: vec!["url".to_string()],
            body: "context.page.goto(url)".to_string(),
        },
        ActionKind::Fill => DraftStep {
            keyword: "When",
            pattern: format!("I fill \"{{value}}\" into the {}", phrase.clone()?),
            text: format!("I fill {} into the {}", py_str(&value), phrase?),
            params: vec!["value".to_string()],
            body: format!("{}.fill(value)", element?),
        },
        ActionKind::Click => DraftStep {
            keyword: "When",
            pattern: format!("I click the {}", phrase.clone()?),
            text: format!("I click the {}", phrase?),
            params: Vec::new(),
            body: match action.value.as_deref() {
                Some("double") => format!("{}.dblclick()", element?),
                _ => format!("{}.click()", element?),
            },
        },
        ActionKind::Select => DraftStep {
            keyword: "When",
            pattern: format!("I select \"{{option}}\" from the {}", phrase.clone()?),
            text: format!("I select {} from the {}", py_str(&value), phrase?),
            params: vec!["option".to_string()],
            body: format!("{}.select_option(option)", element?),
        },
        ActionKind::Check => {
            let verb = if action.value.as_deref() == Some("false") { "uncheck" } else { "check" };
            DraftStep {
                keyword: "When",
                pattern: format!("I {} the {}", verb, phrase.clone()?),
                text: format!("I {} the {}", verb, phrase?),
                params: Vec::new(),
                body: format!("{}.{}()", element?, verb),
            }
        }
        ActionKind::Press => match (phrase, element) {
            (Some(phrase), Some(element)) => DraftStep {
                keyword: "When",
                pattern: format!("I press \"{{key}}\" in the {}", phrase),
                text: format!("I press {} in the {}", py_str(&value), phrase),
                params: vec!["key".to_string()],
                body: format!("{}.press(key)", element),
            },
            _ => DraftStep {
                keyword: "When",
                pattern: "I press \"{key}\"".to_string(),
                text: format!("I press {}", py_str(&value)),
                params: vec!["key".to_string()],
                body: "context.page.keyboard.press(key)".to_string(),
            },
        },
        ActionKind::Hover => DraftStep {
            keyword: "When",
            pattern: format!("I hover over the {}", phrase.clone()?),
            text: format!("I hover over the {}", phrase?),
            params: Vec::new(),
            body: format!("{}.hover()", element?),
        },
        ActionKind::Expect => expect_step(action, phrase, element)?,
        ActionKind::Wait => DraftStep {
            keyword: "When",
            pattern: "I wait for the page to settle".to_string(),
            text: "I wait for the page to settle".to_string(),
            params: Vec::new(),
            body: "context.page.wait_for_load_state()".to_string(),
        },
        ActionKind::Popup => DraftStep {
            keyword: "When",
            pattern: "a new tab opens".to_string(),
            text: "a new tab opens".to_string(),
            params: Vec::new(),
            body: "context.page = context.page.context.pages[-1]".to_string(),
        },
        ActionKind::Close => DraftStep {
            keyword: "When",
            pattern: "I close the current tab".to_string(),
            text: "I close the current tab".to_string(),
            params: Vec::new(),
            body: "context.page.close()".to_string(),
        },
        ActionKind::Unknown => return None,
    };
    Some(draft)
}

fn expect_step(action: &Action, phrase: Option<String>, element: Option<String>) -> Option<DraftStep> {
    let matcher = action.matcher.as_deref().unwrap_or("to_be_visible");
    let should = if matcher.starts_with("not_") { "should not" } else { "should" };
    let base = matcher.trim_start_matches("not_").trim_start_matches("to_");
    let words = base.replace('_', " ");
    let value = action.value.clone().unwrap_or_default();

    let Some(phrase) = phrase else {
        // page-level assertion: expect(page).to_have_url(...) / to_have_title(...)
        let subject = if base == "have_title" { "title" } else { "url" };
        return Some(DraftStep {
            keyword: "Then",
            pattern: format!("the page {} {} be \"{{{}}}\"", subject, should, subject),
            text: format!("the page {} {} be {}", subject, should, py_str(&value)),
            params: vec![subject.to_string()],
            body: format!("expect(context.page).{}({})", matcher, subject),
        });
    };
    let element = element?;

    let draft = match (base, &action.value) {
        ("be_visible", None) => DraftStep {
            keyword: "Then",
            pattern: format!("I {} see the {}", should, phrase),
            text: format!("I {} see the {}", should, phrase),
            params: Vec::new(),
            body: format!("expect({}).{}()", element, matcher),
        },
        (_, None) => DraftStep {
            keyword: "Then",
            pattern: format!("the {} {} {}", phrase, should, words),
            text: format!("the {} {} {}", phrase, should, words),
            params: Vec::new(),
            body: format!("expect({}).{}()", element, matcher),
        },
        (_, Some(_)) => DraftStep {
            keyword: "Then",
            pattern: format!("the {} {} {} \"{{expected}}\"", phrase, should, words),
            text: format!("the {} {} {} {}", phrase, should, words, py_str(&value)),
            params: vec!["expected".to_string()],
            body: format!("expect({}).{}(expected)", element, matcher),
        },
    };
    Some(draft)
}

/// Page object name for a page context: derived from the last URL it
/// navigated to, or from the page variable when it never navigated.
pub fn component_name(url: Option<&str>, page_var: &str) -> String {
    let stem = url
        .and_then(|u| {
            let path = u.split("://").nth(1).unwrap_or(u);
            let path = path.split(['?', '#']).next().unwrap_or(path);
            path.split('/').skip(1).filter(|s| !s.is_empty()).last().map(str::to_string)
        })
        .unwrap_or_else(|| match page_var.strip_prefix("page") {
            Some("") => "home".to_string(),
            Some(n) if n.chars().all(|c| c.is_ascii_digit()) => format!("popup_{}", n),
            _ => page_var.to_string(),
        });

    let mut name: String = slugify(&stem)
        .split('_')
        .filter(|p| !p.is_empty())
        .map(|p| {
            let mut chars = p.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert_str(0, "Home");
    }
    if !name.ends_with("Page") {
        name.push_str("Page");
    }
    name
}

fn element_name(descriptor: &LocatorDescriptor) -> String {
    let label = slugify(&descriptor.display_label().to_lowercase());
    let suffix = match descriptor.strategy {
        LocatorStrategy::Role => match descriptor.value.as_str() {
            "textbox" | "searchbox" => "input",
            other => other,
        },
        LocatorStrategy::Label | LocatorStrategy::Placeholder => "input",
        _ => "element",
    };
    let name = if label.is_empty() {
        suffix.to_string()
    } else if label == suffix || label.ends_with(&format!("_{}", suffix)) {
        label
    } else {
        format!("{}_{}", label, suffix)
    };
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("el_{}", name)
    } else {
        name
    }
}

fn component_candidates(recording: &ParsedRecording) -> Vec<ComponentCandidate> {
    let mut candidates: Vec<(String, ComponentCandidate)> = Vec::new();
    let mut urls: Vec<(String, String)> = Vec::new();

    for action in recording.known_actions() {
        if action.kind == ActionKind::Navigate {
            if let Some(url) = &action.value {
                urls.retain(|(p, _)| *p != action.page);
                urls.push((action.page.clone(), url.clone()));
            }
            continue;
        }
        let Some(descriptor) = &action.locator_descriptor else {
            continue;
        };

        let url = urls.iter().find(|(p, _)| *p == action.page).map(|(_, u)| u.as_str());
        let name = component_name(url, &action.page);
        let idx = match candidates.iter().position(|(n, _)| *n == name) {
            Some(idx) => idx,
            None => {
                candidates.push((
                    name.clone(),
                    ComponentCandidate {
                        name,
                        base_type: None,
                        locators: Vec::new(),
                        methods: Vec::new(),
                    },
                ));
                candidates.len() - 1
            }
        };
        let component = &mut candidates[idx].1;

        let element = match component.locators.iter().find(|l| l.descriptor == *descriptor) {
            Some(existing) => existing.element_name.clone(),
            None => {
                let mut name = element_name(descriptor);
                let mut n = 2;
                while component.locators.iter().any(|l| l.element_name == name) {
                    name = format!("{}_{}", element_name(descriptor), n);
                    n += 1;
                }
                component.locators.push(LocatorEntry::new(&name, descriptor.clone()));
                name
            }
        };

        if let Some(method) = interaction_method(action, &element) {
            if !component.methods.iter().any(|m| m.method_name == method.method_name) {
                component.methods.push(method);
            }
        }
    }

    candidates.into_iter().map(|(_, c)| c).collect()
}

fn interaction_method(action: &Action, element: &str) -> Option<ProposedMethod> {
    let (verb, params, call) = match action.kind {
        ActionKind::Fill => ("fill", vec!["value"], "fill(value)"),
        ActionKind::Click => ("click", vec![], "click()"),
        ActionKind::Select => ("select", vec!["option"], "select_option(option)"),
        ActionKind::Check if action.value.as_deref() == Some("false") => ("uncheck", vec![], "uncheck()"),
        ActionKind::Check => ("check", vec![], "check()"),
        ActionKind::Press => ("press", vec!["key"], "press(key)"),
        ActionKind::Hover => ("hover", vec![], "hover()"),
        _ => return None,
    };
    Some(ProposedMethod {
        method_name: format!("{}_{}", verb, element),
        parameter_names: params.into_iter().map(str::to_string).collect(),
        body: format!("self.{}.{}", element, call),
    })
}

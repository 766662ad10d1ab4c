use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::coordinator::generation::{BEHAVE_IMPORT, GenerationCollaborator, GenerationOutput};
use crate::error::GenerationError;
use crate::recording::action_model::ParsedRecording;

// ============================================================================
// TextInference: raw prompt to completion
// ============================================================================

pub trait TextInference: Send + Sync {
    fn infer_text(&self, prompt: &str) -> Result<String, GenerationError>;
}

// ============================================================================
// Ollama Backend
// ============================================================================

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434/api/generate";
pub const DEFAULT_MODEL: &str = "qwen2.5:1.5b";

pub struct OllamaBackend {
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'static str,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaBackend {
    pub fn new(endpoint: &str, model: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            ..Self::default()
        }
    }
}

impl TextInference for OllamaBackend {
    fn infer_text(&self, prompt: &str) -> Result<String, GenerationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| GenerationError::Permanent(format!("cannot build HTTP client: {}", e)))?;

        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: "json",
        };

        let response = client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .map_err(|e| GenerationError::Transient(format!("{} unreachable: {}", self.endpoint, e)))?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(GenerationError::Transient(format!("{} returned {}", self.endpoint, status)));
        }
        if !status.is_success() {
            return Err(GenerationError::Permanent(format!(
                "{} rejected the request with {} (is model '{}' pulled?)",
                self.endpoint, status, self.model
            )));
        }

        let body: OllamaResponse = response
            .json()
            .map_err(|e| GenerationError::Permanent(format!("unexpected response body: {}", e)))?;
        Ok(body.response)
    }
}

// ============================================================================
// Mock backend (canned responses, for tests and offline runs)
// ============================================================================

/// Replays queued responses in order; the last one repeats once the queue
/// has a single element left.
pub struct MockTextInference {
    responses: Mutex<VecDeque<Result<String, GenerationError>>>,
}

impl MockTextInference {
    pub fn new(response: &str) -> Self {
        Self::sequence(vec![Ok(response.to_string())])
    }

    pub fn sequence(responses: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

impl TextInference for MockTextInference {
    fn infer_text(&self, _prompt: &str) -> Result<String, GenerationError> {
        let mut queue = self
            .responses
            .lock()
            .map_err(|_| GenerationError::Permanent("mock backend lock poisoned".to_string()))?;
        let next = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        next.unwrap_or_else(|| Err(GenerationError::Permanent("no mock response queued".to_string())))
    }
}

// ============================================================================
// LlmGenerator: GenerationCollaborator over a TextInference backend
// ============================================================================

/// Sends the normalized recording to an LLM and parses its JSON answer.
/// Transient backend failures are retried up to `max_retries` times.
pub struct LlmGenerator {
    backend: Box<dyn TextInference>,
    max_retries: u32,
}

impl LlmGenerator {
    pub fn new(backend: Box<dyn TextInference>) -> Self {
        Self { backend, max_retries: 2 }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Create an LlmGenerator backed by a MockTextInference with a canned response.
    pub fn with_mock_response(response: &str) -> Self {
        Self::new(Box::new(MockTextInference::new(response)))
    }

    fn build_prompt(recording: &ParsedRecording, scenario: &str) -> Result<String, GenerationError> {
        let actions = serde_json::to_string_pretty(&recording.actions)
            .map_err(|e| GenerationError::Permanent(format!("cannot encode actions: {}", e)))?;

        Ok(format!(
            r##"Convert this recorded browser session into a behave BDD scenario.

SCENARIO: {scenario}
START URL: {start_url}
MULTIPLE PAGES: {multi}

ACTIONS (JSON):
{actions}

Return ONLY valid JSON matching this exact schema:
{{
  "featureText": "Feature: ...\n  Scenario: ...\n    Given ...",
  "stepImports": ["{import}"],
  "stepCandidates": [
    {{ "pattern": "I fill \"{{value}}\" into the username field", "paramCount": 1, "code": "@when(...)\ndef step_impl(context, value):\n    ..." }}
  ],
  "componentCandidates": [
    {{
      "name": "LoginPage",
      "locators": [
        {{ "elementName": "username_input", "descriptor": {{ "strategy": "role|text|label|placeholder|testid|css|xpath", "value": "textbox", "qualifier": "Username" }} }}
      ],
      "methods": [
        {{ "methodName": "fill_username_input", "parameterNames": ["value"], "body": "self.username_input.fill(value)" }}
      ]
    }}
  ]
}}

Use {{name}} placeholders for every literal value in step patterns.
Respond with ONLY valid JSON, no explanation."##,
            scenario = scenario,
            start_url = recording.metadata.start_url.as_deref().unwrap_or("unknown"),
            multi = recording.metadata.has_multiple_pages,
            actions = actions,
            import = BEHAVE_IMPORT,
        ))
    }

    fn parse_response(response: &str) -> Result<GenerationOutput, GenerationError> {
        // models sometimes wrap the JSON in a markdown fence
        let trimmed = response.trim();
        let json = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .and_then(|t| t.strip_suffix("```"))
            .unwrap_or(trimmed);

        serde_json::from_str(json)
            .map_err(|e| GenerationError::Permanent(format!("model output is not the expected JSON: {}", e)))
    }
}

impl GenerationCollaborator for LlmGenerator {
    fn generate(&self, recording: &ParsedRecording, scenario: &str) -> Result<GenerationOutput, GenerationError> {
        let prompt = Self::build_prompt(recording, scenario)?;

        let mut attempt = 0;
        loop {
            match self.backend.infer_text(&prompt) {
                Ok(response) => {
                    debug!(scenario, attempt, bytes = response.len(), "generation response received");
                    return Self::parse_response(&response);
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(scenario, attempt, error = %e, "retrying generation");
                    std::thread::sleep(Duration::from_millis(250 * u64::from(attempt)));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

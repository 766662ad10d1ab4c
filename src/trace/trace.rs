use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::coordinator::result::ConversionState;

/// One line of the JSONL conversion trace.
#[derive(Debug, Serialize)]
pub struct TraceEvent {
    pub timestamp_ms: u128,
    pub step: u64,

    pub scenario: String,
    pub state: ConversionState,

    pub detail: Option<String>,
    pub error: Option<String>,
}

impl TraceEvent {
    pub fn now(step: u64, scenario: &str, state: ConversionState) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or_default(),
            step,
            scenario: scenario.to_string(),
            state,
            detail: None,
            error: None,
        }
    }

    pub fn with_detail(mut self, detail: impl ToString) -> Self {
        self.detail = Some(detail.to_string());
        self
    }

    pub fn with_error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

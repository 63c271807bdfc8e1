//! Collaborator seams: persistence, execution, and telemetry.
//!
//! The core never talks to a network itself. [`PlaygroundApi`] covers the
//! prompt backend and model execution; [`SpanSource`] hands out recorded
//! span attributes for [`import_span`](crate::trace::import_span). Both are
//! object-safe and return boxed futures so that a frontend can hold them as
//! `Arc<dyn ...>`.
//!
//! - [`single_flight`] deduplicates concurrent requests for the same
//!   resource.

pub mod single_flight;

pub use single_flight::SingleFlight;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{ModelParameters, Prompt, PromptConfig, PromptResponse};
use crate::{Message, ResponseFormat, Tool, ToolCall, ToolChoice};

/// Boxed future returned by collaborator methods.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

// ── Errors ─────────────────────────────────────────────────────────

/// Failures surfaced by collaborators or by pre-flight checks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid prompt configuration: {0}")]
    InvalidConfig(String),
}

impl ApiError {
    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Request(_) => true,
            ApiError::Status { status, .. } => *status == 429 || *status >= 500,
            ApiError::NotFound(_) | ApiError::InvalidConfig(_) => false,
        }
    }
}

// ── Wire types ─────────────────────────────────────────────────────

/// Acknowledgement of a save: the name it was stored under and the new
/// version number.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SavedPrompt {
    pub name: String,
    pub version: u32,
}

/// A saved prompt as listed by the backend.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BackendPrompt {
    pub name: String,
    #[serde(default)]
    pub versions: Vec<u32>,
}

impl BackendPrompt {
    pub fn latest_version(&self) -> Option<u32> {
        self.versions.iter().copied().max()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PromptVersion {
    pub version: u32,
    pub created_at: DateTime<Utc>,
}

/// One model invocation, with template variables already substituted.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub provider: String,
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    pub parameters: ModelParameters,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

impl CompletionRequest {
    /// A request for `prompt`'s configuration with the given (rendered)
    /// messages.
    pub fn for_prompt(prompt: &Prompt, messages: Vec<Message>) -> Self {
        Self {
            provider: prompt.provider.clone(),
            model: prompt.model.clone(),
            messages,
            tools: prompt.tools.clone(),
            tool_choice: prompt.tool_choice.clone(),
            parameters: prompt.parameters.clone(),
            response_format: prompt.response_format.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct CompletionResponse {
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl From<CompletionResponse> for PromptResponse {
    fn from(response: CompletionResponse) -> Self {
        PromptResponse {
            content: response.content,
            cost: response.cost.unwrap_or(0.0),
            tool_calls: response.tool_calls.unwrap_or_default(),
        }
    }
}

// ── Collaborator traits ────────────────────────────────────────────

/// Prompt persistence and model execution.
pub trait PlaygroundApi: Send + Sync {
    /// Store `config` under `name` as a new version.
    fn save<'a>(&'a self, name: &'a str, config: &'a PromptConfig) -> ApiFuture<'a, SavedPrompt>;

    fn list_prompts<'a>(&'a self, task_id: Option<&'a str>) -> ApiFuture<'a, Vec<BackendPrompt>>;

    fn list_versions<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Vec<PromptVersion>>;

    fn get_version<'a>(&'a self, name: &'a str, version: u32) -> ApiFuture<'a, PromptConfig>;

    fn run(&self, request: CompletionRequest) -> ApiFuture<'_, CompletionResponse>;

    /// Server-side variable substitution.
    fn render_variables(
        &self,
        messages: Vec<Message>,
        variables: BTreeMap<String, String>,
    ) -> ApiFuture<'_, Vec<Message>>;

    fn list_providers(&self) -> ApiFuture<'_, Vec<String>>;

    fn list_models<'a>(&'a self, provider: &'a str) -> ApiFuture<'a, Vec<String>>;
}

/// Recorded telemetry.
pub trait SpanSource: Send + Sync {
    /// The attribute dictionary of one span.
    fn span_attributes<'a>(&'a self, span_id: &'a str) -> ApiFuture<'a, serde_json::Value>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolCall;

    #[test]
    fn transient_errors() {
        assert!(ApiError::Request("reset".into()).is_transient());
        assert!(
            ApiError::Status {
                status: 503,
                message: "busy".into()
            }
            .is_transient()
        );
        assert!(
            !ApiError::Status {
                status: 400,
                message: "bad".into()
            }
            .is_transient()
        );
        assert!(!ApiError::InvalidConfig("x".into()).is_transient());
    }

    #[test]
    fn error_messages() {
        let err = ApiError::Status {
            status: 401,
            message: "unauthorized".into(),
        };
        assert_eq!(err.to_string(), "API error 401: unauthorized");
    }

    #[test]
    fn completion_response_defaults() {
        let response: PromptResponse = CompletionResponse {
            content: "ok".into(),
            cost: None,
            tool_calls: Some(vec![ToolCall::new("1", "f", "{}")]),
        }
        .into();
        assert_eq!(response.cost, 0.0);
        assert_eq!(response.tool_calls.len(), 1);
    }

    #[test]
    fn latest_version_is_max() {
        let prompt = BackendPrompt {
            name: "p".into(),
            versions: vec![1, 3, 2],
        };
        assert_eq!(prompt.latest_version(), Some(3));
    }
}

//! Workspace configuration with sensible defaults.
//!
//! [`PlaygroundConfig`] seeds new prompts, the provider catalog, and span
//! imports. It is a plain struct: build it with [`Default`] and the `with_*`
//! methods, or load it from a JSON file where every field is optional.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::store::ModelParameters;
use crate::trace::DEFAULT_IMPORT_NAME;
use crate::{DEFAULT_MODEL, DEFAULT_PROVIDER};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PlaygroundConfig {
    /// Provider for new prompts and unlabelled spans. Default: `"openai"`.
    pub default_provider: String,
    /// Model for new prompts and unlabelled spans. Default: `"gpt-4o-mini"`.
    pub default_model: String,
    /// Sampling parameters for new prompts.
    pub default_parameters: ModelParameters,
    /// Providers offered before the backend reports its own list.
    pub enabled_providers: Vec<String>,
    /// Scope for listing saved prompts. `None` lists everything.
    pub task_id: Option<String>,
    /// Name given to prompts imported from spans. Default: `"Imported span"`.
    pub import_name: String,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            default_provider: DEFAULT_PROVIDER.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            default_parameters: ModelParameters::default(),
            enabled_providers: vec![DEFAULT_PROVIDER.to_string()],
            task_id: None,
            import_name: DEFAULT_IMPORT_NAME.to_string(),
        }
    }
}

impl PlaygroundConfig {
    /// Load from a JSON file. Missing fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {e}", path.display()))?;
        serde_json::from_str(&raw)
            .map_err(|e| format!("invalid config {}: {e}", path.display()))
    }

    pub fn with_default_model(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.default_provider = provider.into();
        self.default_model = model.into();
        self
    }

    pub fn with_default_parameters(mut self, parameters: ModelParameters) -> Self {
        self.default_parameters = parameters;
        self
    }

    pub fn with_enabled_providers(mut self, providers: Vec<String>) -> Self {
        self.enabled_providers = providers;
        self
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_import_name(mut self, name: impl Into<String>) -> Self {
        self.import_name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = PlaygroundConfig::default();
        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.default_model, "gpt-4o-mini");
        assert_eq!(config.default_parameters.max_tokens, 1000);
        assert!((config.default_parameters.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.enabled_providers, vec!["openai"]);
        assert_eq!(config.import_name, "Imported span");
    }

    #[test]
    fn builders_chain() {
        let config = PlaygroundConfig::default()
            .with_default_model("anthropic", "claude-sonnet-4")
            .with_enabled_providers(vec!["anthropic".into(), "openai".into()])
            .with_task_id("task-42");
        assert_eq!(config.default_provider, "anthropic");
        assert_eq!(config.enabled_providers.len(), 2);
        assert_eq!(config.task_id.as_deref(), Some("task-42"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"default_model": "gpt-4.1", "default_parameters": {{"temperature": 0.1}}}}"#
        )
        .unwrap();

        let config = PlaygroundConfig::from_file(file.path()).unwrap();
        assert_eq!(config.default_model, "gpt-4.1");
        assert_eq!(config.default_provider, "openai");
        assert!((config.default_parameters.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.default_parameters.max_tokens, 1000);
    }

    #[test]
    fn bad_files_report_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let err = PlaygroundConfig::from_file(&missing).unwrap_err();
        assert!(err.contains("nope.json"));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{not json").unwrap();
        let err = PlaygroundConfig::from_file(&broken).unwrap_err();
        assert!(err.starts_with("invalid config"));
    }
}

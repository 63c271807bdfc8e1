//! Async orchestration around the store.
//!
//! [`Workspace`] owns the [`PlaygroundState`] behind a mutex and is the only
//! place that talks to collaborators. Every operation reads what it needs
//! under the lock, releases it, awaits the collaborator, and then feeds the
//! settled result back through [`reduce`] as an [`Action`]. The lock is never
//! held across an `.await`.
//!
//! Collaborator failures are returned to the caller and also recorded in the
//! workspace's [`NotificationBuffer`].

use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::api::{
    ApiError, BackendPrompt, CompletionRequest, PlaygroundApi, PromptVersion, SavedPrompt,
    SingleFlight, SpanSource,
};
use crate::config::PlaygroundConfig;
use crate::notify::NotificationBuffer;
use crate::store::{Action, PlaygroundState, Prompt, PromptResponse, reduce};
use crate::template::render_messages;
use crate::trace::{ImportOptions, import_span};
use crate::Message;

pub struct Workspace<A: PlaygroundApi + ?Sized + 'static> {
    api: Arc<A>,
    config: PlaygroundConfig,
    state: Arc<Mutex<PlaygroundState>>,
    versions: SingleFlight<Vec<PromptVersion>>,
    notifications: NotificationBuffer,
}

impl<A: PlaygroundApi + ?Sized + 'static> Workspace<A> {
    pub fn new(api: Arc<A>, config: PlaygroundConfig) -> Self {
        let state = PlaygroundState::new(&config);
        Self {
            api,
            config,
            state: Arc::new(Mutex::new(state)),
            versions: SingleFlight::new(),
            notifications: NotificationBuffer::new(),
        }
    }

    pub fn config(&self) -> &PlaygroundConfig {
        &self.config
    }

    pub fn notifications(&self) -> &NotificationBuffer {
        &self.notifications
    }

    /// Handle to the live state, for frontends that render it directly.
    pub fn shared_state(&self) -> Arc<Mutex<PlaygroundState>> {
        Arc::clone(&self.state)
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> PlaygroundState {
        self.lock().clone()
    }

    /// Apply one action.
    pub fn dispatch(&self, action: Action) {
        let mut state = self.lock();
        let current = std::mem::take(&mut *state);
        *state = reduce(current, action);
    }

    fn lock(&self) -> MutexGuard<'_, PlaygroundState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn report(&self, context: &str, error: &ApiError) {
        warn!(error = %error, "{context}");
        self.notifications.error(format!("{context}: {error}"));
    }

    fn not_found(prompt_id: &str) -> ApiError {
        ApiError::NotFound(format!("prompt {prompt_id}"))
    }

    // ── Execution ──────────────────────────────────────────────────

    /// Run one prompt with the current keyword values substituted into its
    /// messages.
    pub async fn run_prompt(&self, prompt_id: &str) -> Result<PromptResponse, ApiError> {
        let request = {
            let state = self.lock();
            let prompt = state
                .prompt(prompt_id)
                .ok_or_else(|| Self::not_found(prompt_id))?;
            let messages = render_messages(&prompt.messages, state.keywords.values());
            CompletionRequest::for_prompt(prompt, messages)
        };

        self.dispatch(Action::RunStarted {
            prompt_id: prompt_id.to_string(),
        });
        debug!(
            prompt_id,
            model = %request.model,
            messages = request.messages.len(),
            "running prompt"
        );

        match self.api.run(request).await {
            Ok(response) => {
                let response = PromptResponse::from(response);
                self.dispatch(Action::RunFinished {
                    prompt_id: prompt_id.to_string(),
                    response: Some(response.clone()),
                });
                Ok(response)
            }
            Err(e) => {
                self.report("Run failed", &e);
                self.dispatch(Action::RunFinished {
                    prompt_id: prompt_id.to_string(),
                    response: None,
                });
                Err(e)
            }
        }
    }

    /// Run every prompt concurrently. Results are in prompt order.
    pub async fn run_all(&self) -> Vec<(String, Result<PromptResponse, ApiError>)> {
        let ids: Vec<String> = self.lock().prompts.iter().map(|p| p.id.clone()).collect();
        let results = join_all(ids.iter().map(|id| self.run_prompt(id))).await;
        ids.into_iter().zip(results).collect()
    }

    /// Server-side rendering of a prompt's messages with the current keyword
    /// values.
    pub async fn render_preview(&self, prompt_id: &str) -> Result<Vec<Message>, ApiError> {
        let (messages, variables) = {
            let state = self.lock();
            let prompt = state
                .prompt(prompt_id)
                .ok_or_else(|| Self::not_found(prompt_id))?;
            (prompt.messages.clone(), state.keywords.values().clone())
        };
        self.api
            .render_variables(messages, variables)
            .await
            .inspect_err(|e| self.report("Rendering failed", e))
    }

    // ── Persistence ────────────────────────────────────────────────

    /// Save a prompt as a new version, under `name` or its current name.
    ///
    /// Tool parameter schemas and the response format schema are checked
    /// first; an invalid configuration is rejected without calling the API.
    pub async fn save_prompt(
        &self,
        prompt_id: &str,
        name: Option<&str>,
    ) -> Result<SavedPrompt, ApiError> {
        let (name, config, problems) = {
            let state = self.lock();
            let prompt = state
                .prompt(prompt_id)
                .ok_or_else(|| Self::not_found(prompt_id))?;
            (
                name.map_or_else(|| prompt.name.clone(), str::to_string),
                prompt.to_config(),
                prompt.validation_errors(),
            )
        };

        if !problems.is_empty() {
            let e = ApiError::InvalidConfig(problems.join("; "));
            self.report("Save rejected", &e);
            return Err(e);
        }

        match self.api.save(&name, &config).await {
            Ok(saved) => {
                self.dispatch(Action::PromptSaved {
                    prompt_id: prompt_id.to_string(),
                    name: saved.name.clone(),
                    version: saved.version,
                    config,
                });
                info!(name = %saved.name, version = saved.version, "prompt saved");
                self.notifications
                    .info(format!("Saved {} v{}", saved.name, saved.version));
                Ok(saved)
            }
            Err(e) => {
                self.report("Save failed", &e);
                Err(e)
            }
        }
    }

    /// Refresh the list of saved prompts.
    pub async fn load_backend_prompts(&self) -> Result<Vec<BackendPrompt>, ApiError> {
        let prompts = self
            .api
            .list_prompts(self.config.task_id.as_deref())
            .await
            .inspect_err(|e| self.report("Loading prompts failed", e))?;
        self.dispatch(Action::SetBackendPrompts {
            prompts: prompts.clone(),
        });
        Ok(prompts)
    }

    /// Replace the open prompts with the latest version of every saved
    /// prompt. Prompts whose version cannot be fetched are skipped.
    pub async fn open_backend_prompts(&self) -> Result<usize, ApiError> {
        let listed = self.load_backend_prompts().await?;
        let latest: Vec<(&str, u32)> = listed
            .iter()
            .filter_map(|p| Some((p.name.as_str(), p.latest_version()?)))
            .collect();

        let fetched = join_all(
            latest
                .iter()
                .map(|(name, version)| self.api.get_version(name, *version)),
        )
        .await;

        let mut prompts = Vec::with_capacity(fetched.len());
        for ((name, version), result) in latest.iter().zip(fetched) {
            match result {
                Ok(config) => prompts.push(Prompt::from_config(*name, *version, config)),
                Err(e) => self.report(&format!("Loading {name} v{version} failed"), &e),
            }
        }

        let count = prompts.len();
        self.dispatch(Action::HydrateFromBackend { prompts });
        Ok(count)
    }

    /// Versions of a saved prompt. Concurrent requests for the same name
    /// share one API call.
    pub async fn prompt_versions(&self, name: &str) -> Result<Vec<PromptVersion>, ApiError> {
        let api = Arc::clone(&self.api);
        let owned = name.to_string();
        self.versions
            .run(name, move || async move { api.list_versions(&owned).await })
            .await
            .inspect_err(|e| self.report("Loading versions failed", e))
    }

    /// Load one saved version into the workspace, either replacing the prompt
    /// `replace` in place or as a new prompt. Returns the id it lives under.
    pub async fn open_version(
        &self,
        name: &str,
        version: u32,
        replace: Option<&str>,
    ) -> Result<String, ApiError> {
        let config = self
            .api
            .get_version(name, version)
            .await
            .inspect_err(|e| self.report("Loading version failed", e))?;

        let prompt = Prompt::from_config(name, version, config);
        let mut state = self.lock();
        let current = std::mem::take(&mut *state);
        *state = reduce(
            current,
            Action::HydratePrompt {
                replace: replace.map(str::to_string),
                prompt,
            },
        );
        match replace {
            Some(id) if state.prompt(id).is_some() => Ok(id.to_string()),
            Some(id) => Err(Self::not_found(id)),
            None => state
                .prompts
                .last()
                .map(|p| p.id.clone())
                .ok_or_else(|| Self::not_found(name)),
        }
    }

    // ── Provider catalog ───────────────────────────────────────────

    /// Fetch enabled providers and each provider's models.
    ///
    /// A provider whose model list fails to load keeps no model list; the
    /// other providers are unaffected.
    pub async fn refresh_providers(&self) -> Result<Vec<String>, ApiError> {
        let providers = self
            .api
            .list_providers()
            .await
            .inspect_err(|e| self.report("Loading providers failed", e))?;
        self.dispatch(Action::SetProviders {
            providers: providers.clone(),
        });

        let lists = join_all(providers.iter().map(|p| self.api.list_models(p))).await;
        for (provider, result) in providers.iter().zip(lists) {
            match result {
                Ok(models) => self.dispatch(Action::SetAvailableModels {
                    provider: provider.clone(),
                    models,
                }),
                Err(e) => self.report(&format!("Loading models for {provider} failed"), &e),
            }
        }
        Ok(providers)
    }

    // ── Telemetry ──────────────────────────────────────────────────

    /// Replace the workspace contents with a prompt rebuilt from one span.
    /// Returns the id of the imported prompt.
    pub async fn import_trace<S: SpanSource + ?Sized>(
        &self,
        source: &S,
        span_id: &str,
    ) -> Result<String, ApiError> {
        let attributes = source
            .span_attributes(span_id)
            .await
            .inspect_err(|e| self.report("Loading span failed", e))?;

        let prompt = import_span(&attributes, &ImportOptions::from(&self.config));
        self.dispatch(Action::HydrateFromTrace { prompt });
        info!(span_id, "span imported into workspace");

        self.lock()
            .prompts
            .first()
            .map(|p| p.id.clone())
            .ok_or_else(|| ApiError::NotFound(format!("span {span_id}")))
    }
}

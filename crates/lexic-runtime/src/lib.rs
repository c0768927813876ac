//! # lexic-runtime
//!
//! Everything in Lexic that talks to a model or to MLflow.
//!
//! - [`providers`]: the `LlmProvider` seam, the Anthropic client, retry and
//!   completion caching
//! - [`prompts`]: templated prompts shared by agents, generators and judge
//! - [`agents`] and [`pipeline`]: the ten drafting agents and their
//!   forward pipeline
//! - [`judge`]: rubric-driven scoring of a prediction against ground truth
//! - [`synthetic`]: decision extraction and backwards case generation
//! - [`tracking`]: MLflow REST client and a no-op tracker
//! - [`orchestrator`]: the per-step evaluation loop
//!
//! Execution is sequential. The async runtime only drives HTTP I/O.
//!
//! ## Example
//!
//! ```rust,ignore
//! use lexic_runtime::{LexicConfig, LexicRuntime, NoopTracker, orchestrator::EvaluationOrchestrator};
//! use lexic_core::EvalStep;
//!
//! let config = LexicConfig::load(None)?;
//! let runtime = LexicRuntime::from_config(config)?;
//! let orchestrator = EvaluationOrchestrator::new(&runtime, Box::new(NoopTracker::new()))?;
//! let outcome = orchestrator.run_evaluation(EvalStep::Qualification, Some(5), None).await?;
//! ```

use std::sync::Arc;
use thiserror::Error;

use lexic_core::{CaseStore, CoreError, RubricError, ValidationError};

pub mod agents;
pub mod client;
pub mod config;
pub mod judge;
pub mod orchestrator;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod synthetic;
pub mod tracking;
pub mod usage;

pub use agents::{Agent, AgentError, AgentKind, AgentRegistry, PromptAgent};
pub use client::LlmClient;
pub use config::{ConfigError, LexicConfig, ModelRole};
pub use judge::{Judge, JudgeError};
pub use prompts::{PromptCategory, PromptError, PromptLibrary, PromptTemplate};
pub use providers::{
    CachedProvider, ChatMessage, CompletionConfig, CompletionResponse, LlmProvider,
    ProviderError, ProviderRegistry, RetryingProvider, Role, TokenUsage,
};
pub use tracking::{NoopTracker, RunStatus, Tracker, TrackingError};
pub use usage::{LlmUsage, UsageTracker};

/// Errors surfaced by runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Rubric(#[from] RubricError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Judge error: {0}")]
    Judge(#[from] JudgeError),

    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("Malformed model output: {0}")]
    MalformedOutput(#[from] ValidationError),

    #[error("Failed to write {path}: {message}")]
    Write { path: String, message: String },

    #[error("Invalid name mapping {path}: {message}")]
    NameMapping { path: String, message: String },
}

/// Shared handles for one CLI invocation.
///
/// Holds the configuration, the data layout, the provider stack, the prompt
/// library and the usage tracker. Components borrow what they need from it.
pub struct LexicRuntime {
    pub config: LexicConfig,
    pub store: CaseStore,
    pub provider: Arc<dyn LlmProvider>,
    pub prompts: Arc<PromptLibrary>,
    pub usage: Arc<UsageTracker>,
}

impl LexicRuntime {
    pub fn builder() -> LexicRuntimeBuilder {
        LexicRuntimeBuilder::new()
    }

    /// Build the runtime with the provider stack described by `config`:
    /// registry provider, wrapped in retry, wrapped in the completion cache.
    pub fn from_config(config: LexicConfig) -> Result<Self, RuntimeError> {
        let registry = ProviderRegistry::with_defaults();
        let base = registry.create(&config.provider)?;
        let provider = providers::layered(base, &config);
        Self::builder().config(config).provider(provider).build()
    }

    /// A model client for one role, recording usage into this runtime.
    pub fn client(&self, role: ModelRole) -> LlmClient {
        LlmClient::new(
            Arc::clone(&self.provider),
            self.config.completion_config(role),
            role,
            Arc::clone(&self.usage),
        )
    }
}

/// Builder for [`LexicRuntime`].
pub struct LexicRuntimeBuilder {
    config: LexicConfig,
    provider: Option<Arc<dyn LlmProvider>>,
    prompts: Option<PromptLibrary>,
}

impl LexicRuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config: LexicConfig::default(),
            provider: None,
            prompts: None,
        }
    }

    pub fn config(mut self, config: LexicConfig) -> Self {
        self.config = config;
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = Some(prompts);
        self
    }

    /// Build the runtime. Prompt overrides from the config are applied
    /// unless a library was set explicitly.
    pub fn build(self) -> Result<LexicRuntime, RuntimeError> {
        let provider = self.provider.ok_or_else(|| {
            ProviderError::NotConfigured("No LLM provider configured".to_string())
        })?;

        let prompts = match self.prompts {
            Some(prompts) => prompts,
            None => match &self.config.prompts_dir {
                Some(dir) => PromptLibrary::builtin().with_overrides(dir)?,
                None => PromptLibrary::builtin(),
            },
        };

        Ok(LexicRuntime {
            store: CaseStore::new(&self.config.data_dir),
            config: self.config,
            provider,
            prompts: Arc::new(prompts),
            usage: Arc::new(UsageTracker::new()),
        })
    }
}

impl Default for LexicRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted provider shared by the unit tests.

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    use crate::providers::{
        ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, Role, TokenUsage,
    };
    use crate::{LexicConfig, LexicRuntime};

    /// Returns queued replies in order and records every request.
    #[derive(Default)]
    pub struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<String, ProviderError>>>,
        pub requests: Mutex<Vec<(Vec<ChatMessage>, CompletionConfig)>>,
    }

    impl ScriptedProvider {
        pub fn new<I, S>(replies: I) -> Arc<Self>
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn push_reply(&self, reply: impl Into<String>) {
            self.replies.lock().push_back(Ok(reply.into()));
        }

        pub fn push_error(&self, error: ProviderError) {
            self.replies.lock().push_back(Err(error));
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().len()
        }

        /// User message of the n-th request.
        pub fn user_message(&self, n: usize) -> String {
            self.requests.lock()[n]
                .0
                .iter()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            self.requests.lock().push((messages, config.clone()));
            let reply = self
                .replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::HttpError("script exhausted".into())))?;
            Ok(CompletionResponse {
                content: reply,
                usage: TokenUsage {
                    prompt_tokens: 100,
                    completion_tokens: 20,
                    ..Default::default()
                },
                model: config.model.clone(),
                stop_reason: Some("end_turn".to_string()),
                cached: false,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    pub fn runtime(data_dir: &std::path::Path, provider: Arc<ScriptedProvider>) -> LexicRuntime {
        let config = LexicConfig {
            data_dir: data_dir.to_path_buf(),
            ..LexicConfig::default()
        };
        LexicRuntime::builder()
            .config(config)
            .provider(provider)
            .build()
            .unwrap()
    }
}

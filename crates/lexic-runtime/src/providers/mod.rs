//! Model providers.
//!
//! Every model call in Lexic goes through [`LlmProvider`]. [`layered`]
//! builds the stack used at runtime:
//!
//! ```text
//! CachedProvider -> RetryingProvider -> AnthropicProvider
//! ```
//!
//! API keys live in an [`ApiCredential`] and are redacted from `Debug`
//! and `Display` output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

mod cached;
mod factory;
mod retry;
pub mod secrets;

#[cfg(feature = "anthropic")]
mod anthropic;

pub use cached::CachedProvider;
pub use factory::{ProviderFactory, ProviderRegistry};
pub use retry::RetryingProvider;
pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicProvider, AnthropicProviderFactory};

use crate::config::LexicConfig;

/// Environment variable name for the Anthropic API key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Request to model API failed: {0}")]
    HttpError(String),

    #[error("Rate limited by model API (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Model API returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Unreadable model API response: {0}")]
    ParseError(String),

    #[error("Model API rejected credentials: {0}")]
    AuthError(String),

    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Whether the same request may succeed later: rate limits, timeouts,
    /// transport failures and any 5xx (Anthropic uses 529 when overloaded).
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. }
            | ProviderError::Timeout(_)
            | ProviderError::HttpError(_) => true,
            ProviderError::ApiError { status, .. } => *status >= 500,
            ProviderError::ParseError(_)
            | ProviderError::AuthError(_)
            | ProviderError::NotConfigured(_) => false,
        }
    }
}

/// Per-call model settings. [`LexicConfig::completion_config`] derives one
/// per [`ModelRole`](crate::ModelRole).
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionConfig {
    pub model: String,
    pub max_tokens: u32,
    /// 0.0 makes the call deterministic and cacheable.
    pub temperature: f32,
    pub timeout: Duration,
    /// Mark prompt blocks as cacheable on the Anthropic side.
    pub prompt_caching: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: crate::config::DEFAULT_MODEL.to_string(),
            max_tokens: 2_048,
            temperature: 0.0,
            timeout: Duration::from_secs(300),
            prompt_caching: false,
        }
    }
}

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn of a prompt. Templates render a system turn and a user turn.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub usage: TokenUsage,
    /// Model that actually served the request.
    pub model: String,
    pub stop_reason: Option<String>,
    /// Served from the completion cache. No tokens were spent.
    pub cached: bool,
}

/// Token counts reported by the provider for one call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub cache_read_tokens: u32,
    pub cache_creation_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Cheap readiness check. Does not call the API.
    async fn health_check(&self) -> bool;

    fn name(&self) -> &str;

    /// Rough token count for `text`, about four bytes per token.
    fn estimate_tokens(&self, text: &str) -> u32 {
        (text.len() / 4) as u32
    }
}

/// Wrap a base provider in retry and, if enabled, the completion cache.
pub fn layered(base: Arc<dyn LlmProvider>, config: &LexicConfig) -> Arc<dyn LlmProvider> {
    let retrying: Arc<dyn LlmProvider> = Arc::new(RetryingProvider::new(base, config.max_retries));
    if config.cache_capacity == 0 {
        return retrying;
    }
    Arc::new(CachedProvider::new(retrying, config.cache_capacity, config.cache_ttl))
}

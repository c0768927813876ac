//! A provider bound to one role's model settings.

use std::sync::Arc;

use crate::config::ModelRole;
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError};
use crate::usage::UsageTracker;

/// Provider plus completion settings for one [`ModelRole`].
///
/// Every completion served by the model is recorded in the shared
/// [`UsageTracker`]. Cache hits are not.
#[derive(Clone)]
pub struct LlmClient {
    provider: Arc<dyn LlmProvider>,
    config: CompletionConfig,
    role: ModelRole,
    usage: Arc<UsageTracker>,
}

impl LlmClient {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        config: CompletionConfig,
        role: ModelRole,
        usage: Arc<UsageTracker>,
    ) -> Self {
        Self {
            provider,
            config,
            role,
            usage,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn role(&self) -> ModelRole {
        self.role
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    /// Run one completion and return its text.
    pub async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, ProviderError> {
        let response = self.provider.complete(messages, &self.config).await?;
        if !response.cached {
            self.usage.record(self.role, &response.usage, &self.config.model);
        }
        tracing::debug!(
            role = %self.role,
            model = %response.model,
            cached = response.cached,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            "Completion finished"
        );
        Ok(response.content)
    }
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider", &self.provider.name())
            .field("role", &self.role)
            .field("model", &self.config.model)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::CachedProvider;
    use crate::testing::ScriptedProvider;
    use std::time::Duration;

    #[tokio::test]
    async fn test_complete_records_usage() {
        let provider = ScriptedProvider::new(["réponse"]);
        let usage = Arc::new(UsageTracker::new());
        let client = LlmClient::new(
            provider.clone(),
            CompletionConfig::default(),
            ModelRole::Agent,
            Arc::clone(&usage),
        );

        let text = client.complete(vec![ChatMessage::user("q")]).await.unwrap();
        assert_eq!(text, "réponse");

        let agent = usage.for_role(ModelRole::Agent);
        assert_eq!(agent.llm_calls, 1);
        assert_eq!(agent.prompt_tokens, 100);
        assert_eq!(agent.completion_tokens, 20);
    }

    #[tokio::test]
    async fn test_errors_are_not_recorded() {
        let provider = ScriptedProvider::new(Vec::<String>::new());
        let usage = Arc::new(UsageTracker::new());
        let client = LlmClient::new(
            provider,
            CompletionConfig::default(),
            ModelRole::Judge,
            Arc::clone(&usage),
        );

        assert!(client.complete(vec![ChatMessage::user("q")]).await.is_err());
        assert_eq!(usage.total().llm_calls, 0);
    }

    #[tokio::test]
    async fn test_cache_hits_are_not_billed() {
        let provider = ScriptedProvider::new(["score 4", "score 2"]);
        let cached = Arc::new(CachedProvider::new(provider.clone(), 100, Duration::from_secs(60)));
        let usage = Arc::new(UsageTracker::new());
        let client = LlmClient::new(
            cached,
            CompletionConfig {
                temperature: 0.0,
                ..CompletionConfig::default()
            },
            ModelRole::Judge,
            Arc::clone(&usage),
        );

        let first = client.complete(vec![ChatMessage::user("note")]).await.unwrap();
        let second = client.complete(vec![ChatMessage::user("note")]).await.unwrap();
        assert_eq!(first.content, "score 4");
        assert_eq!(second.content, "score 4");
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(provider.request_count(), 1);

        let judge = usage.for_role(ModelRole::Judge);
        assert_eq!(judge.llm_calls, 1);
        assert_eq!(judge.prompt_tokens, 100);
        assert_eq!(judge.completion_tokens, 20);
    }
}

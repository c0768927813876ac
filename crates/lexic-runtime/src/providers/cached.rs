//! In-memory completion cache.
//!
//! Only deterministic requests (temperature 0) are cached, so repeated judge
//! calls over an unchanged prediction cost nothing while sampled agent and
//! generation output stays fresh.

use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use super::{ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError};

/// Caches completions keyed by model, sampling settings and messages.
pub struct CachedProvider {
    inner: Arc<dyn LlmProvider>,
    cache: Cache<CacheKey, CompletionResponse>,
}

impl CachedProvider {
    pub fn new(inner: Arc<dyn LlmProvider>, max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self { inner, cache }
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

/// The full request, so two different prompts can never share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    model: String,
    temperature_bits: u32,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

impl CacheKey {
    fn new(messages: &[ChatMessage], config: &CompletionConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature_bits: config.temperature.to_bits(),
            max_tokens: config.max_tokens,
            messages: messages.to_vec(),
        }
    }
}

#[async_trait]
impl LlmProvider for CachedProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        if config.temperature != 0.0 {
            return self.inner.complete(messages, config).await;
        }

        let key = CacheKey::new(&messages, config);
        if let Some(mut hit) = self.cache.get(&key).await {
            tracing::debug!(model = %config.model, "Completion cache hit");
            hit.cached = true;
            return Ok(hit);
        }

        let response = self.inner.complete(messages, config).await?;
        self.cache.insert(key, response.clone()).await;
        Ok(response)
    }

    async fn health_check(&self) -> bool {
        self.inner.health_check().await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;

    fn deterministic() -> CompletionConfig {
        CompletionConfig {
            temperature: 0.0,
            ..CompletionConfig::default()
        }
    }

    #[tokio::test]
    async fn test_deterministic_requests_are_cached() {
        let inner = ScriptedProvider::new(["first", "second"]);
        let provider = CachedProvider::new(inner.clone(), 100, Duration::from_secs(60));
        let messages = vec![ChatMessage::system("s"), ChatMessage::user("u")];

        let a = provider.complete(messages.clone(), &deterministic()).await.unwrap();
        let b = provider.complete(messages, &deterministic()).await.unwrap();

        assert_eq!(a.content, "first");
        assert_eq!(b.content, "first");
        assert!(!a.cached);
        assert!(b.cached);
        assert_eq!(inner.request_count(), 1);
    }

    #[tokio::test]
    async fn test_sampled_requests_bypass_cache() {
        let inner = ScriptedProvider::new(["first", "second"]);
        let provider = CachedProvider::new(inner.clone(), 100, Duration::from_secs(60));
        let config = CompletionConfig {
            temperature: 0.7,
            ..CompletionConfig::default()
        };

        let a = provider.complete(vec![ChatMessage::user("u")], &config).await.unwrap();
        let b = provider.complete(vec![ChatMessage::user("u")], &config).await.unwrap();

        assert_eq!(a.content, "first");
        assert_eq!(b.content, "second");
        assert_eq!(inner.request_count(), 2);
    }

    #[tokio::test]
    async fn test_key_includes_model_and_messages() {
        let inner = ScriptedProvider::new(["a", "b", "c"]);
        let provider = CachedProvider::new(inner.clone(), 100, Duration::from_secs(60));
        let other_model = CompletionConfig {
            model: "other".to_string(),
            ..deterministic()
        };

        provider.complete(vec![ChatMessage::user("u")], &deterministic()).await.unwrap();
        provider.complete(vec![ChatMessage::user("u")], &other_model).await.unwrap();
        provider.complete(vec![ChatMessage::user("v")], &deterministic()).await.unwrap();

        assert_eq!(inner.request_count(), 3);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let inner = ScriptedProvider::new(Vec::<String>::new());
        inner.push_error(ProviderError::HttpError("down".into()));
        inner.push_reply("recovered");
        let provider = CachedProvider::new(inner.clone(), 100, Duration::from_secs(60));

        assert!(provider.complete(vec![ChatMessage::user("u")], &deterministic()).await.is_err());
        let ok = provider.complete(vec![ChatMessage::user("u")], &deterministic()).await.unwrap();
        assert_eq!(ok.content, "recovered");
    }

    #[test]
    fn test_key_compares_whole_request() {
        let config = deterministic();
        let key = CacheKey::new(&[ChatMessage::user("u")], &config);
        assert_eq!(key, CacheKey::new(&[ChatMessage::user("u")], &config));
        assert_ne!(key, CacheKey::new(&[ChatMessage::system("u")], &config));
        assert_ne!(
            key,
            CacheKey::new(
                &[ChatMessage::user("u")],
                &CompletionConfig {
                    max_tokens: config.max_tokens + 1,
                    ..config.clone()
                }
            )
        );
    }

    #[tokio::test]
    async fn test_max_tokens_separates_entries() {
        let inner = ScriptedProvider::new(["short", "long"]);
        let provider = CachedProvider::new(inner.clone(), 100, Duration::from_secs(60));
        let longer = CompletionConfig {
            max_tokens: 8192,
            ..deterministic()
        };

        let a = provider.complete(vec![ChatMessage::user("u")], &deterministic()).await.unwrap();
        let b = provider.complete(vec![ChatMessage::user("u")], &longer).await.unwrap();

        assert_eq!(a.content, "short");
        assert_eq!(b.content, "long");
        assert!(!b.cached);
        assert_eq!(inner.request_count(), 2);
    }
}

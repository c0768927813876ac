//! Retry of transient provider failures with exponential backoff.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use std::sync::Arc;
use std::time::Duration;

use super::{ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError};

/// Retries transient errors (see [`ProviderError::is_transient`]) up to
/// `max_retries` times after the first attempt. Other errors are returned
/// immediately. A `Retry-After` hint from a rate limit is the minimum wait
/// before the next attempt.
pub struct RetryingProvider {
    inner: Arc<dyn LlmProvider>,
    max_retries: usize,
    min_delay: Duration,
    max_delay: Duration,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn LlmProvider>, max_retries: usize) -> Self {
        Self {
            inner,
            max_retries,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }

    /// Override the backoff bounds.
    pub fn with_delays(mut self, min_delay: Duration, max_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self.max_delay = max_delay;
        self
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
            .with_jitter()
    }
}

#[async_trait]
impl LlmProvider for RetryingProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let attempt = || {
            let messages = messages.clone();
            async move { self.inner.complete(messages, config).await }
        };

        attempt
            .retry(self.backoff())
            .sleep(tokio::time::sleep)
            .when(|e: &ProviderError| e.is_transient())
            .adjust(|e: &ProviderError, delay: Option<Duration>| {
                delay.map(|d| match e {
                    ProviderError::RateLimited {
                        retry_after: Some(hint),
                    } => d.max(*hint),
                    _ => d,
                })
            })
            .notify(|e: &ProviderError, delay: Duration| {
                tracing::warn!(
                    provider = self.inner.name(),
                    model = %config.model,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "Transient provider error, retrying"
                );
            })
            .await
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

    fn retrying(inner: Arc<ScriptedProvider>, retries: usize) -> RetryingProvider {
        RetryingProvider::new(inner, retries)
            .with_delays(Duration::from_millis(1), Duration::from_millis(5))
    }

    async fn ask(provider: &RetryingProvider) -> Result<CompletionResponse, ProviderError> {
        provider
            .complete(vec![ChatMessage::user("q")], &CompletionConfig::default())
            .await
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let inner = ScriptedProvider::new(Vec::<String>::new());
        inner.push_error(ProviderError::RateLimited { retry_after: None });
        inner.push_error(ProviderError::ApiError {
            status: 529,
            message: "overloaded".into(),
        });
        inner.push_reply("fine");
        let provider = retrying(Arc::clone(&inner), 3);

        let response = ask(&provider).await.unwrap();
        assert_eq!(response.content, "fine");
        assert_eq!(inner.request_count(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let inner = ScriptedProvider::new(Vec::<String>::new());
        for _ in 0..5 {
            inner.push_error(ProviderError::Timeout(Duration::from_secs(1)));
        }
        let provider = retrying(Arc::clone(&inner), 3);

        let err = ask(&provider).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
        assert_eq!(inner.request_count(), 4);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let inner = ScriptedProvider::new(Vec::<String>::new());
        inner.push_error(ProviderError::ApiError {
            status: 400,
            message: "bad request".into(),
        });
        let provider = retrying(Arc::clone(&inner), 3);

        let err = ask(&provider).await.unwrap_err();
        assert!(matches!(err, ProviderError::ApiError { status: 400, .. }));
        assert_eq!(inner.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_hint_sets_minimum_delay() {
        let inner = ScriptedProvider::new(Vec::<String>::new());
        inner.push_error(ProviderError::RateLimited {
            retry_after: Some(Duration::from_millis(50)),
        });
        inner.push_reply("fine");
        let provider = retrying(Arc::clone(&inner), 3);

        let started = tokio::time::Instant::now();
        let response = ask(&provider).await.unwrap();
        assert_eq!(response.content, "fine");
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(inner.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_applies_without_hint() {
        let inner = ScriptedProvider::new(Vec::<String>::new());
        inner.push_error(ProviderError::RateLimited { retry_after: None });
        inner.push_reply("fine");
        let provider = retrying(Arc::clone(&inner), 3);

        let started = tokio::time::Instant::now();
        ask(&provider).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_zero_retries() {
        let inner = ScriptedProvider::new(Vec::<String>::new());
        inner.push_error(ProviderError::HttpError("connection reset".into()));
        let provider = retrying(Arc::clone(&inner), 0);

        assert!(ask(&provider).await.is_err());
        assert_eq!(inner.request_count(), 1);
    }
}

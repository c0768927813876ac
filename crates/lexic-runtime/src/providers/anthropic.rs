//! Anthropic Messages API.
//!
//! System turns are sent as the top-level `system` field; the remaining
//! turns become text content blocks. The key is only exposed when the
//! `x-api-key` header is set.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::{
    factory::ProviderFactory,
    secrets::{ApiCredential, CredentialSource},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, Role, TokenUsage,
    ANTHROPIC_API_KEY_ENV,
};
use crate::config::ProviderSettings;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    credential: ApiCredential,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credential(ApiCredential::new(api_key, CredentialSource::Programmatic))
    }

    /// Key from `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Result<Self, ProviderError> {
        Ok(Self::with_credential(ApiCredential::resolve(None, ANTHROPIC_API_KEY_ENV)?))
    }

    /// Key from `provider.api_key` (tagged with `api_key_source`), else
    /// `ANTHROPIC_API_KEY`; base URL from `provider.base_url` when set.
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let credential = match settings.api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => ApiCredential::new(key, settings.api_key_source),
            None => ApiCredential::resolve(None, ANTHROPIC_API_KEY_ENV)?,
        };
        let provider = Self::with_credential(credential);
        Ok(match &settings.base_url {
            Some(url) => provider.with_base_url(url.as_str()),
            None => provider,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn with_credential(credential: ApiCredential) -> Self {
        Self {
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn request(messages: Vec<ChatMessage>, config: &CompletionConfig) -> MessagesRequest {
        let mut system: Vec<String> = Vec::new();
        let mut turns = Vec::new();
        for message in messages {
            match message.role {
                Role::System => system.push(message.content),
                role => turns.push(Turn {
                    role,
                    content: vec![TextBlock {
                        kind: "text",
                        text: message.content,
                        cache_control: config.prompt_caching.then_some(CacheControl { kind: "ephemeral" }),
                    }],
                }),
            }
        }

        MessagesRequest {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            messages: turns,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Turn>,
}

#[derive(Debug, Serialize)]
struct Turn {
    role: Role,
    content: Vec<TextBlock>,
}

#[derive(Debug, Serialize)]
struct TextBlock {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_control: Option<CacheControl>,
}

#[derive(Debug, Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    model: String,
    stop_reason: Option<String>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
    #[serde(default)]
    cache_creation_input_tokens: u32,
    #[serde(default)]
    cache_read_input_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Error for a non-2xx reply. `body` is the raw response text.
fn status_error(status: StatusCode, retry_after: Option<Duration>, body: &str) -> ProviderError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ProviderError::RateLimited { retry_after };
    }
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::AuthError(message),
        _ => ProviderError::ApiError {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = Self::request(messages, config);
        tracing::debug!(model = %config.model, turns = request.messages.len(), "Anthropic request");

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.credential.expose())
            .header("anthropic-version", API_VERSION)
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(config.timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, retry_after, &body));
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(CompletionResponse {
            content: body.content.into_iter().filter_map(|block| block.text).collect(),
            usage: TokenUsage {
                prompt_tokens: body.usage.input_tokens,
                completion_tokens: body.usage.output_tokens,
                cache_read_tokens: body.usage.cache_read_input_tokens,
                cache_creation_tokens: body.usage.cache_creation_input_tokens,
            },
            model: body.model,
            stop_reason: body.stop_reason,
            cached: false,
        })
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

/// `provider.type: anthropic`.
pub struct AnthropicProviderFactory;

impl ProviderFactory for AnthropicProviderFactory {
    fn provider_type(&self) -> &'static str {
        "anthropic"
    }

    fn validate(&self, settings: &ProviderSettings) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(settings.api_key.as_deref(), ANTHROPIC_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "Anthropic needs provider.api_key or {}",
                ANTHROPIC_API_KEY_ENV
            )));
        }
        match &settings.base_url {
            Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => Err(
                ProviderError::NotConfigured(format!("provider.base_url is not an http(s) URL: {}", url)),
            ),
            _ => Ok(()),
        }
    }

    fn create(&self, settings: &ProviderSettings) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(AnthropicProvider::from_settings(settings)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(api_key: &str, base_url: Option<&str>) -> ProviderSettings {
        ProviderSettings {
            api_key: Some(api_key.to_string()),
            base_url: base_url.map(str::to_string),
            ..ProviderSettings::default()
        }
    }

    #[test]
    fn test_request_splits_system_turns() {
        let config = CompletionConfig::default();
        let request = AnthropicProvider::request(
            vec![
                ChatMessage::system("Tu rédiges en français."),
                ChatMessage::user("Qualifie les faits."),
                ChatMessage::system("Réponds en markdown."),
            ],
            &config,
        );
        assert_eq!(
            request.system.as_deref(),
            Some("Tu rédiges en français.\n\nRéponds en markdown.")
        );

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
        assert!(json["messages"][0]["content"][0].get("cache_control").is_none());
        assert_eq!(json["temperature"], 0.0);
    }

    #[test]
    fn test_request_without_system_omits_field() {
        let config = CompletionConfig {
            prompt_caching: true,
            ..CompletionConfig::default()
        };
        let request = AnthropicProvider::request(vec![ChatMessage::user("q")], &config);
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("system").is_none());
        assert_eq!(json["messages"][0]["content"][0]["cache_control"]["type"], "ephemeral");
    }

    #[test]
    fn test_status_error_mapping() {
        let body = r#"{"type":"error","error":{"type":"invalid_request_error","message":"max_tokens too large"}}"#;
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, None, body),
            ProviderError::ApiError { status: 400, ref message } if message == "max_tokens too large"
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, None, "  denied \n"),
            ProviderError::AuthError(ref message) if message == "denied"
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, Some(Duration::from_secs(3)), ""),
            ProviderError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(3)
        ));
    }

    #[test]
    fn test_from_settings() {
        let provider = AnthropicProvider::from_settings(&settings("sk-ant-cfg", Some("https://proxy.local/v1/"))).unwrap();
        assert_eq!(provider.base_url, "https://proxy.local/v1");
        assert_eq!(provider.credential.expose(), "sk-ant-cfg");
        assert_eq!(provider.credential.source(), CredentialSource::Config);

        let provider = AnthropicProvider::from_settings(&settings("sk-ant-cfg", None)).unwrap();
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_from_settings_keeps_env_origin() {
        let from_env = ProviderSettings {
            api_key_source: CredentialSource::Environment,
            ..settings("sk-ant-env", None)
        };
        let provider = AnthropicProvider::from_settings(&from_env).unwrap();
        assert_eq!(provider.credential.expose(), "sk-ant-env");
        assert_eq!(provider.credential.source(), CredentialSource::Environment);
        assert!(format!("{:?}", provider).contains("Environment"));
    }

    #[test]
    fn test_factory_rejects_bad_base_url() {
        let factory = AnthropicProviderFactory;
        assert!(factory.validate(&settings("k", Some("proxy.local"))).is_err());
        assert!(factory.validate(&settings("k", Some("http://localhost:8080"))).is_ok());
    }

    #[test]
    fn test_debug_hides_key() {
        let provider = AnthropicProvider::new("sk-ant-super-secret");
        let debug = format!("{:?}", provider);
        assert!(!debug.contains("sk-ant-super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_health_check_requires_key() {
        assert!(AnthropicProvider::new("sk-ant-key").health_check().await);
        assert!(!AnthropicProvider::new("").health_check().await);
    }
}

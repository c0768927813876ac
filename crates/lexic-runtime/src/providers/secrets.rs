//! API key handling.
//!
//! The key is stored as a `secrecy::SecretString`. Formatting an
//! [`ApiCredential`] prints where the key came from, never the key, and
//! [`ApiCredential::expose`] is only called when the request header is set.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use super::ProviderError;

/// Where a credential was resolved from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CredentialSource {
    /// `provider.api_key` in the YAML config
    #[default]
    Config,
    Environment,
    Programmatic,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::Config => "config",
            CredentialSource::Environment => "environment",
            CredentialSource::Programmatic => "programmatic",
        }
    }
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
        }
    }

    /// Resolve a key: the configured value if set and non-empty, else
    /// `env_var` from the process environment.
    pub fn resolve(configured: Option<&str>, env_var: &str) -> Result<Self, ProviderError> {
        Self::resolve_with(configured, env_var, |name| std::env::var(name).ok())
    }

    /// [`resolve`](Self::resolve) with an explicit environment lookup.
    pub fn resolve_with<F>(configured: Option<&str>, env_var: &str, lookup: F) -> Result<Self, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = configured.filter(|v| !v.is_empty()) {
            return Ok(Self::new(value, CredentialSource::Config));
        }
        match lookup(env_var).filter(|v| !v.is_empty()) {
            Some(value) => Ok(Self::new(value, CredentialSource::Environment)),
            None => Err(ProviderError::NotConfigured(format!(
                "API key missing: set provider.api_key or {}",
                env_var
            ))),
        }
    }

    /// Whether [`resolve`](Self::resolve) would succeed.
    pub fn is_available(configured: Option<&str>, env_var: &str) -> bool {
        configured.is_some_and(|v| !v.is_empty()) || std::env::var(env_var).is_ok_and(|v| !v.is_empty())
    }

    /// The raw key, for the request header only.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED] ({})", self.source)
    }
}

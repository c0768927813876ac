//! Provider construction from the `provider` config section.
//!
//! ```ignore
//! let registry = ProviderRegistry::with_defaults();
//! let provider = registry.create(&config.provider)?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{LlmProvider, ProviderError};
use crate::config::ProviderSettings;

/// Builds providers of one `provider.type`.
pub trait ProviderFactory: Send + Sync {
    fn provider_type(&self) -> &'static str;

    /// Reject settings that could never produce a working provider.
    fn validate(&self, settings: &ProviderSettings) -> Result<(), ProviderError>;

    fn create(&self, settings: &ProviderSettings) -> Result<Arc<dyn LlmProvider>, ProviderError>;
}

#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<&'static str, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        self.factories.insert(factory.provider_type(), factory);
    }

    /// Validate `settings` with the factory for `settings.provider_type`
    /// and build the provider.
    pub fn create(&self, settings: &ProviderSettings) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let factory = self
            .factories
            .get(settings.provider_type.as_str())
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!(
                    "unknown provider type '{}' (known: {})",
                    settings.provider_type,
                    self.available_types().join(", ")
                ))
            })?;
        factory.validate(settings)?;
        let provider = factory.create(settings)?;
        tracing::debug!(provider = provider.name(), "Provider ready");
        Ok(provider)
    }

    pub fn available_types(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    #[cfg(feature = "anthropic")]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::AnthropicProviderFactory));
        registry
    }

    #[cfg(not(feature = "anthropic"))]
    pub fn with_defaults() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

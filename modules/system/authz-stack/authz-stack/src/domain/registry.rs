//! Registry mapping configuration identifiers to plugin factories.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use authz_stack_sdk::AuthorizationPlugin;

use super::error::DomainError;

/// Produces a fresh, not yet loaded plugin instance.
pub type PluginFactory = Arc<dyn Fn() -> Box<dyn AuthorizationPlugin> + Send + Sync>;

/// Identifier → factory table consulted on every stack (re)build.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    factories: HashMap<String, PluginFactory>,
}

impl PluginRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`, replacing any previous registration.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn AuthorizationPlugin> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// Builder-style variant of [`Self::register`].
    #[must_use]
    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn AuthorizationPlugin> + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered identifiers, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Instantiate the plugin registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::UnknownPlugin`] when nothing is registered under `name`.
    pub fn create(&self, name: &str) -> Result<Box<dyn AuthorizationPlugin>, DomainError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| DomainError::UnknownPlugin {
                name: name.to_owned(),
            })?;
        Ok(factory())
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .finish()
    }
}

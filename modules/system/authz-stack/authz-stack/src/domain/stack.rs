//! Immutable, ordered list of loaded plugin entries.

use std::fmt;

use authz_stack_sdk::{AuthorizationPlugin, ControlFlag, PluginParams, StackConfig};
use tracing::debug;

use super::error::DomainError;
use super::registry::PluginRegistry;

/// One loaded entry: identifier, control flag, effective parameters and instance.
pub struct StackEntry {
    name: String,
    flag: ControlFlag,
    params: PluginParams,
    plugin: Box<dyn AuthorizationPlugin>,
}

impl StackEntry {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        flag: ControlFlag,
        params: PluginParams,
        plugin: Box<dyn AuthorizationPlugin>,
    ) -> Self {
        Self {
            name: name.into(),
            flag,
            params,
            plugin,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn flag(&self) -> ControlFlag {
        self.flag
    }

    /// Parameters after merging the stack-level setup.
    #[must_use]
    pub fn params(&self) -> &PluginParams {
        &self.params
    }

    #[must_use]
    pub fn plugin(&self) -> &dyn AuthorizationPlugin {
        self.plugin.as_ref()
    }
}

impl fmt::Debug for StackEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackEntry")
            .field("name", &self.name)
            .field("flag", &self.flag)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Ordered plugin entries. Never mutated once published; reload swaps whole stacks.
#[derive(Debug, Default)]
pub struct PluginStack {
    generation: u64,
    entries: Vec<StackEntry>,
}

impl PluginStack {
    /// The generation-0 stack: no entries, denies everything.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_entries(generation: u64, entries: Vec<StackEntry>) -> Self {
        Self {
            generation,
            entries,
        }
    }

    /// Instantiate and load every configured entry, in order.
    ///
    /// # Errors
    ///
    /// - [`DomainError::UnknownPlugin`] for an unregistered identifier
    /// - [`DomainError::PluginLoad`] for the first entry rejecting its parameters
    pub fn build(
        registry: &PluginRegistry,
        config: &StackConfig,
        generation: u64,
    ) -> Result<Self, DomainError> {
        let mut entries = Vec::with_capacity(config.stack.len());

        for descriptor in &config.stack {
            let params = descriptor.parameters.merged_over(&config.setup);
            let mut plugin = registry.create(&descriptor.name)?;
            plugin
                .load(&params)
                .map_err(|source| DomainError::PluginLoad {
                    name: descriptor.name.clone(),
                    source,
                })?;
            debug!(
                plugin = %descriptor.name,
                flag = %descriptor.flag,
                "plugin loaded"
            );
            entries.push(StackEntry::new(
                descriptor.name.clone(),
                descriptor.flag,
                params,
                plugin,
            ));
        }

        Ok(Self::from_entries(generation, entries))
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn entries(&self) -> &[StackEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Domain errors for the authorization stack.

use authz_stack_sdk::{AuthorizationError, LoadError};

/// Internal domain errors.
#[derive(thiserror::Error, Debug)]
pub enum DomainError {
    #[error("no plugin registered under '{name}'")]
    UnknownPlugin { name: String },

    #[error("plugin '{name}' failed to load: {source}")]
    PluginLoad {
        name: String,
        #[source]
        source: LoadError,
    },

    #[error("smoke test failed for plugin '{name}': {reason}")]
    SmokeTestFailed { name: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AuthorizationError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::UnknownPlugin { name } => Self::UnknownPlugin { name },
            DomainError::PluginLoad { name, source } => Self::PluginLoad { name, source },
            DomainError::SmokeTestFailed { name, reason } => Self::SmokeTestFailed { name, reason },
            DomainError::Config(reason) => Self::InvalidConfiguration(reason),
            DomainError::Internal(reason) => Self::Internal(reason),
        }
    }
}

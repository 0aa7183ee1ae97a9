//! Configuration for the authorization stack.

use std::path::Path;

use authz_stack_sdk::{DirectoryPoolConfig, StackConfig};
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use serde::Deserialize;

use crate::domain::DomainError;

/// Environment prefix; nested keys are separated with `__`,
/// e.g. `AUTHZ_STACK_DIRECTORY__MAX_CONNECTIONS=4`.
pub const ENV_PREFIX: &str = "AUTHZ_STACK_";

/// Configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthzStackConfig {
    /// Ordered plugin stack and shared setup parameters.
    pub authorization: StackConfig,

    /// Directory connection pool used by directory-backed plugins.
    pub directory: DirectoryPoolConfig,
}

impl AuthzStackConfig {
    /// Load from a YAML file layered with `AUTHZ_STACK_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Config`] if the file cannot be read or does not
    /// match the expected shape.
    pub fn from_yaml_file(path: &Path) -> Result<Self, DomainError> {
        Self::extract(Figment::new().merge(Yaml::file_exact(path)))
    }

    /// Load from a YAML document layered with `AUTHZ_STACK_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Config`] if the document does not match the expected shape.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, DomainError> {
        Self::extract(Figment::new().merge(Yaml::string(yaml)))
    }

    fn extract(figment: Figment) -> Result<Self, DomainError> {
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| DomainError::Config(e.to_string()))
    }
}

//! Error types for the authorization stack.

use thiserror::Error;

/// Load-time configuration error raised by [`crate::AuthorizationPlugin::load`].
///
/// Fatal to the inclusion of the failing plugin; surfaces during stack
/// construction, never during request evaluation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// A required parameter is absent.
    #[error("missing parameter '{name}'")]
    MissingParameter { name: String },

    /// A parameter is present but malformed.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },
}

impl LoadError {
    pub fn missing(name: impl Into<String>) -> Self {
        Self::MissingParameter { name: name.into() }
    }

    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Uniform failure signal of the directory provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The connection to the directory could not be established.
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    /// No pooled connection became available, or the query did not finish, in time.
    #[error("directory operation timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    /// The filter expression is not well-formed.
    #[error("malformed query: {0}")]
    MalformedQuery(String),

    /// The remote service answered with an error.
    #[error("directory error: {0}")]
    Remote(String),
}

/// Evaluation-time plugin fault.
///
/// The stack evaluator converts every fault into a `false` verdict for the
/// failing entry; it never escapes `authorize`.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors returned by the [`crate::AuthorizationClient`] reload path.
///
/// Access denial is never an error: `authorize` answers with `false`.
#[derive(Debug, Error)]
pub enum AuthorizationError {
    /// The configuration names a plugin that is not registered.
    #[error("unknown plugin '{name}'")]
    UnknownPlugin { name: String },

    /// A plugin rejected its configuration slice.
    #[error("plugin '{name}' failed to load: {source}")]
    PluginLoad {
        name: String,
        #[source]
        source: LoadError,
    },

    /// The freshly built stack faulted during the synthetic check.
    #[error("smoke test failed for plugin '{name}': {reason}")]
    SmokeTestFailed { name: String, reason: String },

    /// The configuration source could not be read or parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

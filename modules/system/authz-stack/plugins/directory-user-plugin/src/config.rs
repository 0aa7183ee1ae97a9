//! Configuration for the directory user plugin.

use authz_stack_sdk::{LoadError, PluginParams};

/// Directory object class of user entries.
pub const OBJECT_CLASS: &str = "objectclass";

/// Comma separated attribute names to cache.
pub const ATTRIBUTES: &str = "attributes";

/// Validated plugin parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUserConfig {
    pub object_class: String,
    pub attributes: Vec<String>,
}

impl DirectoryUserConfig {
    /// # Errors
    ///
    /// - `MissingParameter` if `objectclass` or `attributes` is absent
    /// - `InvalidParameter` if `objectclass` is not alphanumeric or `attributes` is empty
    pub fn from_params(params: &PluginParams) -> Result<Self, LoadError> {
        let object_class = params.require_alphanumeric(OBJECT_CLASS)?.to_owned();
        let attributes = params.require_list(ATTRIBUTES)?;
        Ok(Self {
            object_class,
            attributes,
        })
    }
}

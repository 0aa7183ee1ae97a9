use std::collections::BTreeSet;

use authz_stack_sdk::{LoadError, PluginParams};

pub const ATTRIBUTE: &str = "attribute";
pub const VALUES: &str = "values";

/// Validated plugin parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryAttrConfig {
    pub attribute: String,
    /// Accepted values; `None` accepts any non-empty value set.
    pub values: Option<BTreeSet<String>>,
}

impl DirectoryAttrConfig {
    /// # Errors
    ///
    /// - `MissingParameter` if `attribute` is absent
    /// - `InvalidParameter` if `attribute` is not alphanumeric or `values` has no entries
    pub fn from_params(params: &PluginParams) -> Result<Self, LoadError> {
        let attribute = params.require_alphanumeric(ATTRIBUTE)?.to_owned();
        let values = match params.optional_list(VALUES)? {
            Some(list) if list.is_empty() => {
                return Err(LoadError::invalid(VALUES, "expected at least one value"));
            }
            other => other.map(|list| list.into_iter().collect()),
        };
        Ok(Self { attribute, values })
    }
}

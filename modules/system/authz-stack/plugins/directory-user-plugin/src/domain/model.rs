use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use authz_stack_sdk::{RequestContext, session_cache};

use crate::SESSION_NAMESPACE;

/// Directory facts cached for one caller.
///
/// Holds only configured attributes that came back with at least one value.
/// Configured attributes the directory did not return are listed in
/// [`DirectoryUser::missing`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryUser {
    common_name: String,
    attributes: HashMap<String, BTreeSet<String>>,
    missing: Vec<String>,
}

impl DirectoryUser {
    #[must_use]
    pub fn new(
        common_name: impl Into<String>,
        attributes: HashMap<String, BTreeSet<String>>,
        missing: Vec<String>,
    ) -> Self {
        Self {
            common_name: common_name.into(),
            attributes,
            missing,
        }
    }

    /// Reads the facts cached in the caller's session, if any.
    #[must_use]
    pub fn from_session(ctx: &RequestContext) -> Option<Arc<Self>> {
        session_cache::fetch::<Self>(ctx, SESSION_NAMESPACE)
    }

    /// The `cn=<token>` fragment the entry was looked up by.
    #[must_use]
    pub fn common_name(&self) -> &str {
        &self.common_name
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.attributes.get(name)
    }

    #[must_use]
    pub fn attributes(&self) -> &HashMap<String, BTreeSet<String>> {
        &self.attributes
    }

    /// Configured attributes absent or empty in the directory response.
    #[must_use]
    pub fn missing(&self) -> &[String] {
        &self.missing
    }
}

use authz_stack_sdk::{LoadError, PluginParams, RequestContext, session_cache};
use directory_user_plugin::{DirectoryUser, SESSION_NAMESPACE};
use tracing::{debug, trace};

use crate::config::DirectoryAttrConfig;

/// Matches one attribute of the cached [`DirectoryUser`] against accepted values.
///
/// Never writes to the session.
#[derive(Debug, Default)]
pub struct DirectoryAttrPlugin {
    config: Option<DirectoryAttrConfig>,
}

impl DirectoryAttrPlugin {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn config(&self) -> Option<&DirectoryAttrConfig> {
        self.config.as_ref()
    }

    /// # Errors
    ///
    /// See [`DirectoryAttrConfig::from_params`].
    pub fn configure(&mut self, params: &PluginParams) -> Result<(), LoadError> {
        let config = DirectoryAttrConfig::from_params(params)?;
        debug!(
            attribute = %config.attribute,
            values = ?config.values,
            "directory attribute plugin configured"
        );
        self.config = Some(config);
        Ok(())
    }

    /// Primed once the directory user facts it reads are cached.
    #[must_use]
    pub fn is_primed(&self, ctx: &RequestContext) -> bool {
        session_cache::is_primed(ctx, SESSION_NAMESPACE)
    }

    /// Whether the cached entry carries an accepted value of the attribute.
    #[must_use]
    pub fn matches(&self, ctx: &RequestContext) -> bool {
        let Some(config) = &self.config else {
            return false;
        };
        let Some(user) = DirectoryUser::from_session(ctx) else {
            trace!("no cached directory user");
            return false;
        };
        let Some(found) = user.attribute(&config.attribute) else {
            trace!(attribute = %config.attribute, "attribute not cached for user");
            return false;
        };

        match &config.values {
            Some(accepted) => found.iter().any(|v| accepted.contains(v)),
            None => !found.is_empty(),
        }
    }
}

//! Directory lookup and session population for the directory user plugin.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use authz_stack_sdk::{
    DirectoryProvider, LoadError, PluginError, PluginParams, Principal, RequestContext,
    session_cache,
};
use regex::Regex;
use tracing::{debug, trace, warn};

use super::model::DirectoryUser;
use crate::SESSION_NAMESPACE;
use crate::config::DirectoryUserConfig;

#[allow(clippy::expect_used)]
static COMMON_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(cn=[a-zA-Z0-9_-]+)").expect("Invalid regex pattern"));

/// First `cn=<token>` fragment of a principal string.
#[must_use]
pub fn common_name(principal: &Principal) -> Option<&str> {
    COMMON_NAME
        .find(principal.username())
        .map(|m| m.as_str())
}

/// Search filter matching entries of `object_class` with the given `cn=` fragment.
#[must_use]
pub fn build_filter(object_class: &str, common_name: &str) -> String {
    format!("(&(objectclass={object_class})({common_name}))")
}

/// Caches the caller's directory attributes under [`SESSION_NAMESPACE`].
pub struct DirectoryUserPlugin {
    provider: Arc<dyn DirectoryProvider>,
    config: Option<DirectoryUserConfig>,
}

impl DirectoryUserPlugin {
    #[must_use]
    pub fn new(provider: Arc<dyn DirectoryProvider>) -> Self {
        Self {
            provider,
            config: None,
        }
    }

    /// Validated parameters; `None` until [`Self::configure`] succeeds.
    #[must_use]
    pub fn config(&self) -> Option<&DirectoryUserConfig> {
        self.config.as_ref()
    }

    /// # Errors
    ///
    /// See [`DirectoryUserConfig::from_params`].
    pub fn configure(&mut self, params: &PluginParams) -> Result<(), LoadError> {
        let config = DirectoryUserConfig::from_params(params)?;
        debug!(
            object_class = %config.object_class,
            attributes = ?config.attributes,
            "directory user plugin configured"
        );
        self.config = Some(config);
        Ok(())
    }

    /// Looks up `principal` and replaces the cached [`DirectoryUser`].
    ///
    /// The namespace ends up either holding the fresh facts or empty. A
    /// principal without a common name, or a lookup with no usable attributes,
    /// leaves it empty without an error.
    ///
    /// # Errors
    ///
    /// - `Provider` when the lookup fails
    /// - `Internal` when called before configuration
    pub async fn populate(
        &self,
        ctx: &RequestContext,
        principal: &Principal,
    ) -> Result<(), PluginError> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| PluginError::Internal("plugin is not configured".to_owned()))?;

        let fill = session_cache::begin_fill(ctx, SESSION_NAMESPACE);

        let Some(cn) = common_name(principal) else {
            warn!(
                principal = principal.username(),
                "cannot extract common name from principal"
            );
            fill.abandon();
            return Ok(());
        };
        trace!(common_name = cn, "extracted common name");

        let filter = build_filter(&config.object_class, cn);
        let mut records = match self.provider.lookup(None, &filter, &config.attributes).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, filter = %filter, "directory lookup failed");
                return Err(e.into());
            }
        };

        if records.is_empty() {
            warn!(filter = %filter, "directory returned no records for user");
            fill.abandon();
            return Ok(());
        }

        let mut attributes = HashMap::with_capacity(config.attributes.len());
        let mut missing = Vec::new();
        for name in &config.attributes {
            match records.remove(name) {
                Some(values) if !values.is_empty() => {
                    attributes.insert(name.clone(), values);
                }
                _ => {
                    warn!(attribute = %name, filter = %filter, "fidelity gap: attribute missing from directory response");
                    missing.push(name.clone());
                }
            }
        }

        if attributes.is_empty() {
            warn!(filter = %filter, "none of the configured attributes were returned");
            fill.abandon();
            return Ok(());
        }

        fill.commit(DirectoryUser::new(cn, attributes, missing));
        Ok(())
    }

    /// Whether the caller's facts are cached.
    #[must_use]
    pub fn is_primed(&self, ctx: &RequestContext) -> bool {
        session_cache::is_primed(ctx, SESSION_NAMESPACE)
    }
}

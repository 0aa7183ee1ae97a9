//! Contract every decision module implements.
//!
//! The stack evaluator drives a plugin per entry:
//! `is_session_primed` → (`populate_session` when not primed) → `is_allowed`.

use async_trait::async_trait;

use crate::error::{LoadError, PluginError};
use crate::models::{Entity, PluginParams, Principal};
use crate::session::RequestContext;

/// Decision module of the authorization stack.
///
/// Instances are created by a registry factory, configured once through
/// [`AuthorizationPlugin::load`] and then shared immutably by all concurrent
/// evaluations of the stack that owns them.
#[async_trait]
pub trait AuthorizationPlugin: Send + Sync {
    /// Validate and apply this entry's parameters.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] for missing or malformed parameters; the error
    /// surfaces during stack construction.
    fn load(&mut self, params: &PluginParams) -> Result<(), LoadError>;

    /// Whether the facts this plugin needs already exist in the session.
    fn is_session_primed(&self, ctx: &RequestContext) -> bool;

    /// Derive facts for `principal` and store them under this plugin's namespace.
    ///
    /// Plugins that only read other namespaces keep the default no-op.
    ///
    /// # Errors
    ///
    /// - `Provider` when the directory lookup fails
    /// - `Internal` for unexpected errors
    async fn populate_session(
        &self,
        ctx: &RequestContext,
        principal: &Principal,
    ) -> Result<(), PluginError> {
        let _ = (ctx, principal);
        Ok(())
    }

    /// Policy verdict for one entity, using session-cached facts only.
    ///
    /// # Errors
    ///
    /// - `Internal` for unexpected errors; treated as `false` by the evaluator
    fn is_allowed(&self, ctx: &RequestContext, entity: &Entity) -> Result<bool, PluginError>;
}

//! [`AuthorizationPlugin`] implementation for the directory attribute plugin.

use async_trait::async_trait;
use authz_stack_sdk::{
    AuthorizationPlugin, Entity, LoadError, PluginError, PluginParams, RequestContext,
};

use super::service::DirectoryAttrPlugin;

// Population is left to the directory user plugin; the default no-op applies.
#[async_trait]
impl AuthorizationPlugin for DirectoryAttrPlugin {
    fn load(&mut self, params: &PluginParams) -> Result<(), LoadError> {
        self.configure(params)
    }

    fn is_session_primed(&self, ctx: &RequestContext) -> bool {
        self.is_primed(ctx)
    }

    fn is_allowed(&self, ctx: &RequestContext, _entity: &Entity) -> Result<bool, PluginError> {
        Ok(self.matches(ctx))
    }
}

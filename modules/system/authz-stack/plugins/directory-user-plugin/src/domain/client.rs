//! [`AuthorizationPlugin`] implementation for the directory user plugin.

use async_trait::async_trait;
use authz_stack_sdk::{
    AuthorizationPlugin, Entity, LoadError, PluginError, PluginParams, Principal, RequestContext,
};

use super::service::DirectoryUserPlugin;

#[async_trait]
impl AuthorizationPlugin for DirectoryUserPlugin {
    fn load(&mut self, params: &PluginParams) -> Result<(), LoadError> {
        self.configure(params)
    }

    fn is_session_primed(&self, ctx: &RequestContext) -> bool {
        self.is_primed(ctx)
    }

    async fn populate_session(
        &self,
        ctx: &RequestContext,
        principal: &Principal,
    ) -> Result<(), PluginError> {
        self.populate(ctx, principal).await
    }

    // Projects and groups alike: a caller known to the directory is allowed.
    fn is_allowed(&self, ctx: &RequestContext, _entity: &Entity) -> Result<bool, PluginError> {
        Ok(self.is_primed(ctx))
    }
}

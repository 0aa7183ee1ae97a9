//! Local (in-process) client for the authorization stack.

use std::sync::Arc;

use async_trait::async_trait;
use authz_stack_sdk::{
    AuthorizationClient, AuthorizationError, Entity, ReloadReport, RequestContext, StackConfig,
};

use super::{DomainError, Service};

/// Local client wrapping the service.
pub struct AuthorizationLocalClient {
    svc: Arc<Service>,
}

impl AuthorizationLocalClient {
    #[must_use]
    pub fn new(svc: Arc<Service>) -> Self {
        Self { svc }
    }
}

fn log_and_convert(op: &str, e: DomainError) -> AuthorizationError {
    tracing::error!(operation = op, error = ?e, "authz_stack call failed");
    e.into()
}

#[async_trait]
impl AuthorizationClient for AuthorizationLocalClient {
    async fn authorize(&self, ctx: &RequestContext, entity: &Entity) -> bool {
        self.svc.authorize(ctx, entity).await
    }

    async fn reload(&self, config: &StackConfig) -> Result<ReloadReport, AuthorizationError> {
        self.svc
            .reload(config)
            .await
            .map_err(|e| log_and_convert("reload", e))
    }
}

//! Public API trait for the authorization stack.

use async_trait::async_trait;

use crate::error::AuthorizationError;
use crate::models::{Entity, ReloadReport, StackConfig};
use crate::session::RequestContext;

/// Public API trait consumed by the serving layer:
///
/// ```ignore
/// let allowed = client.authorize(&ctx, &Entity::project("kernel")).await;
/// ```
#[async_trait]
pub trait AuthorizationClient: Send + Sync {
    /// Decide whether the caller of `ctx` may see `entity`.
    ///
    /// Never fails: errors, faults and missing data all answer `false`.
    async fn authorize(&self, ctx: &RequestContext, entity: &Entity) -> bool;

    /// Replace the active stack with one built from `config`.
    ///
    /// # Errors
    ///
    /// - `UnknownPlugin` / `PluginLoad` if an entry cannot be built
    /// - `SmokeTestFailed` if the new stack faults on the synthetic check
    ///
    /// On error the previously active stack keeps serving.
    async fn reload(&self, config: &StackConfig) -> Result<ReloadReport, AuthorizationError>;
}

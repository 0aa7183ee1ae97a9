//! Shared helpers for plugin-owned session namespaces.
//!
//! A namespace is the session key a plugin exclusively writes. Any plugin of
//! the stack may read it. Plugins call these helpers explicitly from their
//! [`crate::AuthorizationPlugin`] implementation.
//!
//! Population goes through a [`NamespaceFill`]: opening it takes over the
//! namespace, [`NamespaceFill::commit`] replaces the stale value in a single
//! write, and dropping it uncommitted clears the namespace. Readers therefore
//! see either the previous complete value, the new complete value, or nothing.

use std::any::Any;
use std::sync::Arc;

use tracing::debug;

use crate::session::RequestContext;

/// Whether `namespace` holds a value in the caller's session. O(1).
#[must_use]
pub fn is_primed(ctx: &RequestContext, namespace: &str) -> bool {
    ctx.session()
        .is_some_and(|session| session.get(namespace).is_some())
}

/// Typed read of `namespace`.
///
/// Returns `None` when there is no session, no value, or a value of another type.
#[must_use]
pub fn fetch<T>(ctx: &RequestContext, namespace: &str) -> Option<Arc<T>>
where
    T: Any + Send + Sync,
{
    let value = ctx.session()?.get(namespace)?;
    value.downcast::<T>().ok()
}

/// Removes `namespace` from the caller's session.
pub fn clear(ctx: &RequestContext, namespace: &str) {
    if let Some(session) = ctx.session() {
        session.remove(namespace);
    }
}

/// Opens a fill of `namespace` for the owning plugin.
#[must_use]
pub fn begin_fill<'a>(ctx: &'a RequestContext, namespace: &'a str) -> NamespaceFill<'a> {
    NamespaceFill {
        ctx,
        namespace,
        committed: false,
    }
}

/// Pending replacement of one namespace; see the module docs.
#[must_use = "an uncommitted fill clears the namespace when dropped"]
pub struct NamespaceFill<'a> {
    ctx: &'a RequestContext,
    namespace: &'a str,
    committed: bool,
}

impl NamespaceFill<'_> {
    /// Stores `value`, replacing whatever the namespace held.
    ///
    /// Returns `false` when the request carries no session to write to.
    pub fn commit<T>(mut self, value: T) -> bool
    where
        T: Any + Send + Sync,
    {
        self.committed = true;
        if let Some(session) = self.ctx.session() {
            session.set(self.namespace, Arc::new(value));
            true
        } else {
            debug!(namespace = self.namespace, "no session to store derived facts");
            false
        }
    }

    /// Gives up the fill; the namespace is cleared.
    pub fn abandon(self) {}
}

impl Drop for NamespaceFill<'_> {
    fn drop(&mut self) {
        if !self.committed {
            clear(self.ctx, self.namespace);
        }
    }
}

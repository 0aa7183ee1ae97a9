//! Per-caller session and per-request context.
//!
//! The serving layer owns [`Session`] objects and their lifecycle; the stack
//! only reads and writes plugin-owned keys through the injected handle.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::models::Principal;

/// Opaque fact stored under a session key.
pub type SessionValue = Arc<dyn Any + Send + Sync>;

/// Keyed attribute store scoped to one caller.
///
/// Every operation must be safe under concurrent requests of the same caller.
/// Single key writes are atomic: a reader observes either the previous or the
/// new value, never a mix.
pub trait Session: Send + Sync {
    /// Stable identifier, used only for diagnostics.
    fn id(&self) -> &str;

    fn get(&self, key: &str) -> Option<SessionValue>;

    fn set(&self, key: &str, value: SessionValue);

    fn remove(&self, key: &str) -> Option<SessionValue>;

    /// Serializes the primed-check and population of plugin namespaces
    /// across concurrent requests of this caller.
    ///
    /// Held across the provider call, hence an async mutex.
    fn fill_lock(&self) -> &tokio::sync::Mutex<()>;
}

/// In-process [`Session`] backed by a concurrent map.
pub struct InMemorySession {
    id: String,
    attributes: DashMap<String, SessionValue>,
    fill_lock: tokio::sync::Mutex<()>,
}

impl InMemorySession {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: DashMap::new(),
            fill_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl fmt::Debug for InMemorySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.attributes.iter().map(|e| e.key().clone()).collect();
        f.debug_struct("InMemorySession")
            .field("id", &self.id)
            .field("keys", &keys)
            .finish_non_exhaustive()
    }
}

impl Session for InMemorySession {
    fn id(&self) -> &str {
        &self.id
    }

    fn get(&self, key: &str) -> Option<SessionValue> {
        self.attributes.get(key).map(|v| Arc::clone(v.value()))
    }

    fn set(&self, key: &str, value: SessionValue) {
        self.attributes.insert(key.to_owned(), value);
    }

    fn remove(&self, key: &str) -> Option<SessionValue> {
        self.attributes.remove(key).map(|(_, v)| v)
    }

    fn fill_lock(&self) -> &tokio::sync::Mutex<()> {
        &self.fill_lock
    }
}

/// Wraps one inbound call: optional principal, optional session and a
/// request-scoped memo of population attempts.
///
/// Never outlives a single request.
pub struct RequestContext {
    principal: Option<Principal>,
    session: Option<Arc<dyn Session>>,
    populate_attempts: Mutex<HashSet<String>>,
}

impl RequestContext {
    #[must_use]
    pub fn builder() -> RequestContextBuilder {
        RequestContextBuilder::default()
    }

    /// A context with neither principal nor session.
    #[must_use]
    pub fn anonymous() -> Self {
        RequestContextBuilder::default().build()
    }

    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    #[must_use]
    pub fn session(&self) -> Option<&dyn Session> {
        self.session.as_deref()
    }

    /// Records that `plugin` attempted to populate the session during this request.
    ///
    /// Returns `true` on the first call for `plugin`, `false` afterwards.
    pub fn mark_populate_attempt(&self, plugin: &str) -> bool {
        self.populate_attempts.lock().insert(plugin.to_owned())
    }

    /// Whether `plugin` already attempted population during this request.
    #[must_use]
    pub fn populate_attempted(&self, plugin: &str) -> bool {
        self.populate_attempts.lock().contains(plugin)
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("principal", &self.principal)
            .field("session", &self.session.as_ref().map(|s| s.id().to_owned()))
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct RequestContextBuilder {
    principal: Option<Principal>,
    session: Option<Arc<dyn Session>>,
}

impl RequestContextBuilder {
    #[must_use]
    pub fn principal(mut self, principal: impl Into<Principal>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    #[must_use]
    pub fn session(mut self, session: Arc<dyn Session>) -> Self {
        self.session = Some(session);
        self
    }

    #[must_use]
    pub fn build(self) -> RequestContext {
        RequestContext {
            principal: self.principal,
            session: self.session,
            populate_attempts: Mutex::new(HashSet::new()),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn in_memory_session_get_set_remove() {
        let session = InMemorySession::new("s-1");
        assert!(session.is_empty());

        session.set("k", Arc::new(42_u32));
        let value = session.get("k").unwrap();
        assert_eq!(value.downcast_ref::<u32>(), Some(&42));
        assert_eq!(session.len(), 1);

        assert!(session.remove("k").is_some());
        assert!(session.get("k").is_none());
        assert!(session.remove("k").is_none());
    }

    #[test]
    fn populate_attempts_are_memoized_per_plugin() {
        let ctx = RequestContext::builder().principal("jdoe").build();

        assert!(!ctx.populate_attempted("directory-user"));
        assert!(ctx.mark_populate_attempt("directory-user"));
        assert!(!ctx.mark_populate_attempt("directory-user"));
        assert!(ctx.populate_attempted("directory-user"));
        assert!(ctx.mark_populate_attempt("other"));
    }

    #[test]
    fn anonymous_context_has_no_principal_or_session() {
        let ctx = RequestContext::anonymous();
        assert!(ctx.principal().is_none());
        assert!(ctx.session().is_none());
    }

    #[test]
    fn builder_attaches_session() {
        let session: Arc<dyn Session> = Arc::new(InMemorySession::new("abc"));
        let ctx = RequestContext::builder()
            .principal("jdoe (cn=jdoe)")
            .session(session)
            .build();

        assert_eq!(ctx.principal().map(Principal::username), Some("jdoe (cn=jdoe)"));
        assert_eq!(ctx.session().map(Session::id), Some("abc"));
    }
}

//! Domain service for the authorization stack.
//!
//! Holds the active [`PluginStack`] behind an [`ArcSwap`]. Evaluations take a
//! snapshot once and keep it for their whole run; reload builds, checks and
//! publishes a new stack with a single swap. A superseded stack, and its
//! plugin instances, is dropped when the last in-flight evaluation releases it.
//!
//! Reload policy: any entry that fails to resolve, load or pass the smoke test
//! aborts the whole reload and the previous stack keeps serving.

use std::sync::Arc;

use arc_swap::ArcSwap;
use authz_stack_sdk::{
    Entity, InMemorySession, ReloadReport, RequestContext, Session, StackConfig,
};
use tracing::{error, info};

use super::error::DomainError;
use super::evaluator::{self, Decision};
use super::registry::PluginRegistry;
use super::stack::PluginStack;

/// Synthetic, non-privileged caller used by the reload smoke test.
pub const SMOKE_TEST_PRINCIPAL: &str = "authz-smoke-test";

/// Synthetic entity used by the reload smoke test.
pub const SMOKE_TEST_PROJECT: &str = "authz-smoke-test";

/// Authorization stack service.
pub struct Service {
    registry: PluginRegistry,
    active: ArcSwap<PluginStack>,
    // Serializes reloads; evaluations never take it.
    reload_lock: tokio::sync::Mutex<()>,
}

impl Service {
    /// Create a service serving the empty (deny-all) stack.
    #[must_use]
    pub fn new(registry: PluginRegistry) -> Self {
        Self {
            registry,
            active: ArcSwap::from_pointee(PluginStack::empty()),
            reload_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Create a service and publish the stack described by `config`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::reload`].
    pub async fn with_config(
        registry: PluginRegistry,
        config: &StackConfig,
    ) -> Result<Self, DomainError> {
        let svc = Self::new(registry);
        svc.reload(config).await?;
        Ok(svc)
    }

    #[must_use]
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Stable reference to the currently active stack.
    #[must_use]
    pub fn snapshot(&self) -> Arc<PluginStack> {
        self.active.load_full()
    }

    /// Generation of the active stack; `0` before the first reload.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.active.load().generation()
    }

    /// Evaluate the active stack and return the detailed decision.
    pub async fn evaluate(&self, ctx: &RequestContext, entity: &Entity) -> Decision {
        let stack = self.snapshot();
        evaluator::evaluate(&stack, ctx, entity).await
    }

    /// Allow/deny for `entity`; internal details go to logs only.
    pub async fn authorize(&self, ctx: &RequestContext, entity: &Entity) -> bool {
        self.evaluate(ctx, entity).await.allowed
    }

    /// Build, smoke-test and publish a new stack.
    ///
    /// # Errors
    ///
    /// - [`DomainError::UnknownPlugin`] / [`DomainError::PluginLoad`] if an entry cannot be built
    /// - [`DomainError::SmokeTestFailed`] if an entry faults on the synthetic check
    ///
    /// The active stack is left untouched on error.
    #[tracing::instrument(skip_all, fields(entries = config.stack.len()))]
    pub async fn reload(&self, config: &StackConfig) -> Result<ReloadReport, DomainError> {
        let _reload = self.reload_lock.lock().await;
        let current = self.active.load().generation();
        let generation = current + 1;

        let stack = PluginStack::build(&self.registry, config, generation)
            .map_err(|e| abort(current, e))?;
        smoke_test(&stack).await.map_err(|e| abort(current, e))?;

        let entries = stack.len();
        self.active.store(Arc::new(stack));
        info!(
            generation,
            previous_generation = current,
            entries,
            "authorization stack published"
        );

        Ok(ReloadReport {
            generation,
            entries,
        })
    }
}

fn abort(current: u64, e: DomainError) -> DomainError {
    error!(error = %e, active_generation = current, "reload aborted, keeping active stack");
    e
}

/// Runs every entry once against a synthetic caller in a throwaway session.
///
/// Verdicts are irrelevant; only faults fail the test.
async fn smoke_test(stack: &PluginStack) -> Result<(), DomainError> {
    let session: Arc<dyn Session> = Arc::new(InMemorySession::new("authz-smoke-test"));
    let ctx = RequestContext::builder()
        .principal(SMOKE_TEST_PRINCIPAL)
        .session(session)
        .build();
    let entity = Entity::project(SMOKE_TEST_PROJECT);

    for entry in stack.entries() {
        if let Err(fault) = evaluator::run_entry(entry, &ctx, &entity).await {
            return Err(DomainError::SmokeTestFailed {
                name: fault.plugin,
                reason: fault.reason,
            });
        }
    }
    Ok(())
}

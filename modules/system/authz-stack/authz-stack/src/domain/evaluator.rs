//! Stack evaluator: folds per-entry verdicts into one decision.
//!
//! Entries run in stack order. Per entry the session is primed when needed
//! (under the session's fill lock, at most once per request) and the verdict
//! is asked for. Requests of one caller queued behind a failed population
//! share that failure instead of retrying it. Faults and panics count as `false`.
//!
//! | flag         | verdict `false`                 | verdict `true`                          |
//! |--------------|---------------------------------|-----------------------------------------|
//! | `REQUIRED`   | deny, continue                  | counts as a pass                        |
//! | `REQUISITE`  | deny, stop                      | counts as a pass                        |
//! | `SUFFICIENT` | ignored                         | allow and stop, unless already denied   |
//! | `OPTIONAL`   | ignored                         | allows only if nothing else decided     |
//!
//! A stack that ends without a denial allows when at least one `REQUIRED`/
//! `REQUISITE` entry passed or, failing that, one `OPTIONAL` entry passed.
//! Everything else, the empty stack included, denies.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use authz_stack_sdk::{ControlFlag, Entity, RequestContext, Session};
use futures_util::FutureExt;
use tracing::{debug, warn};

use super::stack::{PluginStack, StackEntry};

/// Progress of the fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionState {
    Undecided,
    Denied,
    Allowed,
}

/// Where an entry faulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPhase {
    Populate,
    Verdict,
}

/// An entry that failed instead of answering; reported to operators only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginFault {
    pub plugin: String,
    pub flag: ControlFlag,
    pub phase: FaultPhase,
    pub reason: String,
}

/// Result of one evaluation.
#[derive(Debug, Clone)]
pub struct Decision {
    pub allowed: bool,
    /// Final state; never `Undecided`.
    pub state: DecisionState,
    /// Number of entries whose verdict was asked for.
    pub evaluated: usize,
    pub faults: Vec<PluginFault>,
}

impl Decision {
    fn new(state: DecisionState, evaluated: usize, faults: Vec<PluginFault>) -> Self {
        Self {
            allowed: state == DecisionState::Allowed,
            state,
            evaluated,
            faults,
        }
    }
}

/// Evaluate `stack` for `entity` on behalf of the caller of `ctx`.
#[tracing::instrument(skip_all, fields(generation = stack.generation(), entity = %entity))]
pub async fn evaluate(stack: &PluginStack, ctx: &RequestContext, entity: &Entity) -> Decision {
    let mut denied = false;
    let mut required_passed = false;
    let mut optional_passed = false;
    let mut faults = Vec::new();

    for (index, entry) in stack.entries().iter().enumerate() {
        let verdict = match run_entry(entry, ctx, entity).await {
            Ok(verdict) => verdict,
            Err(fault) => {
                warn!(
                    plugin = %fault.plugin,
                    flag = %fault.flag,
                    phase = ?fault.phase,
                    reason = %fault.reason,
                    "plugin fault treated as deny"
                );
                faults.push(fault);
                false
            }
        };
        let evaluated = index + 1;

        match entry.flag() {
            ControlFlag::Required => {
                if verdict {
                    required_passed = true;
                } else {
                    denied = true;
                }
            }
            ControlFlag::Requisite => {
                if !verdict {
                    debug!(plugin = entry.name(), "requisite entry denied");
                    return Decision::new(DecisionState::Denied, evaluated, faults);
                }
                required_passed = true;
            }
            ControlFlag::Sufficient => {
                if verdict && !denied {
                    debug!(plugin = entry.name(), "sufficient entry allowed");
                    return Decision::new(DecisionState::Allowed, evaluated, faults);
                }
            }
            ControlFlag::Optional => {
                if verdict {
                    optional_passed = true;
                }
            }
        }
    }

    let state = if denied {
        DecisionState::Denied
    } else if required_passed || optional_passed {
        DecisionState::Allowed
    } else {
        // Undecided at the end of the stack: fail closed.
        DecisionState::Denied
    };
    Decision::new(state, stack.len(), faults)
}

/// Prime the session for `entry` if needed and ask for its verdict.
///
/// # Errors
///
/// Returns the [`PluginFault`] raised by the entry, panics included.
pub(crate) async fn run_entry(
    entry: &StackEntry,
    ctx: &RequestContext,
    entity: &Entity,
) -> Result<bool, PluginFault> {
    let fault = |phase: FaultPhase, reason: String| PluginFault {
        plugin: entry.name().to_owned(),
        flag: entry.flag(),
        phase,
        reason,
    };

    let populated = AssertUnwindSafe(prime(entry, ctx)).catch_unwind().await;
    match populated {
        Ok(Ok(())) => {}
        Ok(Err(reason)) => return Err(fault(FaultPhase::Populate, reason)),
        Err(panic) => return Err(fault(FaultPhase::Populate, panic_message(&*panic))),
    }

    let verdict = std::panic::catch_unwind(AssertUnwindSafe(|| {
        entry.plugin().is_allowed(ctx, entity)
    }));
    match verdict {
        Ok(Ok(allowed)) => Ok(allowed),
        Ok(Err(e)) => Err(fault(FaultPhase::Verdict, e.to_string())),
        Err(panic) => Err(fault(FaultPhase::Verdict, panic_message(&*panic))),
    }
}

async fn prime(entry: &StackEntry, ctx: &RequestContext) -> Result<(), String> {
    let plugin = entry.plugin();
    if plugin.is_session_primed(ctx) {
        return Ok(());
    }
    // Nothing to derive from, or nowhere to keep it.
    let (Some(principal), Some(session)) = (ctx.principal(), ctx.session()) else {
        return Ok(());
    };
    if ctx.populate_attempted(entry.name()) {
        return Ok(());
    }

    let failures_key = format!("{FAILURES_PREFIX}{}", entry.name());
    let seen = failure_count(session, &failures_key);

    let _fill = session.fill_lock().lock().await;
    // Another request of this caller may have primed it while we waited.
    if plugin.is_session_primed(ctx) || !ctx.mark_populate_attempt(entry.name()) {
        return Ok(());
    }
    // ...or failed to; requests queued behind that failure share it.
    if failure_count(session, &failures_key) != seen {
        return Err("population failed in a concurrent request of this caller".to_owned());
    }

    let populated = plugin.populate_session(ctx, principal).await;
    if let Err(e) = populated {
        session.set(&failures_key, Arc::new(seen.wrapping_add(1)));
        return Err(e.to_string());
    }
    Ok(())
}

/// Framework-private session key counting failed populations per plugin.
const FAILURES_PREFIX: &str = "authz-stack/populate-failures/";

fn failure_count(session: &dyn Session, key: &str) -> u64 {
    session
        .get(key)
        .and_then(|v| v.downcast_ref::<u64>().copied())
        .unwrap_or(0)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_owned()
    }
}

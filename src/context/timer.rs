/*!
 * Timer Contexts
 *
 * A cancel node with a deadline. The armed timer is a spawned task
 * racing the deadline against the node's own done signal, so any
 * cancellation (manual or cascaded) retires the timer instead of
 * leaving a dangling wakeup. A deadline already covered by an ancestor
 * arms no timer at all: the ancestor's cascade will fire no later.
 */

use crate::errors::Cause;
use crate::promise::Promise;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::cancel::{node_key, propagate_cancel, CancelCtx, Cancelable};
use super::context::{Context, Ctx};

/// A context cancelled automatically when its deadline elapses.
pub struct TimerCtx {
    cancel: CancelCtx,
    deadline: Instant,
}

/// Wraps `parent` with a deadline `timeout` from now.
pub fn with_timeout(parent: &Ctx, timeout: Duration) -> Arc<TimerCtx> {
    with_deadline(parent, Instant::now() + timeout)
}

/// Wraps `parent` with an absolute deadline.
///
/// If an ancestor already carries an earlier (or equal) deadline, the
/// node degenerates to a plain cancellation point reporting the
/// inherited deadline: the ancestor's timer fires first and cascades
/// here. If the deadline has already passed, the node is cancelled
/// synchronously with a deadline-exceeded cause.
///
/// Must be called within a tokio runtime when a timer is armed.
pub fn with_deadline(parent: &Ctx, deadline: Instant) -> Arc<TimerCtx> {
    let inherited = parent.deadline();
    let covered = matches!(inherited, Some(ancestor) if ancestor <= deadline);
    let effective = match inherited {
        Some(ancestor) if ancestor <= deadline => ancestor,
        _ => deadline,
    };

    let ctx = Arc::new(TimerCtx {
        cancel: CancelCtx::new_node(parent.clone()),
        deadline: effective,
    });
    propagate_cancel(parent, ctx.clone());

    if covered {
        log::trace!("deadline covered by ancestor at {effective:?}, no timer armed");
        return ctx;
    }
    if deadline <= Instant::now() {
        ctx.cancel_node(true, Cause::deadline_exceeded());
        return ctx;
    }

    let node = ctx.clone();
    let done = node.done();
    tokio::spawn(async move {
        tokio::select! {
            () = tokio::time::sleep_until(deadline) => {
                log::trace!("context deadline elapsed");
                node.cancel_node(true, Cause::deadline_exceeded());
            }
            // Cancelled some other way first; the timer retires.
            () = done.wait() => {}
        }
    });
    ctx
}

impl TimerCtx {
    /// Cancels this context with the generic canceled cause.
    pub fn cancel(&self) {
        self.cancel_node(true, Cause::canceled());
    }

    /// Cancels this context with an explicit cause.
    ///
    /// The first cancellation wins; later calls are no-ops.
    pub fn cancel_with(&self, cause: Cause) {
        self.cancel_node(true, cause);
    }

    /// Whether this node has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Cancelable for TimerCtx {
    fn cancel_node(&self, remove_from_parent: bool, cause: Cause) {
        let first = self.cancel.cancel_internal(cause);
        if first && remove_from_parent {
            self.cancel.remove_self_from_parent(node_key(self));
        }
    }
}

impl Context for TimerCtx {
    fn deadline(&self) -> Option<Instant> {
        Some(self.deadline)
    }

    fn done(&self) -> Promise<()> {
        self.cancel.done_handle().clone()
    }

    fn err(&self) -> Option<Cause> {
        self.cancel.err()
    }

    fn value(&self, key: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.cancel.parent().value(key)
    }

    fn cancel_registry(&self) -> Option<&CancelCtx> {
        Some(&self.cancel)
    }
}

impl fmt::Debug for TimerCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}.with_deadline({:?})",
            self.cancel.parent(),
            self.deadline
        )?;
        if self.is_cancelled() {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}

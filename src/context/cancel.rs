/*!
 * Cancel Contexts
 *
 * The cancellation point of the tree. Each node keeps a registry of
 * descendant cancelables; cancelling the node resolves its done
 * promise, records the cause, and cascades the same cause to every
 * registered child. Propagation prefers direct registration with the
 * nearest cancelable ancestor and falls back to a watcher task for
 * foreign `Context` implementations.
 */

use crate::errors::Cause;
use crate::promise::Promise;
use ahash::HashMap;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;

use super::background::never_done;
use super::context::{Context, Ctx};

/// Internal face of a node that can be cancelled: the built-in
/// `CancelCtx`/`TimerCtx` variants. Registries hold children through
/// this trait so a cascade reaches timers and plain cancel nodes alike.
pub(crate) trait Cancelable: Context {
    /// Cancels this node. `remove_from_parent` is true for an
    /// individual cancellation and false when an ancestor cascade is
    /// already dropping its whole registry.
    fn cancel_node(&self, remove_from_parent: bool, cause: Cause);
}

/// Registry key: the node's address, stable while the `Arc` pins it.
pub(crate) fn node_key<T: ?Sized>(node: &T) -> usize {
    (node as *const T).cast::<()>() as usize
}

#[derive(Default)]
struct Inner {
    err: Option<Cause>,
    children: HashMap<usize, Arc<dyn Cancelable>>,
}

/// A context that can be cancelled, cascading to its descendants.
pub struct CancelCtx {
    parent: Ctx,
    done: Promise<()>,
    inner: Mutex<Inner>,
}

/// Wraps `parent` with a cancellation point.
///
/// The new node observes the parent chain: cancelling any ancestor
/// cancels it with the ancestor's cause. If the parent is a foreign
/// `Context` implementation, propagation runs through a spawned
/// watcher task, which requires an ambient tokio runtime.
pub fn with_cancel(parent: &Ctx) -> Arc<CancelCtx> {
    let ctx = Arc::new(CancelCtx::new_node(parent.clone()));
    propagate_cancel(parent, ctx.clone());
    ctx
}

impl CancelCtx {
    pub(crate) fn new_node(parent: Ctx) -> Self {
        Self {
            parent,
            done: Promise::new(),
            inner: Mutex::new(Inner::default()),
        }
    }

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
        self.done.is_resolved()
    }

    pub(crate) fn parent(&self) -> &Ctx {
        &self.parent
    }

    pub(crate) fn done_handle(&self) -> &Promise<()> {
        &self.done
    }

    /// Records the cause and cascades to the registered children.
    /// Returns `true` if this call performed the cancellation.
    pub(crate) fn cancel_internal(&self, cause: Cause) -> bool {
        let children = {
            let mut inner = self.inner.lock();
            if inner.err.is_some() {
                return false; // first cancellation wins
            }
            inner.err = Some(cause.clone());
            std::mem::take(&mut inner.children)
        };
        // The cause is recorded before the done signal fires, so a
        // waiter woken by `done` always observes `err`.
        self.done.resolve(());
        if !children.is_empty() {
            log::trace!("cancel cascade to {} child context(s)", children.len());
        }
        // The registry was snapshotted and cleared above; a child that
        // re-enters cancellation never sees the set being iterated.
        for (_, child) in children {
            child.cancel_node(false, cause.clone());
        }
        true
    }

    /// Adds `child` to the registry, or cancels it right away if this
    /// node was cancelled in the meantime.
    pub(crate) fn register_child(&self, child: Arc<dyn Cancelable>) {
        let pending = {
            let mut inner = self.inner.lock();
            match &inner.err {
                Some(cause) => Some(cause.clone()),
                None => {
                    let key = Arc::as_ptr(&child).cast::<()>() as usize;
                    inner.children.insert(key, child.clone());
                    None
                }
            }
        };
        if let Some(cause) = pending {
            child.cancel_node(false, cause);
        }
    }

    pub(crate) fn remove_child(&self, key: usize) {
        self.inner.lock().children.remove(&key);
    }

    /// Deregisters a cancelled node from its nearest cancelable
    /// ancestor. The chain is re-probed here instead of storing a
    /// registry back-pointer, mirroring how registration found it.
    pub(crate) fn remove_self_from_parent(&self, key: usize) {
        let parent_done = self.parent.done();
        if let Some(registry) = self.parent.cancel_registry() {
            if registry.done_handle().ptr_eq(&parent_done) {
                registry.remove_child(key);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn child_count(&self) -> usize {
        self.inner.lock().children.len()
    }
}

impl Cancelable for CancelCtx {
    fn cancel_node(&self, remove_from_parent: bool, cause: Cause) {
        let first = self.cancel_internal(cause);
        if first && remove_from_parent {
            self.remove_self_from_parent(node_key(self));
        }
    }
}

impl Context for CancelCtx {
    fn deadline(&self) -> Option<Instant> {
        self.parent.deadline()
    }

    fn done(&self) -> Promise<()> {
        self.done.clone()
    }

    fn err(&self) -> Option<Cause> {
        self.inner.lock().err.clone()
    }

    fn value(&self, key: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.parent.value(key)
    }

    fn cancel_registry(&self) -> Option<&CancelCtx> {
        Some(self)
    }
}

impl fmt::Debug for CancelCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}.with_cancel", self.parent)?;
        if self.is_cancelled() {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}

/// Wires `child` to observe cancellation of `parent`.
///
/// Three regimes, probed in order:
/// - the parent chain can never cancel: nothing to do;
/// - the parent chain is already cancelled: cancel `child` now;
/// - the nearest cancelable ancestor answers the registry probe *and*
///   its done promise is identical to the parent's: register directly.
///
/// Anything else is a foreign `Context` whose cancellation semantics
/// this crate cannot see into, so a watcher task races the parent's
/// done signal against the child's own and forwards whichever fires
/// first.
pub(crate) fn propagate_cancel(parent: &Ctx, child: Arc<dyn Cancelable>) {
    let parent_done = parent.done();
    if parent_done.ptr_eq(never_done()) {
        return;
    }
    if parent_done.is_resolved() {
        let cause = parent.err().unwrap_or_else(Cause::canceled);
        child.cancel_node(false, cause);
        return;
    }
    if let Some(registry) = parent.cancel_registry() {
        if registry.done_handle().ptr_eq(&parent_done) {
            registry.register_child(child);
            return;
        }
    }
    log::trace!("foreign parent context, propagating through watcher task");
    let parent = parent.clone();
    let child_done = child.done();
    tokio::spawn(async move {
        tokio::select! {
            () = parent_done.wait() => {
                let cause = parent.err().unwrap_or_else(Cause::canceled);
                child.cancel_node(false, cause);
            }
            () = child_done.wait() => {}
        }
    });
}

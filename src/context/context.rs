/*!
 * Context Interface
 *
 * The polymorphic surface every tree node (and any foreign
 * implementation) exposes: deadline, done signal, cancellation cause,
 * and scoped value lookup. `ContextExt` adds the chaining builders so
 * call sites read `ctx.with_timeout(..)` regardless of the concrete
 * node type they hold.
 */

use crate::errors::Cause;
use crate::promise::{Promise, Waiting};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::cancel::CancelCtx;
use super::timer::TimerCtx;
use super::value::ValueCtx;

/// Shared handle to any context tree node.
pub type Ctx = Arc<dyn Context>;

/// A node in the cancellation/value tree.
///
/// Implementations other than the four built-in variants are allowed;
/// they participate in cancellation propagation through the watcher
/// fallback (see [`with_cancel`](super::with_cancel)) as long as their
/// [`done`](Context::done) promise resolves when they are cancelled.
pub trait Context: fmt::Debug + Send + Sync {
    /// The instant after which this context should be considered
    /// expired, if any ancestor (or this node) carries a deadline.
    fn deadline(&self) -> Option<Instant> {
        None
    }

    /// The done signal: resolved exactly once, when this context or an
    /// ancestor is cancelled. Uncancellable contexts share a single
    /// permanently-unresolved sentinel promise.
    fn done(&self) -> Promise<()>;

    /// The cancellation cause; `None` while the context is active.
    /// Set exactly when [`done`](Context::done) resolves.
    fn err(&self) -> Option<Cause> {
        None
    }

    /// Scoped value lookup. Walks the parent chain; the nearest
    /// enclosing binding for `key` wins.
    fn value(&self, key: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        let _ = key;
        None
    }

    /// Capability probe: the nearest cancellation registry reachable
    /// through variants this crate understands. Foreign implementations
    /// keep the default and are handled by the watcher fallback.
    #[doc(hidden)]
    fn cancel_registry(&self) -> Option<&CancelCtx> {
        None
    }
}

/// Conversion into the shared [`Ctx`] handle.
pub trait IntoCtx {
    fn into_ctx(self) -> Ctx;
}

impl<C: Context + 'static> IntoCtx for Arc<C> {
    fn into_ctx(self) -> Ctx {
        self
    }
}

impl IntoCtx for Arc<dyn Context> {
    fn into_ctx(self) -> Ctx {
        self
    }
}

/// Chaining surface available on any context handle, concrete or
/// erased.
pub trait ContextExt: IntoCtx + Clone {
    /// This handle as an erased [`Ctx`].
    fn as_ctx(&self) -> Ctx {
        self.clone().into_ctx()
    }

    /// Wraps this context with a key/value binding.
    fn with_value<V: Any + Send + Sync>(
        &self,
        key: impl Into<String>,
        value: V,
    ) -> Arc<ValueCtx> {
        super::value::with_value(&self.as_ctx(), key, value)
    }

    /// Wraps this context with a cancellation point.
    fn with_cancel(&self) -> Arc<CancelCtx> {
        super::cancel::with_cancel(&self.as_ctx())
    }

    /// Wraps this context with a deadline `timeout` from now.
    fn with_timeout(&self, timeout: Duration) -> Arc<TimerCtx> {
        super::timer::with_timeout(&self.as_ctx(), timeout)
    }

    /// Wraps this context with an absolute deadline.
    fn with_deadline(&self, deadline: Instant) -> Arc<TimerCtx> {
        super::timer::with_deadline(&self.as_ctx(), deadline)
    }

    /// Typed scoped value lookup.
    fn value_of<V: Any + Send + Sync>(&self, key: &str) -> Option<Arc<V>> {
        self.as_ctx()
            .value(key)
            .and_then(|value| value.downcast::<V>().ok())
    }

    /// A future resolving when this context is cancelled, pending
    /// forever for an uncancellable context.
    fn wait(&self) -> Waiting<()> {
        self.as_ctx().done().wait()
    }

    /// Cancellable delay: `true` if the full duration elapsed, `false`
    /// if the context was cancelled first.
    fn sleep(&self, dur: Duration) -> impl Future<Output = bool> + Send {
        let ctx = self.as_ctx();
        async move { sleep(&ctx, dur).await }
    }
}

impl<T: IntoCtx + Clone> ContextExt for T {}

/// A future resolving when `ctx` is cancelled.
///
/// For an uncancellable context this never resolves.
pub fn wait(ctx: &Ctx) -> Waiting<()> {
    ctx.done().wait()
}

/// Sleeps for `dur` unless `ctx` is cancelled first.
///
/// Returns `true` if the timer elapsed, `false` on cancellation (the
/// pending timer is dropped in that case). This is the building block
/// for cancellable delays in higher layers.
pub async fn sleep(ctx: &Ctx, dur: Duration) -> bool {
    tokio::select! {
        () = tokio::time::sleep(dur) => true,
        () = ctx.done().wait() => false,
    }
}

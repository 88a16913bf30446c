/*!
 * Single-Resolution Promise
 *
 * The wakeup substrate for the context tree and the sync primitives.
 * A `Promise<T>` starts unresolved, resolves exactly once, and wakes
 * every waiter parked on it at that moment. Handles are cheap clones
 * of one shared allocation, so identity (`ptr_eq`) is well-defined;
 * the context tree relies on that to recognize its own done signals.
 */

use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

enum State<T> {
    Pending {
        wakers: Vec<(u64, Waker)>,
        next_waiter: u64,
    },
    Resolved(T),
}

struct Shared<T> {
    state: Mutex<State<T>>,
}

/// A one-shot signal: resolved at most once, observed by any number of
/// cloned handles.
///
/// Resolution is first-write-wins; later `resolve` calls are no-ops.
/// Querying the state is synchronous, waiting is a future. A promise is
/// never reused after resolution; components that need a fresh wakeup
/// (a lock gate, a wait-group zero signal) allocate a new one.
pub struct Promise<T = ()> {
    shared: Arc<Shared<T>>,
}

impl<T> Promise<T> {
    /// Creates an unresolved promise.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::Pending {
                    wakers: Vec::new(),
                    next_waiter: 0,
                }),
            }),
        }
    }

    /// Resolves the promise, waking every parked waiter.
    ///
    /// Returns `true` if this call performed the resolution, `false` if
    /// the promise was already resolved (the value is dropped then).
    pub fn resolve(&self, value: T) -> bool {
        let wakers = {
            let mut state = self.shared.state.lock();
            if matches!(*state, State::Resolved(_)) {
                return false;
            }
            match std::mem::replace(&mut *state, State::Resolved(value)) {
                State::Pending { wakers, .. } => wakers,
                State::Resolved(_) => unreachable!("checked pending above"),
            }
        };
        // Wake outside the lock; a woken task may immediately poll us.
        for (_, waker) in wakers {
            waker.wake();
        }
        true
    }

    /// Whether the promise has been resolved.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(*self.shared.state.lock(), State::Resolved(_))
    }

    /// Whether two handles refer to the same underlying promise.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    #[cfg(test)]
    pub(crate) fn waiter_count(&self) -> usize {
        match &*self.shared.state.lock() {
            State::Pending { wakers, .. } => wakers.len(),
            State::Resolved(_) => 0,
        }
    }
}

impl<T: Clone> Promise<T> {
    /// Returns the resolved value, or `None` while pending.
    #[must_use]
    pub fn try_get(&self) -> Option<T> {
        match &*self.shared.state.lock() {
            State::Resolved(value) => Some(value.clone()),
            State::Pending { .. } => None,
        }
    }

    /// A future completing with the resolved value.
    ///
    /// Every caller gets its own waiter registration; dropping the
    /// future before resolution releases its slot.
    #[must_use]
    pub fn wait(&self) -> Waiting<T> {
        Waiting {
            promise: self.clone(),
            slot: None,
        }
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        let (resolved, waiters) = match &*state {
            State::Pending { wakers, .. } => (false, wakers.len()),
            State::Resolved(_) => (true, 0),
        };
        f.debug_struct("Promise")
            .field("resolved", &resolved)
            .field("waiters", &waiters)
            .finish()
    }
}

/// Future returned by [`Promise::wait`].
#[must_use = "futures do nothing unless awaited"]
pub struct Waiting<T> {
    promise: Promise<T>,
    slot: Option<u64>,
}

impl<T: Clone> Future for Waiting<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let this = &mut *self;
        let mut state = this.promise.shared.state.lock();
        match &mut *state {
            State::Resolved(value) => Poll::Ready(value.clone()),
            State::Pending {
                wakers,
                next_waiter,
            } => {
                match this.slot {
                    Some(id) => {
                        // Re-poll: refresh the stored waker in place.
                        if let Some(entry) = wakers.iter_mut().find(|(slot, _)| *slot == id) {
                            entry.1.clone_from(cx.waker());
                        } else {
                            wakers.push((id, cx.waker().clone()));
                        }
                    }
                    None => {
                        let id = *next_waiter;
                        *next_waiter += 1;
                        wakers.push((id, cx.waker().clone()));
                        this.slot = Some(id);
                    }
                }
                Poll::Pending
            }
        }
    }
}

impl<T> Drop for Waiting<T> {
    fn drop(&mut self) {
        if let Some(id) = self.slot {
            let mut state = self.promise.shared.state.lock();
            if let State::Pending { wakers, .. } = &mut *state {
                wakers.retain(|(slot, _)| *slot != id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_promise_is_pending() {
        let promise: Promise<u32> = Promise::new();
        assert!(!promise.is_resolved());
        assert_eq!(promise.try_get(), None);
    }

    #[test]
    fn test_first_resolution_wins() {
        let promise = Promise::new();
        assert!(promise.resolve(1));
        assert!(!promise.resolve(2));
        assert_eq!(promise.try_get(), Some(1));
    }

    #[test]
    fn test_clones_share_state() {
        let promise = Promise::new();
        let handle = promise.clone();
        assert!(promise.ptr_eq(&handle));

        handle.resolve("done");
        assert!(promise.is_resolved());
        assert_eq!(promise.try_get(), Some("done"));
    }

    #[test]
    fn test_distinct_promises_not_identical() {
        let a: Promise<()> = Promise::new();
        let b: Promise<()> = Promise::new();
        assert!(!a.ptr_eq(&b));
    }

    #[tokio::test]
    async fn test_wait_resolved_is_immediate() {
        let promise = Promise::new();
        promise.resolve(7);
        assert_eq!(promise.wait().await, 7);
    }

    #[tokio::test]
    async fn test_wait_wakes_on_resolve() {
        let promise = Promise::new();
        let waiter = {
            let promise = promise.clone();
            tokio::spawn(async move { promise.wait().await })
        };

        tokio::task::yield_now().await;
        promise.resolve(42);

        assert_eq!(waiter.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_resolution_wakes_all_waiters() {
        let promise = Promise::new();
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let promise = promise.clone();
                tokio::spawn(async move { promise.wait().await })
            })
            .collect();

        tokio::task::yield_now().await;
        promise.resolve(9);

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), 9);
        }
    }

    #[tokio::test]
    async fn test_dropped_waiter_releases_slot() {
        use futures::FutureExt;

        let promise: Promise<()> = Promise::new();
        let mut waiting = promise.wait();
        // Poll once so the waiter registers, then drop it.
        assert!((&mut waiting).now_or_never().is_none());
        assert_eq!(promise.waiter_count(), 1);
        drop(waiting);
        assert_eq!(promise.waiter_count(), 0);
    }
}

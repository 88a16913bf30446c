/*!
 * Once / AsyncOnce
 *
 * Single-invocation guards. `Once` is the synchronous variant: the
 * invoked flag flips before the body runs, so reentrant (or racing)
 * calls are already blocked and a panicking body still consumes the
 * invocation. `AsyncOnce` additionally lets concurrent callers await
 * the one in-flight action; a failing action is reported to the
 * initiator alone, while everyone else just observes "done".
 */

use crate::promise::Promise;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

/// Runs a closure at most once.
#[derive(Debug, Default)]
pub struct Once {
    done: AtomicBool,
}

impl Once {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` if no call has claimed the invocation yet.
    ///
    /// The guard is marked before `f` runs: reentrant calls from
    /// within `f` are no-ops, and a panicking `f` is not retried.
    pub fn call_once<F: FnOnce()>(&self, f: F) {
        if !self.done.swap(true, Ordering::SeqCst) {
            f();
        }
    }

    /// Whether the invocation has been claimed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct OnceState {
    done: bool,
    in_flight: Option<Promise<()>>,
}

/// Runs a fallible async action at most once.
///
/// Exactly one caller (the initiator) runs the action; concurrent
/// callers suspend until it settles. The guard is marked done before
/// the action is awaited, so a failure permanently consumes the
/// invocation (no retry). Only the initiator sees the error.
#[derive(Debug, Default)]
pub struct AsyncOnce {
    state: parking_lot::Mutex<OnceState>,
}

impl AsyncOnce {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` if no call has claimed the invocation yet.
    ///
    /// Returns `Ok(true)` to the initiator on success, `Ok(false)` to
    /// everyone else (including callers arriving after completion).
    ///
    /// # Errors
    ///
    /// A failing action returns its error to the initiator alone;
    /// concurrent waiters still get `Ok(false)`.
    pub async fn call_once<F, Fut, E>(&self, f: F) -> Result<bool, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let waiter = {
            let mut state = self.state.lock();
            if state.done {
                match &state.in_flight {
                    Some(promise) => Some(promise.clone()),
                    None => return Ok(false),
                }
            } else {
                state.done = true;
                state.in_flight = Some(Promise::new());
                None
            }
        };

        if let Some(promise) = waiter {
            promise.wait().await;
            return Ok(false);
        }

        // Initiator. The guard resolves the in-flight promise however
        // the action settles (success, failure, or dropped mid-poll),
        // so waiters are always released.
        let _guard = SettleGuard { once: self };
        f().await.map(|()| true)
    }

    /// Whether the action has fully settled.
    #[must_use]
    pub fn is_done(&self) -> bool {
        let state = self.state.lock();
        state.done && state.in_flight.is_none()
    }
}

struct SettleGuard<'a> {
    once: &'a AsyncOnce,
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        let promise = self.once.state.lock().in_flight.take();
        if let Some(promise) = promise {
            promise.resolve(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    #[test]
    fn test_once_runs_exactly_once() {
        let once = Once::new();
        let mut calls = 0;
        for _ in 0..5 {
            once.call_once(|| calls += 1);
        }
        assert_eq!(calls, 1);
        assert!(once.is_done());
    }

    #[test]
    fn test_once_reentrant_call_is_blocked() {
        let once = Arc::new(Once::new());
        let inner_ran = Arc::new(AtomicBool::new(false));

        once.call_once(|| {
            let inner = Arc::clone(&inner_ran);
            once.call_once(move || inner.store(true, Ordering::SeqCst));
        });

        assert!(!inner_ran.load(Ordering::SeqCst));
        assert!(once.is_done());
    }

    #[test]
    fn test_once_panicking_body_is_not_retried() {
        let once = Once::new();
        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            once.call_once(|| panic!("boom"));
        }));
        assert!(panicked.is_err());

        let mut reran = false;
        once.call_once(|| reran = true);
        assert!(!reran);
    }

    #[tokio::test]
    async fn test_async_once_single_initiator() {
        let once = Arc::new(AsyncOnce::new());
        let runs = Arc::new(AtomicU32::new(0));

        let callers: Vec<_> = (0..4)
            .map(|_| {
                let once = Arc::clone(&once);
                let runs = Arc::clone(&runs);
                tokio::spawn(async move {
                    once.call_once(|| async move {
                        tokio::task::yield_now().await;
                        runs.fetch_add(1, Ordering::SeqCst);
                        Ok::<(), String>(())
                    })
                    .await
                })
            })
            .collect();

        let mut initiators = 0;
        for caller in callers {
            if caller.await.unwrap().unwrap() {
                initiators += 1;
            }
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(initiators, 1);
        assert!(once.is_done());
    }

    #[tokio::test]
    async fn test_async_once_completed_callers_noop() {
        let once = AsyncOnce::new();
        assert_eq!(once.call_once(|| async { Ok::<(), String>(()) }).await, Ok(true));
        assert_eq!(once.call_once(|| async { Ok::<(), String>(()) }).await, Ok(false));
    }

    #[tokio::test]
    async fn test_async_once_failure_marks_done_and_hits_initiator_only() {
        let once = Arc::new(AsyncOnce::new());

        let err = once
            .call_once(|| async { Err::<(), String>("failed".into()) })
            .await;
        assert_eq!(err, Err("failed".into()));

        // The failure consumed the invocation; no retry.
        let after = once
            .call_once(|| async { Ok::<(), String>(()) })
            .await;
        assert_eq!(after, Ok(false));
        assert!(once.is_done());
    }

    #[tokio::test]
    async fn test_async_once_waiters_not_told_of_failure() {
        let once = Arc::new(AsyncOnce::new());
        let release = Arc::new(crate::promise::Promise::<()>::new());

        let initiator = {
            let once = Arc::clone(&once);
            let release = Arc::clone(&release);
            tokio::spawn(async move {
                once.call_once(|| async move {
                    release.wait().await;
                    Err::<(), String>("failed".into())
                })
                .await
            })
        };

        tokio::task::yield_now().await;

        let waiter = {
            let once = Arc::clone(&once);
            tokio::spawn(async move {
                once.call_once(|| async { Ok::<(), String>(()) }).await
            })
        };

        tokio::task::yield_now().await;
        release.resolve(());

        assert_eq!(initiator.await.unwrap(), Err("failed".into()));
        assert_eq!(waiter.await.unwrap(), Ok(false));
    }
}

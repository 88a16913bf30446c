/*!
 * WaitGroup
 *
 * A counter of outstanding work plus one shared zero-signal promise.
 * `wait` parks on the zero signal while the counter is nonzero; the
 * `add` that brings it back to exactly zero resolves the signal. The
 * counter must never go negative: that is a fatal misuse fault, and
 * the counter is deliberately left as-is afterwards.
 */

use crate::errors::{fault, FaultKind};
use crate::promise::Promise;
use std::future::Future;

#[derive(Debug, Default)]
struct State {
    count: i64,
    zero: Option<Promise<()>>,
}

/// Waits for a collection of tasks to finish.
#[derive(Debug, Default)]
pub struct WaitGroup {
    state: parking_lot::Mutex<State>,
}

impl WaitGroup {
    /// Creates a wait-group with a zero counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adjusts the counter by `delta`, resolving the zero signal when
    /// it reaches exactly zero.
    ///
    /// # Panics
    ///
    /// Panics if the counter would go negative.
    pub fn add(&self, delta: i64) {
        let zero = {
            let mut state = self.state.lock();
            let next = state.count + delta;
            match next {
                n if n < 0 => fault(FaultKind::WaitGroupNegative),
                0 => {
                    state.count = 0;
                    state.zero.take()
                }
                n => {
                    state.count = n;
                    None
                }
            }
        };
        if let Some(zero) = zero {
            zero.resolve(());
        }
    }

    /// Marks one unit of work finished; equivalent to `add(-1)`.
    pub fn done(&self) {
        self.add(-1);
    }

    /// Suspends until the counter reaches zero.
    ///
    /// A zero counter resolves immediately without allocating a
    /// signal; concurrent waiters on a nonzero counter share one.
    pub async fn wait(&self) {
        let zero = {
            let mut state = self.state.lock();
            if state.count == 0 {
                return;
            }
            state.zero.get_or_insert_with(Promise::new).clone()
        };
        zero.wait().await;
    }

    /// The current counter value.
    #[must_use]
    pub fn count(&self) -> i64 {
        self.state.lock().count
    }

    /// Tracks one unit of work for the duration of the future `f`
    /// produces.
    ///
    /// The counter is incremented before the future runs and
    /// decremented exactly once when it settles: on success, on
    /// panic, or if it is dropped mid-flight.
    pub async fn run<F, Fut>(&self, f: F) -> Fut::Output
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        self.add(1);
        let _guard = CountGuard { group: self };
        f().await
    }

    #[cfg(test)]
    pub(crate) fn has_zero_signal(&self) -> bool {
        self.state.lock().zero.is_some()
    }
}

struct CountGuard<'a> {
    group: &'a WaitGroup,
}

impl Drop for CountGuard<'_> {
    fn drop(&mut self) {
        self.group.done();
    }
}

/*!
 * Mutex
 *
 * An exclusive cooperative lock. "Held" is exactly "a gate promise is
 * present"; releasing resolves the gate, waking every parked waiter at
 * once. The woken waiters race to re-acquire; the try step is atomic
 * under the state lock, so exactly one wins each round and the rest
 * park on the fresh gate. No fairness is guaranteed, by design.
 */

use crate::errors::{fault, FaultKind};
use crate::promise::Promise;

/// An exclusive lock with explicit `lock`/`unlock` pairing.
///
/// Unlike guard-based mutexes, acquisition and release are independent
/// calls, so a critical section may span await points and even tasks.
/// The price is that misuse (`unlock` while unheld) is a fatal fault.
#[derive(Debug, Default)]
pub struct Mutex {
    gate: parking_lot::Mutex<Option<Promise<()>>>,
}

impl Mutex {
    /// Creates an unlocked mutex.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock without suspending.
    ///
    /// Returns `true` on success, `false` if the lock is already held.
    pub fn try_lock(&self) -> bool {
        let mut gate = self.gate.lock();
        if gate.is_none() {
            *gate = Some(Promise::new());
            true
        } else {
            false
        }
    }

    /// Acquires the lock, suspending until it is available.
    pub async fn lock(&self) {
        loop {
            let gate = {
                let mut gate = self.gate.lock();
                match &*gate {
                    None => {
                        *gate = Some(Promise::new());
                        return;
                    }
                    Some(current) => current.clone(),
                }
            };
            // All waiters park on the same gate; its resolution wakes
            // them together and the loop re-races for acquisition.
            gate.wait().await;
        }
    }

    /// Releases the lock, waking every parked waiter.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is not held, which is a programming error,
    /// not a recoverable condition.
    pub fn unlock(&self) {
        let Some(gate) = self.gate.lock().take() else {
            fault(FaultKind::MutexUnlock)
        };
        gate.resolve(());
    }

    /// Whether the lock is currently held.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.gate.lock().is_some()
    }
}

/*!
 * Reader/Writer Mutex
 *
 * One gate promise shared by both roles: present exactly while a
 * writer or at least one reader holds the lock. Every release resolves
 * the gate and wakes all waiters (readers and writers alike), who
 * then re-race with no queue or ticket order. Under sustained read
 * load a writer can be outraced indefinitely; that trade-off is
 * intended behavior and is preserved here.
 */

use crate::errors::{fault, FaultKind};
use crate::promise::Promise;

#[derive(Debug, Default)]
struct State {
    writer_active: bool,
    reader_count: u64,
    gate: Option<Promise<()>>,
}

/// A reader/writer lock with explicit lock/unlock pairing.
///
/// Any number of readers may hold the lock together; a writer holds it
/// alone. Misuse (releasing an unheld side) is a fatal fault.
#[derive(Debug, Default)]
pub struct RwMutex {
    state: parking_lot::Mutex<State>,
}

impl RwMutex {
    /// Creates an unlocked lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the write side without suspending.
    ///
    /// Succeeds only when neither a writer nor any reader holds the
    /// lock.
    pub fn try_lock(&self) -> bool {
        let mut state = self.state.lock();
        if state.gate.is_some() {
            return false;
        }
        state.writer_active = true;
        state.gate = Some(Promise::new());
        true
    }

    /// Acquires the write side, suspending until the lock is free.
    pub async fn lock(&self) {
        loop {
            let gate = {
                let mut state = self.state.lock();
                match &state.gate {
                    None => {
                        state.writer_active = true;
                        state.gate = Some(Promise::new());
                        return;
                    }
                    Some(current) => current.clone(),
                }
            };
            gate.wait().await;
        }
    }

    /// Releases the write side, waking every parked waiter.
    ///
    /// # Panics
    ///
    /// Panics if no writer holds the lock.
    pub fn unlock(&self) {
        let gate = {
            let mut state = self.state.lock();
            if !state.writer_active {
                fault(FaultKind::RwMutexUnlock);
            }
            state.writer_active = false;
            state.gate.take()
        };
        if let Some(gate) = gate {
            gate.resolve(());
        }
    }

    /// Acquires the read side without suspending.
    ///
    /// Additional readers join freely; only an active writer blocks a
    /// reader.
    pub fn try_read_lock(&self) -> bool {
        let mut state = self.state.lock();
        if state.reader_count != 0 {
            state.reader_count += 1;
            return true;
        }
        if state.writer_active {
            return false;
        }
        state.reader_count = 1;
        state.gate = Some(Promise::new());
        true
    }

    /// Acquires the read side, suspending while a writer is active.
    pub async fn read_lock(&self) {
        loop {
            let gate = {
                let mut state = self.state.lock();
                if !state.writer_active {
                    // First reader creates the gate; later readers
                    // share the one already present.
                    if state.gate.is_none() {
                        state.gate = Some(Promise::new());
                    }
                    state.reader_count += 1;
                    return;
                }
                state
                    .gate
                    .clone()
                    .expect("writer active without a gate")
            };
            gate.wait().await;
        }
    }

    /// Releases one reader; the last reader out resolves the gate.
    ///
    /// # Panics
    ///
    /// Panics if no reader holds the lock.
    pub fn read_unlock(&self) {
        let gate = {
            let mut state = self.state.lock();
            match state.reader_count {
                0 => fault(FaultKind::RwMutexReadUnlock),
                1 => {
                    state.reader_count = 0;
                    state.gate.take()
                }
                _ => {
                    state.reader_count -= 1;
                    None
                }
            }
        };
        if let Some(gate) = gate {
            gate.resolve(());
        }
    }

    /// Whether a writer currently holds the lock.
    #[must_use]
    pub fn is_write_locked(&self) -> bool {
        self.state.lock().writer_active
    }

    /// The number of readers currently holding the lock.
    #[must_use]
    pub fn readers(&self) -> u64 {
        self.state.lock().reader_count
    }
}

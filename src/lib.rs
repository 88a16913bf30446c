/*!
 * ctx-sync
 *
 * Cooperative cancellation contexts and async synchronization
 * primitives. A tree-structured context carries deadlines,
 * cancellation causes, and scoped key/value bindings from any node to
 * all of its descendants; `Mutex`, `RwMutex`, `WaitGroup`, and the
 * once guards coordinate cooperative critical sections on the same
 * single-resolution `Promise` substrate.
 *
 * Cancellation is advisory: it flips observable state and wakes
 * waiters, it never interrupts work already in flight.
 */

pub mod context;
pub mod errors;
pub mod promise;
pub mod sync;

// Re-exports
pub use context::{
    background, todo, with_cancel, with_deadline, with_timeout, with_value, CancelCtx, Context,
    ContextExt, Ctx, EmptyCtx, IntoCtx, TimerCtx, ValueCtx,
};
pub use errors::{Cause, CauseKind, FaultKind};
pub use promise::Promise;
pub use sync::{AsyncOnce, Mutex, Once, RwMutex, WaitGroup};

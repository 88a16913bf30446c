/*!
 * Synchronization Primitives
 *
 * Cooperative coordination for async tasks, all built on the same
 * single-resolution [`Promise`](crate::promise::Promise) substrate:
 * an exclusive lock, a reader/writer lock, a counting wait-group, and
 * run-once guards. These coordinate logical critical sections; the
 * short-lived internal state locks never cross an await point.
 */

mod mutex;
mod once;
mod rwmutex;
mod waitgroup;

pub use mutex::Mutex;
pub use once::{AsyncOnce, Once};
pub use rwmutex::RwMutex;
pub use waitgroup::WaitGroup;

/*!
 * Context Tree
 *
 * Tree-structured cooperative cancellation: deadlines, cancellation
 * causes, and scoped key/value bindings, propagated from any node to
 * all of its descendants. Roots come from [`background`]/[`todo`];
 * every other node is created by wrapping a parent with
 * [`with_value`], [`with_cancel`], [`with_timeout`], or
 * [`with_deadline`].
 */

mod background;
mod cancel;
#[allow(clippy::module_inception)]
mod context;
mod timer;
mod value;

pub use background::{background, todo, EmptyCtx};
pub use cancel::{with_cancel, CancelCtx};
pub use context::{sleep, wait, Context, ContextExt, Ctx, IntoCtx};
pub use timer::{with_deadline, with_timeout, TimerCtx};
pub use value::{with_value, ValueCtx};

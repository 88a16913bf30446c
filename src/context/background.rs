/*!
 * Root Contexts
 *
 * `background()` and `todo()` are process-wide roots: never cancelled,
 * no deadline, no values. They share one permanently-unresolved done
 * sentinel, which is also how cancellation propagation recognizes a
 * parent that can never fire.
 */

use crate::promise::Promise;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, LazyLock};

use super::context::{Context, Ctx};

static NEVER_DONE: LazyLock<Promise<()>> = LazyLock::new(Promise::new);

static BACKGROUND: LazyLock<Ctx> = LazyLock::new(|| Arc::new(EmptyCtx { name: "background" }));

static TODO: LazyLock<Ctx> = LazyLock::new(|| Arc::new(EmptyCtx { name: "todo" }));

/// The shared never-resolving done sentinel.
pub(crate) fn never_done() -> &'static Promise<()> {
    &NEVER_DONE
}

/// An uncancellable root context.
pub struct EmptyCtx {
    name: &'static str,
}

impl Context for EmptyCtx {
    fn done(&self) -> Promise<()> {
        never_done().clone()
    }

    fn value(&self, _key: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        None
    }
}

impl fmt::Debug for EmptyCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context::{}", self.name)
    }
}

/// The default root for real work.
#[must_use]
pub fn background() -> Ctx {
    BACKGROUND.clone()
}

/// A root for call sites that have not decided which context to thread
/// through yet.
#[must_use]
pub fn todo() -> Ctx {
    TODO.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roots_are_singletons() {
        assert!(Arc::ptr_eq(&background(), &background()));
        assert!(Arc::ptr_eq(&todo(), &todo()));
    }

    #[test]
    fn test_roots_never_report_state() {
        let root = background();
        assert!(root.deadline().is_none());
        assert!(root.err().is_none());
        assert!(root.value("anything").is_none());
        assert!(!root.done().is_resolved());
    }

    #[test]
    fn test_uncancellable_contexts_share_done_sentinel() {
        assert!(background().done().ptr_eq(&todo().done()));
        assert!(background().done().ptr_eq(never_done()));
    }
}

/*!
 * Value Contexts
 *
 * Pure data wrapping: one key/value binding per node, nearest
 * enclosing binding wins on lookup. Cancellation state and deadlines
 * pass straight through to the parent.
 */

use crate::errors::Cause;
use crate::promise::Promise;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;

use super::cancel::CancelCtx;
use super::context::{Context, Ctx};

/// A context carrying one scoped key/value binding.
pub struct ValueCtx {
    parent: Ctx,
    key: String,
    value: Arc<dyn Any + Send + Sync>,
}

/// Wraps `parent` with a key/value binding.
pub fn with_value<V: Any + Send + Sync>(
    parent: &Ctx,
    key: impl Into<String>,
    value: V,
) -> Arc<ValueCtx> {
    Arc::new(ValueCtx {
        parent: parent.clone(),
        key: key.into(),
        value: Arc::new(value),
    })
}

impl Context for ValueCtx {
    fn deadline(&self) -> Option<Instant> {
        self.parent.deadline()
    }

    fn done(&self) -> Promise<()> {
        self.parent.done()
    }

    fn err(&self) -> Option<Cause> {
        self.parent.err()
    }

    fn value(&self, key: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        if key == self.key {
            Some(self.value.clone())
        } else {
            self.parent.value(key)
        }
    }

    fn cancel_registry(&self) -> Option<&CancelCtx> {
        self.parent.cancel_registry()
    }
}

impl fmt::Debug for ValueCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}.with_value({:?})", self.parent, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::super::background::background;
    use super::super::context::ContextExt;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lookup_walks_parent_chain() {
        let ctx = background()
            .with_value("user", "alice".to_string())
            .with_value("trace", 7_u64);

        assert_eq!(ctx.value_of::<String>("user").as_deref(), Some(&"alice".to_string()));
        assert_eq!(ctx.value_of::<u64>("trace").as_deref(), Some(&7));
        assert!(ctx.value_of::<String>("missing").is_none());
    }

    #[test]
    fn test_nearest_binding_shadows() {
        let outer = background().with_value("user", "alice".to_string());
        let inner = outer.with_value("user", "bob".to_string());

        assert_eq!(inner.value_of::<String>("user").as_deref(), Some(&"bob".to_string()));
        assert_eq!(outer.value_of::<String>("user").as_deref(), Some(&"alice".to_string()));
    }

    #[test]
    fn test_wrong_type_lookup_is_none() {
        let ctx = background().with_value("n", 1_u32);
        assert!(ctx.value_of::<i64>("n").is_none());
    }
}

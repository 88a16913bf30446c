/*!
 * Error Types
 *
 * Two distinct families. Coordination signals (`Cause`) are expected,
 * data-carrying values stored in a context's `err` slot and observed by
 * whoever awaits its done signal. Misuse faults (`FaultKind`) are
 * programming errors (unlocking an unheld lock, driving a wait-group
 * counter negative) and panic at the call site; the primitive's state
 * is not guaranteed consistent afterwards.
 */

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Kind tag for a cancellation cause.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CauseKind {
    /// The context was cancelled explicitly.
    #[error("context canceled")]
    Canceled,

    /// The context's deadline elapsed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

struct CauseInner {
    kind: CauseKind,
    reason: Option<Box<dyn Any + Send + Sync>>,
}

/// Why a context was cancelled.
///
/// Cheap to clone: a cascade hands every descendant a handle to the
/// *same* cause, so `same_cause` can distinguish "cancelled by this
/// ancestor" from an equal-looking independent cancellation. The
/// optional reason payload is whatever the caller passed to
/// `cancel_with`, retrievable with [`Cause::reason`].
#[derive(Clone)]
pub struct Cause {
    inner: Arc<CauseInner>,
}

impl Cause {
    /// A plain cancellation, the default cause of `cancel()`.
    #[must_use]
    pub fn canceled() -> Self {
        Self {
            inner: Arc::new(CauseInner {
                kind: CauseKind::Canceled,
                reason: None,
            }),
        }
    }

    /// A deadline-exceeded cancellation, produced by timer expiry.
    #[must_use]
    pub fn deadline_exceeded() -> Self {
        Self {
            inner: Arc::new(CauseInner {
                kind: CauseKind::DeadlineExceeded,
                reason: None,
            }),
        }
    }

    /// A cancellation carrying an application-supplied reason value.
    #[must_use]
    pub fn with_reason<R: Any + Send + Sync>(reason: R) -> Self {
        Self {
            inner: Arc::new(CauseInner {
                kind: CauseKind::Canceled,
                reason: Some(Box::new(reason)),
            }),
        }
    }

    /// The kind tag.
    #[must_use]
    pub fn kind(&self) -> CauseKind {
        self.inner.kind
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.inner.kind == CauseKind::Canceled
    }

    #[must_use]
    pub fn is_deadline_exceeded(&self) -> bool {
        self.inner.kind == CauseKind::DeadlineExceeded
    }

    /// The reason payload, downcast to the caller's type.
    #[must_use]
    pub fn reason<R: Any + Send + Sync>(&self) -> Option<&R> {
        self.inner.reason.as_ref()?.downcast_ref::<R>()
    }

    /// Whether two handles refer to the same cancellation event.
    #[must_use]
    pub fn same_cause(&self, other: &Cause) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Cause {
    fn eq(&self, other: &Self) -> bool {
        // Payload-carrying causes are only equal to themselves.
        self.same_cause(other)
            || (self.inner.kind == other.inner.kind
                && self.inner.reason.is_none()
                && other.inner.reason.is_none())
    }
}

impl fmt::Debug for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cause")
            .field("kind", &self.inner.kind)
            .field("has_reason", &self.inner.reason.is_some())
            .finish()
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.kind.fmt(f)
    }
}

impl std::error::Error for Cause {}

/// Misuse faults: fatal programming errors raised as panics.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    #[error("unlock of unlocked mutex")]
    MutexUnlock,

    #[error("unlock of unlocked rwmutex")]
    RwMutexUnlock,

    #[error("read-unlock of rwmutex with no active readers")]
    RwMutexReadUnlock,

    #[error("waitgroup counter went negative")]
    WaitGroupNegative,
}

/// Raises a misuse fault. Not recoverable by the primitive.
pub(crate) fn fault(kind: FaultKind) -> ! {
    panic!("{kind}")
}

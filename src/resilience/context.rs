//! Per-call context handed to protected actions and rejection hooks.

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Identity and cancellation signal for one call through a breaker.
///
/// The breaker never cancels anything itself; the action decides whether and
/// how to honor `cancellation()`.
#[derive(Debug, Clone)]
pub struct CallContext {
    id: Uuid,
    cancellation: CancellationToken,
}

impl CallContext {
    /// A fresh context with its own, never-cancelled token.
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    /// A fresh context tied to an existing token.
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            cancellation,
        }
    }

    /// A new call derived from this one. Cancelling the parent cancels the child.
    pub fn child(&self) -> Self {
        Self::with_cancellation(self.cancellation.child_token())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

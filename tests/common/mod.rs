//! Shared helpers for breaker integration tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use breaker::{Breaker, BreakerBuilder, BreakerError, CallContext, ManualClock};
use thiserror::Error;

/// Error returned by the test action when it is switched to failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("fail")]
pub struct Fail;

/// An action whose outcome can be flipped between calls.
#[derive(Clone, Default)]
pub struct FlakyAction {
    failing: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl FlakyAction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of times the action actually ran.
    #[allow(dead_code)]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// A builder wired to this action and a manual clock.
    pub fn builder(&self, clock: &ManualClock) -> BreakerBuilder<Fail> {
        let this = self.clone();
        Breaker::builder().clock(clock.clone()).action(move |_ctx| {
            let this = this.clone();
            async move {
                this.calls.fetch_add(1, Ordering::SeqCst);
                if this.failing.load(Ordering::SeqCst) {
                    Err(Fail)
                } else {
                    Ok(())
                }
            }
        })
    }
}

/// Execute with the action switched to succeed.
#[allow(dead_code)]
pub async fn succeed(
    breaker: &Breaker<Fail>,
    action: &FlakyAction,
) -> Result<(), BreakerError<Fail>> {
    action.set_failing(false);
    breaker.execute(&CallContext::new()).await
}

/// Execute with the action switched to fail.
#[allow(dead_code)]
pub async fn fail(
    breaker: &Breaker<Fail>,
    action: &FlakyAction,
) -> Result<(), BreakerError<Fail>> {
    action.set_failing(true);
    breaker.execute(&CallContext::new()).await
}

/// True if the error is the action's own failure passed through.
#[allow(dead_code)]
pub fn is_action_failure(result: &Result<(), BreakerError<Fail>>) -> bool {
    matches!(result, Err(BreakerError::Operation(Fail)))
}

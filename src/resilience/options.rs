//! Breaker settings and construction.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};

use crate::config::BreakerConfig;
use crate::error::BuildError;
use crate::resilience::circuit_breaker::Breaker;
use crate::resilience::clock::{Clock, SystemClock};
use crate::resilience::context::CallContext;
use crate::resilience::state::{Counts, State};

pub const DEFAULT_HALF_OPEN_MAX_ACTIONS: u32 = 1;
pub const DEFAULT_OPEN_EXPIRY_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_CLOSED_EXPIRY_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_CONSECUTIVE_FAILURE_THRESHOLD: u32 = 6;

pub(crate) type Action<E> =
    Arc<dyn Fn(CallContext) -> BoxFuture<'static, Result<(), E>> + Send + Sync>;
pub(crate) type RejectionHook = Arc<dyn Fn(&CallContext) + Send + Sync>;
pub(crate) type StateChangeHook = Arc<dyn Fn(&CallContext, State, State) + Send + Sync>;
pub(crate) type TripPredicate = Arc<dyn Fn(&Counts) -> bool + Send + Sync>;

pub(crate) fn boxed_action<E, F, Fut>(action: F) -> Action<E>
where
    F: Fn(CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
{
    Arc::new(move |ctx: CallContext| action(ctx).boxed())
}

/// Numeric breaker settings. Values are taken as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Trial calls admitted while half-open.
    pub half_open_max_actions: u32,
    /// How long the breaker stays open before allowing trials.
    pub open_expiry_interval: Duration,
    /// Closed-state statistics window. Zero disables sweeping.
    pub closed_expiry_interval: Duration,
    /// Consecutive failures in closed state that trip the breaker.
    pub consecutive_failure_threshold: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            half_open_max_actions: DEFAULT_HALF_OPEN_MAX_ACTIONS,
            open_expiry_interval: DEFAULT_OPEN_EXPIRY_INTERVAL,
            closed_expiry_interval: DEFAULT_CLOSED_EXPIRY_INTERVAL,
            consecutive_failure_threshold: DEFAULT_CONSECUTIVE_FAILURE_THRESHOLD,
        }
    }
}

impl From<&BreakerConfig> for Settings {
    fn from(config: &BreakerConfig) -> Self {
        Self {
            half_open_max_actions: config.half_open_max_actions,
            open_expiry_interval: Duration::from_millis(config.open_expiry_ms),
            closed_expiry_interval: Duration::from_millis(config.closed_expiry_ms),
            consecutive_failure_threshold: config.consecutive_failure_threshold,
        }
    }
}

/// Builder for [`Breaker`]. Every method overrides one default.
pub struct BreakerBuilder<E> {
    name: String,
    action: Option<Action<E>>,
    settings: Settings,
    on_rejection: Option<RejectionHook>,
    on_state_change: Option<StateChangeHook>,
    should_open: Option<TripPredicate>,
    clock: Arc<dyn Clock>,
}

impl<E> BreakerBuilder<E>
where
    E: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            name: "default".to_string(),
            action: None,
            settings: Settings::default(),
            on_rejection: None,
            on_state_change: None,
            should_open: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Name used in log fields and metric labels.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The protected action.
    pub fn action<F, Fut>(mut self, action: F) -> Self
    where
        F: Fn(CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        self.action = Some(boxed_action(action));
        self
    }

    /// Replace all numeric settings at once.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn half_open_max_actions(mut self, max: u32) -> Self {
        self.settings.half_open_max_actions = max;
        self
    }

    pub fn open_expiry_interval(mut self, interval: Duration) -> Self {
        self.settings.open_expiry_interval = interval;
        self
    }

    pub fn closed_expiry_interval(mut self, interval: Duration) -> Self {
        self.settings.closed_expiry_interval = interval;
        self
    }

    pub fn consecutive_failure_threshold(mut self, threshold: u32) -> Self {
        self.settings.consecutive_failure_threshold = threshold;
        self
    }

    /// Called for every call refused while the breaker is open.
    pub fn on_rejection<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CallContext) + Send + Sync + 'static,
    {
        self.on_rejection = Some(Arc::new(hook));
        self
    }

    /// Called with `(ctx, from, to)` after every state transition.
    pub fn on_state_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CallContext, State, State) + Send + Sync + 'static,
    {
        self.on_state_change = Some(Arc::new(hook));
        self
    }

    /// Custom trip decision for closed-state failures.
    ///
    /// Replaces the consecutive-failure threshold. Runs under the breaker's
    /// lock, so it must be cheap and must not call back into the breaker.
    pub fn should_open<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Counts) -> bool + Send + Sync + 'static,
    {
        self.should_open = Some(Arc::new(predicate));
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn build(self) -> Result<Breaker<E>, BuildError> {
        let action = self.action.ok_or(BuildError::MissingAction)?;
        Ok(Breaker::from_parts(
            self.name,
            action,
            self.settings,
            self.on_rejection,
            self.on_state_change,
            self.should_open,
            self.clock,
        ))
    }
}

impl<E> Default for BreakerBuilder<E>
where
    E: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

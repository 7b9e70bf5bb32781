//! Reconnection backoff for the Host Controller's connect loop.
//!
//! Unlike a classic exponential backoff, the coordinator protocol calls for
//! a small cyclic step schedule: retry at the current step up to a fixed
//! number of times, then advance to the next step, wrapping back to the
//! first after the last.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default step schedule: `[1s, 3s, 10s]`.
pub const DEFAULT_STEPS: &[Duration] = &[
    Duration::from_secs(1),
    Duration::from_secs(3),
    Duration::from_secs(10),
];

/// Number of attempts spent at each step before advancing, by default.
pub const DEFAULT_RETRIES_PER_STEP: u32 = 6;

/// Tracks reconnect attempts against a cyclic step schedule and exposes a
/// cooperative cancel handle.
#[derive(Debug, Clone)]
pub struct ReconnectState {
    steps: Arc<Vec<Duration>>,
    retries_per_step: u32,
    step_index: usize,
    attempts_at_step: u32,
    canceled: Arc<AtomicBool>,
}

impl ReconnectState {
    /// Build a reconnect state from an explicit step schedule.
    #[must_use]
    pub fn new(steps: Vec<Duration>, retries_per_step: u32) -> Self {
        assert!(!steps.is_empty(), "reconnect schedule must be non-empty");
        Self {
            steps: Arc::new(steps),
            retries_per_step: retries_per_step.max(1),
            step_index: 0,
            attempts_at_step: 0,
            canceled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Build a reconnect state using the default `[1s, 3s, 10s]` x6 schedule.
    #[must_use]
    pub fn default_schedule() -> Self {
        Self::new(DEFAULT_STEPS.to_vec(), DEFAULT_RETRIES_PER_STEP)
    }

    /// Delay for the next reconnect attempt, advancing internal state.
    ///
    /// Retries at the current step `retries_per_step` times before moving to
    /// the next step; wraps back to the first step after exhausting the
    /// last one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.steps[self.step_index];

        self.attempts_at_step += 1;
        if self.attempts_at_step >= self.retries_per_step {
            self.attempts_at_step = 0;
            self.step_index = (self.step_index + 1) % self.steps.len();
        }

        delay
    }

    /// Reset to the first step after a successful connection.
    pub fn reset(&mut self) {
        self.step_index = 0;
        self.attempts_at_step = 0;
    }

    /// A cheap, cloneable handle that can be used to cancel an in-progress
    /// backoff sleep from another task.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            canceled: self.canceled.clone(),
        }
    }

    /// Whether `cancel()` has been called on any handle derived from this state.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }
}

/// A handle that can cancel a pending reconnect backoff.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    canceled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Signal cancellation; any in-progress or future `sleep` tied to this
    /// schedule should stop waiting.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }
}

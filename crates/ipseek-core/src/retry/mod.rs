//! Bounded retry around a single object's reconciliation
//!
//! Every object gets its own controller run, carrying nothing but its
//! attempt count between iterations:
//!
//! ```text
//! Idle ──▶ Attempting ──▶ Succeeded
//!              │  ▲
//!      failure │  │ fixed delay
//!              ▼  │
//!        RetryScheduled
//!              │
//!              └─(last attempt failed)─▶ Exhausted
//! ```
//!
//! The delay suspends only the owning task. Backoff is fixed, not
//! exponential.

use crate::config::{DispatchConfig, ManagedObject};
use crate::events::{EventSink, ReconcileEvent};
use crate::traits::BackendDriver;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default number of attempts per object
pub const MAX_ATTEMPTS: u32 = 5;

/// Default fixed delay between attempts
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Attempt budget and delay for one object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay between consecutive attempts
    pub delay: Duration,
}

impl RetryPolicy {
    /// Create a policy; `max_attempts` is clamped to at least one
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Build a policy from dispatch settings
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_secs(config.retry_delay_secs),
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MAX_ATTEMPTS, RETRY_DELAY)
    }
}

/// Position of one object in the retry state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Dispatched, no attempt made yet
    Idle,
    /// Attempt number `attempt` (1-based) is running
    Attempting { attempt: u32 },
    /// Attempt `attempt` failed and another is allowed
    RetryScheduled { attempt: u32 },
    /// Terminal: the driver reported success
    Succeeded { attempts: u32 },
    /// Terminal: every allowed attempt failed
    Exhausted { attempts: u32 },
}

impl RetryState {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RetryState::Succeeded { .. } | RetryState::Exhausted { .. }
        )
    }

    /// Transition out of `Attempting` given the attempt outcome
    ///
    /// Any other state is returned unchanged.
    pub fn after_attempt(self, reconciled: bool, policy: &RetryPolicy) -> Self {
        match self {
            RetryState::Attempting { attempt } if reconciled => {
                RetryState::Succeeded { attempts: attempt }
            }
            RetryState::Attempting { attempt } if attempt < policy.max_attempts => {
                RetryState::RetryScheduled { attempt }
            }
            RetryState::Attempting { attempt } => RetryState::Exhausted { attempts: attempt },
            other => other,
        }
    }
}

/// Terminal result of a controller run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The object is in the desired state after `attempts` attempts
    Succeeded { attempts: u32 },
    /// All `attempts` attempts failed
    Exhausted { attempts: u32 },
}

impl RetryOutcome {
    /// Number of attempts charged
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Succeeded { attempts } | RetryOutcome::Exhausted { attempts } => {
                *attempts
            }
        }
    }

    /// Whether the object was reconciled
    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Succeeded { .. })
    }
}

/// Drives one object through the retry state machine
#[derive(Debug, Clone, Default)]
pub struct RetryController {
    policy: RetryPolicy,
    events: Option<EventSink>,
}

impl RetryController {
    /// Create a controller with the given policy
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            events: None,
        }
    }

    /// Publish attempt and outcome events to `events`
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = Some(events);
        self
    }

    /// Get the policy in use
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Reconcile `object` of `group` toward `address` until success or exhaustion
    ///
    /// Never fails: exhaustion is logged at error level and reported in the
    /// returned outcome, nothing is propagated further.
    pub async fn run(
        &self,
        driver: &dyn BackendDriver,
        group: &str,
        object: &ManagedObject,
        address: &str,
    ) -> RetryOutcome {
        let mut state = RetryState::Idle;

        loop {
            debug!(group, object = %object.name, ?state, "Retry state changed");

            state = match state {
                RetryState::Idle => RetryState::Attempting { attempt: 1 },

                RetryState::Attempting { attempt } => {
                    let reconciled = driver.reconcile(&object.configuration, address).await;
                    if !reconciled {
                        warn!(
                            group,
                            object = %object.name,
                            attempt,
                            "Failed to update object {}@{} (attempt {})",
                            object.name,
                            group,
                            attempt
                        );
                        self.emit(ReconcileEvent::AttemptFailed {
                            group: group.to_string(),
                            object: object.name.clone(),
                            attempt,
                        });
                    }
                    state.after_attempt(reconciled, &self.policy)
                }

                RetryState::RetryScheduled { attempt } => {
                    tokio::time::sleep(self.policy.delay).await;
                    RetryState::Attempting {
                        attempt: attempt + 1,
                    }
                }

                RetryState::Succeeded { attempts } => {
                    info!(
                        group,
                        object = %object.name,
                        attempts,
                        "Successfully updated object {}@{}",
                        object.name,
                        group
                    );
                    self.emit(ReconcileEvent::Succeeded {
                        group: group.to_string(),
                        object: object.name.clone(),
                        attempts,
                    });
                    return RetryOutcome::Succeeded { attempts };
                }

                RetryState::Exhausted { attempts } => {
                    error!(
                        group,
                        object = %object.name,
                        attempts,
                        "Failed to update object {}@{} after {} attempts. Giving up.",
                        object.name,
                        group,
                        attempts
                    );
                    self.emit(ReconcileEvent::Exhausted {
                        group: group.to_string(),
                        object: object.name.clone(),
                        attempts,
                    });
                    return RetryOutcome::Exhausted { attempts };
                }
            };
        }
    }

    fn emit(&self, event: ReconcileEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}

//! Update dispatcher
//!
//! The Dispatcher is responsible for:
//! - Looking up the group named by a trigger
//! - Starting one independent reconciliation task per object in the group
//! - Returning to the caller before any task finishes
//!
//! ## Architecture
//!
//! ```text
//!  trigger(group, address)
//!          │
//!          ▼
//!  ┌──────────────┐   spawn per object   ┌─────────────────┐
//!  │  Dispatcher  │ ───────────────────▶ │ reconcile task  │ ...
//!  └──────────────┘                      └─────────────────┘
//!                                                 │
//!                          ┌──────────────────────┼──────────────────────┐
//!                          ▼                      ▼                      ▼
//!                  ┌───────────────┐     ┌─────────────────┐     ┌─────────────┐
//!                  │DriverRegistry │     │ RetryController │     │   Events    │
//!                  │  (resolve)    │     │ (attempt/delay) │     │  (notify)   │
//!                  └───────────────┘     └─────────────────┘     └─────────────┘
//! ```
//!
//! ## Task Isolation
//!
//! Each task owns a copy of its object, group name and address. Tasks never
//! share mutable state, are never joined and cannot be cancelled: each one
//! runs until its object is Succeeded or Exhausted. A failing object never
//! affects its siblings.

use crate::config::{Configuration, ManagedObject, UpdateGroup};
use crate::error::{Error, Result};
use crate::events::{DEFAULT_EVENT_CHANNEL_CAPACITY, EventSink, ReconcileEvent};
use crate::registry::DriverRegistry;
use crate::retry::{RetryController, RetryPolicy};
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tracing::{error, info, warn};

/// Fire-and-forget update dispatcher
///
/// ## Lifecycle
///
/// 1. Load a [`Configuration`] and fill a [`DriverRegistry`]
/// 2. Create with [`Dispatcher::new()`], keeping or dropping the event receiver
/// 3. Call [`Dispatcher::trigger()`] for every inbound update request
///
/// Dispatching spawns Tokio tasks, so it must be called from within a Tokio
/// runtime.
pub struct Dispatcher {
    /// Immutable configuration shared with the trigger receiver
    config: Arc<Configuration>,

    /// Object type to driver mapping
    registry: Arc<DriverRegistry>,

    /// Retry controller template, cloned into every task
    retry: RetryController,

    /// Optional bound on concurrently running tasks
    limiter: Option<Arc<Semaphore>>,

    /// Event sender for external monitoring
    events: EventSink,
}

impl Dispatcher {
    /// Create a new dispatcher
    ///
    /// # Parameters
    ///
    /// - `config`: Validated, immutable configuration
    /// - `registry`: Registered backend drivers
    ///
    /// # Returns
    ///
    /// A tuple of (dispatcher, event_receiver) where event_receiver yields
    /// reconciliation events. Dropping the receiver is fine; events are then
    /// discarded.
    pub fn new(
        config: Arc<Configuration>,
        registry: Arc<DriverRegistry>,
    ) -> Result<(Self, mpsc::Receiver<ReconcileEvent>)> {
        config.validate()?;

        let (events, rx) = EventSink::channel(DEFAULT_EVENT_CHANNEL_CAPACITY);
        let retry =
            RetryController::new(RetryPolicy::from_config(&config.dispatch)).with_events(events.clone());
        let limiter = config
            .dispatch
            .max_concurrent_tasks
            .map(|permits| Arc::new(Semaphore::new(permits)));

        let dispatcher = Self {
            config,
            registry,
            retry,
            limiter,
            events,
        };

        Ok((dispatcher, rx))
    }

    /// Replace the retry policy taken from configuration
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = RetryController::new(policy).with_events(self.events.clone());
        self
    }

    /// Get the configuration this dispatcher serves
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Dispatch an update to the group named `group_name`
    ///
    /// # Returns
    ///
    /// - `Ok(n)`: The group was found and `n` tasks were started
    /// - `Err(Error::GroupNotFound)`: No such group; nothing was started
    pub fn trigger(&self, group_name: &str, address: &str) -> Result<usize> {
        let Some(group) = self.config.find_group(group_name) else {
            warn!(group = group_name, "Update group \"{}\" is not found", group_name);
            return Err(Error::group_not_found(group_name));
        };

        Ok(self.dispatch(group, address))
    }

    /// Start one reconciliation task per object of `group`
    ///
    /// Returns immediately with the number of tasks started; outcomes are
    /// only visible through logs and events.
    pub fn dispatch(&self, group: &UpdateGroup, address: &str) -> usize {
        info!(
            group = %group.name,
            address,
            "Dispatching update of group \"{}\" ({} object(s)) with {}",
            group.name,
            group.objects.len(),
            address
        );

        for object in &group.objects {
            self.spawn_reconcile(group.name.clone(), object.clone(), address.to_string());
        }

        group.objects.len()
    }

    fn spawn_reconcile(&self, group: String, object: ManagedObject, address: String) {
        let registry = Arc::clone(&self.registry);
        let retry = self.retry.clone();
        let limiter = self.limiter.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            events.emit(ReconcileEvent::Scheduled {
                group: group.clone(),
                object: object.name.clone(),
                address: address.clone(),
            });

            // Held until the task reaches a terminal state
            let _permit = match limiter {
                Some(semaphore) => match semaphore.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        error!(
                            group = %group,
                            object = %object.name,
                            "Concurrency limiter closed, dropping update of object {}@{}",
                            object.name, group
                        );
                        return;
                    }
                },
                None => None,
            };

            info!(
                group = %group,
                object = %object.name,
                "Updating object {}@{}",
                object.name,
                group
            );

            let driver = match registry.resolve(&object.object_type) {
                Ok(driver) => driver,
                Err(_) => {
                    error!(
                        group = %group,
                        object = %object.name,
                        object_type = %object.object_type,
                        "Don't know how to handle type {} of object {}@{}",
                        object.object_type, object.name, group
                    );
                    events.emit(ReconcileEvent::UnknownType {
                        group,
                        object: object.name,
                        object_type: object.object_type,
                    });
                    return;
                }
            };

            retry.run(driver.as_ref(), &group, &object, &address).await;
        });
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("groups", &self.config.update_groups.len())
            .field("registry", &self.registry)
            .field("retry", self.retry.policy())
            .field("limited", &self.limiter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Arc<Configuration> {
        Arc::new(Configuration::new(vec![UpdateGroup::new(
            "vpn1",
            vec![ManagedObject::new("conn-a", "unregistered")],
        )]))
    }

    #[tokio::test]
    async fn unknown_group_starts_nothing() {
        let (dispatcher, mut rx) =
            Dispatcher::new(config(), Arc::new(DriverRegistry::new())).unwrap();

        let result = dispatcher.trigger("vpn9", "203.0.113.5");
        assert!(matches!(result, Err(Error::GroupNotFound(name)) if name == "vpn9"));

        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result = Dispatcher::new(
            Arc::new(Configuration::default()),
            Arc::new(DriverRegistry::new()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn retry_policy_comes_from_config() {
        let mut config = Configuration::clone(&config());
        config.dispatch.max_attempts = 2;

        let (dispatcher, _rx) =
            Dispatcher::new(Arc::new(config), Arc::new(DriverRegistry::new())).unwrap();
        assert_eq!(dispatcher.retry.policy().max_attempts, 2);
    }
}

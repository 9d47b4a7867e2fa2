// # Backend Driver Trait
//
// Defines the reconciliation contract for one remote object type.
//
// ## Implementations
//
// - OpenStack IPsec site connection: `ipseek-driver-openstack` crate
//
// ## Usage
//
// ```rust,ignore
// use ipseek_core::BackendDriver;
//
// let driver = /* BackendDriver implementation */;
// let reconciled = driver.reconcile(&object.configuration, "203.0.113.5").await;
// ```

use async_trait::async_trait;
use std::collections::HashMap;

/// Driver-specific settings carried by a managed object
pub type Settings = HashMap<String, String>;

/// Trait for backend driver implementations
///
/// A driver brings one remote object into agreement with a desired
/// address. It owns every protocol and authentication detail of its
/// remote control plane and nothing else.
///
/// # Outcome
///
/// `reconcile` returns `true` only when the remote object already matched,
/// or was successfully changed to match, the desired address. Every failure
/// (transport, authentication, unexpected response, missing setting) is
/// reported as `false` after the driver logs a diagnostic.
///
/// # Forbidden
///
/// - Retrying or sleeping (owned by the retry controller)
/// - Spawning tasks
/// - Keeping state between calls (credentials and sessions are per call)
/// - Panicking on malformed input
#[async_trait]
pub trait BackendDriver: Send + Sync {
    /// Reconcile the object described by `settings` toward `desired_address`
    ///
    /// # Idempotency
    ///
    /// Calling this repeatedly with the same address must be safe: once the
    /// remote object is in the desired state, further calls are no-ops that
    /// return `true`.
    async fn reconcile(&self, settings: &Settings, desired_address: &str) -> bool;

    /// Get the object type this driver handles (for logging/debugging)
    fn driver_name(&self) -> &'static str;
}

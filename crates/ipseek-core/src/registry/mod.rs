//! Backend driver registry
//!
//! The registry maps an object's declared type string to the driver that
//! reconciles it, so adding a backend means registering a driver rather
//! than editing dispatch logic.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ipseek_core::DriverRegistry;
//!
//! let mut registry = DriverRegistry::new();
//! ipseek_driver_openstack::register(&mut registry, timeout)?;
//!
//! let driver = registry.resolve("openstack_ipsec_site_connection")?;
//! ```
//!
//! The registry is filled once during startup and then shared behind an
//! `Arc`; lookups never take a lock.

use crate::error::{Error, Result};
use crate::traits::BackendDriver;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of backend drivers keyed by object type
#[derive(Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn BackendDriver>>,
}

impl DriverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver for an object type
    ///
    /// Registering the same type twice replaces the earlier driver.
    ///
    /// # Parameters
    ///
    /// - `object_type`: Type identifier used in configuration (e.g., "openstack_ipsec_site_connection")
    /// - `driver`: Driver instance shared by every object of that type
    pub fn register(&mut self, object_type: impl Into<String>, driver: Arc<dyn BackendDriver>) {
        self.drivers.insert(object_type.into(), driver);
    }

    /// Resolve the driver for an object type
    ///
    /// # Returns
    ///
    /// - `Ok(driver)`: The registered driver
    /// - `Err(Error::UnknownObjectType)`: Nothing registered under `object_type`
    pub fn resolve(&self, object_type: &str) -> Result<Arc<dyn BackendDriver>> {
        self.drivers
            .get(object_type)
            .cloned()
            .ok_or_else(|| Error::unknown_type(object_type))
    }

    /// Check if a driver is registered for an object type
    pub fn has_driver(&self, object_type: &str) -> bool {
        self.drivers.contains_key(object_type)
    }

    /// List all registered object types
    pub fn list_drivers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.drivers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.list_drivers())
            .finish()
    }
}

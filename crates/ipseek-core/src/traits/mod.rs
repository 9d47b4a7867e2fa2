//! Core traits for ipseek
//!
//! This module defines the abstract interfaces that backend implementations must follow.
//!
//! - [`BackendDriver`]: Reconcile one remote object type toward a desired address

pub mod backend_driver;

pub use backend_driver::{BackendDriver, Settings};

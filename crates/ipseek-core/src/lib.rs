// # ipseek-core
//
// Core library for ipseek: reconciles the public endpoint address of remote
// network objects whenever a trigger reports an address change.
//
// ## Architecture Overview
//
// - **BackendDriver**: Trait reconciling one remote object type toward a desired address
// - **DriverRegistry**: Maps an object's declared type to its driver
// - **RetryController**: Bounded, fixed-delay retry around one object's reconciliation
// - **Dispatcher**: Starts one independent task per object of a group and returns immediately
// - **Configuration**: Immutable update groups and dispatch settings
//
// ## Design Principles
//
// 1. **Fire-and-forget**: The trigger caller is acknowledged before any attempt runs
// 2. **Isolation**: Objects never share mutable state; one failure never affects another
// 3. **Plugin-Based**: Drivers are registered by type, no hard-coded branching
// 4. **Idempotency**: Drivers compare before writing, so retries are safe

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod registry;
pub mod retry;
pub mod traits;

// Re-export core types for convenience
pub use config::{Configuration, DispatchConfig, ManagedObject, UpdateGroup};
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use events::ReconcileEvent;
pub use registry::DriverRegistry;
pub use retry::{RetryController, RetryOutcome, RetryPolicy, RetryState};
pub use traits::{BackendDriver, Settings};

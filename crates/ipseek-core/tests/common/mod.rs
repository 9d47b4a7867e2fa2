//! Test doubles and common utilities for dispatch contract tests
//!
//! This module provides minimal backend drivers that record how they were
//! driven without talking to any remote control plane.

#![allow(dead_code)]

use ipseek_core::config::{Configuration, ManagedObject, UpdateGroup};
use ipseek_core::events::ReconcileEvent;
use ipseek_core::traits::{BackendDriver, Settings};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio::time::Instant;

/// Object type used by the test doubles
pub const TEST_TYPE: &str = "test_object";

/// A driver that fails until a given attempt, then succeeds
pub struct ScriptedDriver {
    /// Attempt (1-based) that succeeds; `None` fails forever
    succeed_on: Option<usize>,
    /// Call counter for reconcile()
    call_count: Arc<AtomicUsize>,
    /// Time of every reconcile() call
    call_times: Arc<Mutex<Vec<Instant>>>,
    /// Addresses passed to reconcile()
    addresses: Arc<Mutex<Vec<String>>>,
}

impl ScriptedDriver {
    /// A driver that succeeds on attempt `attempt`
    pub fn succeeding_on(attempt: usize) -> Self {
        Self::with_script(Some(attempt))
    }

    /// A driver that never succeeds
    pub fn always_failing() -> Self {
        Self::with_script(None)
    }

    fn with_script(succeed_on: Option<usize>) -> Self {
        Self {
            succeed_on,
            call_count: Arc::new(AtomicUsize::new(0)),
            call_times: Arc::new(Mutex::new(Vec::new())),
            addresses: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Get the number of times reconcile() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get the time of every reconcile() call
    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }

    /// Get the addresses reconcile() was called with
    pub fn addresses(&self) -> Vec<String> {
        self.addresses.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl BackendDriver for ScriptedDriver {
    async fn reconcile(&self, _settings: &Settings, desired_address: &str) -> bool {
        let attempt = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.call_times.lock().unwrap().push(Instant::now());
        self.addresses
            .lock()
            .unwrap()
            .push(desired_address.to_string());

        self.succeed_on.is_some_and(|n| attempt >= n)
    }

    fn driver_name(&self) -> &'static str {
        "scripted"
    }
}

/// A driver that blocks every call until the test opens the gate
pub struct GatedDriver {
    gate: Arc<Semaphore>,
    started: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
}

impl GatedDriver {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
            started: Arc::new(AtomicUsize::new(0)),
            finished: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Let `n` blocked calls complete successfully
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Number of reconcile() calls that have started
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Number of reconcile() calls that have returned
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl BackendDriver for GatedDriver {
    async fn reconcile(&self, _settings: &Settings, _desired_address: &str) -> bool {
        self.started.fetch_add(1, Ordering::SeqCst);
        let passed = match self.gate.acquire().await {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        };
        self.finished.fetch_add(1, Ordering::SeqCst);
        passed
    }

    fn driver_name(&self) -> &'static str {
        "gated"
    }
}

/// A driver that takes a while and records peak concurrency
pub struct SlowDriver {
    work: Duration,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl SlowDriver {
    pub fn new(work: Duration) -> Self {
        Self {
            work,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Highest number of simultaneous reconcile() calls observed
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl BackendDriver for SlowDriver {
    async fn reconcile(&self, _settings: &Settings, _desired_address: &str) -> bool {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.work).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        true
    }

    fn driver_name(&self) -> &'static str {
        "slow"
    }
}

/// A managed object of the test type
pub fn test_object(name: &str) -> ManagedObject {
    ManagedObject::new(name, TEST_TYPE).with_setting("endpoint", "test")
}

/// A group of `count` objects named `<group>-obj-<i>`
pub fn test_group(name: &str, count: usize) -> UpdateGroup {
    let objects = (0..count)
        .map(|i| test_object(&format!("{}-obj-{}", name, i)))
        .collect();
    UpdateGroup::new(name, objects)
}

/// Helper to create a configuration holding the given groups
pub fn config_with(groups: Vec<UpdateGroup>) -> Arc<Configuration> {
    Arc::new(Configuration::new(groups))
}

/// Receive events until `count` terminal ones have arrived
///
/// Panics if they do not arrive within a minute (virtual or real time).
pub async fn collect_terminal(
    rx: &mut mpsc::Receiver<ReconcileEvent>,
    count: usize,
) -> Vec<ReconcileEvent> {
    let mut terminal = Vec::new();
    let deadline = Duration::from_secs(60);

    while terminal.len() < count {
        let event = tokio::time::timeout(deadline, rx.recv())
            .await
            .expect("terminal events arrive before the deadline")
            .expect("event channel stays open");
        if event.is_terminal() {
            terminal.push(event);
        }
    }

    terminal
}

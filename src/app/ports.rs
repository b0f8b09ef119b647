//! Port traits: the boundary between runaway supervision and the host.
//!
//! ```text
//!   Host adapter ──▶ Port trait ──▶ RunawaySupervisor (domain)
//! ```
//!
//! The supervisor is shared across evaluation threads, so every port is
//! `Send + Sync` and takes `&self`.  Adapters that need mutation use
//! interior locking.

use std::sync::Arc;

use crate::app::events::{RunawayEvent, RunawayNotification};
use crate::config::SettingValue;
use crate::error::DispatchError;
use crate::time::Timestamp;

// ───────────────────────────────────────────────────────────────
// Settings port (host → domain, read-only)
// ───────────────────────────────────────────────────────────────

/// Read-only view of the host's key/value settings store.
pub trait SettingsPort: Send + Sync {
    /// Current value for `key`, or `None` if it has never been set.
    fn get(&self, key: &str) -> Option<SettingValue>;
}

// ───────────────────────────────────────────────────────────────
// Command port (domain → device)
// ───────────────────────────────────────────────────────────────

/// Channel to the device's command queue.
///
/// Called synchronously on the alert path, before any observer runs.
/// Implementations should enqueue and return; retry policy belongs to the
/// channel, not to the caller.
pub trait CommandPort: Send + Sync {
    fn send_command(&self, gcode: &str) -> Result<(), DispatchError>;
}

// ───────────────────────────────────────────────────────────────
// Observer registry (domain → external listeners)
// ───────────────────────────────────────────────────────────────

/// Callback invoked on its own thread when a runaway event fires.
pub type ObserverFn = Arc<dyn Fn(&RunawayNotification) -> anyhow::Result<()> + Send + Sync>;

/// A named callback handle returned by an [`ObserverRegistry`].
#[derive(Clone)]
pub struct RegisteredObserver {
    pub name: String,
    pub callback: ObserverFn,
}

impl RegisteredObserver {
    pub fn new(
        name: impl Into<String>,
        callback: impl Fn(&RunawayNotification) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            callback: Arc::new(callback),
        }
    }
}

impl core::fmt::Debug for RegisteredObserver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RegisteredObserver")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Lookup of observers interested in an event.  The supervisor queries it
/// on every alert and never caches the result.
pub trait ObserverRegistry: Send + Sync {
    /// Observers for `event`, in invocation order.
    fn observers(&self, event: RunawayEvent) -> Vec<RegisteredObserver>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time source for [`on_temperatures`].
///
/// [`on_temperatures`]: crate::app::supervisor::RunawaySupervisor::on_temperatures
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

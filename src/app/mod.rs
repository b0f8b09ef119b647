//! Application core: runaway supervision with all I/O behind ports.
//!
//! The [`supervisor`] owns one [`HeaterMonitor`](crate::monitor::HeaterMonitor)
//! per heater and reaches the settings store, the device command channel,
//! observers and the clock only through the traits in [`ports`].

pub mod events;
pub mod notify;
pub mod ports;
pub mod supervisor;

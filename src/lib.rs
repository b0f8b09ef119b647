//! Thermal runaway monitor library.
//!
//! Watches a bed heater and any number of tool heaters for sustained
//! excursions outside their expected band and, once confirmed, sends an
//! emergency command to the device and notifies registered observers.
//!
//! Start at [`RunawaySupervisor`]; everything the host provides is a port
//! trait in [`app::ports`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod heater;
pub mod monitor;
pub mod time;

pub use app::supervisor::{DispatchReport, RunawaySupervisor};
pub use config::HeaterConfig;
pub use heater::{HeaterId, TemperatureSample, TemperatureSnapshot};
pub use monitor::{Decision, Direction, HeaterMonitor, RunawayAlert};
pub use time::Timestamp;

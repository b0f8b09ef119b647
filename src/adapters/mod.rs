//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter     | Implements       | Connects to                    |
//! |-------------|------------------|--------------------------------|
//! | `observers` | ObserverRegistry | In-process callback list       |
//! | `settings`  | SettingsPort     | In-memory / JSON settings map  |
//! | `time`      | Clock            | `std::time::Instant`           |
//!
//! The device command channel has no bundled adapter; the host owns it.

pub mod observers;
pub mod settings;
pub mod time;

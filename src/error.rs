//! Unified error types for the runaway monitor.
//!
//! Every subsystem funnels into the crate-level [`Error`] so the supervisor's
//! per-tick error handling stays uniform: log the failure, skip the affected
//! heater or observer, keep going.  None of these are fatal to the
//! temperature stream.

use core::fmt;

use crate::heater::HeaterId;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A setting could not be parsed or failed range validation.
    Config(ConfigError),
    /// The snapshot carried no sample for a configured heater.
    MissingSample(HeaterId),
    /// The emergency command or an observer notification failed.
    Dispatch(DispatchError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::MissingSample(id) => write!(f, "no sample for heater {id}"),
            Self::Dispatch(e) => write!(f, "dispatch: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The stored value cannot be read as the expected type.
    Invalid { key: &'static str, value: String },
    /// The value parsed but is outside the accepted range.
    OutOfRange { key: &'static str, reason: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid { key, value } => write!(f, "{key}: cannot parse {value:?}"),
            Self::OutOfRange { key, reason } => write!(f, "{key}: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Dispatch errors
// ---------------------------------------------------------------------------

/// Failures on the alert path.  Logged once per attempt and never retried:
/// an emergency command is point-in-time and may not be idempotent.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// The command port returned an error of its own or panicked.
    CommandFailed(String),
    /// The command channel to the device is gone.
    ChannelClosed,
    /// An observer callback returned an error or panicked.
    ObserverFailed { observer: String, reason: String },
    /// The thread for an observer callback could not be started.
    SpawnFailed { observer: String, reason: String },
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CommandFailed(reason) => write!(f, "command failed: {reason}"),
            Self::ChannelClosed => write!(f, "command channel closed"),
            Self::ObserverFailed { observer, reason } => {
                write!(f, "observer {observer} failed: {reason}")
            }
            Self::SpawnFailed { observer, reason } => {
                write!(f, "observer {observer} not started: {reason}")
            }
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<DispatchError> for Error {
    fn from(e: DispatchError) -> Self {
        Self::Dispatch(e)
    }
}

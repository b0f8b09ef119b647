//! Fire-and-forget observer invocation.
//!
//! Each callback runs on its own thread.  A failing or panicking observer
//! is logged and forgotten; it cannot stall the evaluation that raised the
//! alert or stop the other observers.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use log::{debug, error};

use super::events::RunawayNotification;
use super::ports::RegisteredObserver;
use crate::error::DispatchError;

/// Start `observer` on a detached thread.  The handle is returned only so
/// callers that care (tests, shutdown paths) can join it.
pub fn spawn_observer(
    observer: RegisteredObserver,
    notification: RunawayNotification,
) -> Result<JoinHandle<()>, DispatchError> {
    let thread_name: String = format!("runaway-{}", observer.name)
        .chars()
        .filter(|c| *c != '\0')
        .collect();
    let name = observer.name.clone();

    thread::Builder::new()
        .name(thread_name)
        .spawn(move || run_observer(&observer, &notification))
        .map_err(|e| DispatchError::SpawnFailed {
            observer: name,
            reason: e.to_string(),
        })
}

fn run_observer(observer: &RegisteredObserver, notification: &RunawayNotification) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| (observer.callback)(notification)));
    let reason = match outcome {
        Ok(Ok(())) => {
            debug!("OBSERVER | {} handled {}", observer.name, notification.event);
            return;
        }
        Ok(Err(e)) => format!("{e:#}"),
        Err(payload) => panic_message(payload.as_ref()),
    };
    let err = DispatchError::ObserverFailed {
        observer: observer.name.clone(),
        reason,
    };
    error!("OBSERVER | {} on {}: {err}", notification.event, notification.heater);
}

pub(crate) fn panic_message(payload: &(dyn core::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_owned()
    }
}

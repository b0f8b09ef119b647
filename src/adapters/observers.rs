//! In-process observer registry.
//!
//! Implements [`ObserverRegistry`] as an ordered list of `(event, observer)`
//! pairs.  Registration may happen at any time; the supervisor sees the
//! list as it is when an alert fires.

use std::sync::{PoisonError, RwLock};

use log::info;

use crate::app::events::{RunawayEvent, RunawayNotification};
use crate::app::ports::{ObserverRegistry, RegisteredObserver};

#[derive(Debug, Default)]
pub struct ObserverList {
    entries: RwLock<Vec<(RunawayEvent, RegisteredObserver)>>,
}

impl ObserverList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `callback` to `event` under `name`.
    pub fn register(
        &self,
        event: RunawayEvent,
        name: impl Into<String>,
        callback: impl Fn(&RunawayNotification) -> anyhow::Result<()> + Send + Sync + 'static,
    ) {
        let observer = RegisteredObserver::new(name, callback);
        info!("OBSERVER | {} registered for {event}", observer.name);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((event, observer));
    }

    /// Drop every subscription held under `name`.  Returns how many went.
    pub fn unregister(&self, name: &str) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(_, o)| o.name != name);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObserverRegistry for ObserverList {
    fn observers(&self, event: RunawayEvent) -> Vec<RegisteredObserver> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(e, _)| *e == event)
            .map(|(_, o)| o.clone())
            .collect()
    }
}

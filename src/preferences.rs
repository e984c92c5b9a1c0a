//! Unit preference store
//!
//! Session-wide holder for the active measurement system. Cloning the store
//! hands out another reference to the same state; every `set` is broadcast
//! to all subscribers, including writes of the current value.

use crate::models::UnitPreferences;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct UnitStore {
    sender: Arc<watch::Sender<UnitPreferences>>,
}

impl UnitStore {
    #[must_use]
    pub fn new(initial: UnitPreferences) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Current preferences
    #[must_use]
    pub fn get(&self) -> UnitPreferences {
        *self.sender.borrow()
    }

    /// Replace the preferences and notify subscribers
    pub fn set(&self, preferences: UnitPreferences) {
        let previous = self.sender.send_replace(preferences);
        debug!(from = %previous, to = %preferences, "Unit preferences set");
    }

    /// Flip between the metric and imperial systems, returning the new value
    pub fn toggle(&self) -> UnitPreferences {
        let next = self.get().toggled();
        self.set(next);
        next
    }

    /// Receiver that observes every subsequent `set`
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<UnitPreferences> {
        self.sender.subscribe()
    }
}

impl Default for UnitStore {
    fn default() -> Self {
        Self::new(UnitPreferences::metric())
    }
}

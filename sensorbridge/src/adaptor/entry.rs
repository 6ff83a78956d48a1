//! Shared "is this logical sensor active at all" tracker.

use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct EntryState {
    references: usize,
    running: bool,
}

/// Reference-counted activity entry of one logical sensor.
///
/// Owned by the sensor registration layer and shared by every adaptor
/// instance serving that logical sensor. Adaptors add a reference when they
/// start and remove it when they stop; the running flag follows the first
/// and last reference.
#[derive(Debug)]
pub struct AdaptedSensorEntry {
    name: String,
    state: Mutex<EntryState>,
}

impl AdaptedSensorEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(EntryState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, EntryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a reference and return the new count.
    pub fn add_reference(&self) -> usize {
        let mut state = self.state();
        state.references += 1;
        state.references
    }

    /// Remove a reference and return the new count. Never goes below zero.
    pub fn remove_reference(&self) -> usize {
        let mut state = self.state();
        state.references = state.references.saturating_sub(1);
        state.references
    }

    pub fn reference_count(&self) -> usize {
        self.state().references
    }

    pub fn is_running(&self) -> bool {
        self.state().running
    }

    pub fn set_running(&self, running: bool) {
        self.state().running = running;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_counting() {
        let entry = AdaptedSensorEntry::new("alsadaptor");
        assert_eq!(entry.add_reference(), 1);
        assert_eq!(entry.add_reference(), 2);
        assert_eq!(entry.remove_reference(), 1);
        assert_eq!(entry.remove_reference(), 0);
        assert_eq!(entry.remove_reference(), 0);
        assert_eq!(entry.name(), "alsadaptor");
    }
}

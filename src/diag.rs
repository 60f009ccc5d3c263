//! Debug-only critical-section instrumentation
//!
//! A [`SectionTracker`] records named critical-section entry/exit pairs so
//! tests can assert that no section is entered twice without being released.
//! Trackers are explicit instances injected where needed, never process-wide
//! state; release builds never construct one, and the store hooks that call
//! into it compile away outside debug builds.
//!
//! Reentering a held section, or leaving one that is not held, is a logic
//! defect and panics.

use std::collections::HashSet;
use std::sync::Mutex;

/// Records which named critical sections are currently held.
#[derive(Debug, Default)]
pub struct SectionTracker {
    held: Mutex<HashSet<String>>,
}

impl SectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a named section as entered. Panics if it is already held.
    pub fn enter(&self, name: &str) {
        let mut held = self.held.lock().unwrap();
        if !held.insert(name.to_string()) {
            panic!("critical section '{}' entered twice without release", name);
        }
    }

    /// Mark a named section as released. Panics if it was not held.
    pub fn leave(&self, name: &str) {
        let mut held = self.held.lock().unwrap();
        if !held.remove(name) {
            panic!("critical section '{}' released without being held", name);
        }
    }

    /// Number of sections currently held.
    pub fn held_count(&self) -> usize {
        self.held.lock().unwrap().len()
    }

    /// True when every entered section has been released.
    pub fn all_released(&self) -> bool {
        self.held_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_leave_balanced() {
        let tracker = SectionTracker::new();
        tracker.enter("store.in_flight");
        assert_eq!(tracker.held_count(), 1);
        tracker.leave("store.in_flight");
        assert!(tracker.all_released());
    }

    #[test]
    #[should_panic(expected = "entered twice")]
    fn test_reentry_panics() {
        let tracker = SectionTracker::new();
        tracker.enter("store.sequence");
        tracker.enter("store.sequence");
    }

    #[test]
    #[should_panic(expected = "released without being held")]
    fn test_unbalanced_leave_panics() {
        let tracker = SectionTracker::new();
        tracker.leave("registry");
    }

    #[test]
    fn test_instances_are_isolated() {
        let a = SectionTracker::new();
        let b = SectionTracker::new();
        a.enter("shared-name");
        // A second tracker is unaffected by the first
        b.enter("shared-name");
        a.leave("shared-name");
        b.leave("shared-name");
    }
}

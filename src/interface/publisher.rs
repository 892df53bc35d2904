// src/interface/publisher.rs
// Observer contract for the presentation layer (AR overlay, announcements).
// The tracker publishes every recomputed state and every waypoint transition.

use std::fmt;
use std::sync::Arc;

use crate::core::state::NavigationState;
use crate::navigation::Waypoint;

/// Receives navigation output. Callbacks run on the thread that delivered the
/// triggering sample and must not call back into the session.
#[cfg_attr(test, mockall::automock)]
pub trait NavigationObserver: Send + Sync {
    /// Called for every recomputed state
    fn on_state(&self, state: &NavigationState);

    /// Called when an intermediate waypoint is passed or skipped
    fn on_waypoint_reached(&self, _index: usize, _waypoint: &Waypoint) {}

    /// Called once when the destination is reached
    fn on_arrival(&self, _state: &NavigationState) {}
}

/// Adapts a closure into a state-only observer
pub struct StateCallback<F>(pub F);

impl<F> NavigationObserver for StateCallback<F>
where
    F: Fn(&NavigationState) + Send + Sync,
{
    fn on_state(&self, state: &NavigationState) {
        (self.0)(state)
    }
}

/// Fan-out to every subscribed observer
#[derive(Clone, Default)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn NavigationObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        ObserverSet::default()
    }

    pub fn subscribe(&mut self, observer: Arc<dyn NavigationObserver>) {
        self.observers.push(observer);
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn publish_state(&self, state: &NavigationState) {
        for observer in &self.observers {
            observer.on_state(state);
        }
    }

    pub fn publish_waypoint_reached(&self, index: usize, waypoint: &Waypoint) {
        for observer in &self.observers {
            observer.on_waypoint_reached(index, waypoint);
        }
    }

    pub fn publish_arrival(&self, state: &NavigationState) {
        for observer in &self.observers {
            observer.on_arrival(state);
        }
    }
}

impl fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverSet")
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::TrackerPhase;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn state(arrived: bool) -> NavigationState {
        NavigationState {
            phase: if arrived { TrackerPhase::Arrived } else { TrackerPhase::Navigating },
            waypoint_index: 1,
            waypoint_count: 2,
            distance_to_next_m: if arrived { 2.0 } else { 12.0 },
            bearing_deg: 0.0,
            relative_bearing_deg: 0.0,
            remaining_distance_m: 12.0,
            eta_s: None,
            accuracy_m: 3.0,
            approaching_destination: arrived,
            arrived,
            stale: false,
            timestamp_ms: 1000,
        }
    }

    #[test]
    fn test_callback_sees_states_only() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let mut set = ObserverSet::new();
        assert!(set.is_empty());

        set.subscribe(Arc::new(StateCallback(move |state: &NavigationState| {
            assert_eq!(state.waypoint_index, 1);
            counter.fetch_add(1, Ordering::SeqCst);
        })));
        set.publish_state(&state(false));
        set.publish_waypoint_reached(0, &Waypoint::planar(0.0, 0.0));
        set.publish_arrival(&state(true));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fan_out_until_cleared() {
        let mut first = MockNavigationObserver::new();
        first.expect_on_state().times(1).return_const(());
        first.expect_on_arrival().times(1).return_const(());
        let mut second = MockNavigationObserver::new();
        second.expect_on_state().times(1).return_const(());
        second.expect_on_arrival().times(1).return_const(());

        let mut set = ObserverSet::new();
        set.subscribe(Arc::new(first));
        set.subscribe(Arc::new(second));
        assert_eq!(set.len(), 2);

        set.publish_state(&state(false));
        set.publish_arrival(&state(true));

        set.clear();
        assert!(set.is_empty());
        set.publish_state(&state(false));
    }
}

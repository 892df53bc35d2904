// core/state.rs

// Navigation phase machine and the state snapshot handed to the presentation
// layer on every update. Phases move Idle -> Navigating -> Arrived; Arrived is
// terminal until the tracker is stopped or given a new route.

// Dependencies
use serde::{Deserialize, Serialize};

/// Tracker phases
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackerPhase {
    Idle,       // No route loaded
    Navigating, // Following the route
    Arrived,    // Destination reached
}

impl TrackerPhase {
    /// Whether position updates are processed in this phase
    pub fn is_active(self) -> bool {
        self == TrackerPhase::Navigating
    }
}

/// Guidance snapshot for the presentation layer
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NavigationState {
    pub phase: TrackerPhase,
    /// Index of the active waypoint within the route
    pub waypoint_index: usize,
    pub waypoint_count: usize,
    /// Distance to the active waypoint (m)
    pub distance_to_next_m: f64,
    /// Absolute bearing to the active waypoint (degrees, 0 = north)
    pub bearing_deg: f64,
    /// Bearing relative to the current heading, (-180, 180]
    pub relative_bearing_deg: f64,
    /// Distance to the active waypoint plus the remaining legs (m)
    pub remaining_distance_m: f64,
    /// Estimated walking time left, when a walking speed is known (s)
    pub eta_s: Option<f64>,
    /// Accuracy radius of the estimate this state was computed from (m)
    pub accuracy_m: f64,
    /// Within the approach radius of the destination
    pub approaching_destination: bool,
    pub arrived: bool,
    /// The underlying estimate was stale
    pub stale: bool,
    /// Time of the estimate this state was computed from (ms)
    pub timestamp_ms: u64,
}

impl NavigationState {
    /// Progress through the route as a fraction of waypoints passed
    pub fn progress(&self) -> f64 {
        if self.arrived || self.waypoint_count == 0 {
            return 1.0;
        }
        self.waypoint_index as f64 / self.waypoint_count as f64
    }

    pub fn is_final_leg(&self) -> bool {
        self.waypoint_index + 1 >= self.waypoint_count
    }
}

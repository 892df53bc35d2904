// src/navigation/tracker.rs
// Turns a route plus a live position/heading stream into guidance: distance and
// bearing to the active waypoint, waypoint advancement and arrival. Advancement
// radius grows with the estimate's accuracy so GPS noise never leaves the user
// stuck just short of a waypoint; the destination itself uses a fixed, tighter
// radius.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::route::Route;
use crate::core::geometry::{normalize_relative, Coordinates};
use crate::core::localization::PositionEstimate;
use crate::core::state::{NavigationState, TrackerPhase};
use crate::interface::{NavigationObserver, ObserverSet};

/// Navigation tracker tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Floor of the intermediate-waypoint advancement radius (m)
    #[serde(default = "default_min_advance_radius_m")]
    pub min_advance_radius_m: f64,
    /// Added to the estimate's accuracy to form the advancement radius (m)
    #[serde(default = "default_accuracy_margin_m")]
    pub accuracy_margin_m: f64,
    /// Distance to the destination that counts as arrival (m)
    #[serde(default = "default_arrival_radius_m")]
    pub arrival_radius_m: f64,
    /// Distance to the destination that raises the approaching flag (m)
    #[serde(default = "default_approach_radius_m")]
    pub approach_radius_m: f64,
    /// Walking speed below which no ETA is reported (m/s)
    #[serde(default = "default_min_eta_speed")]
    pub min_eta_speed: f64,
}

fn default_min_advance_radius_m() -> f64 {
    10.0
}
fn default_accuracy_margin_m() -> f64 {
    5.0
}
fn default_arrival_radius_m() -> f64 {
    5.0
}
fn default_approach_radius_m() -> f64 {
    8.0
}
fn default_min_eta_speed() -> f64 {
    0.2
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            min_advance_radius_m: default_min_advance_radius_m(),
            accuracy_margin_m: default_accuracy_margin_m(),
            arrival_radius_m: default_arrival_radius_m(),
            approach_radius_m: default_approach_radius_m(),
            min_eta_speed: default_min_eta_speed(),
        }
    }
}

/// Route-following state machine
#[derive(Debug)]
pub struct NavigationTracker {
    config: TrackerConfig,
    route: Option<Route>,
    phase: TrackerPhase,
    index: usize,
    last_estimate: Option<PositionEstimate>,
    latest: Option<Arc<NavigationState>>,
    observers: ObserverSet,
}

impl NavigationTracker {
    pub fn new(config: TrackerConfig) -> Self {
        NavigationTracker {
            config,
            route: None,
            phase: TrackerPhase::Idle,
            index: 0,
            last_estimate: None,
            latest: None,
            observers: ObserverSet::new(),
        }
    }

    pub fn subscribe(&mut self, observer: Arc<dyn NavigationObserver>) {
        self.observers.subscribe(observer);
    }

    /// Loads a route and starts navigating it. Routes that begin at the user's
    /// own start location skip that first waypoint. An empty route leaves the
    /// tracker idle.
    pub fn start(&mut self, route: Route) -> TrackerPhase {
        self.last_estimate = None;
        self.latest = None;

        if route.is_empty() {
            warn!("Ignoring empty route; tracker stays idle");
            self.route = None;
            self.phase = TrackerPhase::Idle;
            self.index = 0;
            return self.phase;
        }

        self.index = if route.starts_at_origin() && route.len() > 1 { 1 } else { 0 };
        info!(
            "Navigation started: {} waypoints, {:.1} m, {:?} coordinates, first target {}",
            route.len(),
            route.length_m(),
            route.mode(),
            self.index
        );
        self.route = Some(route);
        self.phase = TrackerPhase::Navigating;
        self.phase
    }

    /// Recomputes guidance for a new estimate. Returns `None` (no-op) unless
    /// navigating, or when the estimate lacks coordinates in the route's mode.
    pub fn on_position_update(&mut self, estimate: &PositionEstimate) -> Option<NavigationState> {
        if !self.phase.is_active() {
            return None;
        }
        let route = self.route.as_ref()?;
        let position = estimate.coordinates();
        if !position.supports(route.mode()) {
            warn!(
                "Estimate has no {:?} coordinates; skipping update",
                route.mode()
            );
            return None;
        }
        self.last_estimate = Some(estimate.clone());

        let last = route.len() - 1;
        let radius = self.advance_radius(estimate.accuracy_m);
        let mut reached = Vec::new();

        // Pass as many intermediate waypoints as the radius allows, so the
        // state below always targets a waypoint not yet reached
        while self.index < last {
            let (distance, _) = measure(route, self.index, &position)?;
            if distance >= radius {
                break;
            }
            debug!(
                "Reached waypoint {} at {:.1} m (radius {:.1} m)",
                self.index, distance, radius
            );
            reached.push(self.index);
            self.index += 1;
        }

        let mut state = compose_state(&self.config, route, self.index, estimate, TrackerPhase::Navigating)?;

        if self.index == last {
            state.approaching_destination = state.distance_to_next_m < self.config.approach_radius_m;
            // Staleness is reported on the state but never holds back arrival
            if state.distance_to_next_m < self.config.arrival_radius_m {
                state.phase = TrackerPhase::Arrived;
                state.arrived = true;
                state.eta_s = Some(0.0);
            }
        }

        for &index in &reached {
            if let Some(waypoint) = route.waypoint(index) {
                self.observers.publish_waypoint_reached(index, waypoint);
            }
        }
        if state.arrived {
            self.phase = TrackerPhase::Arrived;
            info!(
                "Arrived at destination ({:.1} m from final waypoint)",
                state.distance_to_next_m
            );
        }
        Some(self.publish(state))
    }

    /// Forces advancement to the next waypoint regardless of distance. On the
    /// final waypoint this declares arrival. Returns the recomputed state when
    /// an estimate has been seen.
    pub fn skip_to_next(&mut self) -> Option<NavigationState> {
        if !self.phase.is_active() {
            return None;
        }
        let route = self.route.as_ref()?;
        let last = route.len() - 1;

        if let Some(waypoint) = route.waypoint(self.index) {
            if self.index < last {
                self.observers.publish_waypoint_reached(self.index, waypoint);
            }
        }

        let phase = if self.index >= last {
            info!("Skipped final waypoint; navigation complete");
            TrackerPhase::Arrived
        } else {
            self.index += 1;
            info!("Skipped to waypoint {}", self.index);
            TrackerPhase::Navigating
        };
        self.phase = phase;

        let estimate = self.last_estimate.as_ref()?;
        let mut state = compose_state(&self.config, route, self.index, estimate, phase)?;
        if phase == TrackerPhase::Arrived {
            state.arrived = true;
            state.eta_s = Some(0.0);
        }
        Some(self.publish(state))
    }

    /// Drops the route and returns to idle. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if self.phase != TrackerPhase::Idle {
            info!("Navigation stopped in phase {:?}", self.phase);
        }
        self.route = None;
        self.phase = TrackerPhase::Idle;
        self.index = 0;
        self.last_estimate = None;
    }

    pub fn phase(&self) -> TrackerPhase {
        self.phase
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    /// Latest published state
    pub fn snapshot(&self) -> Option<Arc<NavigationState>> {
        self.latest.clone()
    }

    /// Advancement radius for intermediate waypoints at a given accuracy
    pub fn advance_radius(&self, accuracy_m: f64) -> f64 {
        let accuracy = if accuracy_m.is_finite() { accuracy_m } else { 0.0 };
        self.config
            .min_advance_radius_m
            .max(accuracy + self.config.accuracy_margin_m)
    }

    fn publish(&mut self, state: NavigationState) -> NavigationState {
        self.observers.publish_state(&state);
        if state.arrived {
            self.observers.publish_arrival(&state);
        }
        self.latest = Some(Arc::new(state.clone()));
        state
    }
}

impl Default for NavigationTracker {
    fn default() -> Self {
        NavigationTracker::new(TrackerConfig::default())
    }
}

/// Distance and bearing from `position` to waypoint `index`
fn measure(route: &Route, index: usize, position: &Coordinates) -> Option<(f64, f64)> {
    let target = &route.waypoint(index)?.coordinates;
    let mode = route.mode();
    Some((mode.distance(position, target)?, mode.bearing(position, target)?))
}

fn compose_state(
    config: &TrackerConfig,
    route: &Route,
    index: usize,
    estimate: &PositionEstimate,
    phase: TrackerPhase,
) -> Option<NavigationState> {
    let (distance, bearing) = measure(route, index, &estimate.coordinates())?;
    let remaining = distance + route.remaining_length_from(index);
    let eta_s = (estimate.speed_mps >= config.min_eta_speed).then(|| remaining / estimate.speed_mps);

    Some(NavigationState {
        phase,
        waypoint_index: index,
        waypoint_count: route.len(),
        distance_to_next_m: distance,
        bearing_deg: bearing,
        relative_bearing_deg: normalize_relative(bearing - estimate.heading_deg),
        remaining_distance_m: remaining,
        eta_s,
        accuracy_m: estimate.accuracy_m,
        approaching_destination: false,
        arrived: false,
        stale: estimate.stale,
        timestamp_ms: estimate.timestamp_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::{CoordinateMode, GeoPoint, PlanarPoint};
    use crate::interface::MockNavigationObserver;
    use crate::navigation::Waypoint;
    use rstest::rstest;

    fn estimate(x: f64, y: f64, accuracy_m: f64) -> PositionEstimate {
        PositionEstimate {
            planar: PlanarPoint::new(x, y),
            geodetic: None,
            accuracy_m,
            heading_deg: 0.0,
            speed_mps: 0.0,
            timestamp_ms: 0,
            stale: false,
        }
    }

    fn straight_route(starts_at_origin: bool) -> Route {
        Route::new(
            CoordinateMode::Planar,
            vec![
                Waypoint::planar(0.0, 0.0),
                Waypoint::planar(0.0, 100.0),
                Waypoint::planar(0.0, 200.0),
            ],
            starts_at_origin,
        )
    }

    #[test]
    fn test_start_skips_origin_once() {
        let mut tracker = NavigationTracker::default();
        assert_eq!(tracker.start(straight_route(true)), TrackerPhase::Navigating);
        assert_eq!(tracker.current_index(), 1);

        tracker.start(straight_route(false));
        assert_eq!(tracker.current_index(), 0);

        let single = Route::new(CoordinateMode::Planar, vec![Waypoint::planar(1.0, 1.0)], true);
        tracker.start(single);
        assert_eq!(tracker.current_index(), 0);
    }

    #[test]
    fn test_empty_route_stays_idle() {
        let mut tracker = NavigationTracker::default();
        let empty = Route::new(CoordinateMode::Planar, Vec::new(), true);
        assert_eq!(tracker.start(empty), TrackerPhase::Idle);
        assert!(tracker.on_position_update(&estimate(0.0, 0.0, 3.0)).is_none());
    }

    #[test]
    fn test_idle_update_is_noop() {
        let mut tracker = NavigationTracker::default();
        assert!(tracker.on_position_update(&estimate(0.0, 0.0, 3.0)).is_none());
        assert!(tracker.skip_to_next().is_none());
        assert!(tracker.snapshot().is_none());
    }

    #[rstest]
    #[case(20.0, 25.5, false)]
    #[case(20.0, 24.5, true)]
    #[case(2.0, 10.5, false)]
    #[case(2.0, 9.5, true)]
    fn test_adaptive_advance_radius(#[case] accuracy: f64, #[case] distance: f64, #[case] advances: bool) {
        let mut tracker = NavigationTracker::default();
        tracker.start(straight_route(false));
        let state = tracker.on_position_update(&estimate(0.0, -distance, accuracy)).unwrap();
        assert_eq!(state.waypoint_index == 1, advances);
    }

    #[test]
    fn test_advance_recomputes_against_new_waypoint() {
        let mut tracker = NavigationTracker::default();
        tracker.start(straight_route(false));
        let state = tracker.on_position_update(&estimate(0.0, 2.0, 3.0)).unwrap();
        assert_eq!(state.waypoint_index, 1);
        assert!((state.distance_to_next_m - 98.0).abs() < 1e-9);
        assert!((state.bearing_deg - 0.0).abs() < 1e-9);
        assert!((state.remaining_distance_m - 198.0).abs() < 1e-9);
    }

    #[test]
    fn test_final_waypoint_arrival_strictness() {
        let mut tracker = NavigationTracker::default();
        tracker.start(Route::new(
            CoordinateMode::Planar,
            vec![Waypoint::planar(0.0, 0.0), Waypoint::planar(0.0, 50.0)],
            true,
        ));

        let near = tracker.on_position_update(&estimate(0.0, 43.0, 3.0)).unwrap();
        assert!(!near.arrived);
        assert!(near.approaching_destination);
        assert_eq!(tracker.phase(), TrackerPhase::Navigating);

        let there = tracker.on_position_update(&estimate(0.0, 46.0, 3.0)).unwrap();
        assert!(there.arrived);
        assert_eq!(there.phase, TrackerPhase::Arrived);
        assert_eq!(tracker.phase(), TrackerPhase::Arrived);

        // Terminal: further updates are no-ops
        assert!(tracker.on_position_update(&estimate(0.0, 50.0, 3.0)).is_none());
    }

    #[test]
    fn test_final_waypoint_ignores_accuracy_scaling() {
        let mut tracker = NavigationTracker::default();
        tracker.start(Route::new(
            CoordinateMode::Planar,
            vec![Waypoint::planar(0.0, 0.0), Waypoint::planar(0.0, 50.0)],
            true,
        ));
        let state = tracker.on_position_update(&estimate(0.0, 41.0, 30.0)).unwrap();
        assert!(!state.arrived);
        assert!(!state.approaching_destination);
    }

    #[test]
    fn test_stale_estimate_still_arrives() {
        let mut tracker = NavigationTracker::default();
        tracker.start(Route::new(
            CoordinateMode::Planar,
            vec![Waypoint::planar(0.0, 0.0), Waypoint::planar(0.0, 40.0)],
            true,
        ));
        let mut far = estimate(0.0, 20.0, 3.0);
        far.stale = true;
        let state = tracker.on_position_update(&far).unwrap();
        assert!(state.stale);
        assert!(!state.arrived);

        let mut there = estimate(0.0, 40.0, 3.0);
        there.stale = true;
        let state = tracker.on_position_update(&there).unwrap();
        assert!(state.stale);
        assert!(state.arrived);
        assert_eq!(tracker.phase(), TrackerPhase::Arrived);
    }

    #[test]
    fn test_skip_to_next_then_arrive() {
        let mut tracker = NavigationTracker::default();
        tracker.start(straight_route(true));
        tracker.on_position_update(&estimate(0.0, 20.0, 3.0));

        let state = tracker.skip_to_next().unwrap();
        assert_eq!(state.waypoint_index, 2);
        assert!(!state.arrived);

        let state = tracker.skip_to_next().unwrap();
        assert!(state.arrived);
        assert_eq!(tracker.phase(), TrackerPhase::Arrived);
        assert!(tracker.skip_to_next().is_none());
    }

    #[test]
    fn test_skip_without_estimate_still_transitions() {
        let mut tracker = NavigationTracker::default();
        tracker.start(straight_route(true));
        assert!(tracker.skip_to_next().is_none());
        assert_eq!(tracker.current_index(), 2);
        tracker.skip_to_next();
        assert_eq!(tracker.phase(), TrackerPhase::Arrived);
    }

    #[test]
    fn test_relative_bearing_uses_heading() {
        let mut tracker = NavigationTracker::default();
        tracker.start(straight_route(true));
        let mut facing_east = estimate(0.0, 20.0, 3.0);
        facing_east.heading_deg = 90.0;
        let state = tracker.on_position_update(&facing_east).unwrap();
        assert!((state.relative_bearing_deg + 90.0).abs() < 1e-9);

        let mut facing_south = estimate(0.0, 20.0, 3.0);
        facing_south.heading_deg = 180.0;
        let state = tracker.on_position_update(&facing_south).unwrap();
        assert!((state.relative_bearing_deg - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_eta_from_walking_speed() {
        let mut tracker = NavigationTracker::default();
        tracker.start(straight_route(true));
        let mut walking = estimate(0.0, 20.0, 3.0);
        walking.speed_mps = 1.0;
        let state = tracker.on_position_update(&walking).unwrap();
        assert!((state.eta_s.unwrap() - 180.0).abs() < 1e-9);

        let state = tracker.on_position_update(&estimate(0.0, 20.0, 3.0)).unwrap();
        assert!(state.eta_s.is_none());
    }

    #[test]
    fn test_geodetic_route_needs_geodetic_estimate() {
        let mut tracker = NavigationTracker::default();
        tracker.start(Route::new(
            CoordinateMode::Geodetic,
            vec![Waypoint::geodetic(0.0, 0.0), Waypoint::geodetic(0.001, 0.0)],
            true,
        ));
        assert!(tracker.on_position_update(&estimate(0.0, 0.0, 3.0)).is_none());

        let mut located = estimate(0.0, 0.0, 3.0);
        located.geodetic = Some(GeoPoint::new(0.0, 0.0));
        let state = tracker.on_position_update(&located).unwrap();
        assert!((state.distance_to_next_m - 111.2).abs() < 0.5);
        assert!(state.bearing_deg.abs() < 1e-6);
    }

    #[test]
    fn test_observers_receive_transitions() {
        let mut observer = MockNavigationObserver::new();
        observer.expect_on_state().times(2).return_const(());
        observer
            .expect_on_waypoint_reached()
            .withf(|index, _| *index == 1)
            .times(1)
            .return_const(());
        observer.expect_on_arrival().times(1).return_const(());

        let mut tracker = NavigationTracker::default();
        tracker.subscribe(Arc::new(observer));
        tracker.start(straight_route(true));
        tracker.on_position_update(&estimate(0.0, 95.0, 3.0));
        tracker.on_position_update(&estimate(0.0, 198.0, 3.0));
        assert_eq!(tracker.phase(), TrackerPhase::Arrived);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut tracker = NavigationTracker::default();
        tracker.start(straight_route(true));
        tracker.stop();
        tracker.stop();
        assert_eq!(tracker.phase(), TrackerPhase::Idle);
        assert!(tracker.route().is_none());
        assert!(tracker.on_position_update(&estimate(0.0, 0.0, 3.0)).is_none());
    }
}

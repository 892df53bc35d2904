// src/navigation/route.rs
// Waypoints and routes handed to the tracker. A route comes either from the
// route planner or from an external directions provider; both produce the same
// ordered waypoint list in a single coordinate mode.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::core::geometry::{dominant_mode, CoordinateMode, Coordinates};
use crate::core::graph::LocationNode;

/// One point along a route
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub coordinates: Coordinates,
    /// Graph node this waypoint was produced from, if any
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub floor: Option<i32>,
    #[serde(default)]
    pub category: Option<String>,
}

impl Waypoint {
    pub fn planar(x: f64, y: f64) -> Self {
        Waypoint::at(Coordinates::planar(x, y))
    }

    pub fn geodetic(latitude: f64, longitude: f64) -> Self {
        Waypoint::at(Coordinates::geodetic(latitude, longitude))
    }

    pub fn at(coordinates: Coordinates) -> Self {
        Waypoint {
            coordinates,
            node_id: None,
            floor: None,
            category: None,
        }
    }
}

impl From<&LocationNode> for Waypoint {
    fn from(node: &LocationNode) -> Self {
        Waypoint {
            coordinates: node.coordinates(),
            node_id: Some(node.id.clone()),
            floor: node.floor,
            category: node.category.clone(),
        }
    }
}

/// Ordered waypoints in one coordinate mode
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    waypoints: Vec<Waypoint>,
    mode: CoordinateMode,
    starts_at_origin: bool,
    length_m: f64,
    skipped: usize,
}

impl Route {
    /// Builds a route in `mode`, dropping waypoints that lack coordinates for it.
    ///
    /// `starts_at_origin` marks routes whose first waypoint is the agent's own
    /// starting location, which is how the planner emits paths.
    pub fn new(mode: CoordinateMode, waypoints: Vec<Waypoint>, starts_at_origin: bool) -> Self {
        let total = waypoints.len();
        let waypoints: Vec<Waypoint> = waypoints
            .into_iter()
            .filter(|w| w.coordinates.supports(mode))
            .collect();
        let skipped = total - waypoints.len();
        if skipped > 0 {
            warn!("Dropped {} waypoint(s) lacking {:?} coordinates", skipped, mode);
        }

        let length_m: f64 = leg_lengths(mode, &waypoints).sum();

        Route {
            waypoints,
            mode,
            starts_at_origin,
            length_m,
            skipped,
        }
    }

    /// Builds a route from an external directions provider. The coordinate mode
    /// is whichever the waypoints cover best.
    pub fn from_waypoints(waypoints: Vec<Waypoint>) -> Self {
        let mode = dominant_mode(waypoints.iter().map(|w| &w.coordinates));
        Route::new(mode, waypoints, false)
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn waypoint(&self, index: usize) -> Option<&Waypoint> {
        self.waypoints.get(index)
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn mode(&self) -> CoordinateMode {
        self.mode
    }

    pub fn starts_at_origin(&self) -> bool {
        self.starts_at_origin
    }

    /// Total length of all legs in meters
    pub fn length_m(&self) -> f64 {
        self.length_m
    }

    /// Number of waypoints dropped as malformed
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Length of the legs after waypoint `index` up to the destination
    pub fn remaining_length_from(&self, index: usize) -> f64 {
        if index >= self.waypoints.len() {
            return 0.0;
        }
        leg_lengths(self.mode, &self.waypoints[index..]).sum()
    }
}

fn leg_lengths(mode: CoordinateMode, waypoints: &[Waypoint]) -> impl Iterator<Item = f64> + '_ {
    waypoints
        .windows(2)
        .filter_map(move |pair| mode.distance(&pair[0].coordinates, &pair[1].coordinates))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_length_and_remaining() {
        let route = Route::new(
            CoordinateMode::Planar,
            vec![
                Waypoint::planar(0.0, 0.0),
                Waypoint::planar(3.0, 0.0),
                Waypoint::planar(3.0, 4.0),
            ],
            true,
        );
        assert_eq!(route.len(), 3);
        assert!((route.length_m() - 7.0).abs() < 1e-9);
        assert!((route.remaining_length_from(1) - 4.0).abs() < 1e-9);
        assert_eq!(route.remaining_length_from(2), 0.0);
        assert_eq!(route.remaining_length_from(9), 0.0);
    }

    #[test]
    fn test_mixed_mode_waypoints_are_dropped() {
        let route = Route::from_waypoints(vec![
            Waypoint::geodetic(10.0, 10.0),
            Waypoint::planar(1.0, 1.0),
            Waypoint::geodetic(10.001, 10.0),
        ]);
        assert_eq!(route.mode(), CoordinateMode::Geodetic);
        assert_eq!(route.len(), 2);
        assert_eq!(route.skipped(), 1);
        assert!(!route.starts_at_origin());
    }
}

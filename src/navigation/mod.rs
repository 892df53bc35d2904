//! Navigation for Wayfinder
//!
//! This module turns a location graph into walkable guidance:
//! - Shortest-path planning over the graph (A* with a straight-line heuristic)
//! - Routes as ordered waypoints in a single coordinate mode
//! - Route following with adaptive waypoint advancement and arrival detection

pub mod planner;
pub mod route;
pub mod tracker;

pub use planner::{find_path, nearest_node, PlannedPath, PlannerConfig, RoutePlanner};
pub use route::{Route, Waypoint};
pub use tracker::{NavigationTracker, TrackerConfig};

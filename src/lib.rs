//! Wayfinder - pedestrian navigation core
//!
//! This library computes walking routes over a graph of known locations, fuses
//! satellite fixes with step-based dead reckoning into a position estimate, and
//! tracks the user's progress along the route, emitting guidance for a
//! presentation layer (AR overlay, audio announcements).
//!
//! The host owns all I/O: it supplies the location graph, pushes sensor samples
//! into a [`NavigationSession`] and renders the [`NavigationState`] it receives.

#![warn(unused_extern_crates)]

pub mod config;
pub mod core;
pub mod error;
pub mod interface;
pub mod navigation;

// Re-export commonly used items for easier access
pub use crate::config::WayfinderConfig;
pub use crate::core::{
    CoordinateMode, Connection, Coordinates, GeoPoint, Graph, GraphDescription, LocationNode, NavigationSession,
    NavigationState, PositionEstimate, PositionEstimator, TrackerPhase,
};
pub use crate::error::{Result, WayfinderError};
pub use crate::interface::{FixSample, MotionSample, NavigationObserver, Orientation, Subscription};
pub use crate::navigation::{NavigationTracker, Route, RoutePlanner, Waypoint};

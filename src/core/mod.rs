// core/mod.rs

// Declares the navigation core: geometry shared by every component, the location
// graph, position estimation, tracker state and the session that ties them to
// live sensor streams.

pub mod geometry;
pub mod graph;
pub mod localization;
pub mod session;
pub mod state;

// Re-export key types for a unified API
pub use geometry::{CoordinateMode, Coordinates, GeoPoint, LocalProjection, PlanarPoint};
pub use graph::{BuildReport, Connection, Graph, GraphDescription, LocationNode};
pub use localization::{EstimatorConfig, EstimatorStats, PositionEstimate, PositionEstimator, SampleOutcome};
pub use session::NavigationSession;
pub use state::{NavigationState, TrackerPhase};

//! Sensor and presentation interface for Wayfinder
//!
//! This module defines the push-stream shapes the host feeds in and the
//! observer contract the presentation layer listens on:
//! - Absolute fixes and motion samples
//! - Subscription handles with synchronous unsubscribe
//! - Navigation observers for state snapshots and waypoint transitions
//! - A simulated walk that replays samples through the same handles

mod publisher;
mod simulated;
mod subscriber;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

pub use publisher::*;
pub use simulated::*;
pub use subscriber::*;

/// Absolute position fix from satellite positioning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixSample {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Reported accuracy radius in meters
    pub accuracy_meters: f64,
    /// Sample time in milliseconds
    pub timestamp_ms: u64,
}

impl FixSample {
    pub fn new(latitude: f64, longitude: f64, accuracy_meters: f64, timestamp_ms: u64) -> Self {
        FixSample {
            latitude,
            longitude,
            accuracy_meters,
            timestamp_ms,
        }
    }
}

/// Device orientation as delivered by the platform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Orientation {
    /// Compass heading in degrees, clockwise from north
    Heading(f64),
    /// Device-to-world rotation matrix (row-major, world frame east/north/up)
    RotationMatrix(Matrix3<f64>),
}

impl Orientation {
    /// Heading in degrees [0, 360), or `None` for non-finite input
    pub fn heading_degrees(&self) -> Option<f64> {
        let raw = match self {
            Orientation::Heading(degrees) => *degrees,
            // Azimuth of the device's y axis projected on the horizontal plane
            Orientation::RotationMatrix(r) => r[(0, 1)].atan2(r[(1, 1)]).to_degrees(),
        };
        raw.is_finite()
            .then(|| crate::core::geometry::normalize_heading(raw))
    }
}

/// Relative motion sample from the inertial sensors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionSample {
    /// Linear acceleration (gravity removed) in m/s²
    pub acceleration: Vector3<f64>,
    pub orientation: Orientation,
    /// Sample time in milliseconds
    pub timestamp_ms: u64,
}

impl MotionSample {
    pub fn new(acceleration: Vector3<f64>, orientation: Orientation, timestamp_ms: u64) -> Self {
        MotionSample {
            acceleration,
            orientation,
            timestamp_ms,
        }
    }

    /// Sample carrying a plain compass heading
    pub fn with_heading(acceleration: Vector3<f64>, heading_degrees: f64, timestamp_ms: u64) -> Self {
        MotionSample::new(acceleration, Orientation::Heading(heading_degrees), timestamp_ms)
    }
}

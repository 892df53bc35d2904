// core/localization.rs

// Position estimation for a walking user. Fuses absolute fixes (weighted by their
// reported accuracy) with pedestrian dead reckoning: step detection on linear
// acceleration plus a smoothed compass heading. All fusion happens in the planar
// frame; absolute fixes are projected through a one-time anchor.

// Dependencies
use log::{debug, info, warn};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::geometry::{
    normalize_heading, shortest_angle_diff, Coordinates, GeoPoint, LocalProjection, PlanarPoint,
};
use crate::error::{Result, WayfinderError};
use crate::interface::Orientation;

/// Position estimator tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Linear acceleration magnitude that counts as a footfall (m/s²)
    #[serde(default = "default_step_threshold")]
    pub step_threshold: f64,
    /// Minimum time between two detected steps (ms)
    #[serde(default = "default_min_step_interval_ms")]
    pub min_step_interval_ms: u64,
    /// Distance advanced per detected step (m)
    #[serde(default = "default_step_length_m")]
    pub step_length_m: f64,
    /// Accuracy radius growth per dead-reckoned step (m)
    #[serde(default = "default_step_drift_m")]
    pub step_drift_m: f64,
    /// Exponential smoothing factor applied to heading readings
    #[serde(default = "default_heading_smoothing")]
    pub heading_smoothing: f64,
    /// Time constant of walking speed decay between steps (s)
    #[serde(default = "default_speed_decay_s")]
    pub speed_decay_s: f64,
    /// Upper bound on the step-derived walking speed (m/s)
    #[serde(default = "default_max_walking_speed")]
    pub max_walking_speed: f64,
    /// Fixes at or below this accuracy get the high weight (m)
    #[serde(default = "default_high_accuracy_m")]
    pub high_accuracy_m: f64,
    /// Fixes at or below this accuracy get the medium weight; worse fixes are ignored (m)
    #[serde(default = "default_medium_accuracy_m")]
    pub medium_accuracy_m: f64,
    #[serde(default = "default_high_accuracy_weight")]
    pub high_accuracy_weight: f64,
    #[serde(default = "default_medium_accuracy_weight")]
    pub medium_accuracy_weight: f64,
    /// Accuracy assigned by an explicit anchor call (m)
    #[serde(default = "default_anchor_accuracy_m")]
    pub anchor_accuracy_m: f64,
    /// Age after which an estimate is flagged stale (ms)
    #[serde(default = "default_freshness_ms")]
    pub freshness_ms: u64,
}

fn default_step_threshold() -> f64 {
    1.5
}
fn default_min_step_interval_ms() -> u64 {
    300
}
fn default_step_length_m() -> f64 {
    0.7
}
fn default_step_drift_m() -> f64 {
    0.1
}
fn default_heading_smoothing() -> f64 {
    0.15
}
fn default_speed_decay_s() -> f64 {
    1.0
}
fn default_max_walking_speed() -> f64 {
    3.0
}
fn default_high_accuracy_m() -> f64 {
    5.0
}
fn default_medium_accuracy_m() -> f64 {
    15.0
}
fn default_high_accuracy_weight() -> f64 {
    0.8
}
fn default_medium_accuracy_weight() -> f64 {
    0.5
}
fn default_anchor_accuracy_m() -> f64 {
    1.0
}
fn default_freshness_ms() -> u64 {
    5000
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        EstimatorConfig {
            step_threshold: default_step_threshold(),
            min_step_interval_ms: default_min_step_interval_ms(),
            step_length_m: default_step_length_m(),
            step_drift_m: default_step_drift_m(),
            heading_smoothing: default_heading_smoothing(),
            speed_decay_s: default_speed_decay_s(),
            max_walking_speed: default_max_walking_speed(),
            high_accuracy_m: default_high_accuracy_m(),
            medium_accuracy_m: default_medium_accuracy_m(),
            high_accuracy_weight: default_high_accuracy_weight(),
            medium_accuracy_weight: default_medium_accuracy_weight(),
            anchor_accuracy_m: default_anchor_accuracy_m(),
            freshness_ms: default_freshness_ms(),
        }
    }
}

/// Snapshot of the best position estimate
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PositionEstimate {
    /// Planar position in meters
    pub planar: PlanarPoint,
    /// Absolute position derived through the anchor
    pub geodetic: Option<GeoPoint>,
    /// Accuracy radius in meters (lower is better)
    pub accuracy_m: f64,
    /// Smoothed heading in degrees, clockwise from north
    pub heading_deg: f64,
    /// Walking speed in m/s
    pub speed_mps: f64,
    /// Time of the newest input folded into this estimate (ms)
    pub timestamp_ms: u64,
    /// No anchor, fix or step has refreshed the position within the freshness window
    pub stale: bool,
}

impl PositionEstimate {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            planar: Some(self.planar),
            geodetic: self.geodetic,
        }
    }
}

/// What the estimator did with one input sample
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleOutcome {
    /// The sample changed the estimate
    Applied,
    /// Accepted but carried no usable information (e.g. a poor-accuracy fix)
    Ignored,
    /// Rejected as out of order or malformed
    Dropped,
}

impl SampleOutcome {
    pub fn accepted(self) -> bool {
        self != SampleOutcome::Dropped
    }
}

/// Diagnostic counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EstimatorStats {
    pub fixes_applied: u64,
    pub fixes_ignored: u64,
    pub steps: u64,
    pub out_of_order: u64,
    pub malformed: u64,
}

/// Fuses absolute fixes with pedestrian dead reckoning
#[derive(Debug, Clone)]
pub struct PositionEstimator {
    config: EstimatorConfig,
    projection: Option<LocalProjection>,
    position: PlanarPoint,
    accuracy_m: f64,
    heading_deg: Option<f64>,
    speed_mps: f64,
    last_fix_ms: Option<u64>,
    last_motion_ms: Option<u64>,
    last_step_ms: Option<u64>,
    last_position_ms: Option<u64>,
    latest_input_ms: Option<u64>,
    stats: EstimatorStats,
}

impl PositionEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        PositionEstimator {
            config,
            projection: None,
            position: PlanarPoint::zeros(),
            accuracy_m: f64::INFINITY,
            heading_deg: None,
            speed_mps: 0.0,
            last_fix_ms: None,
            last_motion_ms: None,
            last_step_ms: None,
            last_position_ms: None,
            latest_input_ms: None,
            stats: EstimatorStats::default(),
        }
    }

    /// Pins `latitude`/`longitude` to the planar point (`planar_x`, `planar_y`),
    /// e.g. when a marker at a known map position is scanned. The estimate jumps
    /// to the anchor.
    pub fn anchor(&mut self, latitude: f64, longitude: f64, planar_x: f64, planar_y: f64) -> Result<()> {
        let geo = GeoPoint::new(latitude, longitude);
        if !geo.is_valid() || !planar_x.is_finite() || !planar_y.is_finite() {
            return Err(WayfinderError::InvalidInput(format!(
                "anchor ({}, {}) -> ({}, {})",
                latitude, longitude, planar_x, planar_y
            )));
        }

        let planar = PlanarPoint::new(planar_x, planar_y);
        self.projection = Some(LocalProjection::new(geo, planar));
        self.position = planar;
        self.accuracy_m = self.config.anchor_accuracy_m;
        // Freshness counts from the next input when nothing has arrived yet
        self.last_position_ms = self.latest_input_ms;

        info!(
            "Anchored ({:.6}, {:.6}) at planar ({:.2}, {:.2})",
            latitude, longitude, planar_x, planar_y
        );
        Ok(())
    }

    pub fn is_calibrated(&self) -> bool {
        self.projection.is_some()
    }

    /// Folds an absolute fix into the estimate.
    ///
    /// The first fix received while uncalibrated anchors the planar frame at the
    /// current planar position. Later fixes are blended with a weight chosen by
    /// their accuracy; fixes worse than `medium_accuracy_m` are ignored.
    pub fn ingest_fix(&mut self, latitude: f64, longitude: f64, accuracy_m: f64, timestamp_ms: u64) -> SampleOutcome {
        let geo = GeoPoint::new(latitude, longitude);
        if !geo.is_valid() || !accuracy_m.is_finite() || accuracy_m < 0.0 {
            debug!("Dropping malformed fix ({}, {}) ±{}", latitude, longitude, accuracy_m);
            self.stats.malformed += 1;
            return SampleOutcome::Dropped;
        }
        if self.last_fix_ms.is_some_and(|last| timestamp_ms < last) {
            warn!(
                "Dropping out-of-order fix at {} ms (last {} ms)",
                timestamp_ms,
                self.last_fix_ms.unwrap_or_default()
            );
            self.stats.out_of_order += 1;
            return SampleOutcome::Dropped;
        }
        if self.revises_past_position(timestamp_ms) {
            warn!(
                "Dropping fix at {} ms: position already updated at {} ms",
                timestamp_ms,
                self.last_position_ms.unwrap_or_default()
            );
            self.stats.out_of_order += 1;
            return SampleOutcome::Dropped;
        }
        self.last_fix_ms = Some(timestamp_ms);
        self.note_input(timestamp_ms);

        let Some(projection) = self.projection else {
            self.projection = Some(LocalProjection::new(geo, self.position));
            self.accuracy_m = accuracy_m;
            self.mark_position(timestamp_ms);
            self.stats.fixes_applied += 1;
            info!(
                "Calibrated from first fix ({:.6}, {:.6}) ±{:.1} m",
                latitude, longitude, accuracy_m
            );
            return SampleOutcome::Applied;
        };

        let weight = self.fusion_weight(accuracy_m);
        if weight <= 0.0 {
            debug!("Ignoring fix with accuracy {:.1} m", accuracy_m);
            self.stats.fixes_ignored += 1;
            return SampleOutcome::Ignored;
        }

        let measured = projection.to_planar(geo);
        self.position = self.position * (1.0 - weight) + measured * weight;
        self.accuracy_m = self.accuracy_m * (1.0 - weight) + accuracy_m * weight;
        self.mark_position(timestamp_ms);
        self.stats.fixes_applied += 1;
        debug!(
            "Blended fix w={:.2}: position ({:.2}, {:.2}) ±{:.1} m",
            weight, self.position.x, self.position.y, self.accuracy_m
        );
        SampleOutcome::Applied
    }

    /// Folds a motion sample into the heading and dead-reckoning state
    pub fn ingest_motion(&mut self, acceleration: Vector3<f64>, orientation: Orientation, timestamp_ms: u64) -> SampleOutcome {
        let Some(raw_heading) = orientation.heading_degrees() else {
            self.stats.malformed += 1;
            return SampleOutcome::Dropped;
        };
        if !acceleration.iter().all(|a| a.is_finite()) {
            self.stats.malformed += 1;
            return SampleOutcome::Dropped;
        }
        if self.last_motion_ms.is_some_and(|last| timestamp_ms < last) {
            warn!(
                "Dropping out-of-order motion sample at {} ms (last {} ms)",
                timestamp_ms,
                self.last_motion_ms.unwrap_or_default()
            );
            self.stats.out_of_order += 1;
            return SampleOutcome::Dropped;
        }

        let dt_s = self
            .last_motion_ms
            .map(|last| (timestamp_ms - last) as f64 / 1000.0)
            .unwrap_or(0.0);
        self.last_motion_ms = Some(timestamp_ms);
        self.note_input(timestamp_ms);

        self.heading_deg = Some(match self.heading_deg {
            None => raw_heading,
            Some(previous) => normalize_heading(
                previous + self.config.heading_smoothing * shortest_angle_diff(previous, raw_heading),
            ),
        });

        if self.config.speed_decay_s > 0.0 {
            self.speed_mps *= (-dt_s / self.config.speed_decay_s).exp();
        }

        if self.detect_step(acceleration.norm(), timestamp_ms) {
            // Heading still counts, but a late step must not move the position
            if self.revises_past_position(timestamp_ms) {
                debug!("Ignoring step at {} ms behind the latest position update", timestamp_ms);
                self.stats.out_of_order += 1;
            } else {
                self.advance_step(timestamp_ms);
            }
        }

        SampleOutcome::Applied
    }

    /// Latest estimate, with staleness judged against the newest input seen
    pub fn current_estimate(&self) -> Result<PositionEstimate> {
        self.estimate_at(self.latest_input_ms.unwrap_or(0))
    }

    /// Latest estimate, with staleness judged against a host clock reading
    pub fn estimate_at(&self, now_ms: u64) -> Result<PositionEstimate> {
        let projection = self.projection.ok_or(WayfinderError::Uncalibrated)?;
        Ok(PositionEstimate {
            planar: self.position,
            geodetic: Some(projection.to_geo(&self.position)),
            accuracy_m: self.accuracy_m,
            heading_deg: self.heading_deg.unwrap_or(0.0),
            speed_mps: self.speed_mps,
            timestamp_ms: self.latest_input_ms.unwrap_or(0),
            stale: self.is_stale(now_ms),
        })
    }

    /// Absolute position of the estimate; fails until an anchor exists
    pub fn geodetic_estimate(&self) -> Result<GeoPoint> {
        let projection = self.projection.ok_or(WayfinderError::Uncalibrated)?;
        Ok(projection.to_geo(&self.position))
    }

    /// Blend weight for a fix with the given accuracy radius
    pub fn fusion_weight(&self, accuracy_m: f64) -> f64 {
        if accuracy_m <= self.config.high_accuracy_m {
            self.config.high_accuracy_weight
        } else if accuracy_m <= self.config.medium_accuracy_m {
            self.config.medium_accuracy_weight
        } else {
            0.0
        }
    }

    pub fn stats(&self) -> EstimatorStats {
        self.stats
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    fn is_stale(&self, now_ms: u64) -> bool {
        self.last_position_ms
            .is_some_and(|t| now_ms.saturating_sub(t) > self.config.freshness_ms)
    }

    fn revises_past_position(&self, timestamp_ms: u64) -> bool {
        self.last_position_ms.is_some_and(|last| timestamp_ms < last)
    }

    fn note_input(&mut self, timestamp_ms: u64) {
        self.latest_input_ms = Some(self.latest_input_ms.map_or(timestamp_ms, |t| t.max(timestamp_ms)));
        if self.projection.is_some() && self.last_position_ms.is_none() {
            self.last_position_ms = Some(timestamp_ms);
        }
    }

    fn mark_position(&mut self, timestamp_ms: u64) {
        self.last_position_ms = Some(self.last_position_ms.map_or(timestamp_ms, |t| t.max(timestamp_ms)));
    }

    fn detect_step(&self, magnitude: f64, timestamp_ms: u64) -> bool {
        magnitude > self.config.step_threshold
            && self
                .last_step_ms
                .is_none_or(|last| timestamp_ms.saturating_sub(last) >= self.config.min_step_interval_ms)
    }

    fn advance_step(&mut self, timestamp_ms: u64) {
        if let Some(last) = self.last_step_ms {
            let interval_s = (timestamp_ms - last) as f64 / 1000.0;
            if interval_s > 0.0 {
                self.speed_mps = (self.config.step_length_m / interval_s).min(self.config.max_walking_speed);
            }
        }
        self.last_step_ms = Some(timestamp_ms);
        self.stats.steps += 1;

        // Without an anchor there is no frame to move in
        if self.projection.is_none() {
            return;
        }

        let heading = self.heading_deg.unwrap_or(0.0).to_radians();
        let step = PlanarPoint::new(heading.sin(), heading.cos()) * self.config.step_length_m;
        self.position += step;
        self.accuracy_m += self.config.step_drift_m;
        self.mark_position(timestamp_ms);
        debug!(
            "Step at {} ms: position ({:.2}, {:.2}) heading {:.1}°",
            timestamp_ms,
            self.position.x,
            self.position.y,
            self.heading_deg.unwrap_or(0.0)
        );
    }
}

impl Default for PositionEstimator {
    fn default() -> Self {
        PositionEstimator::new(EstimatorConfig::default())
    }
}

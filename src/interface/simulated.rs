// src/interface/simulated.rs
// Simulated walk along a planar polyline. Generates the fix and motion streams a
// phone would produce for a user walking the path at constant speed, and replays
// them through ordinary subscription handles. Used by the demo binary and tests
// in place of real sensors.

use log::debug;
use nalgebra::Vector3;

use super::{FixSample, MotionSample, Subscription};
use crate::core::geometry::{planar_bearing, planar_distance, LocalProjection, PlanarPoint};

/// Vertical acceleration reported at each footfall (m/s²)
const FOOTFALL_ACCELERATION: f64 = 2.5;

/// One generated sensor sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimulatedSample {
    Fix(FixSample),
    Motion(MotionSample),
}

impl SimulatedSample {
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            SimulatedSample::Fix(fix) => fix.timestamp_ms,
            SimulatedSample::Motion(motion) => motion.timestamp_ms,
        }
    }
}

/// Constant-speed walk along a polyline
#[derive(Debug, Clone)]
pub struct SimulatedWalk {
    projection: LocalProjection,
    path: Vec<PlanarPoint>,
    speed_mps: f64,
    step_length_m: f64,
    fix_interval_ms: u64,
    fix_accuracy_m: f64,
    start_ms: u64,
}

impl SimulatedWalk {
    /// Walk through `path` (planar meters), with fixes expressed through `projection`
    pub fn new(projection: LocalProjection, path: Vec<PlanarPoint>) -> Self {
        SimulatedWalk {
            projection,
            path,
            speed_mps: 1.4,
            step_length_m: 0.7,
            fix_interval_ms: 1000,
            fix_accuracy_m: 3.0,
            start_ms: 0,
        }
    }

    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = speed_mps;
        self
    }

    pub fn with_step_length(mut self, step_length_m: f64) -> Self {
        self.step_length_m = step_length_m;
        self
    }

    pub fn with_fix_interval(mut self, fix_interval_ms: u64) -> Self {
        self.fix_interval_ms = fix_interval_ms;
        self
    }

    pub fn with_fix_accuracy(mut self, accuracy_m: f64) -> Self {
        self.fix_accuracy_m = accuracy_m;
        self
    }

    pub fn starting_at(mut self, start_ms: u64) -> Self {
        self.start_ms = start_ms;
        self
    }

    pub fn length_m(&self) -> f64 {
        self.path.windows(2).map(|leg| planar_distance(&leg[0], &leg[1])).sum()
    }

    pub fn duration_ms(&self) -> u64 {
        if self.speed_mps <= 0.0 {
            return 0;
        }
        (self.length_m() / self.speed_mps * 1000.0).round() as u64
    }

    /// Position and walking direction after `distance_m` along the path
    pub fn position_along(&self, distance_m: f64) -> Option<(PlanarPoint, f64)> {
        let first = *self.path.first()?;
        let mut remaining = distance_m.max(0.0);
        let mut heading = 0.0;
        for leg in self.path.windows(2) {
            let length = planar_distance(&leg[0], &leg[1]);
            if length <= 0.0 {
                continue;
            }
            heading = planar_bearing(&leg[0], &leg[1]);
            if remaining <= length {
                return Some((leg[0] + (leg[1] - leg[0]) * (remaining / length), heading));
            }
            remaining -= length;
        }
        Some((*self.path.last().unwrap_or(&first), heading))
    }

    /// Fixes at the configured cadence, including one at the end of the walk
    pub fn fixes(&self) -> Vec<FixSample> {
        let duration = self.duration_ms();
        let interval = self.fix_interval_ms.max(1);
        let mut times: Vec<u64> = (0..=duration / interval).map(|i| i * interval).collect();
        if times.last() != Some(&duration) {
            times.push(duration);
        }

        times
            .into_iter()
            .filter_map(|t| {
                let (position, _) = self.position_along(self.distance_at(t))?;
                let geo = self.projection.to_geo(&position);
                Some(FixSample::new(
                    geo.latitude,
                    geo.longitude,
                    self.fix_accuracy_m,
                    self.start_ms + t,
                ))
            })
            .collect()
    }

    /// One footfall sample per step, each followed by a quiet sample mid-stride
    pub fn motion(&self) -> Vec<MotionSample> {
        if self.speed_mps <= 0.0 || self.step_length_m <= 0.0 || self.path.len() < 2 {
            return Vec::new();
        }
        let stride_ms = (self.step_length_m / self.speed_mps * 1000.0).round().max(1.0) as u64;
        let steps = (self.length_m() / self.step_length_m).floor() as u64;

        let mut samples = Vec::with_capacity(steps as usize * 2);
        for step in 1..=steps {
            let t = step * stride_ms;
            // Heading of the stride that this footfall completes
            let Some((_, heading)) = self.position_along((step as f64 - 0.5) * self.step_length_m) else {
                continue;
            };
            samples.push(MotionSample::with_heading(
                Vector3::new(0.0, 0.0, FOOTFALL_ACCELERATION),
                heading,
                self.start_ms + t - stride_ms / 2,
            ));
            samples.push(MotionSample::with_heading(Vector3::zeros(), heading, self.start_ms + t));
        }
        samples
    }

    /// Both streams merged in time order; fixes go first on equal timestamps
    pub fn samples(&self) -> Vec<SimulatedSample> {
        let mut samples: Vec<SimulatedSample> = self
            .fixes()
            .into_iter()
            .map(SimulatedSample::Fix)
            .chain(self.motion().into_iter().map(SimulatedSample::Motion))
            .collect();
        samples.sort_by_key(|s| (s.timestamp_ms(), matches!(s, SimulatedSample::Motion(_))));
        samples
    }

    /// Pushes every sample through the given handles. Returns the number of
    /// samples delivered; replay stops early once a handle is unsubscribed.
    pub fn replay(&self, fixes: &Subscription<FixSample>, motion: &Subscription<MotionSample>) -> usize {
        let mut delivered = 0;
        for sample in self.samples() {
            let accepted = match sample {
                SimulatedSample::Fix(fix) => fixes.push(fix),
                SimulatedSample::Motion(m) => motion.push(m),
            };
            if !accepted {
                debug!("Replay stopped after {} samples: subscription closed", delivered);
                break;
            }
            delivered += 1;
        }
        delivered
    }

    fn distance_at(&self, elapsed_ms: u64) -> f64 {
        self.speed_mps * elapsed_ms as f64 / 1000.0
    }
}

//! Configuration loading for Wayfinder

use crate::core::localization::EstimatorConfig;
use crate::error::{Result, WayfinderError};
use crate::navigation::{PlannerConfig, TrackerConfig};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Main configuration structure. Every section and field is optional in YAML.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WayfinderConfig {
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub estimator: EstimatorConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
}

impl WayfinderConfig {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let config: WayfinderConfig = serde_yaml::from_reader(reader)?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: WayfinderConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the estimator and tracker cannot work with
    pub fn validate(&self) -> Result<()> {
        let e = &self.estimator;
        let t = &self.tracker;

        for (name, weight) in [
            ("estimator.high_accuracy_weight", e.high_accuracy_weight),
            ("estimator.medium_accuracy_weight", e.medium_accuracy_weight),
            ("estimator.heading_smoothing", e.heading_smoothing),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(WayfinderError::Config(format!("{} must lie in [0, 1], got {}", name, weight)));
            }
        }

        for (name, value) in [
            ("estimator.step_threshold", e.step_threshold),
            ("estimator.step_length_m", e.step_length_m),
            ("estimator.step_drift_m", e.step_drift_m),
            ("estimator.speed_decay_s", e.speed_decay_s),
            ("estimator.anchor_accuracy_m", e.anchor_accuracy_m),
            ("tracker.min_advance_radius_m", t.min_advance_radius_m),
            ("tracker.accuracy_margin_m", t.accuracy_margin_m),
            ("tracker.arrival_radius_m", t.arrival_radius_m),
            ("tracker.approach_radius_m", t.approach_radius_m),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(WayfinderError::Config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        if e.high_accuracy_m > e.medium_accuracy_m {
            return Err(WayfinderError::Config(format!(
                "estimator.high_accuracy_m ({}) exceeds medium_accuracy_m ({})",
                e.high_accuracy_m, e.medium_accuracy_m
            )));
        }
        if t.arrival_radius_m > t.approach_radius_m {
            return Err(WayfinderError::Config(format!(
                "tracker.arrival_radius_m ({}) exceeds approach_radius_m ({})",
                t.arrival_radius_m, t.approach_radius_m
            )));
        }
        Ok(())
    }
}

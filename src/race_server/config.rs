//! Config - Meet layout and engine tuning
//!
//! Defaults reproduce the stock six-round meet. Any field may be omitted
//! from a JSON config file and falls back to its default.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::race_server::error::{MeetError, Result};

/// Speed model constants for the race engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineTuning {
    /// Seconds an average horse needs for the reference distance
    pub reference_duration_secs: f64,
    /// Reference distance in meters
    pub reference_distance: f64,
    /// Midpoint of the condition scale
    pub average_condition: f64,
    /// Speed gained per condition point, relative to the base
    pub condition_factor: f64,
    /// Frames between variance refreshes
    pub variance_interval_frames: u64,
    /// Full width of the variance draw as a fraction of base speed
    pub variance_spread: f64,
    /// Weight kept from the previous variance on refresh
    pub variance_smoothing: f64,
    /// Floor on effective speed as a fraction of base speed
    pub min_speed_ratio: f64,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            reference_duration_secs: 8.0,
            reference_distance: 1200.0,
            average_condition: 50.0,
            condition_factor: 0.15,
            variance_interval_frames: 15,
            variance_spread: 0.3,
            variance_smoothing: 0.6,
            min_speed_ratio: 0.3,
        }
    }
}

impl EngineTuning {
    /// Seconds an average horse should take over `distance`
    pub fn target_duration(&self, distance: f64) -> f64 {
        self.reference_duration_secs * (distance / self.reference_distance)
    }

    /// Base speed (m/s) for a horse of the given condition over `distance`.
    ///
    /// Monotonically increasing in `condition`; a horse at the average
    /// condition covers `distance` in exactly [`Self::target_duration`].
    pub fn base_speed(&self, distance: f64, condition: u32) -> f64 {
        let average_speed = distance / self.target_duration(distance);
        let average_base = average_speed / (1.0 + self.average_condition * self.condition_factor);
        average_base * (1.0 + f64::from(condition) * self.condition_factor)
    }

    /// Check the values the engine relies on; a zero variance interval is
    /// treated as every frame by the engine but rejected here
    pub fn validate(&self) -> Result<()> {
        if !(self.reference_duration_secs > 0.0) || !(self.reference_distance > 0.0) {
            return Err(MeetError::config(
                "reference duration and distance must be positive",
            ));
        }
        if !(self.condition_factor > 0.0) {
            return Err(MeetError::config("condition_factor must be positive"));
        }
        if self.variance_interval_frames == 0 {
            return Err(MeetError::config("variance_interval_frames must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.variance_smoothing) {
            return Err(MeetError::config("variance_smoothing must be within 0..=1"));
        }
        if !(self.min_speed_ratio > 0.0) || !(self.variance_spread >= 0.0) {
            return Err(MeetError::config(
                "min_speed_ratio must be positive and variance_spread non-negative",
            ));
        }
        Ok(())
    }
}

/// Meet layout: how many rounds, how many horses per round, how far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeetConfig {
    /// Number of rounds in the meet
    pub total_rounds: usize,
    /// Horses drawn into each round
    pub roster_size: usize,
    /// Distance in meters for each round, by position
    pub round_distances: Vec<f64>,
    /// Pause between a round finishing and the next one starting
    pub auto_advance_delay_ms: u64,
    /// Master seed; fresh entropy when absent
    pub seed: Option<u64>,
    pub engine: EngineTuning,
}

impl Default for MeetConfig {
    fn default() -> Self {
        Self {
            total_rounds: 6,
            roster_size: 10,
            round_distances: vec![1200.0, 1400.0, 1600.0, 1800.0, 2000.0, 2200.0],
            auto_advance_delay_ms: 3000,
            seed: None,
            engine: EngineTuning::default(),
        }
    }
}

impl MeetConfig {
    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Distance configured for a 1-based round number
    pub fn distance_for_round(&self, round_number: usize) -> Option<f64> {
        round_number
            .checked_sub(1)
            .and_then(|i| self.round_distances.get(i))
            .copied()
    }

    /// Check every value the scheduler and engine rely on
    pub fn validate(&self) -> Result<()> {
        if self.total_rounds == 0 {
            return Err(MeetError::config("total_rounds must be at least 1"));
        }
        if self.roster_size == 0 {
            return Err(MeetError::config("roster_size must be at least 1"));
        }
        if let Some(bad) = self.round_distances.iter().find(|d| !(**d > 0.0)) {
            return Err(MeetError::config(format!(
                "round distances must be positive, found {bad}"
            )));
        }
        self.engine.validate()
    }
}

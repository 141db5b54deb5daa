//! Horse - Competitor records and per-round run state
//!
//! A `Horse` is the immutable record supplied by the caller. A `HorseState`
//! is created for each horse when a round is initialized and advanced by the
//! engine every frame.

use std::collections::HashSet;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::race_server::config::EngineTuning;
use crate::race_server::error::{MeetError, Result};

/// Immutable competitor record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Horse {
    /// Unique horse ID
    pub id: u32,
    pub name: String,
    /// Display color, e.g. `#C0392B`
    pub color: String,
    /// Form rating in 0..=100
    pub condition: u32,
}

impl Horse {
    /// Create a horse record
    pub fn new(id: u32, name: impl Into<String>, color: impl Into<String>, condition: u32) -> Self {
        Self {
            id,
            name: name.into(),
            color: color.into(),
            condition,
        }
    }
}

const STABLE: [(&str, &str); 20] = [
    ("Thunder Bolt", "#C0392B"),
    ("Silver Arrow", "#BDC3C7"),
    ("Midnight Star", "#2C3E50"),
    ("Golden Gale", "#F1C40F"),
    ("Red Comet", "#E74C3C"),
    ("Blue Thunder", "#2980B9"),
    ("Wild Spirit", "#8E44AD"),
    ("Desert Wind", "#D35400"),
    ("Storm Chaser", "#34495E"),
    ("Emerald Dream", "#27AE60"),
    ("Shadow Dancer", "#7F8C8D"),
    ("Iron Hoof", "#95A5A6"),
    ("Lucky Clover", "#2ECC71"),
    ("Crimson Tide", "#922B21"),
    ("Night Fury", "#17202A"),
    ("Sunset Blaze", "#E67E22"),
    ("Ocean Breeze", "#1ABC9C"),
    ("Royal Flush", "#6C3483"),
    ("Morning Glory", "#F5B7B1"),
    ("Black Pearl", "#000000"),
];

/// The stock twenty-horse stable with a fresh condition roll (1..=100) each
pub fn default_pool<R: Rng + ?Sized>(rng: &mut R) -> Vec<Horse> {
    STABLE
        .iter()
        .enumerate()
        .map(|(i, (name, color))| Horse::new(i as u32 + 1, *name, *color, rng.gen_range(1..=100)))
        .collect()
}

/// Parse a pool from a JSON array of horse records
pub fn load_pool_from_json(json: &str) -> Result<Vec<Horse>> {
    let pool: Vec<Horse> = serde_json::from_str(json)?;
    validate_pool(&pool)?;
    Ok(pool)
}

/// Read and parse a pool file
pub fn load_pool_from_path(path: impl AsRef<Path>) -> Result<Vec<Horse>> {
    let json = std::fs::read_to_string(path)?;
    load_pool_from_json(&json)
}

/// Ids must be unique and conditions within 0..=100
pub fn validate_pool(pool: &[Horse]) -> Result<()> {
    let mut seen = HashSet::with_capacity(pool.len());
    for horse in pool {
        if !seen.insert(horse.id) {
            return Err(MeetError::DuplicateHorse(horse.id));
        }
        if horse.condition > 100 {
            return Err(MeetError::ConditionOutOfRange {
                id: horse.id,
                condition: horse.condition,
            });
        }
    }
    Ok(())
}

/// Run state for a single horse during one round
#[derive(Debug, Clone, Serialize)]
pub struct HorseState {
    pub horse: Horse,
    /// Meters covered since the start
    pub distance_covered: f64,
    /// Deterministic speed (m/s) from condition
    pub base_speed: f64,
    /// Smoothed random offset applied on top of base speed
    pub speed_variance: f64,
    pub finished: bool,
    /// Race clock (seconds) when the line was crossed
    pub finish_time: f64,
}

impl HorseState {
    /// Fresh state at the start line, base speed calibrated for `race_distance`
    pub fn new(horse: Horse, race_distance: f64, tuning: &EngineTuning) -> Self {
        let base_speed = tuning.base_speed(race_distance, horse.condition);
        Self {
            horse,
            distance_covered: 0.0,
            base_speed,
            speed_variance: 0.0,
            finished: false,
            finish_time: 0.0,
        }
    }

    /// Blend a fresh draw into the variance term
    pub fn refresh_variance<R: Rng + ?Sized>(&mut self, rng: &mut R, tuning: &EngineTuning) {
        let draw = (rng.gen::<f64>() - 0.5) * tuning.variance_spread * self.base_speed;
        self.speed_variance = self.speed_variance * tuning.variance_smoothing
            + draw * (1.0 - tuning.variance_smoothing);
    }

    /// Base speed plus variance, floored so a horse never stalls or backs up
    pub fn effective_speed(&self, tuning: &EngineTuning) -> f64 {
        (self.base_speed + self.speed_variance).max(self.base_speed * tuning.min_speed_ratio)
    }

    /// Move forward by `delta` seconds. Returns true if the horse crossed the
    /// line during this step.
    pub fn advance(&mut self, delta: f64, race_distance: f64, race_clock: f64, tuning: &EngineTuning) -> bool {
        if self.finished {
            return false;
        }

        self.distance_covered += self.effective_speed(tuning) * delta;

        if self.distance_covered >= race_distance {
            self.distance_covered = race_distance;
            self.finished = true;
            self.finish_time = race_clock;
            return true;
        }
        false
    }

    /// Progress as a percentage of the race distance, capped at 100
    pub fn progress(&self, race_distance: f64) -> f64 {
        (self.distance_covered / race_distance).min(1.0) * 100.0
    }
}

/// Compact horse state for consumers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorseSnapshot {
    pub id: u32,
    pub distance: f64,
    pub speed: f64,
    pub finished: bool,
}

impl HorseSnapshot {
    /// Build a snapshot from live run state
    pub fn from_state(state: &HorseState, tuning: &EngineTuning) -> Self {
        Self {
            id: state.horse.id,
            distance: state.distance_covered,
            speed: if state.finished { 0.0 } else { state.effective_speed(tuning) },
            finished: state.finished,
        }
    }
}

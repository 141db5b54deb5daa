//! Schedule - Per-round roster draws
//!
//! Every round reshuffles the whole pool and takes the first `roster_size`
//! horses, so a horse can race in several rounds but never twice in one.

use log::info;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::race_server::config::MeetConfig;
use crate::race_server::horse::Horse;

/// One round of the meet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundPlan {
    /// 1-based round number
    pub round: usize,
    /// Distance in meters
    pub distance: f64,
    pub horses: Vec<Horse>,
}

/// Uniform Fisher-Yates shuffle of a copy of `items`
pub fn shuffled<T: Clone, R: Rng + ?Sized>(items: &[T], rng: &mut R) -> Vec<T> {
    let mut out = items.to_vec();
    out.shuffle(rng);
    out
}

/// Build the full meet plan from `pool`.
///
/// Rounds without a configured distance are skipped. The pool must hold at
/// least `roster_size` horses for every roster to be full.
pub fn generate_schedule<R: Rng + ?Sized>(pool: &[Horse], config: &MeetConfig, rng: &mut R) -> Vec<RoundPlan> {
    let mut rounds = Vec::with_capacity(config.total_rounds);

    for round in 1..=config.total_rounds {
        let mut horses = shuffled(pool, rng);
        horses.truncate(config.roster_size);

        let Some(distance) = config.distance_for_round(round) else {
            continue;
        };

        rounds.push(RoundPlan {
            round,
            distance,
            horses,
        });
    }

    info!(
        "Generated schedule: {} rounds of {} from a pool of {}",
        rounds.len(),
        config.roster_size,
        pool.len()
    );
    rounds
}

//! Meet - Multi-round orchestration
//!
//! Owns the schedule, the engine for the round in progress, and the results
//! of every completed round. Engine events are queued and applied on
//! [`Meet::pump`], which also fires the auto-advance to the next round once
//! its delay has passed.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::race_server::config::MeetConfig;
use crate::race_server::error::{MeetError, Result};
use crate::race_server::frames::{FrameScheduler, SteppedFrames};
use crate::race_server::horse::{validate_pool, Horse};
use crate::race_server::race::{EngineSnapshot, EngineState, FinishRecord, Positions, RaceEngine, RaceEvent};
use crate::race_server::schedule::{generate_schedule, RoundPlan};

/// Meet status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeetStatus {
    Idle,
    Ready,
    Racing,
    Paused,
    RoundComplete,
    Finished,
}

/// A horse's placing in a completed round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placing {
    pub horse: Horse,
    /// Seconds of race clock
    pub finish_time: f64,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    pub round: usize,
    pub distance: f64,
    pub results: Vec<Placing>,
}

/// Serializable view of the meet for consumers
#[derive(Debug, Clone, Serialize)]
pub struct MeetSnapshot {
    pub status: MeetStatus,
    pub current_round: usize,
    pub total_rounds: usize,
    pub positions: Positions,
    pub race: Option<EngineSnapshot>,
}

pub struct Meet {
    config: MeetConfig,
    pool: Vec<Horse>,
    schedule: Vec<RoundPlan>,
    status: MeetStatus,
    /// 1-based; 0 before the first round starts
    current_round: usize,
    engine: Option<RaceEngine>,
    events: Rc<RefCell<VecDeque<RaceEvent>>>,
    positions: Positions,
    results: Vec<RoundResult>,
    /// When the next round auto-starts, if a round has just finished
    advance_at: Option<Duration>,
    frames: Rc<dyn FrameScheduler>,
    rng: ChaCha8Rng,
}

impl Meet {
    /// Validate `config` against `pool` and build an idle meet
    pub fn new(config: MeetConfig, pool: Vec<Horse>, frames: Rc<dyn FrameScheduler>) -> Result<Self> {
        config.validate()?;
        validate_pool(&pool)?;
        if pool.len() < config.roster_size {
            return Err(MeetError::PoolTooSmall {
                required: config.roster_size,
                available: pool.len(),
            });
        }

        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Ok(Self {
            config,
            pool,
            schedule: Vec::new(),
            status: MeetStatus::Idle,
            current_round: 0,
            engine: None,
            events: Rc::new(RefCell::new(VecDeque::new())),
            positions: Positions::new(),
            results: Vec::new(),
            advance_at: None,
            frames,
            rng,
        })
    }

    /// Draw a fresh schedule, discarding any meet in progress and its results
    pub fn generate_schedule(&mut self) {
        self.reset();
        self.results.clear();
        self.schedule = generate_schedule(&self.pool, &self.config, &mut self.rng);
        self.status = MeetStatus::Ready;
    }

    /// Start the current round, or round 1 if none has started yet
    pub fn start_race(&mut self) {
        if self.schedule.is_empty() {
            warn!("start_race called without a schedule");
            return;
        }
        if self.current_round == 0 {
            self.current_round = 1;
        }
        let Some(plan) = self.schedule.get(self.current_round - 1).cloned() else {
            return;
        };

        if let Some(previous) = self.engine.take() {
            previous.reset();
        }
        self.positions.clear();
        self.events.borrow_mut().clear();
        self.advance_at = None;

        let engine = RaceEngine::seeded(
            plan.horses,
            plan.distance,
            Rc::clone(&self.frames),
            self.config.engine.clone(),
            self.rng.gen(),
        );
        let queue = Rc::clone(&self.events);
        engine.subscribe(move |event| queue.borrow_mut().push_back(event));

        info!(
            "Round {}/{} starting over {}m",
            plan.round,
            self.schedule.len(),
            plan.distance
        );
        self.status = MeetStatus::Racing;
        engine.start();
        self.positions = engine.positions();
        self.engine = Some(engine);
    }

    /// Pause the round in progress
    pub fn pause_race(&mut self) {
        if let Some(engine) = &self.engine {
            engine.pause();
            if engine.state() == EngineState::Paused {
                self.status = MeetStatus::Paused;
            }
        }
    }

    /// Resume a paused round
    pub fn resume_race(&mut self) {
        if let Some(engine) = &self.engine {
            engine.resume();
            if engine.state() == EngineState::Running {
                self.status = MeetStatus::Racing;
            }
        }
    }

    /// Move on to the next round, or finish the meet after the last one
    pub fn next_round(&mut self) {
        self.advance_at = None;
        let next = self.current_round + 1;

        if next > self.schedule.len() {
            if let Some(engine) = self.engine.take() {
                engine.reset();
            }
            self.status = MeetStatus::Finished;
            info!("Meet finished after {} rounds", self.results.len());
            return;
        }

        self.current_round = next;
        self.start_race();
    }

    /// Apply queued engine events and fire a due auto-advance.
    ///
    /// `now` is on the same clock as the frame timestamps.
    pub fn pump(&mut self, now: Duration) {
        loop {
            let event = self.events.borrow_mut().pop_front();
            match event {
                Some(RaceEvent::Update { positions }) => self.positions = positions,
                Some(RaceEvent::Finish { results }) => self.record_round(&results, now),
                None => break,
            }
        }

        if let Some(at) = self.advance_at {
            if now >= at {
                self.next_round();
            }
        }
    }

    fn record_round(&mut self, results: &[FinishRecord], now: Duration) {
        let Some(plan) = self.current_round.checked_sub(1).and_then(|i| self.schedule.get(i)) else {
            return;
        };

        let placings: Vec<Placing> = results
            .iter()
            .filter_map(|r| {
                plan.horses.iter().find(|h| h.id == r.horse_id).map(|horse| Placing {
                    horse: horse.clone(),
                    finish_time: r.finish_time,
                    position: r.rank,
                })
            })
            .collect();

        if let Some(winner) = placings.first() {
            info!(
                "Round {} won by {} in {:.2}s",
                plan.round, winner.horse.name, winner.finish_time
            );
        }

        self.results.push(RoundResult {
            round: plan.round,
            distance: plan.distance,
            results: placings,
        });
        self.status = MeetStatus::RoundComplete;
        self.advance_at = Some(now + Duration::from_millis(self.config.auto_advance_delay_ms));
    }

    /// Stop the current round and rewind to before round 1. The schedule and
    /// recorded results are kept.
    pub fn reset(&mut self) {
        if let Some(engine) = self.engine.take() {
            engine.reset();
        }
        self.events.borrow_mut().clear();
        self.advance_at = None;
        self.status = MeetStatus::Idle;
        self.current_round = 0;
        self.positions.clear();
        debug!("Meet reset");
    }

    /// Drop all recorded round results
    pub fn clear_results(&mut self) {
        self.results.clear();
    }

    /// Get current meet status
    pub fn status(&self) -> MeetStatus {
        self.status
    }

    /// True after the last scheduled round has been recorded
    pub fn is_finished(&self) -> bool {
        self.status == MeetStatus::Finished
    }

    /// 1-based round in progress, 0 before the first
    pub fn current_round(&self) -> usize {
        self.current_round
    }

    /// Get the generated schedule
    pub fn schedule(&self) -> &[RoundPlan] {
        &self.schedule
    }

    /// Get the full horse pool
    pub fn pool(&self) -> &[Horse] {
        &self.pool
    }

    /// Get horse by ID
    pub fn horse(&self, id: u32) -> Option<&Horse> {
        self.pool.iter().find(|h| h.id == id)
    }

    /// Latest positions of the round in progress
    pub fn positions(&self) -> &Positions {
        &self.positions
    }

    /// Results of every completed round, in order
    pub fn results(&self) -> &[RoundResult] {
        &self.results
    }

    /// Get results for a 1-based round number
    pub fn result_for_round(&self, round: usize) -> Option<&RoundResult> {
        self.results.iter().find(|r| r.round == round)
    }

    /// Get current meet snapshot
    pub fn snapshot(&self) -> MeetSnapshot {
        MeetSnapshot {
            status: self.status,
            current_round: self.current_round,
            total_rounds: self.schedule.len(),
            positions: self.positions.clone(),
            race: self.engine.as_ref().map(RaceEngine::snapshot),
        }
    }
}

/// Drive `meet` to completion on a stepped clock.
///
/// Generates a schedule if none exists, starts round 1 if nothing is
/// running, then steps `frames` every `interval` and pumps the meet.
/// `on_frame` runs after each frame. Returns false if the meet is still
/// unfinished after `max_frames`.
pub fn run_meet(
    meet: &mut Meet,
    frames: &SteppedFrames,
    interval: Duration,
    max_frames: usize,
    mut on_frame: impl FnMut(&Meet, Duration),
) -> bool {
    if meet.schedule().is_empty() {
        meet.generate_schedule();
    }
    if matches!(meet.status(), MeetStatus::Idle | MeetStatus::Ready) {
        meet.start_race();
    }

    let mut now = Duration::ZERO;
    for _ in 0..max_frames {
        frames.step(now);
        meet.pump(now);
        if meet.is_finished() {
            return true;
        }
        on_frame(meet, now);
        now += interval;
    }
    false
}

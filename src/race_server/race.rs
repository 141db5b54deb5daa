//! Race - Frame-driven simulation of a single round
//!
//! A `RaceEngine` owns the run state of every horse in one round. It does
//! no work between frames: each frame callback advances the horses by the
//! elapsed delta, reports positions, and either requests another frame or
//! finalizes the ranking.
//!
//! State machine: `Idle -> Running <-> Paused -> Finished`, with `reset`
//! returning to `Idle` from anywhere. Calls made in the wrong state are
//! no-ops.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use log::{debug, info, trace};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::race_server::config::EngineTuning;
use crate::race_server::frames::{FrameHandle, FrameScheduler};
use crate::race_server::horse::{Horse, HorseSnapshot, HorseState};

/// Horse id to percentage of the race completed (0..=100)
pub type Positions = BTreeMap<u32, f64>;

/// Engine lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Idle,
    Running,
    Paused,
    Finished,
}

/// Final placing of one horse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishRecord {
    pub horse_id: u32,
    /// Race clock (seconds) at the frame the horse crossed the line
    pub finish_time: f64,
    /// 1-based, dense, no ties
    pub rank: u32,
}

/// Events delivered to engine observers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RaceEvent {
    Update { positions: Positions },
    Finish { results: Vec<FinishRecord> },
}

type UpdateObserver = Box<dyn FnMut(&Positions)>;
type FinishObserver = Box<dyn FnMut(&[FinishRecord])>;

#[derive(Default)]
struct Observers {
    update: Vec<UpdateObserver>,
    finish: Vec<FinishObserver>,
}

/// A crossing as detected, before ranking
#[derive(Debug, Clone, Copy)]
struct Crossing {
    horse_id: u32,
    finish_time: f64,
}

enum FrameOutcome {
    /// Callback from a cancelled or superseded schedule
    Stale,
    /// First frame after start/resume; only the timestamp was recorded
    Baseline,
    Advanced { positions: Positions, all_finished: bool },
}

struct RaceCore {
    horses: Vec<Horse>,
    distance: f64,
    tuning: EngineTuning,
    states: Vec<HorseState>,
    status: EngineState,
    last_timestamp: Option<Duration>,
    frame_count: u64,
    /// Sum of frame deltas since start (seconds), paused time excluded
    race_clock: f64,
    finish_order: Vec<Crossing>,
    results: Vec<FinishRecord>,
    pending: Option<FrameHandle>,
    /// Bumped on every transition; callbacks carrying an older epoch are ignored
    epoch: u64,
    rng: ChaCha8Rng,
}

impl RaceCore {
    fn fresh_states(&self) -> Vec<HorseState> {
        self.horses
            .iter()
            .map(|h| HorseState::new(h.clone(), self.distance, &self.tuning))
            .collect()
    }

    fn clear(&mut self) {
        self.states = self.fresh_states();
        self.last_timestamp = None;
        self.frame_count = 0;
        self.race_clock = 0.0;
        self.finish_order.clear();
        self.results.clear();
        self.epoch += 1;
    }

    fn is_live(&self, epoch: u64) -> bool {
        self.epoch == epoch && self.status == EngineState::Running
    }

    fn positions(&self) -> Positions {
        self.states
            .iter()
            .map(|s| (s.horse.id, s.progress(self.distance)))
            .collect()
    }

    fn frame(&mut self, epoch: u64, timestamp: Duration) -> FrameOutcome {
        if !self.is_live(epoch) {
            return FrameOutcome::Stale;
        }
        self.pending = None;

        let Some(last) = self.last_timestamp.replace(timestamp) else {
            return FrameOutcome::Baseline;
        };
        let delta = timestamp.saturating_sub(last).as_secs_f64();
        self.frame_count += 1;
        self.race_clock += delta;

        let refresh = self.frame_count % self.tuning.variance_interval_frames.max(1) == 0;
        if refresh {
            trace!("Frame {}: refreshing speed variance", self.frame_count);
        }

        for state in self.states.iter_mut().filter(|s| !s.finished) {
            if refresh {
                state.refresh_variance(&mut self.rng, &self.tuning);
            }
            if state.advance(delta, self.distance, self.race_clock, &self.tuning) {
                self.finish_order.push(Crossing {
                    horse_id: state.horse.id,
                    finish_time: state.finish_time,
                });
            }
        }

        FrameOutcome::Advanced {
            positions: self.positions(),
            all_finished: self.states.iter().all(|s| s.finished),
        }
    }

    /// Rank by finish time, then by detection order.
    fn finalize(&mut self) -> Vec<FinishRecord> {
        self.status = EngineState::Finished;
        self.epoch += 1;
        self.pending = None;

        let mut order: Vec<(usize, Crossing)> = self.finish_order.iter().copied().enumerate().collect();
        order.sort_by(|(seq_a, a), (seq_b, b)| {
            a.finish_time
                .total_cmp(&b.finish_time)
                .then(seq_a.cmp(seq_b))
        });

        self.results = order
            .into_iter()
            .enumerate()
            .map(|(i, (_, crossing))| FinishRecord {
                horse_id: crossing.horse_id,
                finish_time: crossing.finish_time,
                rank: i as u32 + 1,
            })
            .collect();
        self.results.clone()
    }
}

struct Shared {
    core: RefCell<RaceCore>,
    observers: RefCell<Observers>,
    frames: Rc<dyn FrameScheduler>,
}

impl Shared {
    fn cancel_pending(&self) {
        let pending = self.core.borrow_mut().pending.take();
        if let Some(handle) = pending {
            self.frames.cancel_frame(handle);
        }
    }

    // Observers are moved out while they run so they may call back into
    // the engine, including registering more observers.
    fn dispatch_update(&self, positions: &Positions) {
        let mut running = std::mem::take(&mut self.observers.borrow_mut().update);
        for observer in running.iter_mut() {
            observer(positions);
        }
        let mut observers = self.observers.borrow_mut();
        running.append(&mut observers.update);
        observers.update = running;
    }

    fn dispatch_finish(&self, results: &[FinishRecord]) {
        let mut running = std::mem::take(&mut self.observers.borrow_mut().finish);
        for observer in running.iter_mut() {
            observer(results);
        }
        let mut observers = self.observers.borrow_mut();
        running.append(&mut observers.finish);
        observers.finish = running;
    }
}

fn request_tick(shared: &Rc<Shared>) {
    let epoch = shared.core.borrow().epoch;
    let weak: Weak<Shared> = Rc::downgrade(shared);
    let handle = shared.frames.request_frame(Box::new(move |timestamp: Duration| {
        if let Some(shared) = weak.upgrade() {
            on_frame(&shared, epoch, timestamp);
        }
    }));
    shared.core.borrow_mut().pending = Some(handle);
}

fn on_frame(shared: &Rc<Shared>, epoch: u64, timestamp: Duration) {
    let outcome = shared.core.borrow_mut().frame(epoch, timestamp);
    match outcome {
        FrameOutcome::Stale => {}
        FrameOutcome::Baseline => request_tick(shared),
        FrameOutcome::Advanced { positions, all_finished } => {
            shared.dispatch_update(&positions);

            // An observer may have paused or reset the engine
            if !shared.core.borrow().is_live(epoch) {
                return;
            }

            if all_finished {
                let results = shared.core.borrow_mut().finalize();
                info!(
                    "Race over {}m finished: winner {:?}",
                    shared.core.borrow().distance,
                    results.first().map(|r| r.horse_id)
                );
                shared.dispatch_finish(&results);
            } else {
                request_tick(shared);
            }
        }
    }
}

/// Simulation of one round over a fixed roster and distance
pub struct RaceEngine {
    shared: Rc<Shared>,
}

impl RaceEngine {
    /// Engine with default tuning and an entropy-seeded random source
    pub fn new(horses: Vec<Horse>, distance: f64, frames: Rc<dyn FrameScheduler>) -> Self {
        Self::build(horses, distance, frames, EngineTuning::default(), ChaCha8Rng::from_entropy())
    }

    /// Engine with explicit tuning and a reproducible random source
    pub fn seeded(
        horses: Vec<Horse>,
        distance: f64,
        frames: Rc<dyn FrameScheduler>,
        tuning: EngineTuning,
        seed: u64,
    ) -> Self {
        Self::build(horses, distance, frames, tuning, ChaCha8Rng::seed_from_u64(seed))
    }

    fn build(
        horses: Vec<Horse>,
        distance: f64,
        frames: Rc<dyn FrameScheduler>,
        tuning: EngineTuning,
        rng: ChaCha8Rng,
    ) -> Self {
        let mut core = RaceCore {
            horses,
            distance,
            tuning,
            states: Vec::new(),
            status: EngineState::Idle,
            last_timestamp: None,
            frame_count: 0,
            race_clock: 0.0,
            finish_order: Vec::new(),
            results: Vec::new(),
            pending: None,
            epoch: 0,
            rng,
        };
        core.states = core.fresh_states();

        Self {
            shared: Rc::new(Shared {
                core: RefCell::new(core),
                observers: RefCell::new(Observers::default()),
                frames,
            }),
        }
    }

    /// Begin the race from the start line. No-op while running or paused.
    pub fn start(&self) {
        {
            let mut core = self.shared.core.borrow_mut();
            if matches!(core.status, EngineState::Running | EngineState::Paused) {
                return;
            }
            core.clear();
            core.status = EngineState::Running;
            info!(
                "Race started: {} horses over {}m",
                core.horses.len(),
                core.distance
            );
        }
        request_tick(&self.shared);
    }

    /// Freeze the race, keeping every horse where it is
    pub fn pause(&self) {
        {
            let mut core = self.shared.core.borrow_mut();
            if core.status != EngineState::Running {
                return;
            }
            core.status = EngineState::Paused;
            core.last_timestamp = None;
            core.epoch += 1;
            debug!("Race paused at {:.3}s", core.race_clock);
        }
        self.shared.cancel_pending();
    }

    /// Continue a paused race; the next frame only sets a new baseline
    pub fn resume(&self) {
        {
            let mut core = self.shared.core.borrow_mut();
            if core.status != EngineState::Paused {
                return;
            }
            core.status = EngineState::Running;
            core.last_timestamp = None;
            core.epoch += 1;
            debug!("Race resumed at {:.3}s", core.race_clock);
        }
        request_tick(&self.shared);
    }

    /// Cancel any pending frame and return to `Idle` with zeroed run state
    pub fn reset(&self) {
        self.shared.cancel_pending();
        let mut core = self.shared.core.borrow_mut();
        core.clear();
        core.status = EngineState::Idle;
        debug!("Race reset");
    }

    /// Progress of every horse, in percent
    pub fn positions(&self) -> Positions {
        self.shared.core.borrow().positions()
    }

    /// True once every horse has crossed and the ranking was delivered
    pub fn is_finished(&self) -> bool {
        self.shared.core.borrow().status == EngineState::Finished
    }

    /// Current lifecycle state
    pub fn state(&self) -> EngineState {
        self.shared.core.borrow().status
    }

    /// Race distance in meters
    pub fn distance(&self) -> f64 {
        self.shared.core.borrow().distance
    }

    /// Ranked results once finished, empty before
    pub fn results(&self) -> Vec<FinishRecord> {
        self.shared.core.borrow().results.clone()
    }

    /// Register an observer for per-frame positions
    pub fn on_update(&self, observer: impl FnMut(&Positions) + 'static) {
        self.shared.observers.borrow_mut().update.push(Box::new(observer));
    }

    /// Register an observer for the final ranking
    pub fn on_finish(&self, observer: impl FnMut(&[FinishRecord]) + 'static) {
        self.shared.observers.borrow_mut().finish.push(Box::new(observer));
    }

    /// Forward both update and finish events into one handler as [`RaceEvent`]s
    pub fn subscribe(&self, handler: impl FnMut(RaceEvent) + 'static) {
        let handler = Rc::new(RefCell::new(handler));
        let on_update = Rc::clone(&handler);
        self.on_update(move |positions| {
            (&mut *on_update.borrow_mut())(RaceEvent::Update {
                positions: positions.clone(),
            })
        });
        self.on_finish(move |results| {
            (&mut *handler.borrow_mut())(RaceEvent::Finish {
                results: results.to_vec(),
            })
        });
    }

    /// Horse furthest along the track
    pub fn leader(&self) -> Option<u32> {
        let core = self.shared.core.borrow();
        core.states
            .iter()
            .max_by(|a, b| a.distance_covered.total_cmp(&b.distance_covered))
            .map(|s| s.horse.id)
    }

    /// Get compact snapshot for consumers
    pub fn snapshot(&self) -> EngineSnapshot {
        let core = self.shared.core.borrow();
        EngineSnapshot {
            state: core.status,
            distance: core.distance,
            race_clock: core.race_clock,
            frame_count: core.frame_count,
            horses: core
                .states
                .iter()
                .map(|s| HorseSnapshot::from_state(s, &core.tuning))
                .collect(),
            finisher_count: core.finish_order.len() as u32,
        }
    }
}

impl Drop for RaceEngine {
    fn drop(&mut self) {
        self.shared.cancel_pending();
    }
}

/// Compact engine snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub state: EngineState,
    pub distance: f64,
    pub race_clock: f64,
    pub frame_count: u64,
    pub horses: Vec<HorseSnapshot>,
    pub finisher_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::race_server::frames::SteppedFrames;
    use std::cell::Cell;

    fn mock_horses(count: u32, condition: Option<u32>) -> Vec<Horse> {
        (0..count)
            .map(|i| {
                Horse::new(
                    i + 1,
                    format!("Horse {}", i + 1),
                    format!("#{:06}", i + 1),
                    condition.unwrap_or(50 + i),
                )
            })
            .collect()
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn engine(horses: Vec<Horse>, distance: f64, seed: u64) -> (Rc<SteppedFrames>, RaceEngine) {
        let frames = Rc::new(SteppedFrames::new());
        let engine = RaceEngine::seeded(horses, distance, frames.clone(), EngineTuning::default(), seed);
        (frames, engine)
    }

    fn collect_finish(engine: &RaceEngine) -> Rc<RefCell<Vec<Vec<FinishRecord>>>> {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&calls);
        engine.on_finish(move |results| sink.borrow_mut().push(results.to_vec()));
        calls
    }

    #[test]
    fn test_positions_start_at_zero() {
        let (_, engine) = engine(mock_horses(10, None), 1200.0, 1);
        let positions = engine.positions();
        assert_eq!(positions.len(), 10);
        assert!(positions.values().all(|p| *p == 0.0));
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(!engine.is_finished());
    }

    #[test]
    fn test_all_horses_reach_the_line() {
        let (frames, engine) = engine(mock_horses(10, None), 1200.0, 2);
        engine.start();
        frames.run_frames(4000, ms(0), ms(16));

        assert!(engine.positions().values().all(|p| *p == 100.0));
        assert!(engine.is_finished());
        assert_eq!(frames.pending_count(), 0);
    }

    #[test]
    fn test_finish_fires_once_with_dense_ranks() {
        let (frames, engine) = engine(mock_horses(10, Some(50)), 1200.0, 3);
        let calls = collect_finish(&engine);
        engine.start();
        frames.run_frames(4000, ms(0), ms(16));

        let calls = calls.borrow();
        assert_eq!(calls.len(), 1);
        let results = &calls[0];
        assert_eq!(results.len(), 10);

        let mut ranks: Vec<u32> = results.iter().map(|r| r.rank).collect();
        ranks.sort_unstable();
        assert_eq!(ranks, (1..=10).collect::<Vec<_>>());

        assert!(results.windows(2).all(|w| w[0].finish_time <= w[1].finish_time));
        assert_eq!(engine.results(), *results);
    }

    #[test]
    fn test_higher_condition_tends_to_win() {
        let mut high_condition_wins = 0;

        for trial in 0..10 {
            let mut horses = vec![
                Horse::new(1, "Fast", "#FF0000", 100),
                Horse::new(2, "Slow", "#0000FF", 1),
            ];
            horses.extend(mock_horses(8, Some(50)).into_iter().map(|mut h| {
                h.id += 2;
                h
            }));

            let (frames, engine) = engine(horses, 1200.0, trial);
            let calls = collect_finish(&engine);
            engine.start();

            for f in 0..4000 {
                frames.step(ms(f * 50));
                if engine.is_finished() {
                    break;
                }
            }

            let calls = calls.borrow();
            let Some(results) = calls.first() else { continue };
            let rank_of = |id| results.iter().find(|r| r.horse_id == id).map(|r| r.rank);
            if let (Some(fast), Some(slow)) = (rank_of(1), rank_of(2)) {
                if fast < slow {
                    high_condition_wins += 1;
                }
            }
        }

        assert!(high_condition_wins >= 7);
    }

    #[test]
    fn test_pause_freezes_positions() {
        let (frames, engine) = engine(mock_horses(10, None), 1200.0, 4);
        engine.start();
        frames.run_frames(100, ms(0), ms(16));

        let before = engine.positions();
        assert!(before.values().any(|p| *p > 0.0));

        engine.pause();
        assert_eq!(engine.state(), EngineState::Paused);
        assert_eq!(frames.pending_count(), 0);

        frames.run_frames(200, ms(1600), ms(16));
        assert_eq!(engine.positions(), before);
    }

    #[test]
    fn test_resume_has_no_time_jump() {
        let (frames, engine) = engine(mock_horses(10, None), 1200.0, 5);
        engine.start();
        frames.run_frames(100, ms(0), ms(16));

        engine.pause();
        let at_pause = engine.positions();
        let clock_at_pause = engine.snapshot().race_clock;

        engine.resume();
        assert_eq!(engine.state(), EngineState::Running);
        assert_eq!(frames.pending_count(), 1);

        // A long gap: the first frame back is only a baseline
        frames.step(ms(100_000));
        assert_eq!(engine.positions(), at_pause);

        frames.step(ms(100_016));
        let after = engine.positions();
        for (id, pos) in &after {
            let moved = pos - at_pause[id];
            assert!(moved > 0.0 && moved < 1.0, "horse {id} moved {moved}%");
        }
        let clock = engine.snapshot().race_clock;
        assert!((clock - clock_at_pause - 0.016).abs() < 1e-9);
    }

    #[test]
    fn test_longer_distance_takes_more_frames() {
        fn frames_to_finish(distance: f64) -> u64 {
            let (frames, engine) = engine(mock_horses(10, Some(50)), distance, 6);
            engine.start();
            for f in 0..5000 {
                frames.step(ms(f * 16));
                if engine.is_finished() {
                    return f;
                }
            }
            panic!("race over {distance}m did not finish");
        }

        let short = frames_to_finish(1200.0);
        let long = frames_to_finish(2200.0);
        assert!(short > 0);
        assert!(long > short);
    }

    #[test]
    fn test_simultaneous_finish_ranks_by_detection_order() {
        let tuning = EngineTuning {
            variance_spread: 0.0,
            ..EngineTuning::default()
        };
        let frames = Rc::new(SteppedFrames::new());
        let engine = RaceEngine::seeded(mock_horses(3, Some(50)), 1200.0, frames.clone(), tuning, 0);
        engine.start();
        frames.run_frames(1000, ms(0), ms(16));

        let results = engine.results();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.finish_time == results[0].finish_time));
        let ids: Vec<u32> = results.iter().map(|r| r.horse_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        let ranks: Vec<u32> = results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn test_invalid_state_calls_are_noops() {
        let (frames, engine) = engine(mock_horses(4, None), 1200.0, 7);

        engine.pause();
        engine.resume();
        engine.reset();
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(frames.pending_count(), 0);

        engine.start();
        engine.start();
        assert_eq!(frames.pending_count(), 1);

        engine.pause();
        engine.pause();
        engine.start();
        assert_eq!(engine.state(), EngineState::Paused);
        assert_eq!(frames.pending_count(), 0);

        engine.resume();
        engine.resume();
        assert_eq!(frames.pending_count(), 1);
    }

    #[test]
    fn test_reset_clears_run_state() {
        let (frames, engine) = engine(mock_horses(5, None), 1200.0, 8);
        engine.start();
        frames.run_frames(4000, ms(0), ms(16));
        assert!(engine.is_finished());

        engine.reset();
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.results().is_empty());
        assert!(engine.positions().values().all(|p| *p == 0.0));
        assert_eq!(engine.snapshot().finisher_count, 0);

        // A fresh start runs a whole new race
        let calls = collect_finish(&engine);
        engine.start();
        frames.run_frames(4000, ms(100_000), ms(16));
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn test_reset_mid_race_drops_pending_frame() {
        let (frames, engine) = engine(mock_horses(5, None), 1200.0, 9);
        let updates = Rc::new(Cell::new(0));
        let counter = Rc::clone(&updates);
        engine.on_update(move |_| counter.set(counter.get() + 1));

        engine.start();
        frames.run_frames(10, ms(0), ms(16));
        assert_eq!(updates.get(), 9);

        engine.reset();
        assert_eq!(frames.pending_count(), 0);
        frames.run_frames(10, ms(160), ms(16));
        assert_eq!(updates.get(), 9);
    }

    #[test]
    fn test_observers_fire_in_registration_order() {
        let (frames, engine) = engine(mock_horses(3, None), 1200.0, 10);
        let log = Rc::new(RefCell::new(Vec::new()));

        for tag in ["a", "b"] {
            let log = Rc::clone(&log);
            engine.on_update(move |_| log.borrow_mut().push(format!("update-{tag}")));
        }
        for tag in ["a", "b"] {
            let log = Rc::clone(&log);
            engine.on_finish(move |_| log.borrow_mut().push(format!("finish-{tag}")));
        }

        engine.start();
        frames.run_frames(4000, ms(0), ms(16));

        let log = log.borrow();
        let tail: Vec<&str> = log[log.len() - 4..].iter().map(String::as_str).collect();
        assert_eq!(tail, ["update-a", "update-b", "finish-a", "finish-b"]);
        assert_eq!(log.iter().filter(|e| e.starts_with("finish")).count(), 2);
    }

    #[test]
    fn test_subscribe_forwards_events() {
        let (frames, engine) = engine(mock_horses(2, None), 1200.0, 11);
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        engine.subscribe(move |event| sink.borrow_mut().push(event));

        engine.start();
        frames.run_frames(4000, ms(0), ms(16));

        let events = events.borrow();
        assert!(matches!(events.last(), Some(RaceEvent::Finish { results }) if results.len() == 2));
        assert!(matches!(
            &events[events.len() - 2],
            RaceEvent::Update { positions } if positions.values().all(|p| *p == 100.0)
        ));
    }

    #[test]
    fn test_dropping_engine_cancels_frame() {
        let (frames, engine) = engine(mock_horses(2, None), 1200.0, 12);
        engine.start();
        assert_eq!(frames.pending_count(), 1);
        drop(engine);
        assert_eq!(frames.pending_count(), 0);
    }

    #[test]
    fn test_leader_and_snapshot() {
        let horses = vec![Horse::new(1, "Slow", "#000", 10), Horse::new(2, "Quick", "#fff", 90)];
        let (frames, engine) = engine(horses, 1200.0, 13);
        engine.start();
        frames.run_frames(20, ms(0), ms(16));

        assert_eq!(engine.leader(), Some(2));
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.state, EngineState::Running);
        assert_eq!(snapshot.frame_count, 19);
        assert_eq!(snapshot.horses.len(), 2);
        assert!(snapshot.horses.iter().all(|h| h.speed > 0.0 && !h.finished));
    }

    #[test]
    fn test_variance_refreshes_on_interval() {
        // Long enough that nobody finishes inside 40 frames
        let (frames, engine) = engine(mock_horses(3, Some(50)), 12_000.0, 1);
        engine.start();
        frames.step(ms(0));

        let speeds = |engine: &RaceEngine| -> Vec<f64> {
            engine.snapshot().horses.iter().map(|h| h.speed).collect()
        };
        let mut last = speeds(&engine);
        let mut changed_at = Vec::new();

        for f in 1..=40u64 {
            frames.step(ms(f * 16));
            assert_eq!(engine.snapshot().frame_count, f);
            let current = speeds(&engine);
            if current != last {
                changed_at.push(f);
            }
            last = current;
        }

        assert_eq!(changed_at, vec![15, 30]);
    }

    #[test]
    fn test_zero_variance_interval_does_not_panic() {
        let tuning = EngineTuning {
            variance_interval_frames: 0,
            ..EngineTuning::default()
        };
        assert!(tuning.validate().is_err());

        let frames = Rc::new(SteppedFrames::new());
        let engine = RaceEngine::seeded(mock_horses(3, None), 1200.0, frames.clone(), tuning, 1);
        engine.start();
        frames.run_frames(4000, ms(0), ms(16));
        assert!(engine.is_finished());
        assert_eq!(engine.results().len(), 3);
    }
}

//! Race Server Module
//!
//! Multi-round horse racing: a roster scheduler, a frame-driven race engine
//! for a single round, and the meet that runs one engine per round.

pub mod config;
pub mod error;
pub mod frames;
pub mod horse;
pub mod meet;
pub mod race;
pub mod schedule;

pub use config::{EngineTuning, MeetConfig};
pub use error::{MeetError, Result};
pub use frames::{FrameCallback, FrameHandle, FrameScheduler, SteppedFrames};
pub use horse::{default_pool, load_pool_from_json, load_pool_from_path, Horse};
pub use meet::{run_meet, Meet, MeetSnapshot, MeetStatus, Placing, RoundResult};
pub use race::{EngineState, FinishRecord, Positions, RaceEngine, RaceEvent};
pub use schedule::{generate_schedule, shuffled, RoundPlan};

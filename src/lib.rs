//! Horse Race - Multi-round race simulation
//!
//! Builds a randomized multi-round schedule from a horse pool and runs each
//! round through a frame-driven race engine. Rendering, input and storage
//! are left to the caller, which feeds frames in and reads events out.

pub mod race_server;

pub use race_server::*;

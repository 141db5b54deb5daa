//! Error types for meet setup.
//!
//! The engine and scheduler never fail once built from valid inputs; every
//! precondition is checked here, before a meet is constructed.

use thiserror::Error;

/// Errors raised while loading or validating meet inputs.
#[derive(Debug, Error)]
pub enum MeetError {
    /// A configuration value is outside its valid range
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// The pool cannot fill a single roster
    #[error("Pool too small: need {required} horses, have {available}")]
    PoolTooSmall { required: usize, available: usize },

    /// Two horses in the pool share an id
    #[error("Duplicate horse id {0}")]
    DuplicateHorse(u32),

    #[error("Horse {id} has condition {condition}, expected 0..=100")]
    ConditionOutOfRange { id: u32, condition: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MeetError {
    /// Creates an invalid-config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, MeetError>;

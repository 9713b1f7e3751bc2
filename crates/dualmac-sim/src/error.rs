//! Simulation error types

use std::time::Duration;

use dualmac_core::MacError;
use thiserror::Error;

/// Errors that abort a simulation run
#[derive(Debug, Error)]
pub enum SimError {
    #[error("MAC failure: {0}")]
    Mac(#[from] MacError),

    #[error("invalid scenario: {0}")]
    InvalidScenario(String),

    #[error("event scheduled in the past: at {at:?}, now {now:?}")]
    ScheduleInPast { at: Duration, now: Duration },
}

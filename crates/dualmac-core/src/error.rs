//! Error types for the channel-access coordinator

use std::time::Duration;

use dualmac_frame::{FrameKind, MacAddress};
use thiserror::Error;

use crate::directory::StationId;

/// Errors raised by the coordinator
///
/// Address lookups and frame-shape problems are recoverable: callers log
/// them and drop the frame. The timing variants indicate broken wiring and
/// abort the run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MacError {
    /// Address is not registered in the directory
    #[error("unknown address: {0}")]
    UnknownAddress(MacAddress),

    /// Station id is not registered in the directory
    #[error("unknown station: {0}")]
    UnknownStation(StationId),

    /// Frame is missing a field the operation needs
    #[error("{kind} frame has no transmitter address")]
    MissingTransmitter { kind: FrameKind },

    /// Only RTS and CTS travel across the bridge
    #[error("{0} frames cannot be relayed between channels")]
    NotRelayable(FrameKind),

    /// Reservation would start at or before the current time
    #[error("reservation start {start:?} is not after now {now:?}")]
    ReservationInPast { start: Duration, now: Duration },

    /// A timer was requested with a delay that is zero or negative
    #[error("{what} scheduled at {at:?}, which is not after now {now:?}")]
    NonPositiveDelay {
        what: &'static str,
        at: Duration,
        now: Duration,
    },
}

impl MacError {
    /// True for errors that must abort the simulation run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MacError::ReservationInPast { .. } | MacError::NonPositiveDelay { .. }
        )
    }
}

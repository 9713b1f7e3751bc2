//! Requests and notifications emitted by the access machines
//!
//! The machines never call into the scheduler, PHY or contention manager
//! directly. Every side effect is queued as a [`MacAction`] which the owner
//! drains and applies, in order, at the current simulation time.

use std::time::Duration;

use dualmac_frame::{Frame, MacAddress, MacHeader};

use crate::directory::Radio;

/// Timers a station can arm
#[derive(Debug, Clone, PartialEq)]
pub enum Timer {
    /// ACK for the frame just sent did not arrive in time
    AckTimeout,
    /// SIFS after an acknowledged fragment, send the next one
    NextFragment,
    /// SIFS after a unicast DATA, reply with an ACK
    SendAck {
        to: MacAddress,
        duration: Duration,
    },
    /// Guard delay after the start of an overheard DATA frame
    PreemptiveRtsCheck {
        /// Header of the frame on air
        on_air: MacHeader,
        /// When that frame stops being on air
        on_air_end: Duration,
    },
    /// Start time granted by a CTS (plus SIFS) has arrived
    SendAsScheduled,
    /// The on-air frame that triggered our preemptive RTS has ended
    ReleaseFirstRts,
}

/// Identifies a timer independent of its parameters.
///
/// Each station radio holds at most one pending timer per slot; arming a
/// slot again replaces the pending one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerSlot {
    AckTimeout,
    NextFragment,
    SendAck,
    PreemptiveRtsCheck,
    SendAsScheduled,
    ReleaseFirstRts,
}

impl Timer {
    pub fn slot(&self) -> TimerSlot {
        match self {
            Timer::AckTimeout => TimerSlot::AckTimeout,
            Timer::NextFragment => TimerSlot::NextFragment,
            Timer::SendAck { .. } => TimerSlot::SendAck,
            Timer::PreemptiveRtsCheck { .. } => TimerSlot::PreemptiveRtsCheck,
            Timer::SendAsScheduled => TimerSlot::SendAsScheduled,
            Timer::ReleaseFirstRts => TimerSlot::ReleaseFirstRts,
        }
    }
}

/// Noteworthy coordinator decisions, surfaced for tracing and statistics
#[derive(Debug, Clone, PartialEq)]
pub enum MacNotice {
    /// A preemptive RTS was handed to the control channel
    PreemptiveRts { to: MacAddress },
    /// Eligible for a preemptive RTS but another station holds the token
    ArbitrationLost,
    /// A CTS answering an RTS was queued on the control channel
    CtsIssued { to: MacAddress, start: Duration },
    /// A CTS addressed to us was accepted; DATA goes out at `send_at`
    CtsAccepted { send_at: Duration },
    /// A CTS failed the safety check and was ignored
    CtsRejected { start: Duration },
    /// A frame was discarded without being sent
    Dropped { reason: String },
}

/// Side effects requested by the access machines
#[derive(Debug, Clone, PartialEq)]
pub enum MacAction {
    // -------------------------------------------------------------------------
    // PHY and contention
    // -------------------------------------------------------------------------
    /// Put a frame on air now
    Transmit {
        radio: Radio,
        frame: Frame,
        duration: Duration,
    },

    /// Ask the contention manager for access
    RequestAccess { radio: Radio },

    /// Load a new backoff counter into the contention manager
    StartBackoff { radio: Radio, slots: u32 },

    /// Medium is reserved for `duration` from now
    NavStart { radio: Radio, duration: Duration },

    // -------------------------------------------------------------------------
    // Scheduler
    // -------------------------------------------------------------------------
    /// Arm `timer` to fire after `delay`, replacing any pending timer in its slot
    SetTimer {
        radio: Radio,
        timer: Timer,
        delay: Duration,
    },

    /// Disarm a pending timer, if any
    CancelTimer { radio: Radio, slot: TimerSlot },

    // -------------------------------------------------------------------------
    // Cross-channel (consumed by the owning station)
    // -------------------------------------------------------------------------
    /// Data channel asks the control channel to send an RTS or CTS
    SendByControlChannel(Frame),

    /// Control channel passes a received RTS or CTS to the data channel
    NotifyDataChannel(Frame),

    // -------------------------------------------------------------------------
    // Upper layer
    // -------------------------------------------------------------------------
    /// A complete MSDU arrived for us
    Deliver { from: MacAddress, payload: Vec<u8> },

    /// A frame completed successfully
    TxOk { radio: Radio, header: MacHeader },

    /// A data frame exhausted its retries and was dropped
    TxFailed { radio: Radio, header: MacHeader },

    /// Informational notice
    Notice(MacNotice),
}

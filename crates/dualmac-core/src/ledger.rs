//! Channel reservation ledger
//!
//! Each radio keeps one ledger: the current NAV reservation plus the end of
//! its own last transmission and last reception. Together they answer
//! "when is this channel next free".

use std::time::Duration;

use dualmac_frame::{MacAddress, MacHeader};
use tracing::trace;

use crate::error::MacError;

/// Result of [`ReservationLedger::schedule_reservation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    /// When the reserved exchange may begin
    pub start: Duration,
    /// Time from now until the reservation ends; published as the new NAV
    pub busy_for: Duration,
}

/// NAV and last-activity bookkeeping for one radio
#[derive(Debug, Clone)]
pub struct ReservationLedger {
    /// Address of the radio owning this ledger
    own: MacAddress,
    /// Whether duration fields of overheard frames extend the NAV
    honors_duration_field: bool,
    nav_start: Duration,
    nav_duration: Duration,
    last_tx_start: Duration,
    last_tx_duration: Duration,
    last_rx_start: Duration,
    last_rx_duration: Duration,
}

impl ReservationLedger {
    pub fn new(own: MacAddress, honors_duration_field: bool) -> Self {
        Self {
            own,
            honors_duration_field,
            nav_start: Duration::ZERO,
            nav_duration: Duration::ZERO,
            last_tx_start: Duration::ZERO,
            last_tx_duration: Duration::ZERO,
            last_rx_start: Duration::ZERO,
            last_rx_duration: Duration::ZERO,
        }
    }

    pub fn nav_end(&self) -> Duration {
        self.nav_start + self.nav_duration
    }

    pub fn last_tx_end(&self) -> Duration {
        self.last_tx_start + self.last_tx_duration
    }

    pub fn last_rx_end(&self) -> Duration {
        self.last_rx_start + self.last_rx_duration
    }

    /// Latest of NAV end, own tx end and own rx end
    pub fn busy_until(&self) -> Duration {
        self.nav_end().max(self.last_tx_end()).max(self.last_rx_end())
    }

    /// Record the start of a reception on this radio.
    ///
    /// Must run before any other handling of the frame. When the frame is
    /// addressed elsewhere and this channel honours duration fields, the NAV
    /// is extended past the frame by its duration field; the new NAV length
    /// from `now` is returned so the caller can publish it.
    pub fn record_reception_start(
        &mut self,
        now: Duration,
        rx_duration: Duration,
        header: &MacHeader,
    ) -> Option<Duration> {
        self.last_rx_start = now;
        self.last_rx_duration = rx_duration;

        if !self.honors_duration_field || header.addr1 == self.own || header.duration.is_zero() {
            return None;
        }
        self.extend_reservation(now, now + rx_duration, header.duration)
    }

    /// Record the start of one of our own transmissions
    pub fn record_transmission_start(&mut self, now: Duration, tx_duration: Duration) {
        self.last_tx_start = now;
        self.last_tx_duration = tx_duration;
    }

    /// Reserve the channel for `duration`, starting no earlier than
    /// `proposed_start` and no earlier than the channel is known to be free.
    ///
    /// The stored reservation is overwritten to cover everything from `now`
    /// to the end of the new window.
    pub fn schedule_reservation(
        &mut self,
        now: Duration,
        proposed_start: Duration,
        duration: Duration,
    ) -> Result<Reservation, MacError> {
        let start = proposed_start.max(self.busy_until());
        if start <= now {
            return Err(MacError::ReservationInPast { start, now });
        }

        let busy_for = start + duration - now;
        trace!(
            "reservation: proposed={:?} nav_end={:?} tx_end={:?} rx_end={:?} -> start={:?} busy_for={:?}",
            proposed_start,
            self.nav_end(),
            self.last_tx_end(),
            self.last_rx_end(),
            start,
            busy_for
        );
        self.nav_start = now;
        self.nav_duration = busy_for;

        Ok(Reservation { start, busy_for })
    }

    /// Adopt a reservation learned from an overheard frame if it ends later
    /// than the current one.
    ///
    /// Returns the remaining NAV length from `now` when the reservation was
    /// extended and still lies in the future.
    pub fn extend_reservation(
        &mut self,
        now: Duration,
        start: Duration,
        duration: Duration,
    ) -> Option<Duration> {
        let end = start + duration;
        if end <= self.nav_end() {
            return None;
        }

        trace!("NAV extended from {:?} to {:?}", self.nav_end(), end);
        self.nav_start = start;
        self.nav_duration = duration;
        end.checked_sub(now).filter(|d| !d.is_zero())
    }

    /// True iff `proposed_start` lies strictly after the NAV end, our last
    /// transmission end and our last reception end.
    pub fn is_transmission_safe(&self, proposed_start: Duration) -> bool {
        proposed_start > self.nav_end()
            && proposed_start > self.last_tx_end()
            && proposed_start > self.last_rx_end()
    }

    /// Forget everything; used when the radio switches channel
    pub fn reset(&mut self) {
        *self = Self::new(self.own, self.honors_duration_field);
    }
}

//! Per-radio DCF contention manager
//!
//! Tracks carrier sense, NAV and the backoff counter of one radio and
//! decides when a pending access request is granted. Backoff slots are only
//! counted down while the medium has been idle for at least DIFS.

use std::time::Duration;

use dualmac_core::PhyTiming;
use tracing::trace;

/// Result of an access request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The request waits for the backoff to expire
    Pending,
    /// Medium busy and no backoff running: the requester must back off
    Collision,
}

#[derive(Debug, Clone)]
pub struct Contention {
    slot: Duration,
    difs: Duration,
    backoff_slots: u32,
    /// Slots are counted from no earlier than this instant
    counted_from: Duration,
    busy_until: Duration,
    nav_until: Duration,
    requested: bool,
}

impl Contention {
    pub fn new(phy: &PhyTiming) -> Self {
        Self {
            slot: phy.slot(),
            difs: phy.difs(),
            backoff_slots: 0,
            counted_from: Duration::ZERO,
            busy_until: Duration::ZERO,
            nav_until: Duration::ZERO,
            requested: false,
        }
    }

    pub fn backoff_slots(&self) -> u32 {
        self.backoff_slots
    }

    pub fn is_requested(&self) -> bool {
        self.requested
    }

    /// Medium busy by carrier sense or NAV at `now`
    pub fn is_busy(&self, now: Duration) -> bool {
        self.busy_until > now || self.nav_until > now
    }

    fn countdown_start(&self) -> Duration {
        (self.busy_until.max(self.nav_until) + self.difs).max(self.counted_from)
    }

    /// Consume the slots that elapsed idle up to `now`
    fn update_backoff(&mut self, now: Duration) {
        let start = self.countdown_start();
        if now > start {
            let elapsed = (now - start).as_nanos() / self.slot.as_nanos().max(1);
            let elapsed = u32::try_from(elapsed).unwrap_or(u32::MAX);
            self.backoff_slots = self.backoff_slots.saturating_sub(elapsed);
            self.counted_from = now;
        }
    }

    /// Draw a new backoff
    pub fn start_backoff(&mut self, now: Duration, slots: u32) {
        trace!("backoff {} slots at {:?}", slots, now);
        self.backoff_slots = slots;
        self.counted_from = now;
    }

    pub fn request_access(&mut self, now: Duration) -> RequestOutcome {
        self.update_backoff(now);
        self.requested = true;
        if self.backoff_slots == 0 && self.is_busy(now) {
            RequestOutcome::Collision
        } else {
            RequestOutcome::Pending
        }
    }

    /// Something is on the air until `until` (reception or own transmission)
    pub fn notify_busy(&mut self, now: Duration, until: Duration) {
        if until > self.busy_until {
            self.update_backoff(now);
            self.busy_until = until;
        }
    }

    pub fn notify_nav(&mut self, now: Duration, until: Duration) {
        if until > self.nav_until {
            self.update_backoff(now);
            self.nav_until = until;
        }
    }

    /// When the pending request will be granted if nothing else happens
    pub fn next_grant_time(&self, now: Duration) -> Option<Duration> {
        if !self.requested {
            return None;
        }
        let at = self.countdown_start() + self.slot * self.backoff_slots;
        Some(at.max(now))
    }

    /// Grant the pending request if its time has come
    pub fn try_grant(&mut self, now: Duration) -> bool {
        match self.next_grant_time(now) {
            Some(at) if at <= now => {
                self.requested = false;
                self.backoff_slots = 0;
                self.counted_from = now;
                true
            }
            _ => false,
        }
    }

    /// Forget all state; used when the radio switches channel
    pub fn reset(&mut self) {
        self.backoff_slots = 0;
        self.requested = false;
        self.busy_until = Duration::ZERO;
        self.nav_until = Duration::ZERO;
        self.counted_from = Duration::ZERO;
    }
}

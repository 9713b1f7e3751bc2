//! Generic channel-access state machine
//!
//! One [`Txop`] drives one radio: it owns the outgoing queue, the in-flight
//! frame, the contention window and the reservation ledger, and reacts to
//! contention-manager notifications. What differs between the control and
//! data radios (acknowledgements, fragmentation, sequence numbers, address
//! rewriting at dequeue) is supplied by an [`AccessPolicy`].

use std::collections::VecDeque;
use std::time::Duration;

use dualmac_frame::{Frame, FrameKind, MacAddress, MacHeader, FCS_SIZE, SEQUENCE_MODULO};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::action::{MacAction, MacNotice, Timer, TimerSlot};
use crate::config::ContentionConfig;
use crate::directory::Radio;
use crate::error::MacError;
use crate::ledger::ReservationLedger;
use crate::phy::PhyTiming;

/// Largest number of fragments a 4-bit fragment number can address
const MAX_FRAGMENTS: usize = 16;

/// Per-channel behaviour plugged into [`Txop`]
pub trait AccessPolicy {
    /// Radio this policy drives
    fn radio(&self) -> Radio;

    /// Whether the receiver must acknowledge a frame with this header
    fn expects_ack(&self, header: &MacHeader) -> bool;

    /// Whether frames with this header get a sequence number at dequeue
    fn assigns_sequence(&self, header: &MacHeader) -> bool;

    /// Frames larger than this many bytes are fragmented
    fn fragmentation_threshold(&self) -> Option<usize>;

    /// Retransmissions allowed before a frame is dropped
    fn retry_limit(&self) -> u32;

    /// Whether overheard duration fields extend the NAV
    fn honors_duration_field(&self) -> bool;

    /// Last-moment rewrite of a frame leaving the queue
    fn prepare(&self, frame: Frame) -> Result<Frame, MacError>;
}

/// Where the machine is in its access cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessState {
    /// Nothing in flight
    Idle,
    /// Waiting for the contention manager to grant access
    AwaitingAccess,
    /// A frame is on air
    Transmitting,
    /// Frame sent, waiting for its ACK
    AwaitingAck,
    /// Fragment acknowledged, next fragment follows after SIFS
    Burst,
}

/// Binary exponential backoff window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentionWindow {
    min: u32,
    max: u32,
    current: u32,
}

impl ContentionWindow {
    pub fn new(config: ContentionConfig) -> Self {
        Self {
            min: config.cw_min,
            max: config.cw_max.max(config.cw_min),
            current: config.cw_min,
        }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = self.min;
    }

    pub fn double(&mut self) {
        self.current = (self.current.saturating_mul(2) + 1).min(self.max);
    }
}

/// The frame currently being worked on
#[derive(Debug, Clone)]
struct Outgoing {
    frame: Frame,
    fragment: u8,
    retries: u32,
}

/// Channel-access state machine for one radio
pub struct Txop<P: AccessPolicy> {
    policy: P,
    phy: PhyTiming,
    own: MacAddress,
    queue: VecDeque<Frame>,
    current: Option<Outgoing>,
    state: AccessState,
    cw: ContentionWindow,
    rng: StdRng,
    next_sequence: u16,
    ledger: ReservationLedger,
    /// Mirrors whether a request is pending at the contention manager
    access_requested: bool,
    /// Head of queue will be sent at a time granted over the control channel
    reserved: bool,
    actions: Vec<MacAction>,
}

impl<P: AccessPolicy> Txop<P> {
    pub fn new(
        policy: P,
        own: MacAddress,
        phy: PhyTiming,
        contention: ContentionConfig,
        seed: u64,
    ) -> Self {
        let ledger = ReservationLedger::new(own, policy.honors_duration_field());
        Self {
            policy,
            phy,
            own,
            queue: VecDeque::new(),
            current: None,
            state: AccessState::Idle,
            cw: ContentionWindow::new(contention),
            rng: StdRng::seed_from_u64(seed),
            next_sequence: 0,
            ledger,
            access_requested: false,
            reserved: false,
            actions: Vec::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn radio(&self) -> Radio {
        self.policy.radio()
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn own_address(&self) -> MacAddress {
        self.own
    }

    pub fn phy(&self) -> &PhyTiming {
        &self.phy
    }

    pub fn state(&self) -> AccessState {
        self.state
    }

    pub fn ledger(&self) -> &ReservationLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut ReservationLedger {
        &mut self.ledger
    }

    pub fn contention_window(&self) -> u32 {
        self.cw.current()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Next frame that will leave the queue
    pub fn peek(&self) -> Option<&Frame> {
        self.queue.front()
    }

    /// True while a frame has been dequeued and not yet completed
    pub fn has_current(&self) -> bool {
        self.current.is_some()
    }

    pub fn is_access_requested(&self) -> bool {
        self.access_requested
    }

    pub fn is_reserved(&self) -> bool {
        self.reserved
    }

    /// Mark the head of the queue as scheduled by a control-channel grant.
    /// Normal access will not dequeue it until [`Txop::send_as_scheduled`].
    pub fn reserve(&mut self) {
        self.reserved = true;
    }

    pub(crate) fn push_action(&mut self, action: MacAction) {
        self.actions.push(action);
    }

    /// Drain pending actions
    pub fn drain_actions(&mut self) -> Vec<MacAction> {
        std::mem::take(&mut self.actions)
    }

    // -------------------------------------------------------------------------
    // Fragmentation
    // -------------------------------------------------------------------------

    fn fragment_payload_size(&self, frame: &Frame) -> Option<usize> {
        let threshold = self.policy.fragmentation_threshold()?;
        if frame.header.kind != FrameKind::Data || frame.header.addr1.is_group() {
            return None;
        }
        if frame.size() <= threshold {
            return None;
        }
        let overhead = frame.header.serialized_size() + FCS_SIZE;
        let per = threshold.saturating_sub(overhead).max(1);
        Some(per.max(frame.payload.len().div_ceil(MAX_FRAGMENTS)))
    }

    fn fragment_count(&self, frame: &Frame) -> usize {
        match self.fragment_payload_size(frame) {
            Some(per) => frame.payload.len().div_ceil(per).max(1),
            None => 1,
        }
    }

    fn fragment_of(&self, frame: &Frame, index: usize) -> Frame {
        let Some(per) = self.fragment_payload_size(frame) else {
            return frame.clone();
        };
        let count = self.fragment_count(frame);
        let start = (index * per).min(frame.payload.len());
        let end = ((index + 1) * per).min(frame.payload.len());

        let mut header = frame.header.clone();
        header.fragment = index as u8;
        header.more_fragments = index + 1 < count;
        Frame::new(header, frame.payload[start..end].to_vec())
    }

    /// On-air size of the first transmission `frame` would cause
    pub fn first_transmission_size(&self, frame: &Frame) -> usize {
        self.fragment_of(frame, 0).size()
    }

    // -------------------------------------------------------------------------
    // Queue and access requests
    // -------------------------------------------------------------------------

    /// Initial backoff; called once when the radio comes up
    pub fn start(&mut self) {
        self.start_backoff();
    }

    /// Append a frame and request access if nothing is in flight
    pub fn queue(&mut self, frame: Frame) {
        debug!("{} queue: {}", self.radio(), frame.header);
        self.queue.push_back(frame);
        self.start_access_if_needed();
    }

    fn start_backoff(&mut self) {
        let slots = self.rng.random_range(0..=self.cw.current());
        self.actions.push(MacAction::StartBackoff {
            radio: self.radio(),
            slots,
        });
    }

    fn request_access(&mut self) {
        self.access_requested = true;
        if self.state == AccessState::Idle {
            self.state = AccessState::AwaitingAccess;
        }
        self.actions.push(MacAction::RequestAccess {
            radio: self.radio(),
        });
    }

    fn start_access_if_needed(&mut self) {
        if self.current.is_none()
            && !self.queue.is_empty()
            && !self.access_requested
            && !self.reserved
        {
            self.request_access();
        }
    }

    fn restart_access_if_needed(&mut self) {
        let pending = self.current.is_some() || (!self.queue.is_empty() && !self.reserved);
        if pending && !self.access_requested {
            self.request_access();
        }
    }

    // -------------------------------------------------------------------------
    // Contention manager notifications
    // -------------------------------------------------------------------------

    /// Contention manager granted access to the medium
    pub fn access_granted(&mut self, now: Duration) {
        self.access_requested = false;

        if matches!(
            self.state,
            AccessState::Transmitting | AccessState::AwaitingAck | AccessState::Burst
        ) {
            debug!("{} access grant ignored while {:?}", self.radio(), self.state);
            return;
        }

        if self.current.is_none() {
            if self.reserved {
                debug!("{} access grant ignored, head frame reserved by CTS", self.radio());
                self.state = AccessState::Idle;
                return;
            }
            if !self.dequeue_next() {
                self.state = AccessState::Idle;
                return;
            }
        }

        self.transmit_current(now);
    }

    /// The medium was busy when access was requested without backoff
    pub fn collision(&mut self) {
        debug!("{} collision, backing off (cw={})", self.radio(), self.cw.current());
        self.cw.double();
        self.start_backoff();
        self.restart_access_if_needed();
    }

    /// Another queue of the same station won the same slot
    pub fn internal_collision(&mut self) {
        debug!("{} internal collision", self.radio());
        self.cw.double();
        self.start_backoff();
        self.restart_access_if_needed();
    }

    /// Radio moved to another channel: all queued and in-flight frames are lost
    pub fn channel_switching(&mut self) {
        debug!(
            "{} channel switch, flushing {} queued frame(s)",
            self.radio(),
            self.queue.len() + usize::from(self.current.is_some())
        );
        self.queue.clear();
        self.current = None;
        self.state = AccessState::Idle;
        self.access_requested = false;
        self.reserved = false;
        self.cw.reset();
        self.ledger.reset();
        self.actions.push(MacAction::CancelTimer {
            radio: self.radio(),
            slot: TimerSlot::AckTimeout,
        });
        self.actions.push(MacAction::CancelTimer {
            radio: self.radio(),
            slot: TimerSlot::NextFragment,
        });
    }

    // -------------------------------------------------------------------------
    // Transmission cycle
    // -------------------------------------------------------------------------

    /// Move the queue head into `current`. Returns false if nothing was dequeued.
    fn dequeue_next(&mut self) -> bool {
        while let Some(frame) = self.queue.pop_front() {
            let mut frame = match self.policy.prepare(frame) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("{} dropping frame at dequeue: {}", self.radio(), e);
                    self.actions.push(MacAction::Notice(MacNotice::Dropped {
                        reason: e.to_string(),
                    }));
                    continue;
                }
            };

            if self.policy.assigns_sequence(&frame.header) {
                frame.header.sequence = self.next_sequence;
                self.next_sequence = (self.next_sequence + 1) % SEQUENCE_MODULO;
            }
            frame.header.fragment = 0;
            frame.header.retry = false;
            frame.header.more_fragments = false;

            debug!("{} dequeued {} ({} bytes)", self.radio(), frame.header, frame.size());
            self.current = Some(Outgoing {
                frame,
                fragment: 0,
                retries: 0,
            });
            return true;
        }
        false
    }

    fn transmit_current(&mut self, now: Duration) {
        let Some(out) = self.current.as_ref() else {
            return;
        };
        let index = usize::from(out.fragment);
        let mut frame = self.fragment_of(&out.frame, index);
        frame.header.retry = out.retries > 0;

        if frame.header.kind == FrameKind::Data {
            frame.header.duration = if !self.policy.expects_ack(&frame.header) {
                Duration::ZERO
            } else if frame.header.more_fragments {
                let next = self.fragment_of(&out.frame, index + 1);
                self.phy.sifs() * 3
                    + self.phy.ack_duration() * 2
                    + self.phy.tx_duration(next.size())
            } else {
                self.phy.sifs() + self.phy.ack_duration()
            };
        }

        let duration = self.phy.tx_duration(frame.size());
        debug!("{} tx {} for {:?}", self.radio(), frame.header, duration);
        self.ledger.record_transmission_start(now, duration);
        self.state = AccessState::Transmitting;
        self.actions.push(MacAction::Transmit {
            radio: self.radio(),
            frame,
            duration,
        });
    }

    /// The PHY finished sending the current frame
    pub fn tx_end(&mut self) {
        if self.state != AccessState::Transmitting {
            return;
        }
        let Some(out) = self.current.as_ref() else {
            self.state = AccessState::Idle;
            return;
        };

        if self.policy.expects_ack(&out.frame.header) {
            self.state = AccessState::AwaitingAck;
            self.actions.push(MacAction::SetTimer {
                radio: self.radio(),
                timer: Timer::AckTimeout,
                delay: self.phy.ack_timeout(),
            });
        } else {
            self.end_tx_no_ack();
        }
    }

    fn end_tx_no_ack(&mut self) {
        if let Some(out) = self.current.take() {
            self.actions.push(MacAction::TxOk {
                radio: self.radio(),
                header: out.frame.header,
            });
        }
        self.finish_frame();
    }

    fn finish_frame(&mut self) {
        self.state = AccessState::Idle;
        self.cw.reset();
        self.start_backoff();
        self.start_access_if_needed();
    }

    /// An ACK addressed to us arrived
    pub fn ack_received(&mut self) {
        if self.state != AccessState::AwaitingAck {
            debug!("{} unexpected ACK in state {:?}", self.radio(), self.state);
            return;
        }
        self.actions.push(MacAction::CancelTimer {
            radio: self.radio(),
            slot: TimerSlot::AckTimeout,
        });
        self.cw.reset();

        let total = match self.current.as_ref() {
            Some(out) => self.fragment_count(&out.frame),
            None => {
                self.state = AccessState::Idle;
                return;
            }
        };
        let Some(out) = self.current.as_mut() else {
            return;
        };

        if usize::from(out.fragment) + 1 < total {
            out.fragment += 1;
            out.retries = 0;
            self.state = AccessState::Burst;
            self.actions.push(MacAction::SetTimer {
                radio: self.radio(),
                timer: Timer::NextFragment,
                delay: self.phy.sifs(),
            });
            return;
        }

        if let Some(out) = self.current.take() {
            debug!("{} ACK for seq {}", self.radio(), out.frame.header.sequence);
            self.actions.push(MacAction::TxOk {
                radio: self.radio(),
                header: out.frame.header,
            });
        }
        self.finish_frame();
    }

    /// SIFS after a fragment's ACK elapsed
    pub fn next_fragment(&mut self, now: Duration) {
        if self.state == AccessState::Burst {
            self.transmit_current(now);
        }
    }

    /// The ACK for the current frame did not arrive
    pub fn ack_timeout(&mut self) {
        if self.state != AccessState::AwaitingAck {
            return;
        }
        let radio = self.radio();
        let limit = self.policy.retry_limit();
        let Some(out) = self.current.as_mut() else {
            self.state = AccessState::Idle;
            return;
        };

        out.retries += 1;
        if out.retries > limit {
            warn!(
                "{} dropping {} after {} retransmissions",
                radio,
                out.frame.header,
                limit
            );
            if let Some(out) = self.current.take() {
                self.actions.push(MacAction::TxFailed {
                    radio,
                    header: out.frame.header,
                });
            }
            self.finish_frame();
            return;
        }

        debug!("{} ACK timeout, retry {}/{}", radio, out.retries, limit);
        self.state = AccessState::Idle;
        self.cw.double();
        self.start_backoff();
        self.restart_access_if_needed();
    }

    /// A control-channel grant's start time has arrived: send the head of the
    /// queue without contending.
    pub fn send_as_scheduled(&mut self, now: Duration) {
        self.reserved = false;

        if self.current.is_some() {
            debug!(
                "{} scheduled send skipped, frame already in flight ({:?})",
                self.radio(),
                self.state
            );
            return;
        }
        if !self.dequeue_next() {
            debug!("{} scheduled send with empty queue", self.radio());
            self.state = AccessState::Idle;
            return;
        }
        self.transmit_current(now);
    }
}

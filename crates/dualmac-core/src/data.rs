//! Data-channel access machine
//!
//! Runs the ordinary DCF cycle for DATA/ACK frames and adds the preemptive
//! cross-channel RTS: while another station's long DATA frame is on air,
//! one eligible station asks the control channel for a reservation that
//! starts right after the ongoing exchange. The answering CTS is the access
//! grant; the DATA frame then goes out at the granted time without
//! contending.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dualmac_frame::{CtsGrant, Frame, FrameKind, MacAddress, MacHeader};
use tracing::{debug, info, trace, warn};

use crate::action::{MacAction, MacNotice, Timer, TimerSlot};
use crate::arbiter::RtsArbiter;
use crate::bridge::Bridge;
use crate::config::{MacConfig, PreemptionConfig};
use crate::directory::Radio;
use crate::error::MacError;
use crate::txop::{AccessPolicy, Txop};

/// Acknowledged, fragmenting policy for the DATA/ACK radio
#[derive(Debug, Clone)]
pub struct DataPolicy {
    fragmentation_threshold: Option<usize>,
    retry_limit: u32,
}

impl DataPolicy {
    pub fn new(config: &MacConfig) -> Self {
        Self {
            fragmentation_threshold: config.fragmentation_threshold,
            retry_limit: config.retry_limit,
        }
    }
}

impl AccessPolicy for DataPolicy {
    fn radio(&self) -> Radio {
        Radio::Data
    }

    fn expects_ack(&self, header: &MacHeader) -> bool {
        header.kind == FrameKind::Data && !header.addr1.is_group()
    }

    fn assigns_sequence(&self, header: &MacHeader) -> bool {
        matches!(header.kind, FrameKind::Data | FrameKind::Mgmt)
    }

    fn fragmentation_threshold(&self) -> Option<usize> {
        self.fragmentation_threshold
    }

    fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    fn honors_duration_field(&self) -> bool {
        true
    }

    fn prepare(&self, frame: Frame) -> Result<Frame, MacError> {
        Ok(frame)
    }
}

/// Outcome of the preemptive-RTS eligibility test
#[derive(Debug, Clone, PartialEq)]
pub enum Eligibility {
    /// An RTS for the head of the queue may be sent to `to`
    Eligible { to: MacAddress },
    /// A frame is already in flight or scheduled by an earlier CTS
    Busy,
    /// Nothing queued
    QueueEmpty,
    /// Head of queue is not a DATA frame above the RTS threshold
    RtsNotNeeded,
    /// Our destination takes part in the exchange on air
    SameExchange,
    /// We are closer to the on-air receiver than the minimum separation
    TooClose { distance: f64 },
    /// The on-air receiver is a group address or not in the directory
    Unresolved,
}

/// Partially received fragmented MSDU
#[derive(Debug)]
struct Reassembly {
    sequence: u16,
    next_fragment: u8,
    payload: Vec<u8>,
}

/// Access machine for a station's data radio
pub struct DataChannel {
    txop: Txop<DataPolicy>,
    bridge: Bridge,
    arbiter: Arc<RtsArbiter>,
    preemption: PreemptionConfig,
    rts_threshold: Option<usize>,
    /// Last (sequence, fragment) seen per transmitter, for duplicate detection
    last_seen: HashMap<MacAddress, (u16, u8)>,
    reassembly: HashMap<MacAddress, Reassembly>,
}

impl DataChannel {
    pub fn new(
        own: MacAddress,
        bridge: Bridge,
        arbiter: Arc<RtsArbiter>,
        config: &MacConfig,
        seed: u64,
    ) -> Self {
        Self {
            txop: Txop::new(DataPolicy::new(config), own, config.phy, config.data, seed),
            bridge,
            arbiter,
            preemption: config.preemption,
            rts_threshold: config.rts_threshold,
            last_seen: HashMap::new(),
            reassembly: HashMap::new(),
        }
    }

    pub fn address(&self) -> MacAddress {
        self.txop.own_address()
    }

    pub fn txop(&self) -> &Txop<DataPolicy> {
        &self.txop
    }

    pub fn txop_mut(&mut self) -> &mut Txop<DataPolicy> {
        &mut self.txop
    }

    pub fn start(&mut self) {
        self.txop.start();
    }

    /// Queue an MSDU for transmission
    pub fn enqueue(&mut self, frame: Frame) {
        self.txop.queue(frame);
    }

    /// Whether `frame` is large enough to warrant an RTS
    pub fn needs_rts(&self, frame: &Frame) -> bool {
        frame.header.kind == FrameKind::Data
            && !frame.header.addr1.is_group()
            && self.rts_threshold.is_some_and(|t| frame.size() > t)
    }

    fn push(&mut self, action: MacAction) {
        self.txop.push_action(action);
    }

    fn publish_nav(&mut self, busy_for: Option<Duration>) {
        if let Some(duration) = busy_for {
            self.push(MacAction::NavStart {
                radio: Radio::Data,
                duration,
            });
        }
    }

    // -------------------------------------------------------------------------
    // Reception
    // -------------------------------------------------------------------------

    /// The data radio started receiving a frame
    pub fn notify_rx_start(&mut self, now: Duration, rx_duration: Duration, frame: &Frame) {
        let busy = self
            .txop
            .ledger_mut()
            .record_reception_start(now, rx_duration, &frame.header);
        self.publish_nav(busy);

        let hdr = &frame.header;
        if hdr.kind == FrameKind::Data
            && hdr.addr1 != self.address()
            && rx_duration > self.preemption.min_on_air()
        {
            trace!("overheard long DATA ({:?}), arming preemptive RTS check", rx_duration);
            self.push(MacAction::SetTimer {
                radio: Radio::Data,
                timer: Timer::PreemptiveRtsCheck {
                    on_air: hdr.clone(),
                    on_air_end: now + rx_duration,
                },
                delay: self.preemption.guard_delay(),
            });
        }
    }

    /// A frame was received intact on the data channel
    pub fn receive(&mut self, frame: Frame) {
        let own = self.address();
        match frame.header.kind {
            FrameKind::Ack if frame.header.addr1 == own => {
                self.txop.ack_received();
            }
            FrameKind::Data if frame.header.addr1 == own => {
                self.receive_unicast(frame);
            }
            FrameKind::Data if frame.header.addr1.is_group() => {
                if let Some(src) = frame.header.addr2.filter(|src| *src != own) {
                    self.push(MacAction::Deliver {
                        from: src,
                        payload: frame.payload,
                    });
                }
            }
            _ => trace!("data rx ignored: {}", frame.header),
        }
    }

    fn receive_unicast(&mut self, frame: Frame) {
        let hdr = frame.header;
        let Some(src) = hdr.addr2 else {
            warn!("DATA without transmitter address dropped");
            return;
        };

        let phy = *self.txop.phy();
        let ack_duration = if hdr.more_fragments {
            hdr.duration.saturating_sub(phy.sifs() + phy.ack_duration())
        } else {
            Duration::ZERO
        };
        self.push(MacAction::SetTimer {
            radio: Radio::Data,
            timer: Timer::SendAck {
                to: src,
                duration: ack_duration,
            },
            delay: phy.sifs(),
        });

        let id = (hdr.sequence, hdr.fragment);
        if hdr.retry && self.last_seen.get(&src) == Some(&id) {
            debug!("duplicate {} from {}, acknowledged only", hdr, src);
            return;
        }
        self.last_seen.insert(src, id);

        if let Some(payload) = self.reassemble(src, &hdr, frame.payload) {
            self.push(MacAction::Deliver { from: src, payload });
        }
    }

    /// Collect fragments; returns the MSDU once its last fragment arrived
    fn reassemble(&mut self, src: MacAddress, hdr: &MacHeader, payload: Vec<u8>) -> Option<Vec<u8>> {
        if hdr.fragment == 0 {
            if !hdr.more_fragments {
                self.reassembly.remove(&src);
                return Some(payload);
            }
            self.reassembly.insert(
                src,
                Reassembly {
                    sequence: hdr.sequence,
                    next_fragment: 1,
                    payload,
                },
            );
            return None;
        }

        let Some(partial) = self.reassembly.get_mut(&src) else {
            debug!("fragment {} from {} without a first fragment", hdr.fragment, src);
            return None;
        };
        if partial.sequence != hdr.sequence || partial.next_fragment != hdr.fragment {
            debug!("out-of-order fragment from {}, discarding partial MSDU", src);
            self.reassembly.remove(&src);
            return None;
        }

        partial.payload.extend_from_slice(&payload);
        partial.next_fragment += 1;
        if hdr.more_fragments {
            return None;
        }
        self.reassembly.remove(&src).map(|p| p.payload)
    }

    fn send_ack(&mut self, now: Duration, to: MacAddress, duration: Duration) {
        let frame = Frame::control(MacHeader::ack(to, duration));
        let airtime = self.txop.phy().ack_duration();
        self.txop
            .ledger_mut()
            .record_transmission_start(now, airtime);
        self.push(MacAction::Transmit {
            radio: Radio::Data,
            frame,
            duration: airtime,
        });
    }

    // -------------------------------------------------------------------------
    // Preemptive RTS
    // -------------------------------------------------------------------------

    /// Decide whether the head of our queue may be announced by a
    /// preemptive RTS while `on_air` is being transmitted.
    pub fn eligibility(&self, on_air: &MacHeader) -> Eligibility {
        if self.txop.has_current() || self.txop.is_reserved() {
            return Eligibility::Busy;
        }
        let Some(next) = self.txop.peek() else {
            return Eligibility::QueueEmpty;
        };
        if !self.needs_rts(next) {
            return Eligibility::RtsNotNeeded;
        }

        let to = next.header.addr1;
        if to == on_air.addr1 || Some(to) == on_air.addr2 {
            return Eligibility::SameExchange;
        }
        if on_air.addr1.is_group() {
            return Eligibility::Unresolved;
        }

        match self.bridge.separation(self.address(), on_air.addr1) {
            Ok(distance) if distance < self.preemption.min_separation_m => {
                Eligibility::TooClose { distance }
            }
            Ok(_) => Eligibility::Eligible { to },
            Err(e) => {
                warn!("preemptive RTS check: {}", e);
                Eligibility::Unresolved
            }
        }
    }

    /// Guard delay after an overheard long DATA frame elapsed: send a
    /// preemptive RTS for our next frame if eligible and first.
    pub fn check_and_send_preemptive_rts(
        &mut self,
        now: Duration,
        on_air: &MacHeader,
        on_air_end: Duration,
    ) -> Result<(), MacError> {
        let to = match self.eligibility(on_air) {
            Eligibility::Eligible { to } => to,
            other => {
                trace!("no preemptive RTS: {:?}", other);
                return Ok(());
            }
        };

        if !self.arbiter.try_claim() {
            debug!("preemptive RTS to {} lost arbitration", to);
            self.push(MacAction::Notice(MacNotice::ArbitrationLost));
            return Ok(());
        }

        if on_air_end <= now {
            return Err(MacError::NonPositiveDelay {
                what: "first-RTS release",
                at: on_air_end,
                now,
            });
        }
        self.push(MacAction::CancelTimer {
            radio: Radio::Data,
            slot: TimerSlot::ReleaseFirstRts,
        });
        self.push(MacAction::SetTimer {
            radio: Radio::Data,
            timer: Timer::ReleaseFirstRts,
            delay: on_air_end - now,
        });

        let Some(next) = self.txop.peek() else {
            return Ok(());
        };
        let phy = *self.txop.phy();
        let data_airtime = phy.tx_duration(self.txop.first_transmission_size(next));
        // No CTS term: the CTS travels on the control channel
        let duration = phy.sifs() + data_airtime + phy.sifs() + phy.ack_duration();

        info!("preemptive RTS to {} reserving {:?}", to, duration);
        let rts = Frame::control(MacHeader::rts(to, self.address(), duration));
        self.push(MacAction::Notice(MacNotice::PreemptiveRts { to }));
        self.push(MacAction::SendByControlChannel(rts));
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Frames relayed from the control channel
    // -------------------------------------------------------------------------

    /// An RTS or CTS arrived over the control channel, already translated to
    /// data-channel addresses.
    pub fn on_control_frame(&mut self, now: Duration, frame: Frame) -> Result<(), MacError> {
        match frame.header.kind {
            FrameKind::Rts => self.on_control_rts(now, frame),
            FrameKind::Cts => self.on_control_cts(now, frame),
            kind => {
                debug!("control channel relayed a {} frame, ignored", kind);
                Ok(())
            }
        }
    }

    /// Answer an RTS addressed to us with a CTS carrying the granted start
    pub fn on_control_rts(&mut self, now: Duration, rts: Frame) -> Result<(), MacError> {
        if rts.header.addr1 != self.address() {
            return Ok(());
        }
        let Some(src) = rts.header.addr2 else {
            warn!("RTS without transmitter address dropped");
            return Ok(());
        };

        let sifs = self.txop.phy().sifs();
        let reservation =
            self.txop
                .ledger_mut()
                .schedule_reservation(now, now + sifs, rts.header.duration)?;
        self.publish_nav(Some(reservation.busy_for));

        debug!(
            "CTS to {}: start {:?}, duration {:?}",
            src, reservation.start, rts.header.duration
        );
        let cts = Frame::new(
            MacHeader::cts(src, rts.header.duration),
            CtsGrant::new(reservation.start).encode(),
        );
        self.push(MacAction::Notice(MacNotice::CtsIssued {
            to: src,
            start: reservation.start,
        }));
        self.push(MacAction::SendByControlChannel(cts));
        Ok(())
    }

    /// Every CTS updates our NAV; a CTS for us schedules our DATA frame
    pub fn on_control_cts(&mut self, now: Duration, cts: Frame) -> Result<(), MacError> {
        let grant = match CtsGrant::decode(&cts.payload) {
            Ok(grant) => grant,
            Err(e) => {
                warn!("CTS dropped: {}", e);
                self.push(MacAction::Notice(MacNotice::Dropped {
                    reason: e.to_string(),
                }));
                return Ok(());
            }
        };

        let send_at = grant.start + self.txop.phy().sifs();
        if !self.txop.ledger().is_transmission_safe(send_at) {
            warn!(
                "invalid CTS: start {:?} overlaps busy period ending {:?}",
                send_at,
                self.txop.ledger().busy_until()
            );
            self.push(MacAction::Notice(MacNotice::CtsRejected { start: grant.start }));
            return Ok(());
        }

        let busy = self
            .txop
            .ledger_mut()
            .extend_reservation(now, grant.start, cts.header.duration);
        self.publish_nav(busy);

        if cts.header.addr1 != self.address() {
            return Ok(());
        }
        if send_at <= now {
            return Err(MacError::NonPositiveDelay {
                what: "scheduled DATA send",
                at: send_at,
                now,
            });
        }

        debug!("CTS accepted, DATA at {:?}", send_at);
        self.txop.reserve();
        self.push(MacAction::SetTimer {
            radio: Radio::Data,
            timer: Timer::SendAsScheduled,
            delay: send_at - now,
        });
        self.push(MacAction::Notice(MacNotice::CtsAccepted { send_at }));
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Timers and contention notifications
    // -------------------------------------------------------------------------

    pub fn timer_fired(&mut self, now: Duration, timer: Timer) -> Result<(), MacError> {
        match timer {
            Timer::AckTimeout => self.txop.ack_timeout(),
            Timer::NextFragment => self.txop.next_fragment(now),
            Timer::SendAck { to, duration } => self.send_ack(now, to, duration),
            Timer::PreemptiveRtsCheck { on_air, on_air_end } => {
                return self.check_and_send_preemptive_rts(now, &on_air, on_air_end);
            }
            Timer::SendAsScheduled => self.txop.send_as_scheduled(now),
            Timer::ReleaseFirstRts => {
                trace!("first-RTS token released");
                self.arbiter.release();
            }
        }
        Ok(())
    }

    pub fn access_granted(&mut self, now: Duration) {
        self.txop.access_granted(now);
    }

    pub fn tx_end(&mut self) {
        self.txop.tx_end();
    }

    pub fn collision(&mut self) {
        self.txop.collision();
    }

    pub fn internal_collision(&mut self) {
        self.txop.internal_collision();
    }

    pub fn channel_switching(&mut self) {
        self.reassembly.clear();
        self.txop.channel_switching();
    }

    pub fn drain_actions(&mut self) -> Vec<MacAction> {
        self.txop.drain_actions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{Directory, Position, StationAddresses, StationId};

    fn us(n: u64) -> Duration {
        Duration::from_micros(n)
    }

    fn addrs(id: u32) -> StationAddresses {
        StationAddresses::allocate(StationId(id))
    }

    /// Stations 0..=3 on a 2 m line, station 4 half a metre from station 1
    fn bridge() -> Bridge {
        let mut dir = Directory::new();
        for i in 0..4 {
            dir.add_station(Position::new(2.0 * f64::from(i), 0.0, 0.0));
        }
        dir.add_station(Position::new(2.0, 0.5, 0.0));
        Bridge::new(Arc::new(dir))
    }

    fn channel(id: u32, arbiter: &Arc<RtsArbiter>) -> DataChannel {
        DataChannel::new(
            addrs(id).data,
            bridge(),
            Arc::clone(arbiter),
            &MacConfig::default(),
            u64::from(id),
        )
    }

    fn data(to: u32, from: u32, len: usize) -> Frame {
        Frame::new(MacHeader::data(addrs(to).data, addrs(from).data), vec![0; len])
    }

    /// Header of station 0 sending to station 1
    fn on_air() -> MacHeader {
        let mut hdr = MacHeader::data(addrs(1).data, addrs(0).data);
        hdr.duration = us(60);
        hdr
    }

    fn find_timer(actions: &[MacAction], slot: TimerSlot) -> Option<(Timer, Duration)> {
        actions.iter().find_map(|a| match a {
            MacAction::SetTimer { timer, delay, .. } if timer.slot() == slot => {
                Some((timer.clone(), *delay))
            }
            _ => None,
        })
    }

    fn control_frames(actions: &[MacAction]) -> Vec<Frame> {
        actions
            .iter()
            .filter_map(|a| match a {
                MacAction::SendByControlChannel(f) => Some(f.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_long_overheard_data_arms_check() {
        let arbiter = RtsArbiter::shared();
        let mut ch = channel(2, &arbiter);
        let frame = Frame::new(on_air(), vec![0; 1024]);

        ch.notify_rx_start(us(100), us(1428), &frame);
        let actions = ch.drain_actions();
        let (timer, delay) = find_timer(&actions, TimerSlot::PreemptiveRtsCheck).unwrap();
        assert_eq!(delay, Duration::from_nanos(20));
        assert_eq!(
            timer,
            Timer::PreemptiveRtsCheck {
                on_air: on_air(),
                on_air_end: us(1528)
            }
        );
        // Duration field of the overheard frame extends the NAV
        assert!(actions.contains(&MacAction::NavStart {
            radio: Radio::Data,
            duration: us(1428 + 60)
        }));
    }

    #[test]
    fn test_short_or_own_data_arms_nothing() {
        let arbiter = RtsArbiter::shared();
        let mut ch = channel(2, &arbiter);
        ch.notify_rx_start(us(0), us(180), &Frame::new(on_air(), vec![0; 100]));
        assert!(find_timer(&ch.drain_actions(), TimerSlot::PreemptiveRtsCheck).is_none());

        let mut rx = channel(1, &arbiter);
        rx.notify_rx_start(us(0), us(1428), &Frame::new(on_air(), vec![0; 1024]));
        assert!(find_timer(&rx.drain_actions(), TimerSlot::PreemptiveRtsCheck).is_none());
    }

    #[test]
    fn test_eligibility_rejections() {
        let arbiter = RtsArbiter::shared();

        let ch = channel(2, &arbiter);
        assert_eq!(ch.eligibility(&on_air()), Eligibility::QueueEmpty);

        let mut ch = channel(2, &arbiter);
        ch.enqueue(data(3, 2, 100));
        assert_eq!(ch.eligibility(&on_air()), Eligibility::RtsNotNeeded);

        // Destination is the on-air receiver
        let mut ch = channel(2, &arbiter);
        ch.enqueue(data(1, 2, 1024));
        assert_eq!(ch.eligibility(&on_air()), Eligibility::SameExchange);

        // Destination is the on-air sender
        let mut ch = channel(2, &arbiter);
        ch.enqueue(data(0, 2, 1024));
        assert_eq!(ch.eligibility(&on_air()), Eligibility::SameExchange);

        // Station 4 sits 0.5 m from the on-air receiver
        let mut ch = channel(4, &arbiter);
        ch.enqueue(data(3, 4, 1024));
        assert_eq!(
            ch.eligibility(&on_air()),
            Eligibility::TooClose { distance: 0.5 }
        );

        let mut ch = channel(2, &arbiter);
        ch.enqueue(data(3, 2, 1024));
        assert_eq!(
            ch.eligibility(&on_air()),
            Eligibility::Eligible { to: addrs(3).data }
        );
    }

    #[test]
    fn test_group_addressed_on_air_frame_is_unresolved() {
        let arbiter = RtsArbiter::shared();
        let mut ch = channel(2, &arbiter);
        ch.enqueue(data(3, 2, 1024));
        let broadcast = MacHeader::data(MacAddress::BROADCAST, addrs(0).data);
        assert_eq!(ch.eligibility(&broadcast), Eligibility::Unresolved);
    }

    #[test]
    fn test_preemptive_rts_fields() {
        let arbiter = RtsArbiter::shared();
        let mut ch = channel(2, &arbiter);
        ch.enqueue(data(3, 2, 1024));
        ch.drain_actions();

        ch.check_and_send_preemptive_rts(us(100), &on_air(), us(1528))
            .unwrap();
        let actions = ch.drain_actions();

        let rts = control_frames(&actions);
        assert_eq!(rts.len(), 1);
        let hdr = &rts[0].header;
        assert_eq!(hdr.kind, FrameKind::Rts);
        assert_eq!(hdr.addr1, addrs(3).data);
        assert_eq!(hdr.addr2, Some(addrs(2).data));
        // SIFS + DATA(1428) + SIFS + ACK(44)
        assert_eq!(hdr.duration, us(16 + 1428 + 16 + 44));

        assert!(!arbiter.is_available());
        let (_, delay) = find_timer(&actions, TimerSlot::ReleaseFirstRts).unwrap();
        assert_eq!(delay, us(1428));
        // Pending release is replaced, never left to fire stale
        let cancel = actions.iter().position(|a| {
            matches!(
                a,
                MacAction::CancelTimer {
                    slot: TimerSlot::ReleaseFirstRts,
                    ..
                }
            )
        });
        let set = actions.iter().position(|a| {
            matches!(
                a,
                MacAction::SetTimer {
                    timer: Timer::ReleaseFirstRts,
                    ..
                }
            )
        });
        assert!(cancel.unwrap() < set.unwrap());
    }

    #[test]
    fn test_second_station_loses_arbitration() {
        let arbiter = RtsArbiter::shared();
        let mut first = channel(2, &arbiter);
        let mut second = channel(3, &arbiter);
        first.enqueue(data(3, 2, 1024));
        second.enqueue(data(2, 3, 1024));

        first
            .check_and_send_preemptive_rts(us(100), &on_air(), us(1528))
            .unwrap();
        second
            .check_and_send_preemptive_rts(us(100), &on_air(), us(1528))
            .unwrap();

        assert_eq!(control_frames(&first.drain_actions()).len(), 1);
        let lost = second.drain_actions();
        assert!(control_frames(&lost).is_empty());
        assert!(lost.contains(&MacAction::Notice(MacNotice::ArbitrationLost)));

        // Token comes back when the on-air frame ends
        first.timer_fired(us(1528), Timer::ReleaseFirstRts).unwrap();
        assert!(arbiter.is_available());
    }

    #[test]
    fn test_rts_answered_with_cts_after_busy_period() {
        let arbiter = RtsArbiter::shared();
        let mut ch = channel(3, &arbiter);
        // Overheard DATA 100..1528 with 60 us duration field: busy until 1588
        ch.notify_rx_start(us(100), us(1428), &Frame::new(on_air(), vec![0; 1024]));
        ch.drain_actions();

        let rts = Frame::control(MacHeader::rts(addrs(3).data, addrs(2).data, us(1504)));
        ch.on_control_frame(us(300), rts).unwrap();
        let actions = ch.drain_actions();

        let cts = control_frames(&actions);
        assert_eq!(cts.len(), 1);
        assert_eq!(cts[0].header.kind, FrameKind::Cts);
        assert_eq!(cts[0].header.addr1, addrs(2).data);
        assert_eq!(cts[0].header.addr2, None);
        assert_eq!(cts[0].header.duration, us(1504));
        assert_eq!(CtsGrant::decode(&cts[0].payload).unwrap().start, us(1588));
        assert!(actions.contains(&MacAction::NavStart {
            radio: Radio::Data,
            duration: us(1588 + 1504 - 300)
        }));
    }

    #[test]
    fn test_rts_on_idle_channel_starts_after_sifs() {
        let arbiter = RtsArbiter::shared();
        let mut ch = channel(3, &arbiter);
        let rts = Frame::control(MacHeader::rts(addrs(3).data, addrs(2).data, us(1504)));
        ch.on_control_rts(us(50), rts).unwrap();
        let cts = control_frames(&ch.drain_actions());
        assert_eq!(CtsGrant::decode(&cts[0].payload).unwrap().start, us(66));
    }

    #[test]
    fn test_cts_for_us_schedules_data() {
        let arbiter = RtsArbiter::shared();
        let mut ch = channel(2, &arbiter);
        ch.enqueue(data(3, 2, 1024));
        ch.drain_actions();

        let cts = Frame::new(
            MacHeader::cts(addrs(2).data, us(1504)),
            CtsGrant::new(us(1588)).encode(),
        );
        ch.on_control_frame(us(400), cts).unwrap();
        let actions = ch.drain_actions();

        assert!(ch.txop().is_reserved());
        let (_, delay) = find_timer(&actions, TimerSlot::SendAsScheduled).unwrap();
        assert_eq!(delay, us(1588 + 16 - 400));
        assert_eq!(ch.txop().ledger().nav_end(), us(1588 + 1504));

        ch.timer_fired(us(1604), Timer::SendAsScheduled).unwrap();
        let sent: Vec<_> = ch
            .drain_actions()
            .into_iter()
            .filter(|a| matches!(a, MacAction::Transmit { .. }))
            .collect();
        assert_eq!(sent.len(), 1);
        assert!(!ch.txop().is_reserved());
    }

    #[test]
    fn test_cts_for_others_only_extends_nav() {
        let arbiter = RtsArbiter::shared();
        let mut ch = channel(0, &arbiter);
        let cts = Frame::new(
            MacHeader::cts(addrs(2).data, us(1504)),
            CtsGrant::new(us(1588)).encode(),
        );
        ch.on_control_cts(us(400), cts).unwrap();
        let actions = ch.drain_actions();
        assert!(find_timer(&actions, TimerSlot::SendAsScheduled).is_none());
        assert!(actions.contains(&MacAction::NavStart {
            radio: Radio::Data,
            duration: us(1588 + 1504 - 400)
        }));
        assert!(!ch.txop().is_reserved());
    }

    #[test]
    fn test_invalid_cts_rejected() {
        let arbiter = RtsArbiter::shared();
        let mut ch = channel(2, &arbiter);
        // Busy until 1588 from the overheard exchange
        ch.notify_rx_start(us(100), us(1428), &Frame::new(on_air(), vec![0; 1024]));
        ch.drain_actions();

        // start + SIFS == NAV end is not strictly after it
        let cts = Frame::new(
            MacHeader::cts(addrs(2).data, us(1504)),
            CtsGrant::new(us(1572)).encode(),
        );
        ch.on_control_cts(us(400), cts).unwrap();
        let actions = ch.drain_actions();
        assert!(actions.contains(&MacAction::Notice(MacNotice::CtsRejected { start: us(1572) })));
        assert!(find_timer(&actions, TimerSlot::SendAsScheduled).is_none());
        assert_eq!(ch.txop().ledger().nav_end(), us(1588));
    }

    #[test]
    fn test_malformed_cts_dropped() {
        let arbiter = RtsArbiter::shared();
        let mut ch = channel(2, &arbiter);
        let cts = Frame::new(MacHeader::cts(addrs(2).data, us(10)), vec![1, 2]);
        ch.on_control_cts(us(0), cts).unwrap();
        let actions = ch.drain_actions();
        assert!(matches!(
            actions.as_slice(),
            [MacAction::Notice(MacNotice::Dropped { .. })]
        ));
    }

    #[test]
    fn test_stale_cts_is_fatal() {
        let arbiter = RtsArbiter::shared();
        let mut ch = channel(2, &arbiter);
        let cts = Frame::new(
            MacHeader::cts(addrs(2).data, us(100)),
            CtsGrant::new(us(10)).encode(),
        );
        let err = ch.on_control_cts(us(500), cts).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_unicast_data_acked_and_delivered() {
        let arbiter = RtsArbiter::shared();
        let mut ch = channel(1, &arbiter);
        let mut frame = data(1, 0, 64);
        frame.header.duration = us(60);
        ch.receive(frame.clone());

        let actions = ch.drain_actions();
        let (timer, delay) = find_timer(&actions, TimerSlot::SendAck).unwrap();
        assert_eq!(delay, us(16));
        assert_eq!(
            timer,
            Timer::SendAck {
                to: addrs(0).data,
                duration: Duration::ZERO
            }
        );
        assert!(actions.contains(&MacAction::Deliver {
            from: addrs(0).data,
            payload: vec![0; 64]
        }));

        // Retransmission of the same frame is acknowledged but not delivered twice
        frame.header.retry = true;
        ch.receive(frame);
        let actions = ch.drain_actions();
        assert!(find_timer(&actions, TimerSlot::SendAck).is_some());
        assert!(!actions.iter().any(|a| matches!(a, MacAction::Deliver { .. })));

        ch.timer_fired(
            us(200),
            Timer::SendAck {
                to: addrs(0).data,
                duration: Duration::ZERO,
            },
        )
        .unwrap();
        let ack = ch.drain_actions();
        assert!(matches!(
            ack.as_slice(),
            [MacAction::Transmit { frame, duration, .. }]
                if frame.header.kind == FrameKind::Ack && *duration == us(44)
        ));
    }

    #[test]
    fn test_fragments_reassembled() {
        let arbiter = RtsArbiter::shared();
        let mut ch = channel(1, &arbiter);
        for (i, chunk) in [[1u8; 4], [2u8; 4], [3u8; 4]].iter().enumerate() {
            let mut frame = Frame::new(
                MacHeader::data(addrs(1).data, addrs(0).data),
                chunk.to_vec(),
            );
            frame.header.sequence = 9;
            frame.header.fragment = i as u8;
            frame.header.more_fragments = i < 2;
            ch.receive(frame);
        }
        let delivered: Vec<_> = ch
            .drain_actions()
            .into_iter()
            .filter_map(|a| match a {
                MacAction::Deliver { payload, .. } => Some(payload),
                _ => None,
            })
            .collect();
        assert_eq!(delivered, vec![[[1u8; 4], [2u8; 4], [3u8; 4]].concat()]);
    }

    #[test]
    fn test_ack_for_us_completes_frame() {
        let arbiter = RtsArbiter::shared();
        let mut ch = channel(0, &arbiter);
        ch.enqueue(data(1, 0, 100));
        ch.access_granted(us(0));
        ch.tx_end();
        ch.drain_actions();

        ch.receive(Frame::control(MacHeader::ack(addrs(0).data, Duration::ZERO)));
        assert!(ch
            .drain_actions()
            .iter()
            .any(|a| matches!(a, MacAction::TxOk { .. })));
    }
}

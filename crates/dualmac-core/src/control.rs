//! Control-channel access machine
//!
//! Sends RTS and CTS frames handed over by the data channel. Control frames
//! are never acknowledged or retried here: a frame is complete as soon as it
//! has been sent. Received RTS (for us) and CTS (for anyone) are passed on
//! to the data channel.

use std::time::Duration;

use dualmac_frame::{Frame, FrameKind, MacAddress, MacHeader};
use tracing::{debug, trace};

use crate::action::MacAction;
use crate::bridge::Bridge;
use crate::config::ContentionConfig;
use crate::directory::Radio;
use crate::error::MacError;
use crate::phy::PhyTiming;
use crate::txop::{AccessPolicy, Txop};

/// Fire-and-forget policy for the RTS/CTS radio
#[derive(Debug, Clone)]
pub struct ControlPolicy {
    bridge: Bridge,
}

impl ControlPolicy {
    pub fn new(bridge: Bridge) -> Self {
        Self { bridge }
    }
}

impl AccessPolicy for ControlPolicy {
    fn radio(&self) -> Radio {
        Radio::Control
    }

    fn expects_ack(&self, _header: &MacHeader) -> bool {
        false
    }

    fn assigns_sequence(&self, _header: &MacHeader) -> bool {
        false
    }

    fn fragmentation_threshold(&self) -> Option<usize> {
        None
    }

    fn retry_limit(&self) -> u32 {
        0
    }

    fn honors_duration_field(&self) -> bool {
        // RTS/CTS duration fields describe the data channel
        false
    }

    fn prepare(&self, mut frame: Frame) -> Result<Frame, MacError> {
        if frame.header.kind == FrameKind::Rts {
            frame.header.addr1 = self.bridge.control_address_of(frame.header.addr1)?;
        }
        Ok(frame)
    }
}

/// Access machine for a station's control radio
pub struct ControlChannel {
    txop: Txop<ControlPolicy>,
}

impl ControlChannel {
    pub fn new(
        own: MacAddress,
        bridge: Bridge,
        phy: PhyTiming,
        contention: ContentionConfig,
        seed: u64,
    ) -> Self {
        Self {
            txop: Txop::new(ControlPolicy::new(bridge), own, phy, contention, seed),
        }
    }

    pub fn address(&self) -> MacAddress {
        self.txop.own_address()
    }

    pub fn txop(&self) -> &Txop<ControlPolicy> {
        &self.txop
    }

    pub fn txop_mut(&mut self) -> &mut Txop<ControlPolicy> {
        &mut self.txop
    }

    pub fn start(&mut self) {
        self.txop.start();
    }

    /// Queue an RTS or CTS and request access if idle
    pub fn enqueue_and_request_access(&mut self, frame: Frame) {
        self.txop.queue(frame);
    }

    pub fn notify_rx_start(&mut self, now: Duration, rx_duration: Duration, frame: &Frame) {
        // Control ledger never honours duration fields, so no NAV comes back
        let _ = self
            .txop
            .ledger_mut()
            .record_reception_start(now, rx_duration, &frame.header);
    }

    /// A frame was received intact on the control channel
    pub fn receive(&mut self, frame: Frame) {
        match frame.header.kind {
            FrameKind::Rts if frame.header.addr1 == self.address() => {
                debug!("control rx RTS for us: {}", frame.header);
                self.txop.push_action(MacAction::NotifyDataChannel(frame));
            }
            FrameKind::Rts => {
                trace!("control rx RTS for someone else: {}", frame.header);
            }
            FrameKind::Cts => {
                debug!("control rx CTS: {}", frame.header);
                self.txop.push_action(MacAction::NotifyDataChannel(frame));
            }
            kind => {
                debug!("control rx unexpected {} frame, ignored", kind);
            }
        }
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
        self.txop.channel_switching();
    }

    pub fn drain_actions(&mut self) -> Vec<MacAction> {
        self.txop.drain_actions()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::directory::{Directory, Position, StationAddresses, StationId};
    use crate::txop::AccessState;

    fn control(id: u32) -> ControlChannel {
        let mut dir = Directory::new();
        dir.add_station(Position::new(0.0, 0.0, 0.0));
        dir.add_station(Position::new(2.0, 0.0, 0.0));
        let bridge = Bridge::new(Arc::new(dir));
        let own = StationAddresses::allocate(StationId(id)).control;
        ControlChannel::new(own, bridge, PhyTiming::default(), ContentionConfig::default(), 1)
    }

    #[test]
    fn test_rts_completes_without_ack() {
        let mut ctl = control(0);
        let a = StationAddresses::allocate(StationId(0));
        let b = StationAddresses::allocate(StationId(1));
        ctl.enqueue_and_request_access(Frame::control(MacHeader::rts(
            b.control,
            a.control,
            Duration::from_micros(1504),
        )));
        ctl.access_granted(Duration::ZERO);
        ctl.tx_end();

        let actions = ctl.drain_actions();
        assert!(actions.iter().any(|a| matches!(
            a,
            MacAction::Transmit {
                radio: Radio::Control,
                ..
            }
        )));
        assert!(actions.iter().any(|a| matches!(a, MacAction::TxOk { .. })));
        assert!(!actions.iter().any(|a| matches!(a, MacAction::SetTimer { .. })));
        assert_eq!(ctl.txop().state(), AccessState::Idle);
    }

    #[test]
    fn test_rts_destination_translated_at_dequeue() {
        let mut ctl = control(0);
        let a = StationAddresses::allocate(StationId(0));
        let b = StationAddresses::allocate(StationId(1));
        // Built with the data address of the target
        ctl.enqueue_and_request_access(Frame::control(MacHeader::rts(
            b.data,
            a.control,
            Duration::from_micros(100),
        )));
        ctl.access_granted(Duration::ZERO);

        let sent = ctl
            .drain_actions()
            .into_iter()
            .find_map(|a| match a {
                MacAction::Transmit { frame, .. } => Some(frame),
                _ => None,
            })
            .unwrap();
        assert_eq!(sent.header.addr1, b.control);
    }

    #[test]
    fn test_rts_to_unknown_station_dropped() {
        let mut ctl = control(0);
        let a = StationAddresses::allocate(StationId(0));
        ctl.enqueue_and_request_access(Frame::control(MacHeader::rts(
            MacAddress::allocate(77),
            a.control,
            Duration::ZERO,
        )));
        ctl.access_granted(Duration::ZERO);
        let actions = ctl.drain_actions();
        assert!(!actions.iter().any(|a| matches!(a, MacAction::Transmit { .. })));
        assert!(actions.iter().any(|a| matches!(a, MacAction::Notice(_))));
    }

    #[test]
    fn test_receive_forwards_rts_for_us_and_every_cts() {
        let mut ctl = control(1);
        let a = StationAddresses::allocate(StationId(0));
        let b = StationAddresses::allocate(StationId(1));

        ctl.receive(Frame::control(MacHeader::rts(b.control, a.control, Duration::ZERO)));
        ctl.receive(Frame::control(MacHeader::rts(a.control, b.control, Duration::ZERO)));
        ctl.receive(Frame::new(MacHeader::cts(a.control, Duration::ZERO), vec![0; 8]));

        let forwarded = ctl
            .drain_actions()
            .into_iter()
            .filter(|a| matches!(a, MacAction::NotifyDataChannel(_)))
            .count();
        assert_eq!(forwarded, 2);
    }

    #[test]
    fn test_control_ledger_ignores_duration_fields() {
        let mut ctl = control(1);
        let a = StationAddresses::allocate(StationId(0));
        let rts = Frame::control(MacHeader::rts(a.control, a.control, Duration::from_millis(2)));
        ctl.notify_rx_start(Duration::ZERO, Duration::from_micros(52), &rts);
        assert_eq!(ctl.txop().ledger().nav_end(), Duration::ZERO);
        assert_eq!(ctl.txop().ledger().last_rx_end(), Duration::from_micros(52));
    }
}

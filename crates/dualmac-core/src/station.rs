//! Dual-radio station
//!
//! Owns one control and one data access machine, wired to the shared
//! [`Bridge`] and [`RtsArbiter`] at construction. Cross-channel actions are
//! resolved here; everything else is handed to the caller through
//! [`DualStation::drain_actions`].

use std::sync::Arc;
use std::time::Duration;

use dualmac_frame::{Frame, MacAddress, MacHeader};
use tracing::{debug, warn};

use crate::action::{MacAction, MacNotice, Timer};
use crate::arbiter::RtsArbiter;
use crate::bridge::Bridge;
use crate::config::MacConfig;
use crate::control::ControlChannel;
use crate::data::DataChannel;
use crate::directory::{Radio, StationAddresses, StationId};
use crate::error::MacError;

/// A simulated station with a control radio and a data radio
pub struct DualStation {
    id: StationId,
    addresses: StationAddresses,
    control: ControlChannel,
    data: DataChannel,
    bridge: Bridge,
    actions: Vec<MacAction>,
}

impl DualStation {
    /// Build both access machines for station `id`.
    ///
    /// `seed` feeds the backoff generators; the two radios draw from
    /// independent streams derived from it.
    pub fn new(
        id: StationId,
        config: &MacConfig,
        bridge: Bridge,
        arbiter: Arc<RtsArbiter>,
        seed: u64,
    ) -> Result<Self, MacError> {
        let addresses = bridge.directory().entry(id)?.addresses;
        let control = ControlChannel::new(
            addresses.control,
            bridge.clone(),
            config.phy,
            config.control,
            seed.wrapping_mul(2),
        );
        let data = DataChannel::new(
            addresses.data,
            bridge.clone(),
            arbiter,
            config,
            seed.wrapping_mul(2).wrapping_add(1),
        );

        Ok(Self {
            id,
            addresses,
            control,
            data,
            bridge,
            actions: Vec::new(),
        })
    }

    pub fn id(&self) -> StationId {
        self.id
    }

    pub fn addresses(&self) -> StationAddresses {
        self.addresses
    }

    pub fn control(&self) -> &ControlChannel {
        &self.control
    }

    pub fn data(&self) -> &DataChannel {
        &self.data
    }

    /// Draw initial backoffs on both radios
    pub fn start(&mut self, now: Duration) -> Result<(), MacError> {
        self.control.start();
        self.data.start();
        self.route(now)
    }

    /// Queue an MSDU for `to` (a data-radio address) on the data channel
    pub fn enqueue(&mut self, now: Duration, to: MacAddress, payload: Vec<u8>) -> Result<(), MacError> {
        let header = MacHeader::data(to, self.addresses.data);
        self.data.enqueue(Frame::new(header, payload));
        self.route(now)
    }

    /// The radio started receiving a frame. Runs before [`DualStation::receive`].
    pub fn notify_rx_start(
        &mut self,
        now: Duration,
        radio: Radio,
        rx_duration: Duration,
        frame: &Frame,
    ) -> Result<(), MacError> {
        match radio {
            Radio::Control => self.control.notify_rx_start(now, rx_duration, frame),
            Radio::Data => self.data.notify_rx_start(now, rx_duration, frame),
        }
        self.route(now)
    }

    /// The radio received a frame intact
    pub fn receive(&mut self, now: Duration, radio: Radio, frame: Frame) -> Result<(), MacError> {
        match radio {
            Radio::Control => self.control.receive(frame),
            Radio::Data => self.data.receive(frame),
        }
        self.route(now)
    }

    pub fn access_granted(&mut self, now: Duration, radio: Radio) -> Result<(), MacError> {
        match radio {
            Radio::Control => self.control.access_granted(now),
            Radio::Data => self.data.access_granted(now),
        }
        self.route(now)
    }

    pub fn tx_end(&mut self, now: Duration, radio: Radio) -> Result<(), MacError> {
        match radio {
            Radio::Control => self.control.tx_end(),
            Radio::Data => self.data.tx_end(),
        }
        self.route(now)
    }

    pub fn collision(&mut self, now: Duration, radio: Radio) -> Result<(), MacError> {
        match radio {
            Radio::Control => self.control.collision(),
            Radio::Data => self.data.collision(),
        }
        self.route(now)
    }

    pub fn internal_collision(&mut self, now: Duration, radio: Radio) -> Result<(), MacError> {
        match radio {
            Radio::Control => self.control.internal_collision(),
            Radio::Data => self.data.internal_collision(),
        }
        self.route(now)
    }

    pub fn channel_switching(&mut self, now: Duration, radio: Radio) -> Result<(), MacError> {
        match radio {
            Radio::Control => self.control.channel_switching(),
            Radio::Data => self.data.channel_switching(),
        }
        self.route(now)
    }

    /// A timer armed by this station fired
    pub fn timer_fired(&mut self, now: Duration, radio: Radio, timer: Timer) -> Result<(), MacError> {
        match radio {
            Radio::Data => self.data.timer_fired(now, timer)?,
            Radio::Control => debug!("{} control radio has no timer {:?}", self.id, timer),
        }
        self.route(now)
    }

    /// Drain pending actions for the PHY, contention managers and scheduler
    pub fn drain_actions(&mut self) -> Vec<MacAction> {
        std::mem::take(&mut self.actions)
    }

    /// Pump both machines until no cross-channel action remains
    fn route(&mut self, now: Duration) -> Result<(), MacError> {
        loop {
            let mut pending = self.control.drain_actions();
            pending.extend(self.data.drain_actions());
            if pending.is_empty() {
                return Ok(());
            }

            for action in pending {
                match action {
                    MacAction::SendByControlChannel(frame) => {
                        match self.bridge.relay_control_frame(frame) {
                            Ok(frame) => self.control.enqueue_and_request_access(frame),
                            Err(e) => self.drop_relay(e),
                        }
                    }
                    MacAction::NotifyDataChannel(frame) => {
                        match self.bridge.relay_to_data_channel(frame) {
                            Ok(frame) => self.data.on_control_frame(now, frame)?,
                            Err(e) => self.drop_relay(e),
                        }
                    }
                    other => self.actions.push(other),
                }
            }
        }
    }

    fn drop_relay(&mut self, e: MacError) {
        warn!("{} cross-channel relay dropped frame: {}", self.id, e);
        self.actions.push(MacAction::Notice(MacNotice::Dropped {
            reason: e.to_string(),
        }));
    }
}

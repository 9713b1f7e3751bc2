//! Cross-channel bridge
//!
//! RTS and CTS frames are built by the data-channel machine with data-radio
//! addresses but travel over the control radio. The bridge rewrites
//! addresses in both directions using the shared [`Directory`].

use std::sync::Arc;

use dualmac_frame::{Frame, FrameKind, MacAddress};
use tracing::trace;

use crate::directory::{Directory, StationId};
use crate::error::MacError;

/// Address translation between the control and data radios
#[derive(Debug, Clone)]
pub struct Bridge {
    directory: Arc<Directory>,
}

impl Bridge {
    pub fn new(directory: Arc<Directory>) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Rewrite an RTS or CTS built with data-channel addresses so it can be
    /// sent on the control channel.
    ///
    /// RTS frames get both receiver and transmitter rewritten; CTS frames
    /// only carry a receiver.
    pub fn relay_control_frame(&self, frame: Frame) -> Result<Frame, MacError> {
        self.rewrite(frame, |addr| self.directory.to_control(addr))
    }

    /// Inverse of [`Bridge::relay_control_frame`] for RTS/CTS frames received
    /// on the control channel.
    pub fn relay_to_data_channel(&self, frame: Frame) -> Result<Frame, MacError> {
        self.rewrite(frame, |addr| self.directory.to_data(addr))
    }

    fn rewrite<F>(&self, mut frame: Frame, translate: F) -> Result<Frame, MacError>
    where
        F: Fn(MacAddress) -> Result<MacAddress, MacError>,
    {
        let hdr = &mut frame.header;
        match hdr.kind {
            FrameKind::Rts => {
                let src = hdr
                    .addr2
                    .ok_or(MacError::MissingTransmitter { kind: hdr.kind })?;
                let to = translate(hdr.addr1)?;
                let from = translate(src)?;
                trace!("relay RTS {} -> {}, {} -> {}", hdr.addr1, to, src, from);
                hdr.addr1 = to;
                hdr.addr2 = Some(from);
            }
            FrameKind::Cts => {
                let to = translate(hdr.addr1)?;
                trace!("relay CTS {} -> {}", hdr.addr1, to);
                hdr.addr1 = to;
            }
            kind => return Err(MacError::NotRelayable(kind)),
        }
        Ok(frame)
    }

    /// Control-radio address of whichever station owns `address`
    pub fn control_address_of(&self, address: MacAddress) -> Result<MacAddress, MacError> {
        self.directory.to_control(address)
    }

    /// Station owning `address` on either radio
    pub fn station_of(&self, address: MacAddress) -> Result<StationId, MacError> {
        self.directory.resolve(address).map(|(id, _)| id)
    }

    /// Distance in metres between the stations owning two addresses
    pub fn separation(&self, a: MacAddress, b: MacAddress) -> Result<f64, MacError> {
        self.directory
            .distance(self.station_of(a)?, self.station_of(b)?)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dualmac_frame::MacHeader;

    use super::*;
    use crate::directory::{Position, StationAddresses};

    fn bridge() -> Bridge {
        let mut dir = Directory::new();
        dir.add_station(Position::new(0.0, 0.0, 0.0));
        dir.add_station(Position::new(2.0, 0.0, 0.0));
        Bridge::new(Arc::new(dir))
    }

    #[test]
    fn test_rts_rewrites_both_addresses() {
        let bridge = bridge();
        let a = StationAddresses::allocate(StationId(0));
        let b = StationAddresses::allocate(StationId(1));
        let rts = Frame::control(MacHeader::rts(b.data, a.data, Duration::from_micros(1504)));

        let relayed = bridge.relay_control_frame(rts.clone()).unwrap();
        assert_eq!(relayed.header.addr1, b.control);
        assert_eq!(relayed.header.addr2, Some(a.control));
        assert_eq!(relayed.header.duration, rts.header.duration);

        let back = bridge.relay_to_data_channel(relayed).unwrap();
        assert_eq!(back, rts);
    }

    #[test]
    fn test_cts_rewrites_receiver_only() {
        let bridge = bridge();
        let a = StationAddresses::allocate(StationId(0));
        let cts = Frame::new(MacHeader::cts(a.data, Duration::from_micros(10)), vec![0; 8]);

        let relayed = bridge.relay_control_frame(cts).unwrap();
        assert_eq!(relayed.header.addr1, a.control);
        assert_eq!(relayed.header.addr2, None);
        assert_eq!(relayed.payload.len(), 8);
    }

    #[test]
    fn test_unknown_address_is_error() {
        let bridge = bridge();
        let a = StationAddresses::allocate(StationId(0));
        let rts = Frame::control(MacHeader::rts(
            MacAddress::allocate(40),
            a.data,
            Duration::ZERO,
        ));
        assert!(matches!(
            bridge.relay_control_frame(rts),
            Err(MacError::UnknownAddress(_))
        ));
    }

    #[test]
    fn test_data_frames_are_not_relayed() {
        let bridge = bridge();
        let a = StationAddresses::allocate(StationId(0));
        let b = StationAddresses::allocate(StationId(1));
        let data = Frame::new(MacHeader::data(b.data, a.data), vec![1, 2, 3]);
        assert_eq!(
            bridge.relay_control_frame(data),
            Err(MacError::NotRelayable(FrameKind::Data))
        );
    }

    #[test]
    fn test_separation() {
        let bridge = bridge();
        let a = StationAddresses::allocate(StationId(0));
        let b = StationAddresses::allocate(StationId(1));
        assert_eq!(bridge.separation(a.data, b.control).unwrap(), 2.0);
        assert_eq!(bridge.separation(a.data, a.control).unwrap(), 0.0);
    }
}

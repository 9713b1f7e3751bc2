//! MAC header model
//!
//! Only the fields the channel-access layer reads or writes are modelled.
//! Control frames (RTS, CTS, ACK) keep the on-air sizes of the real
//! 802.11 encodings so that airtime math stays faithful.

use std::fmt;
use std::time::Duration;

use crate::address::MacAddress;

/// Size of the frame check sequence trailing every MAC frame
pub const FCS_SIZE: usize = 4;

/// On-air size of an RTS frame, FCS included
pub const RTS_SIZE: usize = 16 + FCS_SIZE;

/// On-air size of a CTS frame without payload, FCS included
pub const CTS_SIZE: usize = 10 + FCS_SIZE;

/// On-air size of an ACK frame, FCS included
pub const ACK_SIZE: usize = 10 + FCS_SIZE;

/// Highest sequence number before wrap-around (12-bit field)
pub const SEQUENCE_MODULO: u16 = 4096;

/// Frame type carried in the header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrameKind {
    /// Request to send
    Rts,
    /// Clear to send
    Cts,
    /// Data frame
    Data,
    /// Acknowledgement
    Ack,
    /// Management frame (association, beacons)
    Mgmt,
}

impl FrameKind {
    /// Short upper-case name used in logs and traces
    pub fn name(&self) -> &'static str {
        match self {
            FrameKind::Rts => "RTS",
            FrameKind::Cts => "CTS",
            FrameKind::Data => "DATA",
            FrameKind::Ack => "ACK",
            FrameKind::Mgmt => "MGMT",
        }
    }

    /// True for RTS, CTS and ACK
    pub fn is_control(&self) -> bool {
        matches!(self, FrameKind::Rts | FrameKind::Cts | FrameKind::Ack)
    }

    /// Serialized header length in bytes, FCS excluded
    pub fn header_size(&self) -> usize {
        match self {
            FrameKind::Rts => 16,
            FrameKind::Cts | FrameKind::Ack => 10,
            FrameKind::Data | FrameKind::Mgmt => 24,
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 802.11 MAC header
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MacHeader {
    /// Frame type
    pub kind: FrameKind,
    /// Receiver address
    pub addr1: MacAddress,
    /// Transmitter address (absent on CTS and ACK)
    pub addr2: Option<MacAddress>,
    /// BSS identifier
    pub addr3: Option<MacAddress>,
    /// Duration/ID field: how long the medium stays reserved after this frame
    pub duration: Duration,
    /// Sequence number (12 bits)
    pub sequence: u16,
    /// Fragment number (4 bits)
    pub fragment: u8,
    /// Retransmission flag
    pub retry: bool,
    /// More-fragments flag
    pub more_fragments: bool,
}

impl MacHeader {
    fn bare(kind: FrameKind, addr1: MacAddress) -> Self {
        Self {
            kind,
            addr1,
            addr2: None,
            addr3: None,
            duration: Duration::ZERO,
            sequence: 0,
            fragment: 0,
            retry: false,
            more_fragments: false,
        }
    }

    /// Data header from `from` to `to`
    pub fn data(to: MacAddress, from: MacAddress) -> Self {
        Self {
            addr2: Some(from),
            ..Self::bare(FrameKind::Data, to)
        }
    }

    /// Management header from `from` to `to`
    pub fn mgmt(to: MacAddress, from: MacAddress) -> Self {
        Self {
            addr2: Some(from),
            ..Self::bare(FrameKind::Mgmt, to)
        }
    }

    /// RTS header reserving the medium for `duration`
    pub fn rts(to: MacAddress, from: MacAddress, duration: Duration) -> Self {
        Self {
            addr2: Some(from),
            duration,
            ..Self::bare(FrameKind::Rts, to)
        }
    }

    /// CTS header addressed to the RTS sender
    pub fn cts(to: MacAddress, duration: Duration) -> Self {
        Self {
            duration,
            ..Self::bare(FrameKind::Cts, to)
        }
    }

    /// ACK header addressed to the data sender
    pub fn ack(to: MacAddress, duration: Duration) -> Self {
        Self {
            duration,
            ..Self::bare(FrameKind::Ack, to)
        }
    }

    /// Set the BSS identifier
    pub fn with_bssid(mut self, bssid: MacAddress) -> Self {
        self.addr3 = Some(bssid);
        self
    }

    /// Serialized header length in bytes, FCS excluded
    pub fn serialized_size(&self) -> usize {
        self.kind.header_size()
    }

    pub fn is_rts(&self) -> bool {
        self.kind == FrameKind::Rts
    }

    pub fn is_cts(&self) -> bool {
        self.kind == FrameKind::Cts
    }

    pub fn is_data(&self) -> bool {
        self.kind == FrameKind::Data
    }

    pub fn is_ack(&self) -> bool {
        self.kind == FrameKind::Ack
    }
}

impl fmt::Display for MacHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to={}", self.kind, self.addr1)?;
        if let Some(src) = self.addr2 {
            write!(f, " from={}", src)?;
        }
        write!(f, " dur={:?}", self.duration)?;
        if self.kind == FrameKind::Data {
            write!(f, " seq={} frag={}", self.sequence, self.fragment)?;
            if self.retry {
                f.write_str(" retry")?;
            }
            if self.more_fragments {
                f.write_str(" more")?;
            }
        }
        Ok(())
    }
}

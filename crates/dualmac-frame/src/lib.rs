//! 802.11 Frame Model
//!
//! This crate provides the frame types exchanged by the dual-channel MAC:
//!
//! - **MacAddress**: 48-bit addresses with allocation for simulated stations
//! - **MacHeader**: the header fields channel access reads (type, addresses,
//!   duration, sequence control, retry and more-fragments flags)
//! - **Frame**: header plus payload with on-air size accounting
//! - **CtsGrant**: the start-time payload a control-channel CTS carries
//! - **SeqTsHeader**: sequence/timestamp prefix on traffic payloads
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use dualmac_frame::{CtsGrant, Frame, MacAddress, MacHeader};
//!
//! let sender = MacAddress::allocate(1);
//! let grant = CtsGrant::new(Duration::from_micros(1500));
//! let cts = Frame::new(MacHeader::cts(sender, Duration::from_micros(1504)), grant.encode());
//!
//! assert_eq!(CtsGrant::decode(&cts.payload).unwrap(), grant);
//! assert_eq!(cts.size(), 22);
//! ```

pub mod address;
pub mod error;
pub mod frame;
pub mod header;
pub mod payload;

pub use address::MacAddress;
pub use error::ParseError;
pub use frame::Frame;
pub use header::{
    FrameKind, MacHeader, ACK_SIZE, CTS_SIZE, FCS_SIZE, RTS_SIZE, SEQUENCE_MODULO,
};
pub use payload::{CtsGrant, SeqTsHeader};

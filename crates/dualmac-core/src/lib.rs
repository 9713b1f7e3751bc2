//! Dual-Channel 802.11 Access Coordinator
//!
//! This crate implements a two-radio MAC: a control radio carries RTS/CTS
//! and a data radio carries DATA/ACK. While a long DATA frame is on air,
//! one station may announce its own next frame with a preemptive RTS on
//! the control channel; the CTS it gets back names the start time of its
//! DATA frame, so no contention is needed on the data channel.
//!
//! # Architecture
//!
//! - [`ReservationLedger`] tracks, per radio, the NAV and the end of the last
//!   own transmission and reception
//! - [`Txop`] is the channel-access state machine both radios share,
//!   specialised by an [`AccessPolicy`] ([`ControlPolicy`], [`DataPolicy`])
//! - [`DataChannel`] adds preemptive RTS, CTS handling and receiver duties
//! - [`Bridge`] translates addresses between the radios using the
//!   [`Directory`]
//! - [`RtsArbiter`] lets at most one station win the preemptive RTS for a
//!   given on-air frame
//! - [`DualStation`] wires one control and one data machine together
//!
//! The machines are passive: every call takes the current simulation time
//! and leaves [`MacAction`]s to be drained and applied by the caller.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use dualmac_core::{Bridge, Directory, DualStation, MacAction, MacConfig, Position, Radio, RtsArbiter};
//!
//! let mut directory = Directory::new();
//! let a = directory.add_station(Position::new(0.0, 0.0, 0.0));
//! let b = directory.add_station(Position::new(2.0, 0.0, 0.0));
//! let bridge = Bridge::new(Arc::new(directory));
//! let arbiter = RtsArbiter::shared();
//!
//! let mut sta = DualStation::new(a, &MacConfig::default(), bridge.clone(), arbiter, 1).unwrap();
//! let to = bridge.directory().entry(b).unwrap().addresses.data;
//!
//! sta.enqueue(Duration::ZERO, to, vec![0; 100]).unwrap();
//! let actions = sta.drain_actions();
//! assert!(actions.contains(&MacAction::RequestAccess { radio: Radio::Data }));
//! ```

pub mod action;
pub mod arbiter;
pub mod bridge;
pub mod config;
pub mod control;
pub mod data;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod phy;
pub mod station;
pub mod txop;

pub use action::{MacAction, MacNotice, Timer, TimerSlot};
pub use arbiter::RtsArbiter;
pub use bridge::Bridge;
pub use config::{ContentionConfig, MacConfig, PreemptionConfig};
pub use control::{ControlChannel, ControlPolicy};
pub use data::{DataChannel, DataPolicy, Eligibility};
pub use directory::{Directory, Position, Radio, StationAddresses, StationEntry, StationId};
pub use error::MacError;
pub use ledger::{Reservation, ReservationLedger};
pub use phy::PhyTiming;
pub use station::DualStation;
pub use txop::{AccessPolicy, AccessState, ContentionWindow, Txop};

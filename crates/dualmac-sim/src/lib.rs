//! Discrete-event simulation harness for the dual-channel MAC
//!
//! This crate drives [`dualmac_core`] stations through a simulated world:
//!
//! - **Scheduler**: time-ordered event queue with lazy cancellation
//! - **Medium**: one broadcast channel per radio with range, propagation
//!   delay, half-duplex radios and overlap loss
//! - **Contention**: per-radio DCF carrier sense, NAV and backoff
//! - **World**: applies MAC actions, runs flows and collects statistics
//!
//! # Example
//!
//! ```rust
//! use dualmac_sim::{scenario, World};
//!
//! let mut world = World::new(scenario::four_station(false)).unwrap();
//! let summary = world.run().unwrap();
//!
//! assert_eq!(summary.control.rts, 0);
//! assert!(summary.flows.iter().all(|f| f.rx_packets > 0));
//! ```

pub mod dcf;
pub mod error;
pub mod medium;
pub mod scenario;
pub mod scheduler;
pub mod stats;
pub mod trace;
pub mod traffic;
pub mod world;

pub use dcf::{Contention, RequestOutcome};
pub use error::SimError;
pub use medium::{Medium, MediumConfig};
pub use scenario::{SimConfig, StationSpec};
pub use scheduler::{EventId, Scheduler};
pub use stats::{ChannelStats, FlowReport, FlowStats, RunSummary, StationStats, Statistics};
pub use trace::{Trace, TraceEvent, TraceKind};
pub use traffic::FlowConfig;
pub use world::{SimEvent, World};

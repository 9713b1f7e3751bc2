//! MAC configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::phy::PhyTiming;

/// Contention window bounds for one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentionConfig {
    pub cw_min: u32,
    pub cw_max: u32,
}

impl Default for ContentionConfig {
    fn default() -> Self {
        Self {
            cw_min: 15,
            cw_max: 1023,
        }
    }
}

/// Preemptive cross-channel RTS parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreemptionConfig {
    /// Overheard DATA must stay on air longer than this (µs) to trigger a check
    pub min_on_air_us: u64,
    /// Delay between the start of the overheard DATA and the check (ns)
    pub guard_delay_ns: u64,
    /// Minimum distance (m) between this station and the on-air receiver
    pub min_separation_m: f64,
}

impl Default for PreemptionConfig {
    fn default() -> Self {
        Self {
            min_on_air_us: 180,
            guard_delay_ns: 20,
            min_separation_m: 1.0,
        }
    }
}

impl PreemptionConfig {
    pub fn min_on_air(&self) -> Duration {
        Duration::from_micros(self.min_on_air_us)
    }

    pub fn guard_delay(&self) -> Duration {
        Duration::from_nanos(self.guard_delay_ns)
    }
}

/// Configuration shared by every station's pair of access machines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacConfig {
    /// PHY timing used for airtime and inter-frame spaces
    pub phy: PhyTiming,
    /// Contention window of the control (RTS/CTS) channel
    pub control: ContentionConfig,
    /// Contention window of the data (DATA/ACK) channel
    pub data: ContentionConfig,
    /// Frames larger than this (bytes) ask for a preemptive RTS; `None` disables RTS
    pub rts_threshold: Option<usize>,
    /// Frames larger than this (bytes) are fragmented; `None` disables fragmentation
    pub fragmentation_threshold: Option<usize>,
    /// Retransmissions allowed before a data frame is dropped
    pub retry_limit: u32,
    /// Preemptive RTS parameters
    pub preemption: PreemptionConfig,
}

impl Default for MacConfig {
    fn default() -> Self {
        Self {
            phy: PhyTiming::default(),
            control: ContentionConfig::default(),
            data: ContentionConfig::default(),
            rts_threshold: Some(500),
            fragmentation_threshold: None,
            retry_limit: 7,
            preemption: PreemptionConfig::default(),
        }
    }
}

impl MacConfig {
    /// Same configuration with RTS/CTS switched off
    pub fn without_rts(self) -> Self {
        Self {
            rts_threshold: None,
            ..self
        }
    }
}

//! Scenario configuration and built-in presets

use std::time::Duration;

use dualmac_core::{MacConfig, Position};
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::medium::MediumConfig;
use crate::traffic::FlowConfig;

/// Placement of one station
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StationSpec {
    pub position: Position,
}

impl StationSpec {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            position: Position::new(x, y, 0.0),
        }
    }
}

/// Everything needed to build a [`crate::World`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seeds backoff draws and packet errors
    pub seed: u64,
    pub duration_us: u64,
    pub mac: MacConfig,
    pub medium: MediumConfig,
    pub stations: Vec<StationSpec>,
    pub flows: Vec<FlowConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        four_station(true)
    }
}

impl SimConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_micros(self.duration_us)
    }

    /// Check that every flow refers to two distinct existing stations
    pub fn validate(&self) -> Result<(), SimError> {
        if self.stations.is_empty() {
            return Err(SimError::InvalidScenario("no stations".into()));
        }
        let n = self.stations.len() as u32;
        for (i, flow) in self.flows.iter().enumerate() {
            if flow.src >= n || flow.dst >= n {
                return Err(SimError::InvalidScenario(format!(
                    "flow {} refers to station outside 0..{}",
                    i, n
                )));
            }
            if flow.src == flow.dst {
                return Err(SimError::InvalidScenario(format!(
                    "flow {} sends to itself",
                    i
                )));
            }
            if flow.interval_us == 0 && flow.count != 1 {
                return Err(SimError::InvalidScenario(format!(
                    "flow {} has a zero interval",
                    i
                )));
            }
        }
        Ok(())
    }
}

/// `n` stations on a square grid with `spacing` metres between neighbours
pub fn grid(n: usize, spacing: f64) -> Vec<StationSpec> {
    let width = (n as f64).sqrt().ceil().max(1.0) as usize;
    (0..n)
        .map(|i| StationSpec::at((i % width) as f64 * spacing, (i / width) as f64 * spacing))
        .collect()
}

/// Names accepted by [`preset`]
pub const PRESETS: &[&str] = &[
    "four_station",
    "four_station_no_rts",
    "retry_exhaustion",
    "crowded_overhearing",
];

/// Look up a built-in scenario by name
pub fn preset(name: &str) -> Option<SimConfig> {
    match name {
        "four_station" => Some(four_station(true)),
        "four_station_no_rts" => Some(four_station(false)),
        "retry_exhaustion" => Some(retry_exhaustion()),
        "crowded_overhearing" => Some(crowded_overhearing()),
        _ => None,
    }
}

/// Four stations on a 2 m grid with flows 0 -> 1 and 2 -> 3
pub fn four_station(rts: bool) -> SimConfig {
    let mac = if rts {
        MacConfig::default()
    } else {
        MacConfig::default().without_rts()
    };
    SimConfig {
        seed: 1,
        duration_us: 100_000,
        mac,
        medium: MediumConfig::default(),
        stations: grid(4, 2.0),
        flows: vec![
            FlowConfig {
                src: 0,
                dst: 1,
                count: 20,
                start_us: 1_000,
                ..Default::default()
            },
            FlowConfig {
                src: 2,
                dst: 3,
                count: 20,
                start_us: 1_100,
                ..Default::default()
            },
        ],
    }
}

/// Station 1 is out of range of station 0, station 2 is close by.
/// Station 0 sends one packet to each, the unreachable one first.
pub fn retry_exhaustion() -> SimConfig {
    SimConfig {
        seed: 7,
        duration_us: 50_000,
        mac: MacConfig::default(),
        medium: MediumConfig::default(),
        stations: vec![
            StationSpec::at(0.0, 0.0),
            StationSpec::at(500.0, 0.0),
            StationSpec::at(10.0, 0.0),
        ],
        flows: vec![
            FlowConfig {
                src: 0,
                dst: 1,
                count: 1,
                start_us: 1_000,
                ..Default::default()
            },
            FlowConfig {
                src: 0,
                dst: 2,
                count: 1,
                start_us: 1_010,
                ..Default::default()
            },
        ],
    }
}

/// Eight stations, four simultaneous pairs: every queued sender overhears
/// the others' DATA frames and competes for the same preemptive RTS.
pub fn crowded_overhearing() -> SimConfig {
    let flows = (0..4)
        .map(|pair| FlowConfig {
            src: 2 * pair,
            dst: 2 * pair + 1,
            count: 15,
            start_us: 1_000,
            ..Default::default()
        })
        .collect();
    SimConfig {
        seed: 3,
        duration_us: 100_000,
        mac: MacConfig::default(),
        medium: MediumConfig::default(),
        stations: grid(8, 2.0),
        flows,
    }
}

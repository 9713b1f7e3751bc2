//! Broadcast medium for one channel
//!
//! Models what the MAC needs from a PHY: which stations hear a transmission
//! and when, half-duplex radios, loss of overlapping receptions, and an
//! optional random packet error rate.

use std::time::Duration;

use dualmac_core::{Position, Radio};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Propagation speed in m/s
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Medium parameters, shared by both channels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediumConfig {
    /// Maximum distance at which a transmission is heard (m)
    pub range_m: f64,
    /// Probability that an otherwise clean reception is lost
    pub packet_error_rate: f64,
}

impl Default for MediumConfig {
    fn default() -> Self {
        Self {
            range_m: 100.0,
            packet_error_rate: 0.0,
        }
    }
}

/// A transmission reaching `station` after `delay`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arrival {
    pub station: usize,
    pub delay: Duration,
}

/// What the receiver does with an arriving signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxStart {
    /// Receiver locked onto the signal
    Locked,
    /// Receiver is transmitting
    Deaf,
    /// Signal overlapped another one; neither is received
    Overlap,
}

/// How a locked reception ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxEnd {
    Clean,
    Corrupted,
    /// Lost to the packet error rate
    Error,
}

#[derive(Debug, Clone, Copy)]
struct Reception {
    tx: u64,
    corrupted: bool,
}

#[derive(Debug, Clone, Default)]
struct Receiver {
    transmitting_until: Duration,
    /// End of the latest signal seen at the antenna
    signal_until: Duration,
    current: Option<Reception>,
}

pub struct Medium {
    radio: Radio,
    config: MediumConfig,
    positions: Vec<Position>,
    receivers: Vec<Receiver>,
    rng: StdRng,
}

impl Medium {
    pub fn new(radio: Radio, config: MediumConfig, positions: Vec<Position>, seed: u64) -> Self {
        let receivers = vec![Receiver::default(); positions.len()];
        Self {
            radio,
            config,
            positions,
            receivers,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn radio(&self) -> Radio {
        self.radio
    }

    /// `src` starts transmitting; returns every station that will hear it.
    ///
    /// A reception in progress at `src` is lost.
    pub fn start_tx(&mut self, now: Duration, src: usize, duration: Duration) -> Vec<Arrival> {
        if let Some(rx) = self.receivers.get_mut(src) {
            rx.transmitting_until = rx.transmitting_until.max(now + duration);
            if let Some(current) = rx.current.as_mut() {
                current.corrupted = true;
            }
        }

        let Some(origin) = self.positions.get(src).copied() else {
            return Vec::new();
        };
        self.positions
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != src)
            .filter_map(|(station, pos)| {
                let distance = origin.distance_to(pos);
                (distance <= self.config.range_m).then(|| Arrival {
                    station,
                    delay: Duration::from_secs_f64(distance / SPEED_OF_LIGHT),
                })
            })
            .collect()
    }

    /// The first bit of transmission `tx` reached `station`
    pub fn rx_start(&mut self, now: Duration, station: usize, tx: u64, duration: Duration) -> RxStart {
        let Some(rx) = self.receivers.get_mut(station) else {
            return RxStart::Deaf;
        };
        let busy = rx.signal_until > now;
        rx.signal_until = rx.signal_until.max(now + duration);

        if rx.transmitting_until > now {
            trace!("{} rx of tx{} at station {} lost: transmitting", self.radio, tx, station);
            return RxStart::Deaf;
        }
        if busy {
            if let Some(current) = rx.current.as_mut() {
                current.corrupted = true;
            }
            trace!("{} rx of tx{} at station {} overlaps", self.radio, tx, station);
            return RxStart::Overlap;
        }

        rx.current = Some(Reception {
            tx,
            corrupted: false,
        });
        RxStart::Locked
    }

    /// The last bit of transmission `tx` reached `station`.
    ///
    /// Returns `None` if the receiver was not locked onto `tx`.
    pub fn rx_end(&mut self, station: usize, tx: u64) -> Option<RxEnd> {
        let rx = self.receivers.get_mut(station)?;
        if !matches!(rx.current, Some(c) if c.tx == tx) {
            return None;
        }
        let current = rx.current.take()?;

        if current.corrupted {
            return Some(RxEnd::Corrupted);
        }
        if self.config.packet_error_rate > 0.0
            && self.rng.random::<f64>() < self.config.packet_error_rate
        {
            return Some(RxEnd::Error);
        }
        Some(RxEnd::Clean)
    }
}

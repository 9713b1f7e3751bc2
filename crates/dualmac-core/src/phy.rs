//! Airtime math for the OFDM PHY both radios use

use std::time::Duration;

use dualmac_frame::{ACK_SIZE, CTS_SIZE, RTS_SIZE};
use serde::{Deserialize, Serialize};

/// Timing parameters of an OFDM PHY mode
///
/// Defaults describe 802.11a at 6 Mb/s (BPSK 1/2, 24 data bits per symbol).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhyTiming {
    /// Slot time (µs)
    pub slot_us: u64,
    /// Short inter-frame space (µs)
    pub sifs_us: u64,
    /// PLCP preamble plus SIGNAL field (µs)
    pub preamble_us: u64,
    /// OFDM symbol duration (µs)
    pub symbol_us: u64,
    /// Data bits carried per OFDM symbol
    pub bits_per_symbol: u32,
    /// SERVICE field bits prepended to the PSDU
    pub service_bits: u32,
    /// Tail bits appended to the PSDU
    pub tail_bits: u32,
}

impl Default for PhyTiming {
    fn default() -> Self {
        Self {
            slot_us: 9,
            sifs_us: 16,
            preamble_us: 20,
            symbol_us: 4,
            bits_per_symbol: 24,
            service_bits: 16,
            tail_bits: 6,
        }
    }
}

impl PhyTiming {
    pub fn slot(&self) -> Duration {
        Duration::from_micros(self.slot_us)
    }

    pub fn sifs(&self) -> Duration {
        Duration::from_micros(self.sifs_us)
    }

    /// DIFS = SIFS + 2 slots
    pub fn difs(&self) -> Duration {
        self.sifs() + self.slot() * 2
    }

    /// Time on air for a PSDU of `bytes` bytes
    pub fn tx_duration(&self, bytes: usize) -> Duration {
        let bits = u64::from(self.service_bits) + 8 * bytes as u64 + u64::from(self.tail_bits);
        let symbols = bits.div_ceil(u64::from(self.bits_per_symbol.max(1)));
        Duration::from_micros(self.preamble_us + symbols * self.symbol_us)
    }

    pub fn ack_duration(&self) -> Duration {
        self.tx_duration(ACK_SIZE)
    }

    pub fn rts_duration(&self) -> Duration {
        self.tx_duration(RTS_SIZE)
    }

    pub fn cts_duration(&self) -> Duration {
        self.tx_duration(CTS_SIZE)
    }

    /// How long a sender waits after its frame ends before declaring the ACK lost
    pub fn ack_timeout(&self) -> Duration {
        self.sifs() + self.ack_duration() + self.slot()
    }
}

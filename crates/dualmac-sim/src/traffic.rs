//! Constant-interval traffic flows

use std::time::Duration;

use dualmac_frame::SeqTsHeader;
use serde::{Deserialize, Serialize};

/// One application flow between two stations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Index of the sending station
    pub src: u32,
    /// Index of the receiving station
    pub dst: u32,
    /// Application payload bytes per packet
    pub packet_size: usize,
    pub interval_us: u64,
    /// Number of packets; 0 sends until the run ends
    pub count: u32,
    pub start_us: u64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            src: 0,
            dst: 1,
            packet_size: 1024,
            interval_us: 1500,
            count: 10,
            start_us: 1000,
        }
    }
}

impl FlowConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_micros(self.interval_us)
    }

    pub fn start(&self) -> Duration {
        Duration::from_micros(self.start_us)
    }

    /// Whether packet `seq` is the last one the flow sends
    pub fn is_last(&self, seq: u32) -> bool {
        self.count != 0 && seq + 1 >= self.count
    }

    /// Payload for packet `seq`, stamped with its send time
    pub fn packet(&self, seq: u32, now: Duration) -> Vec<u8> {
        SeqTsHeader::new(seq, now).payload(self.packet_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_carries_sequence_and_time() {
        let flow = FlowConfig::default();
        let payload = flow.packet(3, Duration::from_micros(42));

        assert_eq!(payload.len(), 1024);
        let hdr = SeqTsHeader::decode(&payload).unwrap();
        assert_eq!(hdr.seq, 3);
        assert_eq!(hdr.sent_at, Duration::from_micros(42));
    }

    #[test]
    fn test_last_packet() {
        let flow = FlowConfig {
            count: 2,
            ..Default::default()
        };
        assert!(!flow.is_last(0));
        assert!(flow.is_last(1));

        let endless = FlowConfig {
            count: 0,
            ..Default::default()
        };
        assert!(!endless.is_last(1_000_000));
    }
}

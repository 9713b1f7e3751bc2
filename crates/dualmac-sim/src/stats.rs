//! Flow, station and channel statistics

use std::collections::BTreeSet;
use std::time::Duration;

use dualmac_core::{MacNotice, Radio};
use dualmac_frame::{FrameKind, SeqTsHeader};
use serde::Serialize;

pub(crate) fn radio_index(radio: Radio) -> usize {
    match radio {
        Radio::Control => 0,
        Radio::Data => 1,
    }
}

/// Receiver-side accounting for one flow
#[derive(Debug, Clone, Default)]
pub struct FlowStats {
    pub tx_packets: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub rx_bytes: u64,
    /// Deliveries of a sequence number already received
    pub duplicates: u64,
    delay_sum: Duration,
    first_rx: Option<Duration>,
    last_rx: Option<Duration>,
    received: BTreeSet<u32>,
}

impl FlowStats {
    pub fn record_tx(&mut self, bytes: usize) {
        self.tx_packets += 1;
        self.tx_bytes += bytes as u64;
    }

    pub fn record_rx(&mut self, now: Duration, header: &SeqTsHeader, bytes: usize) {
        if !self.received.insert(header.seq) {
            self.duplicates += 1;
            return;
        }
        self.rx_packets += 1;
        self.rx_bytes += bytes as u64;
        self.delay_sum += now.saturating_sub(header.sent_at);
        self.first_rx.get_or_insert(now);
        self.last_rx = Some(now);
    }

    /// Packets sent but never delivered
    pub fn lost_packets(&self) -> u64 {
        self.tx_packets.saturating_sub(self.rx_packets)
    }

    /// Highest sequence number delivered so far
    pub fn last_seq(&self) -> Option<u32> {
        self.received.last().copied()
    }

    pub fn mean_delay(&self) -> Option<Duration> {
        let n = u32::try_from(self.rx_packets).ok().filter(|n| *n > 0)?;
        Some(self.delay_sum / n)
    }

    /// Received application throughput between first and last delivery
    pub fn throughput_mbps(&self) -> f64 {
        match (self.first_rx, self.last_rx) {
            (Some(first), Some(last)) if last > first => {
                (self.rx_bytes * 8) as f64 / (last - first).as_secs_f64() / 1e6
            }
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StationStats {
    pub tx_ok: u64,
    pub tx_failed: u64,
    pub preemptive_rts: u64,
    pub arbitration_lost: u64,
    pub cts_rejected: u64,
    pub dropped: u64,
}

impl StationStats {
    pub fn record_notice(&mut self, notice: &MacNotice) {
        match notice {
            MacNotice::PreemptiveRts { .. } => self.preemptive_rts += 1,
            MacNotice::ArbitrationLost => self.arbitration_lost += 1,
            MacNotice::CtsRejected { .. } => self.cts_rejected += 1,
            MacNotice::Dropped { .. } => self.dropped += 1,
            MacNotice::CtsIssued { .. } | MacNotice::CtsAccepted { .. } => {}
        }
    }
}

/// Frames started on one channel, by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    pub rts: u64,
    pub cts: u64,
    pub data: u64,
    pub ack: u64,
    pub mgmt: u64,
    /// Receptions lost at some receiver
    pub corrupted: u64,
}

impl ChannelStats {
    pub fn count(&mut self, kind: FrameKind) {
        *self.slot(kind) += 1;
    }

    pub fn frames(&self, kind: FrameKind) -> u64 {
        match kind {
            FrameKind::Rts => self.rts,
            FrameKind::Cts => self.cts,
            FrameKind::Data => self.data,
            FrameKind::Ack => self.ack,
            FrameKind::Mgmt => self.mgmt,
        }
    }

    fn slot(&mut self, kind: FrameKind) -> &mut u64 {
        match kind {
            FrameKind::Rts => &mut self.rts,
            FrameKind::Cts => &mut self.cts,
            FrameKind::Data => &mut self.data,
            FrameKind::Ack => &mut self.ack,
            FrameKind::Mgmt => &mut self.mgmt,
        }
    }
}

/// Everything counted during a run
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub flows: Vec<FlowStats>,
    pub stations: Vec<StationStats>,
    channels: [ChannelStats; 2],
}

impl Statistics {
    pub fn new(flows: usize, stations: usize) -> Self {
        Self {
            flows: vec![FlowStats::default(); flows],
            stations: vec![StationStats::default(); stations],
            channels: Default::default(),
        }
    }

    pub fn channel(&self, radio: Radio) -> &ChannelStats {
        &self.channels[radio_index(radio)]
    }

    pub fn channel_mut(&mut self, radio: Radio) -> &mut ChannelStats {
        &mut self.channels[radio_index(radio)]
    }
}

/// Per-flow line of a run summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowReport {
    pub flow: usize,
    pub src: u32,
    pub dst: u32,
    pub tx_packets: u64,
    pub rx_packets: u64,
    pub lost_packets: u64,
    pub duplicates: u64,
    pub mean_delay_us: Option<f64>,
    pub throughput_mbps: f64,
}

/// Outcome of [`crate::World::run_until`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub ended_at_us: u64,
    pub events: u64,
    pub flows: Vec<FlowReport>,
    pub stations: Vec<StationStats>,
    pub control: ChannelStats,
    pub data: ChannelStats,
}

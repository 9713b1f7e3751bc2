//! Ordered log of what happened during a run

use std::time::Duration;

use dualmac_core::{MacNotice, Radio, StationId};
use dualmac_frame::{FrameKind, MacAddress, MacHeader};

#[derive(Debug, Clone, PartialEq)]
pub enum TraceKind {
    TxStart {
        radio: Radio,
        header: MacHeader,
        duration: Duration,
    },
    RxOk {
        radio: Radio,
        header: MacHeader,
    },
    /// Lost to overlap, half-duplex or packet error
    RxCorrupted {
        radio: Radio,
        header: MacHeader,
    },
    Delivered {
        from: MacAddress,
        bytes: usize,
    },
    TxOk {
        radio: Radio,
        header: MacHeader,
    },
    TxFailed {
        radio: Radio,
        header: MacHeader,
    },
    Notice(MacNotice),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceEvent {
    pub at: Duration,
    pub station: StationId,
    pub kind: TraceKind,
}

impl TraceEvent {
    /// Header of a transmission started on `radio`, if this is one
    pub fn tx_start(&self, radio: Radio) -> Option<&MacHeader> {
        match &self.kind {
            TraceKind::TxStart {
                radio: r, header, ..
            } if *r == radio => Some(header),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Trace {
    events: Vec<TraceEvent>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, at: Duration, station: StationId, kind: TraceKind) {
        self.events.push(TraceEvent { at, station, kind });
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Transmissions of `kind` started on `radio`
    pub fn transmissions(&self, radio: Radio, kind: FrameKind) -> impl Iterator<Item = &TraceEvent> {
        self.events
            .iter()
            .filter(move |e| e.tx_start(radio).is_some_and(|h| h.kind == kind))
    }

    pub fn notices(&self) -> impl Iterator<Item = (&TraceEvent, &MacNotice)> {
        self.events.iter().filter_map(|e| match &e.kind {
            TraceKind::Notice(n) => Some((e, n)),
            _ => None,
        })
    }
}

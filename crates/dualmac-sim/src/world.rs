//! Simulation world
//!
//! Owns the stations, one medium per channel, one contention manager per
//! station radio and the event scheduler. Stations never see each other:
//! everything they want done comes back as [`MacAction`]s, which the world
//! turns into scheduled events.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use dualmac_core::{
    Bridge, Directory, DualStation, MacAction, MacError, Position, Radio, RtsArbiter, StationId,
    Timer, TimerSlot,
};
use dualmac_frame::{Frame, MacAddress, SeqTsHeader};
use tracing::{debug, error, info, trace, warn};

use crate::dcf::{Contention, RequestOutcome};
use crate::error::SimError;
use crate::medium::{Medium, RxEnd, RxStart};
use crate::scenario::SimConfig;
use crate::scheduler::{EventId, Scheduler};
use crate::stats::{radio_index, FlowReport, RunSummary, Statistics};
use crate::trace::{Trace, TraceKind};

/// Everything the scheduler can hold
#[derive(Debug, Clone)]
pub enum SimEvent {
    /// Flow `flow` generates packet `seq`
    Packet { flow: usize, seq: u32 },
    /// A pending access request may be due
    AccessCheck { station: usize, radio: Radio },
    RxStart {
        station: usize,
        radio: Radio,
        tx: u64,
        frame: Frame,
        duration: Duration,
    },
    RxEnd {
        station: usize,
        radio: Radio,
        tx: u64,
        frame: Frame,
    },
    TxEnd { station: usize, radio: Radio },
    Timer {
        station: usize,
        radio: Radio,
        timer: Timer,
    },
}

pub struct World {
    config: SimConfig,
    bridge: Bridge,
    stations: Vec<DualStation>,
    mediums: [Medium; 2],
    contention: Vec<[Contention; 2]>,
    scheduler: Scheduler<SimEvent>,
    /// Pending MAC timers; setting a timer replaces the one in its slot
    timers: HashMap<(usize, Radio, TimerSlot), EventId>,
    access_checks: HashMap<(usize, Radio), EventId>,
    trace: Trace,
    stats: Statistics,
    next_tx: u64,
    events: u64,
}

fn station_id(index: usize) -> StationId {
    StationId(index as u32)
}

impl World {
    /// Build every station and start their initial backoffs at time zero
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;

        let mut directory = Directory::new();
        for spec in &config.stations {
            directory.add_station(spec.position);
        }
        let bridge = Bridge::new(Arc::new(directory));
        let arbiter = RtsArbiter::shared();

        let stations = bridge
            .directory()
            .stations()
            .map(|entry| {
                DualStation::new(
                    entry.id,
                    &config.mac,
                    bridge.clone(),
                    Arc::clone(&arbiter),
                    config
                        .seed
                        .wrapping_mul(1_000)
                        .wrapping_add(u64::from(entry.id.0)),
                )
            })
            .collect::<Result<Vec<_>, MacError>>()?;

        let positions: Vec<Position> = config.stations.iter().map(|s| s.position).collect();
        let mediums = [
            Medium::new(
                Radio::Control,
                config.medium,
                positions.clone(),
                config.seed ^ 0xC0,
            ),
            Medium::new(Radio::Data, config.medium, positions, config.seed ^ 0xDA),
        ];
        let contention = (0..stations.len())
            .map(|_| {
                [
                    Contention::new(&config.mac.phy),
                    Contention::new(&config.mac.phy),
                ]
            })
            .collect();

        let mut scheduler = Scheduler::new();
        for (flow, cfg) in config.flows.iter().enumerate() {
            scheduler.schedule_at(cfg.start(), SimEvent::Packet { flow, seq: 0 })?;
        }

        info!(
            "world: {} stations, {} flows, RTS threshold {:?}",
            stations.len(),
            config.flows.len(),
            config.mac.rts_threshold
        );

        let stats = Statistics::new(config.flows.len(), stations.len());
        let mut world = Self {
            config,
            bridge,
            stations,
            mediums,
            contention,
            scheduler,
            timers: HashMap::new(),
            access_checks: HashMap::new(),
            trace: Trace::new(),
            stats,
            next_tx: 0,
            events: 0,
        };
        for station in 0..world.stations.len() {
            world.with_station(station, |s, now| s.start(now))?;
        }
        Ok(world)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn station(&self, index: usize) -> Option<&DualStation> {
        self.stations.get(index)
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    // -------------------------------------------------------------------------
    // Run loop
    // -------------------------------------------------------------------------

    /// Run for the configured duration
    pub fn run(&mut self) -> Result<RunSummary, SimError> {
        self.run_until(self.config.duration())
    }

    /// Process events up to and including `end`
    pub fn run_until(&mut self, end: Duration) -> Result<RunSummary, SimError> {
        while let Some(at) = self.scheduler.peek_time() {
            if at > end {
                break;
            }
            let Some((_, event)) = self.scheduler.pop() else {
                break;
            };
            self.events += 1;
            if let Err(e) = self.handle(event) {
                error!("run aborted at {:?}: {}", at, e);
                return Err(e);
            }
        }

        let summary = self.summary(end);
        info!(
            "run finished at {:?} after {} events",
            end, summary.events
        );
        Ok(summary)
    }

    fn handle(&mut self, event: SimEvent) -> Result<(), SimError> {
        let now = self.now();
        match event {
            SimEvent::Packet { flow, seq } => self.generate_packet(flow, seq),
            SimEvent::AccessCheck { station, radio } => {
                self.access_checks.remove(&(station, radio));
                if self.contention[station][radio_index(radio)].try_grant(now) {
                    trace!("{} {} access granted", station_id(station), radio);
                    self.with_station(station, |s, now| s.access_granted(now, radio))?;
                }
                self.reschedule_access(station, radio)
            }
            SimEvent::RxStart {
                station,
                radio,
                tx,
                frame,
                duration,
            } => self.rx_start(station, radio, tx, frame, duration),
            SimEvent::RxEnd {
                station,
                radio,
                tx,
                frame,
            } => self.rx_end(station, radio, tx, frame),
            SimEvent::TxEnd { station, radio } => {
                self.with_station(station, |s, now| s.tx_end(now, radio))
            }
            SimEvent::Timer {
                station,
                radio,
                timer,
            } => {
                self.timers.remove(&(station, radio, timer.slot()));
                self.with_station(station, |s, now| s.timer_fired(now, radio, timer))
            }
        }
    }

    fn generate_packet(&mut self, flow: usize, seq: u32) -> Result<(), SimError> {
        let now = self.now();
        let Some(cfg) = self.config.flows.get(flow).cloned() else {
            return Ok(());
        };

        let payload = cfg.packet(seq, now);
        self.stats.flows[flow].record_tx(payload.len());
        let to = self
            .bridge
            .directory()
            .entry(StationId(cfg.dst))?
            .addresses
            .data;
        debug!("flow {} packet {} at {:?}", flow, seq, now);
        self.with_station(cfg.src as usize, |s, now| s.enqueue(now, to, payload))?;

        if !cfg.is_last(seq) {
            self.scheduler
                .schedule_after(cfg.interval(), SimEvent::Packet { flow, seq: seq + 1 });
        }
        Ok(())
    }

    fn rx_start(
        &mut self,
        station: usize,
        radio: Radio,
        tx: u64,
        frame: Frame,
        duration: Duration,
    ) -> Result<(), SimError> {
        let now = self.now();
        let ri = radio_index(radio);
        let outcome = self.mediums[ri].rx_start(now, station, tx, duration);
        self.contention[station][ri].notify_busy(now, now + duration);

        if outcome == RxStart::Locked {
            self.with_station(station, |s, now| {
                s.notify_rx_start(now, radio, duration, &frame)
            })?;
            self.scheduler.schedule_after(
                duration,
                SimEvent::RxEnd {
                    station,
                    radio,
                    tx,
                    frame,
                },
            );
        } else {
            self.record_loss(station, radio, frame);
        }
        self.reschedule_access(station, radio)
    }

    fn rx_end(&mut self, station: usize, radio: Radio, tx: u64, frame: Frame) -> Result<(), SimError> {
        match self.mediums[radio_index(radio)].rx_end(station, tx) {
            Some(RxEnd::Clean) => {
                self.trace.record(
                    self.now(),
                    station_id(station),
                    TraceKind::RxOk {
                        radio,
                        header: frame.header.clone(),
                    },
                );
                self.with_station(station, |s, now| s.receive(now, radio, frame))
            }
            Some(RxEnd::Corrupted | RxEnd::Error) => {
                self.record_loss(station, radio, frame);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn record_loss(&mut self, station: usize, radio: Radio, frame: Frame) {
        trace!("{} lost {} on {}", station_id(station), frame.header, radio);
        self.stats.channel_mut(radio).corrupted += 1;
        self.trace.record(
            self.now(),
            station_id(station),
            TraceKind::RxCorrupted {
                radio,
                header: frame.header,
            },
        );
    }

    // -------------------------------------------------------------------------
    // MAC actions
    // -------------------------------------------------------------------------

    /// Call into one station and carry out the actions it produced
    fn with_station<F>(&mut self, station: usize, f: F) -> Result<(), SimError>
    where
        F: FnOnce(&mut DualStation, Duration) -> Result<(), MacError>,
    {
        let now = self.now();
        let Some(s) = self.stations.get_mut(station) else {
            return Err(MacError::UnknownStation(station_id(station)).into());
        };
        f(s, now)?;
        let actions = s.drain_actions();
        self.apply(station, actions)
    }

    fn apply(&mut self, station: usize, actions: Vec<MacAction>) -> Result<(), SimError> {
        let now = self.now();
        let id = station_id(station);
        let mut pending: VecDeque<MacAction> = actions.into();

        while let Some(action) = pending.pop_front() {
            match action {
                MacAction::Transmit {
                    radio,
                    frame,
                    duration,
                } => self.transmit(station, radio, frame, duration)?,
                MacAction::RequestAccess { radio } => {
                    let outcome = self.contention[station][radio_index(radio)].request_access(now);
                    if outcome == RequestOutcome::Collision {
                        trace!("{} {} request while busy", id, radio);
                        self.stations[station].collision(now, radio)?;
                        pending.extend(self.stations[station].drain_actions());
                    }
                    self.reschedule_access(station, radio)?;
                }
                MacAction::StartBackoff { radio, slots } => {
                    self.contention[station][radio_index(radio)].start_backoff(now, slots);
                    self.reschedule_access(station, radio)?;
                }
                MacAction::NavStart { radio, duration } => {
                    self.contention[station][radio_index(radio)].notify_nav(now, now + duration);
                    self.reschedule_access(station, radio)?;
                }
                MacAction::SetTimer {
                    radio,
                    timer,
                    delay,
                } => {
                    let key = (station, radio, timer.slot());
                    if let Some(old) = self.timers.remove(&key) {
                        self.scheduler.cancel(old);
                    }
                    let event = self.scheduler.schedule_after(
                        delay,
                        SimEvent::Timer {
                            station,
                            radio,
                            timer,
                        },
                    );
                    self.timers.insert(key, event);
                }
                MacAction::CancelTimer { radio, slot } => {
                    if let Some(old) = self.timers.remove(&(station, radio, slot)) {
                        self.scheduler.cancel(old);
                    }
                }
                MacAction::Deliver { from, payload } => self.deliver(station, from, payload),
                MacAction::TxOk { radio, header } => {
                    self.stats.stations[station].tx_ok += 1;
                    self.trace.record(now, id, TraceKind::TxOk { radio, header });
                }
                MacAction::TxFailed { radio, header } => {
                    self.stats.stations[station].tx_failed += 1;
                    self.trace
                        .record(now, id, TraceKind::TxFailed { radio, header });
                }
                MacAction::Notice(notice) => {
                    self.stats.stations[station].record_notice(&notice);
                    self.trace.record(now, id, TraceKind::Notice(notice));
                }
                MacAction::SendByControlChannel(frame) | MacAction::NotifyDataChannel(frame) => {
                    warn!("{} cross-channel action escaped the station: {}", id, frame.header);
                }
            }
        }
        Ok(())
    }

    fn transmit(
        &mut self,
        station: usize,
        radio: Radio,
        frame: Frame,
        duration: Duration,
    ) -> Result<(), SimError> {
        let now = self.now();
        let ri = radio_index(radio);
        let tx = self.next_tx;
        self.next_tx += 1;

        self.contention[station][ri].notify_busy(now, now + duration);
        self.stats.channel_mut(radio).count(frame.header.kind);
        self.trace.record(
            now,
            station_id(station),
            TraceKind::TxStart {
                radio,
                header: frame.header.clone(),
                duration,
            },
        );

        for arrival in self.mediums[ri].start_tx(now, station, duration) {
            self.scheduler.schedule_after(
                arrival.delay,
                SimEvent::RxStart {
                    station: arrival.station,
                    radio,
                    tx,
                    frame: frame.clone(),
                    duration,
                },
            );
        }
        self.scheduler
            .schedule_after(duration, SimEvent::TxEnd { station, radio });
        self.reschedule_access(station, radio)
    }

    fn deliver(&mut self, station: usize, from: MacAddress, payload: Vec<u8>) {
        let now = self.now();
        self.trace.record(
            now,
            station_id(station),
            TraceKind::Delivered {
                from,
                bytes: payload.len(),
            },
        );

        let src = match self.bridge.directory().resolve(from) {
            Ok((src, _)) => src,
            Err(e) => {
                warn!("delivery at {} from unknown sender: {}", station_id(station), e);
                return;
            }
        };
        let header = match SeqTsHeader::decode(&payload) {
            Ok(header) => header,
            Err(e) => {
                debug!("delivery without application header: {}", e);
                return;
            }
        };

        let flow = self
            .config
            .flows
            .iter()
            .position(|f| f.src == src.0 && f.dst as usize == station);
        match flow {
            Some(flow) => self.stats.flows[flow].record_rx(now, &header, payload.len()),
            None => debug!("delivery {} -> {} matches no flow", src, station_id(station)),
        }
    }

    /// Move the access check of one radio to its new grant time
    fn reschedule_access(&mut self, station: usize, radio: Radio) -> Result<(), SimError> {
        let now = self.now();
        if let Some(old) = self.access_checks.remove(&(station, radio)) {
            self.scheduler.cancel(old);
        }
        if let Some(at) = self.contention[station][radio_index(radio)].next_grant_time(now) {
            let event = self
                .scheduler
                .schedule_at(at, SimEvent::AccessCheck { station, radio })?;
            self.access_checks.insert((station, radio), event);
        }
        Ok(())
    }

    fn summary(&self, end: Duration) -> RunSummary {
        let flows = self
            .config
            .flows
            .iter()
            .zip(&self.stats.flows)
            .enumerate()
            .map(|(flow, (cfg, stats))| FlowReport {
                flow,
                src: cfg.src,
                dst: cfg.dst,
                tx_packets: stats.tx_packets,
                rx_packets: stats.rx_packets,
                lost_packets: stats.lost_packets(),
                duplicates: stats.duplicates,
                mean_delay_us: stats.mean_delay().map(|d| d.as_secs_f64() * 1e6),
                throughput_mbps: stats.throughput_mbps(),
            })
            .collect();

        RunSummary {
            ended_at_us: end.as_micros() as u64,
            events: self.events,
            flows,
            stations: self.stats.stations.clone(),
            control: *self.stats.channel(Radio::Control),
            data: *self.stats.channel(Radio::Data),
        }
    }
}

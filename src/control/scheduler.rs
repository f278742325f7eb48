//! Fixed-cadence tick orchestrator (spec.md §4.7). Owns the one state
//! bundle the engine exposes: topology, trains, reservations, tick index
//! (spec.md §9 "global state").

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{error, info_span, warn};

use crate::control::errors::{EngineError, Outcome, SpawnRejectReason, SwitchRejectReason};
use crate::control::messages::{
    Command, ConnectionSnapshot, Snapshot, TrainSnapshot, WagonSnapshot,
};
use crate::control::rail_system::reservation::ReservationTable;
use crate::control::rail_system::signaling;
use crate::control::rail_system::topology::Topology;
use crate::control::rail_system::{kinematics, router::Router};
use crate::control::train::{Train, TrainStatus, TrainType};
use crate::general::{Heading, SectionId, TrainId, TrainTypeId, BLOCK_GRACE, DEFAULT_DWELL, MAX_WAGONS};

/// A command paired with an optional reply channel; the engine returns an
/// [`Outcome`] for every inbound command (spec.md §6).
#[derive(Debug)]
pub struct CommandEnvelope {
    pub command: Command,
    pub reply: Option<oneshot::Sender<Outcome>>,
}

impl CommandEnvelope {
    pub fn fire_and_forget(command: Command) -> Self {
        CommandEnvelope { command, reply: None }
    }
}

/// The owned engine state bundle and tick loop.
pub struct Scheduler {
    topology: Topology,
    train_types: HashMap<TrainTypeId, TrainType>,
    trains: Vec<Train>,
    reservation: ReservationTable,
    router: Router,
    tick_index: u64,
    sim_time_seconds: f64,
    tick_rate_hz: f64,
    speed_multiplier: f64,
    paused: bool,
    shutdown: bool,
    command_rx: mpsc::Receiver<CommandEnvelope>,
    snapshot_tx: broadcast::Sender<Snapshot>,
}

impl Scheduler {
    pub fn new(
        topology: Topology,
        train_types: HashMap<TrainTypeId, TrainType>,
        tick_rate_hz: f64,
        command_rx: mpsc::Receiver<CommandEnvelope>,
        snapshot_tx: broadcast::Sender<Snapshot>,
    ) -> Self {
        let reservation = ReservationTable::new(topology.section_index_bound());
        Scheduler {
            topology,
            train_types,
            trains: Vec::new(),
            reservation,
            router: Router::new(),
            tick_index: 0,
            sim_time_seconds: 0.0,
            tick_rate_hz,
            speed_multiplier: 1.0,
            paused: false,
            shutdown: false,
            command_rx,
            snapshot_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Snapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn set_speed_multiplier(&mut self, multiplier: f64) {
        self.speed_multiplier = multiplier;
    }

    fn dt_seconds(&self) -> f64 {
        self.speed_multiplier / self.tick_rate_hz
    }

    /// Runs the tick loop until a `Shutdown` command is drained. Sleeps
    /// between ticks to maintain cadence; no operation inside a tick
    /// blocks on I/O (spec.md §5).
    pub async fn run(mut self) {
        let period = Duration::from_secs_f64(1.0 / self.tick_rate_hz);
        loop {
            let keep_going = self.tick();
            if !keep_going {
                break;
            }
            tokio::time::sleep(period).await;
        }
    }

    /// Runs exactly one tick. Returns `false` once a shutdown has been
    /// processed and the final snapshot emitted.
    pub fn tick(&mut self) -> bool {
        let span = info_span!("tick", tick_index = self.tick_index);
        let _enter = span.enter();

        self.drain_commands();

        if self.shutdown {
            self.publish_snapshot();
            return false;
        }

        if self.paused {
            return true;
        }

        self.trains
            .sort_by(|a, b| b.priority_index().cmp(&a.priority_index()).then(a.id.0.cmp(&b.id.0)));

        let dt = self.dt_seconds();
        self.sim_time_seconds += dt;

        for idx in 0..self.trains.len() {
            self.update_train_plan(idx, dt);
        }

        let decisions = signaling::evaluate(&mut self.trains, &self.topology, &self.reservation, dt);

        for train in self.trains.iter_mut() {
            let admitted = decisions.get(&train.id).copied().unwrap_or(true);
            if let Err(e) = kinematics::advance_train(train, dt, &self.topology, &mut self.reservation, admitted) {
                error!(error = %e, train_id = train.id.0, "invariant violated");
            }
        }

        self.trains.retain(|t| !matches!(t.status, TrainStatus::Despawned));

        self.publish_snapshot();
        self.tick_index += 1;
        true
    }

    fn drain_commands(&mut self) {
        while let Ok(envelope) = self.command_rx.try_recv() {
            let outcome = self.handle_command(envelope.command);
            if let Some(reply) = envelope.reply {
                let _ = reply.send(outcome);
            }
        }
    }

    fn handle_command(&mut self, command: Command) -> Outcome {
        match command {
            Command::Spawn {
                train_id,
                code,
                type_id,
                entry_section,
                num_wagons,
                desired_stop,
            } => self.handle_spawn(train_id, code, type_id, entry_section, num_wagons, desired_stop),
            Command::SetConnectionActive { from, to, active } => self.handle_switch(from, to, active),
            Command::ClearAll => {
                for train in self.trains.drain(..) {
                    for wagon in &train.wagons {
                        self.reservation.release(train.id, wagon.section, &self.topology);
                    }
                }
                Outcome::Ok
            }
            Command::PauseSimulation => {
                self.paused = true;
                Outcome::Ok
            }
            Command::ResumeSimulation => {
                self.paused = false;
                Outcome::Ok
            }
            Command::Shutdown => {
                self.shutdown = true;
                Outcome::Ok
            }
        }
    }

    fn handle_spawn(
        &mut self,
        train_id: TrainId,
        code: String,
        type_id: TrainTypeId,
        entry_section: SectionId,
        num_wagons: usize,
        desired_stop: Option<crate::general::StopId>,
    ) -> Outcome {
        if self.trains.iter().any(|t| t.id == train_id) {
            return Outcome::Rejected(EngineError::SpawnRejected(SpawnRejectReason::DuplicateTrainId));
        }
        if num_wagons == 0 || num_wagons > MAX_WAGONS {
            return Outcome::Rejected(EngineError::SpawnRejected(SpawnRejectReason::InvalidWagonCount));
        }
        if !self.topology.is_spawn(entry_section) {
            return Outcome::Rejected(EngineError::SpawnRejected(SpawnRejectReason::NotASpawnSection));
        }
        let Some(&train_type) = self.train_types.get(&type_id) else {
            return Outcome::Rejected(EngineError::SpawnRejected(SpawnRejectReason::UnknownTrainType));
        };
        if let Some(stop_id) = desired_stop {
            if self.topology.stop(stop_id).is_none() {
                return Outcome::Rejected(EngineError::SpawnRejected(SpawnRejectReason::UnknownStop));
            }
        }

        let target = match desired_stop.and_then(|s| self.topology.stop(s)).map(|s| s.section) {
            Some(section) => section,
            None => match self.nearest_despawn(entry_section) {
                Some(section) => section,
                None => return Outcome::Rejected(EngineError::SpawnRejected(SpawnRejectReason::NoReachableTarget)),
            },
        };

        let route = match self
            .router
            .find_route(&self.topology, entry_section, None, Heading::Forward, target)
        {
            Ok(route) => route,
            Err(e) => return Outcome::Rejected(e),
        };

        if route.len() < num_wagons {
            return Outcome::Rejected(EngineError::SpawnRejected(SpawnRejectReason::EntryOccupied));
        }

        for &section in route.iter().take(num_wagons) {
            if self.reservation.peek(section).is_some() {
                return Outcome::Rejected(EngineError::SpawnRejected(SpawnRejectReason::EntryOccupied));
            }
        }
        if let Some(block) = self.topology.block_of(entry_section) {
            if self.reservation.peek_block(block).is_some() {
                return Outcome::Rejected(EngineError::SpawnRejected(SpawnRejectReason::EntryBlockHeld));
            }
        }

        let route_queue: VecDeque<SectionId> = route.into_iter().collect();
        let Some(mut train) = Train::spawn(
            train_id,
            code,
            train_type,
            desired_stop,
            Heading::Forward,
            route_queue,
            num_wagons,
            target,
        ) else {
            return Outcome::Rejected(EngineError::SpawnRejected(SpawnRejectReason::InvalidWagonCount));
        };

        for wagon in &train.wagons {
            if !self.reservation.try_reserve(train_id, wagon.section, &self.topology) {
                for already in &train.wagons {
                    if already.section == wagon.section {
                        break;
                    }
                    self.reservation.release(train_id, already.section, &self.topology);
                }
                return Outcome::Rejected(EngineError::SpawnRejected(SpawnRejectReason::EntryOccupied));
            }
        }

        train.status = TrainStatus::Moving;
        self.trains.push(train);
        Outcome::Ok
    }

    fn handle_switch(&mut self, from: SectionId, to: SectionId, active: bool) -> Outcome {
        if self.reservation.peek(from).is_some() || self.reservation.peek(to).is_some() {
            return Outcome::Rejected(EngineError::SwitchRejected(SwitchRejectReason::SwitchOccupied));
        }
        match self.topology.set_connection_active(from, to, active) {
            Ok(()) => Outcome::Ok,
            Err(_) => Outcome::Rejected(EngineError::UnknownSection(to)),
        }
    }

    fn nearest_despawn(&self, from: SectionId) -> Option<SectionId> {
        self.topology
            .despawn_sections()
            .filter_map(|despawn| {
                self.router
                    .find_route(&self.topology, from, None, Heading::Forward, despawn)
                    .ok()
                    .map(|route| (despawn, route.len()))
            })
            .min_by_key(|(_, len)| *len)
            .map(|(section, _)| section)
    }

    fn plan_invalid(&self, idx: usize) -> bool {
        let train = &self.trains[idx];
        match train.next_target() {
            Some(next) => !self
                .topology
                .neighbors(train.head_section(), train.previous_block)
                .into_iter()
                .any(|n| n.section == next),
            None => false,
        }
    }

    fn replan(&mut self, idx: usize, target: SectionId) {
        self.trains[idx].set_target(target);
        let head = self.trains[idx].head_section();
        let previous_block = self.trains[idx].previous_block;
        let heading = self.trains[idx].heading;

        match self.router.find_route(&self.topology, head, previous_block, heading, target) {
            Ok(route) => {
                let mut plan: VecDeque<SectionId> = route.into_iter().collect();
                plan.pop_front();
                self.trains[idx].set_plan(plan);
                if matches!(self.trains[idx].status, TrainStatus::Stuck) {
                    self.trains[idx].status = TrainStatus::Moving;
                }
            }
            Err(_) => {
                self.trains[idx].status = TrainStatus::Stuck;
            }
        }
    }

    fn update_train_plan(&mut self, idx: usize, dt_seconds: f64) {
        match self.trains[idx].status {
            TrainStatus::Dwelling => {
                if self.trains[idx].tick_dwell(Duration::from_secs_f64(dt_seconds)) {
                    let head = self.trains[idx].head_section();
                    match self.nearest_despawn(head) {
                        Some(target) => {
                            self.trains[idx].desired_stop = None;
                            self.replan(idx, target);
                            self.trains[idx].status = TrainStatus::Moving;
                        }
                        None => {
                            self.trains[idx].status = TrainStatus::Stuck;
                        }
                    }
                }
            }
            TrainStatus::Moving => {
                self.maybe_start_dwell(idx);
                if matches!(self.trains[idx].status, TrainStatus::Dwelling) {
                    return;
                }
                let needs_replan = self.plan_invalid(idx) || self.trains[idx].is_past_grace(BLOCK_GRACE);
                if needs_replan {
                    let target = self.trains[idx].target;
                    self.replan(idx, target);
                }
            }
            TrainStatus::Stuck => {
                let target = self.trains[idx].target;
                self.replan(idx, target);
            }
            TrainStatus::Scheduled | TrainStatus::Despawned => {}
        }
    }

    /// Dwell starts exactly once, the tick the head arrives at its desired
    /// stop's section from the mandated approach side (spec.md §4.6). A
    /// wrong-side arrival never dwells; the train is redirected to the
    /// nearest despawn section and keeps transiting instead of retrying.
    fn maybe_start_dwell(&mut self, idx: usize) {
        let train = &self.trains[idx];
        let Some(stop_id) = train.desired_stop else {
            return;
        };
        let Some(stop) = self.topology.stop(stop_id) else {
            return;
        };
        if train.head_section() != stop.section {
            return;
        }
        let approach_ok = train
            .previous_section
            .map(|prev| signaling::approach_matches(prev, train.head_section(), stop.approach))
            .unwrap_or(true);
        if approach_ok {
            self.trains[idx].start_dwell(DEFAULT_DWELL);
            return;
        }

        let head = train.head_section();
        self.trains[idx].desired_stop = None;
        match self.nearest_despawn(head) {
            Some(target) => self.replan(idx, target),
            None => self.trains[idx].status = TrainStatus::Stuck,
        }
    }

    fn publish_snapshot(&self) {
        let trains = self
            .trains
            .iter()
            .map(|t| TrainSnapshot {
                train_id: t.id,
                code: t.code.clone(),
                status: t.status,
                head_section: t.head_section(),
                heading: t.heading,
                desired_stop: t.desired_stop,
            })
            .collect();

        let wagons = self
            .trains
            .iter()
            .flat_map(|t| {
                t.wagons.iter().enumerate().map(move |(i, w)| WagonSnapshot {
                    train_id: t.id,
                    wagon_index: i,
                    section: w.section,
                    position_offset: w.position_offset,
                })
            })
            .collect();

        let connections = self
            .topology
            .connections()
            .map(|c| ConnectionSnapshot {
                from: c.from,
                to: c.to,
                active: c.active,
            })
            .collect();

        let snapshot = Snapshot {
            tick_index: self.tick_index,
            sim_time_seconds: self.sim_time_seconds,
            trains,
            wagons,
            connections,
        };

        if self.snapshot_tx.send(snapshot).is_err() {
            warn!("no snapshot subscribers currently connected");
        }
    }

    pub fn trains(&self) -> &[Train] {
        &self.trains
    }

    pub fn reservation(&self) -> &ReservationTable {
        &self.reservation
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn tick_index(&self) -> u64 {
        self.tick_index
    }
}

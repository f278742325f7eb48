//! Inbound commands and outbound snapshots — the engine's only boundary
//! types (spec.md §6). Wire formats are a host concern; these are plain
//! Rust values crossing an in-process queue.

use crate::control::train::TrainStatus;
use crate::general::{Heading, SectionId, StopId, TrainId, TrainTypeId};

/// A tagged inbound record, drained by the scheduler at step 1 of each
/// tick (spec.md §4.7, §5).
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Spawn {
        train_id: TrainId,
        code: String,
        type_id: TrainTypeId,
        entry_section: SectionId,
        num_wagons: usize,
        desired_stop: Option<StopId>,
    },
    SetConnectionActive {
        from: SectionId,
        to: SectionId,
        active: bool,
    },
    ClearAll,
    PauseSimulation,
    ResumeSimulation,
    Shutdown,
}

/// State of one wagon at the moment a snapshot was taken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WagonSnapshot {
    pub train_id: TrainId,
    pub wagon_index: usize,
    pub section: SectionId,
    pub position_offset: f64,
}

/// State of one train at the moment a snapshot was taken.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSnapshot {
    pub train_id: TrainId,
    pub code: String,
    pub status: TrainStatus,
    pub head_section: SectionId,
    pub heading: Heading,
    pub desired_stop: Option<StopId>,
}

/// Diagnostic view of one connection's runtime flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionSnapshot {
    pub from: SectionId,
    pub to: SectionId,
    pub active: bool,
}

/// One full outbound record, emitted at step 7 of every tick (spec.md §6).
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub tick_index: u64,
    pub sim_time_seconds: f64,
    pub trains: Vec<TrainSnapshot>,
    pub wagons: Vec<WagonSnapshot>,
    pub connections: Vec<ConnectionSnapshot>,
}

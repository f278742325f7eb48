//! Error taxonomy surfaced by the engine. Admission denials are normal
//! backpressure and are never represented here; only outcomes a caller must
//! branch on are.

use crate::general::{BlockId, SectionId, StopId, TrainId};
use thiserror::Error;

/// Reasons a `Spawn` command may be rejected.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
pub enum SpawnRejectReason {
    #[error("entry section is already occupied")]
    EntryOccupied,
    #[error("entry block is held by another train")]
    EntryBlockHeld,
    #[error("a train with this id already exists")]
    DuplicateTrainId,
    #[error("wagon count must be between 1 and 15")]
    InvalidWagonCount,
    #[error("unknown stop id")]
    UnknownStop,
    #[error("section is not a designated spawn point")]
    NotASpawnSection,
    #[error("unknown train type id")]
    UnknownTrainType,
    #[error("no route from the entry section to any valid target")]
    NoReachableTarget,
}

/// Reasons a `SetConnectionActive` command may be rejected.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
pub enum SwitchRejectReason {
    #[error("a wagon occupies one of the connection's endpoint sections")]
    SwitchOccupied,
}

/// Top-level error taxonomy for the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("no route found from section {from:?} to section {to:?}")]
    NoRouteFound { from: SectionId, to: SectionId },
    #[error("spawn rejected: {0}")]
    SpawnRejected(SpawnRejectReason),
    #[error("switch rejected: {0}")]
    SwitchRejected(SwitchRejectReason),
    #[error("unknown train {0:?}")]
    UnknownTrain(TrainId),
    #[error("unknown block {0:?}")]
    UnknownBlock(BlockId),
    #[error("unknown stop {0:?}")]
    UnknownStop(StopId),
    #[error("unknown section {0:?}")]
    UnknownSection(SectionId),
    /// A fatal internal contradiction, e.g. two wagons resolved into one
    /// section after a kinematics transition. The engine is not expected to
    /// ever produce this; it exists as an always-on correctness backstop.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

/// Outcome returned for every inbound command, per spec.md §6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Rejected(EngineError),
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok)
    }
}

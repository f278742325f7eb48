//! Shared identifiers and tuning constants used across the engine.

use std::time::Duration;

/// Identity of a [`crate::control::rail_system::topology::Section`].
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SectionId(pub u32);

/// Identity of a [`crate::control::rail_system::topology::Block`].
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BlockId(pub u32);

/// Identity of a [`crate::control::rail_system::topology::Stop`].
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct StopId(pub u32);

/// Identity of a [`crate::control::train::Train`].
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TrainId(pub u32);

/// Identity of a train type (the catalogue entry a train is spawned from).
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TrainTypeId(pub u32);

impl SectionId {
    pub fn new(id: u32) -> Self {
        SectionId(id)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl BlockId {
    pub fn new(id: u32) -> Self {
        BlockId(id)
    }
}

impl StopId {
    pub fn new(id: u32) -> Self {
        StopId(id)
    }
}

impl TrainId {
    pub fn new(id: u32) -> Self {
        TrainId(id)
    }
}

impl TrainTypeId {
    pub fn new(id: u32) -> Self {
        TrainTypeId(id)
    }
}

/// A single discrete tick index, counted from zero since scheduler start.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Tick(pub u64);

impl Tick {
    pub fn next(self) -> Tick {
        Tick(self.0 + 1)
    }
}

/// Geometric orientation of a section. Used only by the router's reversal
/// tie-break (prefer horizontal over diagonal when a reverse move is chosen).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum GeometryClass {
    Horizontal,
    Diagonal,
}

/// The mandated side a stop must be approached from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ApproachDirection {
    Left,
    Right,
}

/// Longitudinal direction a train is currently moving along its path.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Heading {
    Forward,
    Reverse,
}

impl std::ops::Not for Heading {
    type Output = Heading;

    fn not(self) -> Heading {
        match self {
            Heading::Forward => Heading::Reverse,
            Heading::Reverse => Heading::Forward,
        }
    }
}

/// Maximum number of wagons (including the locomotive) a train may have.
pub const MAX_WAGONS: usize = 15;

/// Fixed distance (in section units) kept between consecutive wagons along
/// a train's recent path history.
pub const WAGON_SPACING: f64 = 1.0;

/// Extra edge cost charged to a route step that reverses the train's
/// current direction of travel.
pub const REVERSE_PENALTY: usize = 50;

/// Number of consecutive ticks a train may be denied admission before the
/// router is asked to replan around the obstruction.
pub const BLOCK_GRACE: u32 = 20;

/// How close (in position_offset units) the head must be to a section
/// boundary before signaling evaluates whether it may cross this tick.
pub const ADMISSION_EPSILON: f64 = 1e-6;

/// Default dwell duration at a stop, in simulated time.
pub const DEFAULT_DWELL: Duration = Duration::from_secs(5);

/// Default tick cadence of the scheduler.
pub const DEFAULT_TICK_RATE_HZ: f64 = 10.0;

/// Hop limit for the reservation table's bounded-lookahead exit check
/// (spec.md §4.2 "contract on entry").
pub const BOUNDED_LOOKAHEAD_DEPTH: usize = 8;

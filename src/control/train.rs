//! Train lifecycle: spawning, dwelling, despawning, and the per-train route
//! plan cursor (spec.md §3, §4.6).

use std::collections::VecDeque;
use std::time::Duration;

use crate::general::{BlockId, Heading, SectionId, StopId, TrainId, TrainTypeId};

/// Catalogue entry a train is spawned from. Speeds are piecewise constant
/// (Non-goals rule out physical acceleration modeling).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainType {
    pub id: TrainTypeId,
    pub priority_index: u32,
    /// Sections per simulated second.
    pub cruising_speed: f64,
}

/// One car of a train. Wagon 0 is the locomotive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wagon {
    pub section: SectionId,
    pub position_offset: f64,
}

/// Lifecycle state of a train, per the state machine in spec.md §4.5.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum TrainStatus {
    Scheduled,
    Moving,
    Dwelling,
    Stuck,
    Despawned,
}

#[derive(Debug, Clone)]
pub struct Train {
    pub id: TrainId,
    pub code: String,
    pub train_type: TrainType,
    /// Ordered head-to-tail; `wagons[0]` is the head.
    pub wagons: Vec<Wagon>,
    pub heading: Heading,
    pub desired_stop: Option<StopId>,
    pub status: TrainStatus,
    /// Block the head occupied immediately before its current one; feeds
    /// the router's turn-exclusion state.
    pub previous_block: Option<BlockId>,
    /// Section the head occupied immediately before its current one; feeds
    /// the stop approach-direction check.
    pub previous_section: Option<SectionId>,
    /// The train's current goal section (a stop, or a despawn point once
    /// dwell expires). Replanning always routes toward this.
    pub target: SectionId,
    /// Consecutive ticks the head has been denied admission to its next
    /// planned section.
    pub blocked_ticks: u32,
    /// Remaining section ids beyond the wagons already placed; `plan[0]` is
    /// the head's next target once it reaches its current section's end.
    plan: VecDeque<SectionId>,
    dwell_remaining: Option<Duration>,
}

impl Train {
    /// Places `num_wagons` wagons along the first `num_wagons` sections of
    /// `route` (wagon 0 at `route[0]`), each at offset 0. The remainder of
    /// `route` becomes the plan the head will consume as it advances — this
    /// is the only way a newly spawned train has "recent path history"
    /// behind its head.
    pub fn spawn(
        id: TrainId,
        code: impl Into<String>,
        train_type: TrainType,
        desired_stop: Option<StopId>,
        heading: Heading,
        mut route: VecDeque<SectionId>,
        num_wagons: usize,
        target: SectionId,
    ) -> Option<Self> {
        if route.len() < num_wagons || num_wagons == 0 {
            return None;
        }
        let wagons = (0..num_wagons)
            .map(|_| Wagon {
                section: route.pop_front().expect("checked length above"),
                position_offset: 0.0,
            })
            .collect();

        Some(Train {
            id,
            code: code.into(),
            train_type,
            wagons,
            heading,
            desired_stop,
            status: TrainStatus::Scheduled,
            previous_block: None,
            previous_section: None,
            target,
            blocked_ticks: 0,
            plan: route,
            dwell_remaining: None,
        })
    }

    pub fn head(&self) -> &Wagon {
        &self.wagons[0]
    }

    pub fn head_mut(&mut self) -> &mut Wagon {
        &mut self.wagons[0]
    }

    pub fn head_section(&self) -> SectionId {
        self.wagons[0].section
    }

    pub fn tail_section(&self) -> SectionId {
        self.wagons.last().expect("a train always has at least one wagon").section
    }

    pub fn wagon_count(&self) -> usize {
        self.wagons.len()
    }

    pub fn priority_index(&self) -> u32 {
        self.train_type.priority_index
    }

    pub fn speed(&self) -> f64 {
        self.train_type.cruising_speed
    }

    /// The section the head should move into next, per the cached plan.
    pub fn next_target(&self) -> Option<SectionId> {
        self.plan.front().copied()
    }

    pub fn pop_next_target(&mut self) -> Option<SectionId> {
        self.plan.pop_front()
    }

    pub fn push_front_target(&mut self, section: SectionId) {
        self.plan.push_front(section);
    }

    pub fn plan_is_exhausted(&self) -> bool {
        self.plan.is_empty()
    }

    pub fn set_plan(&mut self, plan: VecDeque<SectionId>) {
        self.plan = plan;
        self.blocked_ticks = 0;
    }

    pub fn plan(&self) -> &VecDeque<SectionId> {
        &self.plan
    }

    pub fn record_denial(&mut self) {
        self.blocked_ticks = self.blocked_ticks.saturating_add(1);
    }

    pub fn reset_denial(&mut self) {
        self.blocked_ticks = 0;
    }

    pub fn is_past_grace(&self, grace: u32) -> bool {
        self.blocked_ticks > grace
    }

    pub fn start_dwell(&mut self, duration: Duration) {
        self.status = TrainStatus::Dwelling;
        self.dwell_remaining = Some(duration);
    }

    /// Advances the dwell timer by `dt`; returns `true` once it has expired.
    pub fn tick_dwell(&mut self, dt: Duration) -> bool {
        match self.dwell_remaining.as_mut() {
            Some(remaining) => {
                *remaining = remaining.saturating_sub(dt);
                let expired = remaining.is_zero();
                if expired {
                    self.dwell_remaining = None;
                }
                expired
            }
            None => false,
        }
    }

    pub fn is_dwelling(&self) -> bool {
        matches!(self.status, TrainStatus::Dwelling)
    }

    pub fn set_target(&mut self, target: SectionId) {
        self.target = target;
    }
}

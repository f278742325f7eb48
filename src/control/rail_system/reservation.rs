//! Authoritative occupancy index over sections and blocks (spec.md §4.2).
//!
//! A dense array keyed by section id, per the arena-plus-index design note:
//! cross-references are ids, never pointers.

use std::collections::{HashMap, VecDeque};

use fixedbitset::FixedBitSet;

use crate::control::rail_system::topology::Topology;
use crate::general::{BlockId, SectionId, TrainId};

/// Occupancy of every section and the block presence counters derived from
/// it. Rebuilt incrementally; `release` recomputes the affected block's
/// counter from scratch to avoid drift (spec.md §4.2).
#[derive(Debug, Clone)]
pub struct ReservationTable {
    sections: Vec<Option<TrainId>>,
    block_presence: HashMap<BlockId, (TrainId, usize)>,
}

impl ReservationTable {
    /// `index_bound` must be at least one greater than the highest
    /// [`SectionId`] in the topology this table will be used with — see
    /// [`Topology::section_index_bound`].
    pub fn new(index_bound: usize) -> Self {
        ReservationTable {
            sections: vec![None; index_bound],
            block_presence: HashMap::new(),
        }
    }

    pub fn peek(&self, section: SectionId) -> Option<TrainId> {
        self.sections.get(section.index()).copied().flatten()
    }

    pub fn peek_block(&self, block: BlockId) -> Option<TrainId> {
        self.block_presence.get(&block).map(|(train, _)| *train)
    }

    /// Succeeds only if `section` is free and the block containing it is
    /// either free or already held by `train`.
    pub fn try_reserve(&mut self, train: TrainId, section: SectionId, topology: &Topology) -> bool {
        if self.peek(section).is_some() {
            return false;
        }
        if let Some(block) = topology.block_of(section) {
            if let Some(holder) = self.peek_block(block) {
                if holder != train {
                    return false;
                }
            }
        }

        self.sections[section.index()] = Some(train);
        if let Some(block) = topology.block_of(section) {
            let entry = self.block_presence.entry(block).or_insert((train, 0));
            entry.0 = train;
            entry.1 += 1;
        }
        true
    }

    /// Releases `section`. If this was the train's last presence in its
    /// block, the block is released too.
    pub fn release(&mut self, train: TrainId, section: SectionId, topology: &Topology) {
        if self.sections.get(section.index()).copied().flatten() != Some(train) {
            return;
        }
        self.sections[section.index()] = None;

        let Some(block) = topology.block_of(section) else {
            return;
        };
        self.rebuild_block_presence(block, topology);
    }

    fn rebuild_block_presence(&mut self, block: BlockId, topology: &Topology) {
        let Some(block_sections) = topology.sections_of(block) else {
            return;
        };
        let mut holder: Option<TrainId> = None;
        let mut count = 0usize;
        for section in block_sections {
            if let Some(train) = self.peek(*section) {
                holder = Some(train);
                count += 1;
            }
        }
        match holder {
            Some(train) => {
                self.block_presence.insert(block, (train, count));
            }
            None => {
                self.block_presence.remove(&block);
            }
        }
    }

    /// Whether block `block` is entirely free.
    pub fn block_is_free(&self, block: BlockId) -> bool {
        self.peek_block(block).is_none()
    }

    /// Bounded-lookahead exit check (spec.md §4.2 "contract on entry"): a
    /// train may only enter `block` if an exit exists within `max_depth`
    /// hops of `entering_section` that leads to a section whose block is
    /// free or is `block` itself. A despawn section always counts as an
    /// exit, even when it has no onward neighbors.
    pub fn has_bounded_exit(
        &self,
        block: BlockId,
        entering_section: SectionId,
        previous_block: Option<BlockId>,
        topology: &Topology,
        max_depth: usize,
    ) -> bool {
        let mut discovered = FixedBitSet::with_capacity(topology.section_index_bound());
        let mut queue = VecDeque::new();
        queue.push_back((entering_section, Some(block), 0usize));
        discovered.insert(entering_section.index());

        while let Some((section, prev_block, depth)) = queue.pop_front() {
            if topology.is_despawn(section) {
                return true;
            }
            let current_block = topology.block_of(section);
            if current_block != Some(block) && (current_block.is_none() || self.block_is_free(current_block.unwrap()))
            {
                return true;
            }
            if depth >= max_depth {
                continue;
            }
            for neighbor in topology.neighbors(section, prev_block.or(previous_block)) {
                let idx = neighbor.section.index();
                if idx >= discovered.len() || discovered.contains(idx) {
                    continue;
                }
                discovered.insert(idx);
                queue.push_back((neighbor.section, current_block, depth + 1));
            }
        }
        false
    }
}

//! Per-tick admission evaluation and priority arbitration (spec.md §4.5).

use std::collections::HashMap;

use crate::control::rail_system::reservation::ReservationTable;
use crate::control::rail_system::topology::Topology;
use crate::control::train::Train;
use crate::general::{ApproachDirection, BlockId, SectionId, TrainId, ADMISSION_EPSILON, BOUNDED_LOOKAHEAD_DEPTH};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
enum Contention {
    Section(SectionId),
    Block(BlockId),
}

struct Candidate {
    train_id: TrainId,
    priority: u32,
    contention: Contention,
}

/// Whether the head will cross into its next section this tick at the
/// given speed and cadence.
fn is_near_boundary(train: &Train, dt_seconds: f64) -> bool {
    train.head().position_offset + train.speed() * dt_seconds >= 1.0 - ADMISSION_EPSILON
}

/// Whether entering `to` from `from` satisfies a stop's mandated approach.
pub fn approach_matches(from: SectionId, to: SectionId, approach: ApproachDirection) -> bool {
    match approach {
        ApproachDirection::Left => from.0 < to.0,
        ApproachDirection::Right => from.0 > to.0,
    }
}

/// Evaluates admission for every train whose head is about to cross into
/// its next section this tick, resolves contention by priority, and
/// updates each evaluated train's denial-streak counter. Trains not near a
/// boundary are absent from the returned map; callers should treat a
/// missing entry as "admission not needed this tick."
pub fn evaluate(
    trains: &mut [Train],
    topology: &Topology,
    reservation: &ReservationTable,
    dt_seconds: f64,
) -> HashMap<TrainId, bool> {
    let mut decisions: HashMap<TrainId, bool> = HashMap::new();
    let mut candidates: Vec<Candidate> = Vec::new();

    for train in trains.iter() {
        if train.is_dwelling() || !is_near_boundary(train, dt_seconds) {
            continue;
        }
        // A train with an exhausted plan is either about to exit at a
        // despawn section (handled directly by kinematics, no admission
        // needed) or stuck; neither needs a decision here.
        let Some(s_next) = train.next_target() else {
            continue;
        };

        let current_section = train.head_section();
        let edge_ok = topology
            .neighbors(current_section, train.previous_block)
            .into_iter()
            .any(|n| n.section == s_next);
        if !edge_ok {
            decisions.insert(train.id, false);
            continue;
        }

        if reservation.peek(s_next).is_some() {
            decisions.insert(train.id, false);
            continue;
        }

        let current_block = topology.block_of(current_section);
        let b_next = topology.block_of(s_next);
        let entering_new_block = b_next != current_block;

        if entering_new_block {
            if let Some(block) = b_next {
                if !reservation.block_is_free(block) {
                    decisions.insert(train.id, false);
                    continue;
                }
                if !reservation.has_bounded_exit(
                    block,
                    s_next,
                    current_block,
                    topology,
                    BOUNDED_LOOKAHEAD_DEPTH,
                ) {
                    decisions.insert(train.id, false);
                    continue;
                }
            }
        }

        // Approach-direction mismatch never blocks entry — a train may
        // transit a stop without dwelling; only dwell-start checks it
        // (lifecycle, not signaling).
        let contention = match (entering_new_block, b_next) {
            (true, Some(block)) => Contention::Block(block),
            _ => Contention::Section(s_next),
        };

        candidates.push(Candidate {
            train_id: train.id,
            priority: train.priority_index(),
            contention,
        });
    }

    let mut groups: HashMap<Contention, Vec<&Candidate>> = HashMap::new();
    for candidate in &candidates {
        groups.entry(candidate.contention).or_default().push(candidate);
    }

    for group in groups.values() {
        let winner = group
            .iter()
            .max_by(|a, b| a.priority.cmp(&b.priority).then(b.train_id.0.cmp(&a.train_id.0)))
            .expect("group is never empty");
        for candidate in group {
            decisions.insert(candidate.train_id, candidate.train_id == winner.train_id);
        }
    }

    for train in trains.iter_mut() {
        if let Some(admitted) = decisions.get(&train.id) {
            if *admitted {
                train.reset_denial();
            } else {
                train.record_denial();
            }
        }
    }

    decisions
}

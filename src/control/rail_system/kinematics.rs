//! Continuous-position advancement of a train's wagons (spec.md §4.4).
//!
//! A train is a rigid body: if the head may not cross into its next
//! section this tick, no wagon advances. Otherwise every wagon's
//! `position_offset` advances by the same amount, tail first, so that a
//! wagon's vacated section is released before the wagon ahead of it can be
//! considered to occupy it.

use crate::control::errors::EngineError;
use crate::control::rail_system::reservation::ReservationTable;
use crate::control::rail_system::topology::Topology;
use crate::control::train::{Train, TrainStatus};
use crate::general::ADMISSION_EPSILON;

/// Advances `train` by `dt_seconds`. `head_admitted` is the signaling
/// decision (§4.5) for whether the head may cross into its next planned
/// section this tick; it is only consulted when the head is actually about
/// to cross.
pub fn advance_train(
    train: &mut Train,
    dt_seconds: f64,
    topology: &Topology,
    reservation: &mut ReservationTable,
    head_admitted: bool,
) -> Result<(), EngineError> {
    if train.is_dwelling() {
        return Ok(());
    }

    let distance = train.speed() * dt_seconds;
    if distance <= 0.0 {
        return Ok(());
    }

    let head_offset = train.head().position_offset;
    let would_cross = head_offset + distance >= 1.0 - ADMISSION_EPSILON;
    if would_cross && !head_admitted {
        return Ok(());
    }

    let wagon_count = train.wagon_count();
    for i in (0..wagon_count).rev() {
        // `remove(0)` below can only happen on the last iteration (i == 0),
        // after which the loop ends, so indices stay valid throughout.
        let wagon = &mut train.wagons[i];
        wagon.position_offset += distance;
        if wagon.position_offset < 1.0 {
            continue;
        }
        let overflow = wagon.position_offset - 1.0;

        if i == 0 {
            advance_head(train, overflow, topology, reservation)?;
        } else {
            let predecessor_section = train.wagons[i - 1].section;
            let is_tail = i == wagon_count - 1;
            if is_tail {
                let old_section = train.wagons[i].section;
                reservation.release(train.id, old_section, topology);
            }
            train.wagons[i].section = predecessor_section;
            train.wagons[i].position_offset = overflow;
        }
    }

    Ok(())
}

fn advance_head(
    train: &mut Train,
    overflow: f64,
    topology: &Topology,
    reservation: &mut ReservationTable,
) -> Result<(), EngineError> {
    let head_section = train.head_section();
    let is_only_wagon = train.wagon_count() == 1;

    match train.pop_next_target() {
        Some(next) => {
            if is_only_wagon {
                reservation.release(train.id, head_section, topology);
            }
            if !reservation.try_reserve(train.id, next, topology) {
                return Err(EngineError::InvariantViolation(format!(
                    "section {:?} not free at guaranteed head transition",
                    next
                )));
            }
            train.previous_block = topology.block_of(head_section);
            train.previous_section = Some(head_section);
            let head = train.head_mut();
            head.section = next;
            head.position_offset = overflow;
        }
        None => {
            if !topology.is_despawn(head_section) {
                return Err(EngineError::InvariantViolation(format!(
                    "head at {:?} has no plan and is not a despawn section",
                    head_section
                )));
            }
            if is_only_wagon {
                reservation.release(train.id, head_section, topology);
            }
            train.wagons.remove(0);
            if train.wagons.is_empty() {
                train.status = TrainStatus::Despawned;
            }
        }
    }
    Ok(())
}

//! A shared sample topology used across unit and integration tests: two
//! opposing through lines, a platform block spanning three sections, a
//! passing siding, and a switch stub for hold-rejection coverage.
//!
//! Resolves the topology-level open questions: section 0 and section 141
//! are the spawn points, section 41 and section 100 are the despawn
//! points; Track 1 (section 31) must be approached from its lower-indexed
//! neighbor (section 30).

use std::collections::HashMap;

use crate::control::rail_system::topology::{Topology, TopologyBuilder};
use crate::control::train::TrainType;
use crate::general::{ApproachDirection, BlockId, GeometryClass, SectionId, StopId, TrainTypeId};

pub const LINE_A_SPAWN: u32 = 0;
pub const LINE_A_DESPAWN: u32 = 41;
pub const LINE_B_SPAWN: u32 = 141;
pub const LINE_B_DESPAWN: u32 = 100;
pub const TRACK_1_SECTION: u32 = 31;
pub const TRACK_1_STOP: StopId = StopId(0);
pub const SIDING_SECTION: u32 = 500;
pub const SIDING_STOP: StopId = StopId(1);
pub const SWITCH_STUB_SECTION: u32 = 1000;

pub const FAST_TYPE: TrainTypeId = TrainTypeId(0);
pub const SLOW_TYPE: TrainTypeId = TrainTypeId(1);

pub fn build_fixture_topology() -> Topology {
    let mut builder = TopologyBuilder::new();

    for id in LINE_A_SPAWN..=LINE_A_DESPAWN {
        builder.add_section(SectionId::new(id), GeometryClass::Horizontal);
    }
    for id in LINE_B_DESPAWN..=LINE_B_SPAWN {
        builder.add_section(SectionId::new(id), GeometryClass::Horizontal);
    }
    builder.add_section(SectionId::new(SIDING_SECTION), GeometryClass::Diagonal);
    builder.add_section(SectionId::new(SWITCH_STUB_SECTION), GeometryClass::Horizontal);

    for id in LINE_A_SPAWN..LINE_A_DESPAWN {
        builder.add_connection(SectionId::new(id), SectionId::new(id + 1), true, None);
    }
    builder.add_connection(SectionId::new(10), SectionId::new(SIDING_SECTION), true, None);
    builder.add_connection(SectionId::new(SIDING_SECTION), SectionId::new(11), true, None);

    for id in (LINE_B_DESPAWN + 1..=LINE_B_SPAWN).rev() {
        builder.add_connection(SectionId::new(id), SectionId::new(id - 1), true, None);
    }

    // Crossover letting a Line B train reach Track 1 from the "wrong" side,
    // and the reverse hop into the platform block itself.
    builder.add_connection(SectionId::new(132), SectionId::new(32), true, None);
    builder.add_connection(SectionId::new(32), SectionId::new(31), true, None);

    // A siding off the main line, held by a switch; inactive toggles are
    // rejected while a wagon sits on section 2 or this stub.
    builder.add_connection(SectionId::new(2), SectionId::new(SWITCH_STUB_SECTION), true, None);

    for id in LINE_A_SPAWN..=LINE_A_DESPAWN {
        if (30..=32).contains(&id) {
            continue;
        }
        builder.add_block(BlockId::new(id), format!("A{id}"), &[SectionId::new(id)]);
    }
    builder.add_block(
        BlockId::new(31),
        "Platform",
        &[SectionId::new(30), SectionId::new(31), SectionId::new(32)],
    );
    for id in LINE_B_DESPAWN..=LINE_B_SPAWN {
        builder.add_block(BlockId::new(id), format!("B{id}"), &[SectionId::new(id)]);
    }
    builder.add_block(BlockId::new(SIDING_SECTION), "Siding", &[SectionId::new(SIDING_SECTION)]);
    builder.add_block(
        BlockId::new(SWITCH_STUB_SECTION),
        "SwitchStub",
        &[SectionId::new(SWITCH_STUB_SECTION)],
    );

    builder.add_stop(TRACK_1_STOP, SectionId::new(TRACK_1_SECTION), ApproachDirection::Left);
    builder.add_stop(SIDING_STOP, SectionId::new(SIDING_SECTION), ApproachDirection::Left);

    builder.mark_spawn(SectionId::new(LINE_A_SPAWN));
    builder.mark_spawn(SectionId::new(LINE_B_SPAWN));
    builder.mark_despawn(SectionId::new(LINE_A_DESPAWN));
    builder.mark_despawn(SectionId::new(LINE_B_DESPAWN));

    builder.build().expect("fixture topology is internally consistent")
}

pub fn build_fixture_train_types() -> HashMap<TrainTypeId, TrainType> {
    let mut types = HashMap::new();
    types.insert(
        FAST_TYPE,
        TrainType {
            id: FAST_TYPE,
            priority_index: 2,
            cruising_speed: 1.0,
        },
    );
    types.insert(
        SLOW_TYPE,
        TrainType {
            id: SLOW_TYPE,
            priority_index: 1,
            cruising_speed: 0.3,
        },
    );
    types
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_builds_without_error() {
        let topology = build_fixture_topology();
        assert!(topology.is_spawn(SectionId::new(LINE_A_SPAWN)));
        assert!(topology.is_despawn(SectionId::new(LINE_A_DESPAWN)));
        assert_eq!(
            topology.block_of(SectionId::new(30)),
            topology.block_of(SectionId::new(32))
        );
        assert_eq!(topology.stop_at(SectionId::new(TRACK_1_SECTION)).unwrap().id, TRACK_1_STOP);
    }
}

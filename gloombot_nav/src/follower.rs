// Per-agent path following.
//
// `PathFollower` is the state machine an agent runs over a planned route:
//
//   NoPath ──start──▶ Following ──cursor past last node──▶ Arrived
//                        │
//                        └──graph changed / off corridor / invalidated──▶ Stale
//
// While Following, each `tick` advances the cursor past every node the agent
// is within `arrival_distance` of, then hands back the world position of the
// next unvisited node as the steering target. The follower never produces
// movement input itself.
//
// A path is bound to the graph generation it was planned against. Any
// generation change makes it Stale before it is followed again; the owner
// (`navigator.rs`) also marks paths Stale eagerly on every mutation it
// performs. A Stale path yields no steering target and must be replanned.
//
// The corridor check measures the agent's distance to the current leg: the
// segment from the last reached node (or the position the path was adopted
// at, for the first leg) to the current target node.
//
// See also: `pathfinding.rs` which produces the `PathResult` consumed here,
// `navigator.rs` which owns one follower per agent.
//
// **Critical constraint: determinism.** Follower state is plain data and
// fully serializable; identical inputs give identical transitions.

use crate::nav::NavGraph;
use crate::pathfinding::PathResult;
use crate::types::{NodeId, Vec3};
use serde::{Deserialize, Serialize};

/// Why a path stopped being usable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StaleReason {
    /// The graph was mutated after the path was planned.
    GraphChanged,
    /// A node still ahead on the path no longer exists.
    NodeRemoved,
    /// The agent strayed further than the corridor slack from its leg.
    OffCorridor,
    /// A new goal was requested.
    GoalChanged,
    /// The agent's team or movement abilities changed.
    ProfileChanged,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FollowState {
    NoPath,
    Following,
    Arrived,
    Stale(StaleReason),
}

/// An agent's progress along a planned route.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathFollower {
    state: FollowState,
    nodes: Vec<NodeId>,
    /// Index into `nodes` of the next unvisited node.
    cursor: usize,
    /// Graph generation the path was planned against.
    generation: u64,
    /// Where the agent stood when the path was adopted.
    origin: Vec3,
    truncated: bool,
}

impl Default for PathFollower {
    fn default() -> Self {
        Self {
            state: FollowState::NoPath,
            nodes: Vec::new(),
            cursor: 0,
            generation: 0,
            origin: Vec3::ZERO,
            truncated: false,
        }
    }
}

impl PathFollower {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt a freshly planned path. An empty path leaves the follower in
    /// `NoPath`.
    pub fn start(&mut self, path: PathResult, origin: Vec3, generation: u64) {
        self.state = if path.nodes.is_empty() {
            FollowState::NoPath
        } else {
            FollowState::Following
        };
        self.nodes = path.nodes;
        self.cursor = 0;
        self.generation = generation;
        self.origin = origin;
        self.truncated = path.truncated;
    }

    /// Drop the current path.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Mark an active path Stale. No effect in any other state.
    pub fn invalidate(&mut self, reason: StaleReason) {
        if self.state == FollowState::Following {
            self.state = FollowState::Stale(reason);
        }
    }

    /// Advance along the path given the agent's current position and return
    /// the steering target, or `None` when not (or no longer) Following.
    pub fn tick(
        &mut self,
        graph: &NavGraph,
        position: Vec3,
        arrival_distance: f32,
        corridor_slack: f32,
    ) -> Option<Vec3> {
        if self.state != FollowState::Following {
            return None;
        }
        if graph.generation() != self.generation {
            let removed = self.remaining().iter().any(|&id| !graph.is_live(id));
            self.state = FollowState::Stale(if removed {
                StaleReason::NodeRemoved
            } else {
                StaleReason::GraphChanged
            });
            return None;
        }

        let target = loop {
            let Some(target) = self.node_position(graph, self.cursor) else {
                self.state = FollowState::Stale(StaleReason::NodeRemoved);
                return None;
            };
            if position.distance(target) > arrival_distance {
                break target;
            }
            self.cursor += 1;
            if self.cursor >= self.nodes.len() {
                self.state = FollowState::Arrived;
                return None;
            }
        };

        let leg_start = match self.cursor {
            0 => Some(self.origin),
            c => self.node_position(graph, c - 1),
        };
        let off_corridor =
            leg_start.is_some_and(|s| position.distance_to_segment(s, target) > corridor_slack);
        if off_corridor {
            self.state = FollowState::Stale(StaleReason::OffCorridor);
            return None;
        }
        Some(target)
    }

    pub fn state(&self) -> FollowState {
        self.state
    }

    pub fn is_following(&self) -> bool {
        self.state == FollowState::Following
    }

    pub fn is_stale(&self) -> bool {
        matches!(self.state, FollowState::Stale(_))
    }

    /// The full planned node sequence.
    pub fn path(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Nodes not yet reached.
    pub fn remaining(&self) -> &[NodeId] {
        self.nodes.get(self.cursor..).unwrap_or(&[])
    }

    pub fn next_node(&self) -> Option<NodeId> {
        self.nodes.get(self.cursor).copied()
    }

    /// The path was cut short by the path length limit.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    fn node_position(&self, graph: &NavGraph, index: usize) -> Option<Vec3> {
        let id = *self.nodes.get(index)?;
        graph.node(id).map(|n| n.position)
    }
}

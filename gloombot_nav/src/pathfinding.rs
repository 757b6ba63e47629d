// A* pathfinding over the navigation graph.
//
// Implements standard A* search using a `BinaryHeap` (min-heap via reversed
// ordering). Node scores and came-from data are stored in `Vec`s indexed by
// `NodeId` for O(1) access and deterministic behavior (no `HashMap`).
//
// The heuristic is straight-line distance to the goal node, which is
// admissible as long as edge costs are at least the distance they span.
//
// Each search sees the graph through a `CapabilityProfile`: edges whose move
// type the agent lacks, or whose target node excludes the agent's team, are
// simply invisible. The same graph therefore serves walkers, climbers and
// fliers without any per-class code.
//
// See also: `nav.rs` for the `NavGraph` being searched, `capability.rs` for
// the edge filter, `navigator.rs` which runs queued plans each tick.
//
// **Critical constraint: determinism.** A* is a pure function of graph
// state, endpoints and profile. Equal f scores break on smaller g, then on
// smaller node id; all float ordering goes through `total_cmp`.

use crate::capability::CapabilityProfile;
use crate::config::NavConfig;
use crate::error::PlanError;
use crate::nav::NavGraph;
use crate::types::{NodeFlags, NodeId, Vec3};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Bounds on one search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchLimits {
    /// Longest path returned; longer routes keep their goal end.
    pub max_path_nodes: usize,
    /// Nodes closed before the search gives up.
    pub max_expansions: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_path_nodes: 256,
            max_expansions: 8192,
        }
    }
}

/// The result of a successful search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    /// Node ids from start to goal, inclusive. When `truncated`, the first
    /// node is partway along the route instead of the start.
    pub nodes: Vec<NodeId>,
    /// Cost of the full route, including any truncated prefix.
    pub total_cost: f32,
    /// The route was longer than `max_path_nodes`.
    pub truncated: bool,
}

impl PathResult {
    pub fn goal(&self) -> Option<NodeId> {
        self.nodes.last().copied()
    }
}

/// Entry in the A* open set (min-heap via reversed ordering).
struct OpenEntry {
    node: NodeId,
    f_score: f32,
    g_score: f32,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap: smallest f (then g, then id) is "greatest".
        other
            .f_score
            .total_cmp(&self.f_score)
            .then_with(|| other.g_score.total_cmp(&self.g_score))
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Find the cheapest route from `start` to `goal` that `profile` may use.
pub fn astar(
    graph: &NavGraph,
    start: NodeId,
    goal: NodeId,
    profile: &CapabilityProfile,
    limits: SearchLimits,
) -> Result<PathResult, PlanError> {
    if graph.live_count() == 0 {
        return Err(PlanError::EmptyGraph);
    }
    if !graph.is_live(start) {
        return Err(PlanError::NoStartNode);
    }
    let goal_pos = graph.node(goal).ok_or(PlanError::NoGoalNode)?.position;
    if start == goal {
        return Ok(PathResult {
            nodes: vec![start],
            total_cost: 0.0,
            truncated: false,
        });
    }

    let n = graph.slot_count();
    // g_score[node] = cost of cheapest known path from start to node.
    let mut g_score = vec![f32::INFINITY; n];
    let mut came_from: Vec<Option<NodeId>> = vec![None; n];
    let mut closed = vec![false; n];
    let mut expansions = 0usize;

    g_score[start.index()] = 0.0;

    let mut open = BinaryHeap::new();
    open.push(OpenEntry {
        node: start,
        f_score: heuristic(graph, start, goal_pos),
        g_score: 0.0,
    });

    while let Some(current) = open.pop() {
        let current_id = current.node;
        let ci = current_id.index();

        if current_id == goal {
            let path = reconstruct_path(&came_from, start, goal, g_score[ci], limits.max_path_nodes);
            debug!(
                "astar {start}->{goal}: {} nodes, cost {:.1}, {expansions} expansions",
                path.nodes.len(),
                path.total_cost
            );
            return Ok(path);
        }

        if closed[ci] {
            continue;
        }
        if expansions >= limits.max_expansions {
            warn!("astar {start}->{goal}: gave up after {expansions} expansions");
            return Err(PlanError::ExpansionLimit(expansions));
        }
        closed[ci] = true;
        expansions += 1;

        let current_g = g_score[ci];

        for edge in graph.neighbors(current_id) {
            let ni = edge.to.index();
            if ni >= n || closed[ni] || !profile.can_follow(graph, edge) {
                continue;
            }

            let tentative_g = current_g + edge.cost;
            if tentative_g < g_score[ni] {
                g_score[ni] = tentative_g;
                came_from[ni] = Some(current_id);
                open.push(OpenEntry {
                    node: edge.to,
                    f_score: tentative_g + heuristic(graph, edge.to, goal_pos),
                    g_score: tentative_g,
                });
            }
        }
    }

    Err(PlanError::Unreachable)
}

/// Snap `start_pos` and `goal_pos` to the nearest nodes the profile's team
/// may use (within `config.snap_max_range`), then run A*.
pub fn plan_path(
    graph: &NavGraph,
    start_pos: Vec3,
    goal_pos: Vec3,
    profile: &CapabilityProfile,
    config: &NavConfig,
) -> Result<PathResult, PlanError> {
    if graph.live_count() == 0 {
        return Err(PlanError::EmptyGraph);
    }
    let snap = |pos: Vec3| {
        graph.find_nearest_where(pos, NodeFlags::empty(), config.snap_max_range, |node| {
            profile.can_enter(node)
        })
    };
    let start = snap(start_pos).ok_or(PlanError::NoStartNode)?;
    let goal = snap(goal_pos).ok_or(PlanError::NoGoalNode)?;
    astar(graph, start, goal, profile, config.search_limits())
}

/// Straight-line distance from a node to the goal position.
fn heuristic(graph: &NavGraph, node: NodeId, goal_pos: Vec3) -> f32 {
    graph
        .node(node)
        .map_or(0.0, |n| n.position.distance(goal_pos))
}

fn reconstruct_path(
    came_from: &[Option<NodeId>],
    start: NodeId,
    goal: NodeId,
    total_cost: f32,
    max_path_nodes: usize,
) -> PathResult {
    let mut nodes = vec![goal];
    let mut current = goal;
    while current != start {
        match came_from[current.index()] {
            Some(prev) => {
                nodes.push(prev);
                current = prev;
            }
            None => break,
        }
    }
    nodes.reverse();

    let cap = max_path_nodes.max(1);
    let truncated = nodes.len() > cap;
    if truncated {
        nodes.drain(..nodes.len() - cap);
    }
    PathResult {
        nodes,
        total_cost,
        truncated,
    }
}

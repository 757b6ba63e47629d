// Navigation system: the per-level graph plus every agent's path state.
//
// `NavSystem` is the single owner of navigation data for a running level. It
// owns the config, the `NavGraph`, the registry of agents (`AgentNav`, one
// `PathFollower` each) and the `PlanQueue`. The embedding game drives it
// from its single update thread:
//
//   1. Behavior code calls `request_path(agent, start, goal)` whenever it
//      wants a route. The request is queued, not planned.
//   2. Once per frame the game calls `tick()`, which services at most
//      `plans_per_tick` queued requests and reports the outcomes as
//      `NavEvent`s in a `StepResult`.
//   3. Each frame, per agent, the game calls `update_agent(agent, position)`
//      and steers toward the returned point.
//
// `plan_now` is the synchronous escape hatch for callers that cannot wait a
// frame.
//
// ## Invalidation
//
// Every graph mutation made through `NavSystem` (add/remove/connect, flag or
// team changes, level load, regenerate) marks all active paths Stale on the
// spot and re-queues a plan for each affected agent that still has a goal.
// Paths also go Stale on their own (generation mismatch, knocked off the
// corridor) inside `PathFollower::tick`; `update_agent` re-queues those too.
// A new goal or a changed capability profile invalidates that one agent.
//
// See also: `nav.rs` for the graph, `nav_file.rs` for level persistence,
// `pathfinding.rs` for A*, `follower.rs` for the per-agent state machine,
// `queue.rs` for request ordering.
//
// **Critical constraint: determinism.** Agents live in a `BTreeMap` keyed by
// `AgentId` and requests are serviced in submission order, so identical call
// sequences produce identical events.

use crate::capability::CapabilityProfile;
use crate::config::NavConfig;
use crate::error::{NavError, PlanError, Result};
use crate::follower::{FollowState, PathFollower, StaleReason};
use crate::nav::{NavGraph, NavNode};
use crate::nav_file;
use crate::pathfinding;
use crate::queue::PlanQueue;
use crate::types::{AgentId, MoveType, NodeFlags, NodeId, TeamAccess, Vec3};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Navigation state of one registered agent.
#[derive(Clone, Debug)]
pub struct AgentNav {
    pub profile: CapabilityProfile,
    /// Last position reported via `update_agent` (or at registration).
    pub position: Vec3,
    /// The goal of the most recent request, kept for replanning.
    pub goal: Option<Vec3>,
    pub follower: PathFollower,
    /// Why the most recent plan failed, cleared by the next success.
    pub last_error: Option<PlanError>,
}

/// Outcome of a serviced plan request.
#[derive(Clone, Debug, PartialEq)]
pub enum NavEvent {
    PathReady {
        agent: AgentId,
        nodes: usize,
        cost: f32,
    },
    /// A route was found but only its goal end fits in a path.
    PathTruncated {
        agent: AgentId,
        nodes: usize,
        cost: f32,
    },
    PathFailed {
        agent: AgentId,
        error: PlanError,
    },
}

impl NavEvent {
    pub fn agent(&self) -> AgentId {
        match self {
            NavEvent::PathReady { agent, .. }
            | NavEvent::PathTruncated { agent, .. }
            | NavEvent::PathFailed { agent, .. } => *agent,
        }
    }
}

/// The result of one `NavSystem::tick`.
#[derive(Clone, Debug, Default)]
pub struct StepResult {
    pub events: Vec<NavEvent>,
    /// Requests still queued after this tick.
    pub pending: usize,
}

pub struct NavSystem {
    config: NavConfig,
    graph: NavGraph,
    /// Name of the loaded level, if any.
    level: Option<String>,
    agents: BTreeMap<AgentId, AgentNav>,
    queue: PlanQueue,
}

impl NavSystem {
    pub fn new(config: NavConfig) -> Self {
        let graph = NavGraph::with_capacity(config.max_nodes);
        Self {
            config,
            graph,
            level: None,
            agents: BTreeMap::new(),
            queue: PlanQueue::new(),
        }
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    pub fn graph(&self) -> &NavGraph {
        &self.graph
    }

    pub fn level(&self) -> Option<&str> {
        self.level.as_deref()
    }

    // -----------------------------------------------------------------------
    // Graph mutation
    // -----------------------------------------------------------------------

    pub fn add_node(&mut self, position: Vec3, flags: NodeFlags) -> Result<NodeId> {
        let id = self.graph.add(position, flags)?;
        self.invalidate_all(StaleReason::GraphChanged);
        Ok(id)
    }

    /// Remove a node. Paths through it go Stale with `NodeRemoved`, all other
    /// active paths with `GraphChanged`.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        if !self.graph.remove(id) {
            return false;
        }
        for agent in self.agents.values_mut() {
            let reason = if agent.follower.remaining().contains(&id) {
                StaleReason::NodeRemoved
            } else {
                StaleReason::GraphChanged
            };
            agent.follower.invalidate(reason);
        }
        self.requeue_stale();
        true
    }

    pub fn connect(&mut self, a: NodeId, b: NodeId, cost: f32, move_type: MoveType) -> Result<()> {
        self.mutate(|graph| graph.connect(a, b, cost, move_type))
    }

    pub fn set_team_access(&mut self, id: NodeId, access: TeamAccess) -> Result<()> {
        self.mutate(|graph| graph.set_team_access(id, access))
    }

    pub fn set_flags(&mut self, id: NodeId, flags: NodeFlags) -> Result<()> {
        self.mutate(|graph| graph.set_flags(id, flags))
    }

    pub fn clear_graph(&mut self) {
        self.graph.clear();
        self.invalidate_all(StaleReason::GraphChanged);
    }

    pub fn find_nearest(&self, position: Vec3, required: NodeFlags, max_range: f32) -> Option<&NavNode> {
        self.graph
            .find_nearest(position, required, max_range)
            .and_then(|id| self.graph.node(id))
    }

    // -----------------------------------------------------------------------
    // Level persistence
    // -----------------------------------------------------------------------

    /// Load `<maps_dir>/<level>.nav`. On failure the current graph and level
    /// are kept.
    pub fn load_level(&mut self, level: &str) -> Result<usize> {
        let count = nav_file::load_level(&self.config.maps_dir, level, &mut self.graph)?;
        self.level = Some(level.to_string());
        self.invalidate_all(StaleReason::GraphChanged);
        Ok(count)
    }

    /// Save the graph under the current level's name.
    pub fn save_level(&self) -> Result<PathBuf> {
        let level = self.current_level()?;
        nav_file::save_level(&self.config.maps_dir, level, &self.graph)
    }

    /// Administrative rebuild: reload the current level's graph from disk
    /// and invalidate every outstanding path. Refused when `nav_autogen` is
    /// off.
    pub fn regenerate(&mut self) -> Result<usize> {
        if !self.config.nav_autogen {
            warn!("regenerate refused: nav_autogen is disabled");
            return Err(NavError::Validation("nav_autogen is disabled".into()));
        }
        let level = self.current_level()?.to_string();
        info!("regenerating navigation for {level:?}");
        let result = nav_file::load_level(&self.config.maps_dir, &level, &mut self.graph);
        self.invalidate_all(StaleReason::GraphChanged);
        result
    }

    fn current_level(&self) -> Result<&str> {
        self.level
            .as_deref()
            .ok_or_else(|| NavError::Validation("no level loaded".into()))
    }

    // -----------------------------------------------------------------------
    // Agents
    // -----------------------------------------------------------------------

    /// Register an agent, or update the profile and position of one already
    /// registered.
    pub fn register_agent(&mut self, agent: AgentId, profile: CapabilityProfile, position: Vec3) -> Result<()> {
        if let Some(existing) = self.agents.get_mut(&agent) {
            existing.position = position;
            return self.set_profile(agent, profile);
        }
        if self.agents.len() >= self.config.max_agents {
            warn!("cannot register {agent}: {} agents already", self.agents.len());
            return Err(NavError::AgentLimit {
                max: self.config.max_agents,
            });
        }
        self.agents.insert(
            agent,
            AgentNav {
                profile,
                position,
                goal: None,
                follower: PathFollower::new(),
                last_error: None,
            },
        );
        debug!("registered {agent} ({:?})", profile.team);
        Ok(())
    }

    /// Forget an agent and drop its pending request.
    pub fn remove_agent(&mut self, agent: AgentId) -> bool {
        self.queue.cancel(agent);
        self.agents.remove(&agent).is_some()
    }

    /// Change an agent's capabilities (class change). An active path planned
    /// under the old profile goes Stale and is replanned.
    pub fn set_profile(&mut self, agent: AgentId, profile: CapabilityProfile) -> Result<()> {
        let nav = self.agent_mut(agent)?;
        if nav.profile == profile {
            return Ok(());
        }
        nav.profile = profile;
        nav.follower.invalidate(StaleReason::ProfileChanged);
        self.requeue_stale();
        Ok(())
    }

    pub fn agent(&self, agent: AgentId) -> Option<&AgentNav> {
        self.agents.get(&agent)
    }

    pub fn agent_state(&self, agent: AgentId) -> Option<FollowState> {
        self.agents.get(&agent).map(|a| a.follower.state())
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn pending_requests(&self) -> usize {
        self.queue.len()
    }

    // -----------------------------------------------------------------------
    // Planning and following
    // -----------------------------------------------------------------------

    /// Queue a route request from `start` to `goal`, serviced by a later
    /// `tick`. The plan starts from wherever the agent was last reported
    /// when the request is serviced. A new goal invalidates the agent's
    /// current path.
    pub fn request_path(&mut self, agent: AgentId, start: Vec3, goal: Vec3) -> Result<()> {
        let nav = self.agent_mut(agent)?;
        nav.position = start;
        if nav.goal != Some(goal) {
            nav.follower.invalidate(StaleReason::GoalChanged);
        }
        nav.goal = Some(goal);
        self.queue.push(agent, goal);
        Ok(())
    }

    /// Plan a route immediately, bypassing the queue. Any queued request for
    /// the agent is dropped.
    pub fn plan_now(&mut self, agent: AgentId, start: Vec3, goal: Vec3) -> Result<NavEvent> {
        let nav = self.agent_mut(agent)?;
        nav.position = start;
        nav.goal = Some(goal);
        self.queue.cancel(agent);
        self.service(agent, goal)
    }

    /// Service up to `plans_per_tick` queued requests.
    pub fn tick(&mut self) -> StepResult {
        let mut events = Vec::new();
        for _ in 0..self.config.plans_per_tick {
            let Some(request) = self.queue.pop_next() else {
                break;
            };
            match self.service(request.agent, request.goal) {
                Ok(event) => events.push(event),
                Err(e) => warn!("dropping plan request: {e}"),
            }
        }
        StepResult {
            events,
            pending: self.queue.len(),
        }
    }

    /// Report the agent's position and get its steering target. Returns
    /// `None` when there is nothing to follow (no path, arrived, stale).
    pub fn update_agent(&mut self, agent: AgentId, position: Vec3) -> Result<Option<Vec3>> {
        let nav = self
            .agents
            .get_mut(&agent)
            .ok_or(NavError::UnknownAgent(agent))?;
        nav.position = position;
        let target = nav.follower.tick(
            &self.graph,
            position,
            self.config.arrival_distance,
            self.config.corridor_slack,
        );
        if let (FollowState::Stale(reason), Some(goal)) = (nav.follower.state(), nav.goal) {
            if self.queue.push(agent, goal) {
                debug!("{agent}: path stale ({reason:?}), replanning");
            }
        }
        Ok(target)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn agent_mut(&mut self, agent: AgentId) -> Result<&mut AgentNav> {
        self.agents
            .get_mut(&agent)
            .ok_or(NavError::UnknownAgent(agent))
    }

    /// Run a graph mutation; if it changed anything, invalidate all paths.
    fn mutate(&mut self, op: impl FnOnce(&mut NavGraph) -> Result<()>) -> Result<()> {
        let before = self.graph.generation();
        op(&mut self.graph)?;
        if self.graph.generation() != before {
            self.invalidate_all(StaleReason::GraphChanged);
        }
        Ok(())
    }

    fn invalidate_all(&mut self, reason: StaleReason) {
        for nav in self.agents.values_mut() {
            nav.follower.invalidate(reason);
        }
        self.requeue_stale();
    }

    /// Queue a replan for every Stale agent that still has a goal.
    fn requeue_stale(&mut self) {
        for (&agent, nav) in &self.agents {
            if let Some(goal) = nav.goal.filter(|_| nav.follower.is_stale()) {
                self.queue.push(agent, goal);
            }
        }
    }

    fn service(&mut self, agent: AgentId, goal: Vec3) -> Result<NavEvent> {
        let nav = self
            .agents
            .get_mut(&agent)
            .ok_or(NavError::UnknownAgent(agent))?;
        let planned = pathfinding::plan_path(&self.graph, nav.position, goal, &nav.profile, &self.config);
        let event = match planned {
            Ok(path) => {
                let (nodes, cost, truncated) = (path.nodes.len(), path.total_cost, path.truncated);
                nav.follower.start(path, nav.position, self.graph.generation());
                nav.last_error = None;
                if truncated {
                    NavEvent::PathTruncated { agent, nodes, cost }
                } else {
                    NavEvent::PathReady { agent, nodes, cost }
                }
            }
            Err(error) => {
                debug!("{agent}: no path to {goal}: {error}");
                nav.follower.clear();
                nav.last_error = Some(error);
                NavEvent::PathFailed { agent, error }
            }
        };
        Ok(event)
    }
}

// Plan request queue for time-sliced pathfinding.
//
// Agents ask for routes whenever their behavior layer decides to; the
// navigator services only a few requests per tick so a burst of requests
// never stalls a frame. Requests wait here in submission order.
//
// Each agent has at most one pending request. Asking again before the first
// is serviced replaces the goal but keeps the original place in line, so an
// agent that re-targets every tick still gets planned for.
//
// See also: `navigator.rs` which drains this queue in `tick`.
//
// **Critical constraint: determinism.** Requests are keyed by a monotonic
// sequence number; service order depends only on submission order.

use crate::types::{AgentId, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A pending route request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub agent: AgentId,
    pub goal: Vec3,
}

/// FIFO of plan requests, at most one per agent.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlanQueue {
    pending: BTreeMap<u64, PlanRequest>,
    by_agent: BTreeMap<AgentId, u64>,
    /// Monotonic counter for submission order.
    next_sequence: u64,
}

impl PlanQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a request. Returns `false` if it replaced a pending request for
    /// the same agent.
    pub fn push(&mut self, agent: AgentId, goal: Vec3) -> bool {
        let existing = self
            .by_agent
            .get(&agent)
            .and_then(|seq| self.pending.get_mut(seq));
        if let Some(existing) = existing {
            existing.goal = goal;
            return false;
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.pending.insert(
            sequence,
            PlanRequest { agent, goal },
        );
        self.by_agent.insert(agent, sequence);
        true
    }

    /// Take the oldest pending request.
    pub fn pop_next(&mut self) -> Option<PlanRequest> {
        let (_, request) = self.pending.pop_first()?;
        self.by_agent.remove(&request.agent);
        Some(request)
    }

    /// Drop an agent's pending request, if any.
    pub fn cancel(&mut self, agent: AgentId) -> bool {
        match self.by_agent.remove(&agent) {
            Some(seq) => self.pending.remove(&seq).is_some(),
            None => false,
        }
    }

    pub fn pending_goal(&self, agent: AgentId) -> Option<Vec3> {
        let seq = self.by_agent.get(&agent)?;
        self.pending.get(seq).map(|r| r.goal)
    }

    pub fn contains(&self, agent: AgentId) -> bool {
        self.by_agent.contains_key(&agent)
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

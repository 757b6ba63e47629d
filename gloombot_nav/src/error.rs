// Error types for the navigation crate.
//
// Two error enums, both `thiserror`-derived:
// - `NavError`: graph mutation, persistence, agent registry, and
//   configuration failures.
// - `PlanError`: reasons a plan request produced no route.
//
// Every failure maps onto one of four `ErrorKind`s (validation, capacity,
// not-found, io). None of them is fatal: each operation either fully applies
// or leaves prior state untouched, and the caller picks a fallback (idle,
// wander, empty graph).
//
// See also: `nav.rs` and `nav_file.rs` which produce `NavError`,
// `pathfinding.rs` which produces `PlanError`.

use crate::types::{AgentId, NodeId};
use thiserror::Error;

/// Coarse failure category, for callers that only care about the class of
/// failure (retry later, give up for this level, fall back to wandering).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or out-of-range input. Prior state preserved.
    Validation,
    /// Graph or neighbor list full.
    Capacity,
    /// No qualifying node or route.
    NotFound,
    /// File open/read/write failure.
    Io,
}

/// Errors from graph mutation, nav file persistence, and config loading.
#[derive(Error, Debug)]
pub enum NavError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("node graph full ({capacity} nodes)")]
    GraphFull { capacity: usize },

    #[error("node {node} neighbor list full")]
    NeighborsFull { node: NodeId },

    #[error("agent limit reached ({max} agents)")]
    AgentLimit { max: usize },

    #[error("unknown agent {0}")]
    UnknownAgent(AgentId),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl NavError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NavError::Validation(_) | NavError::Config(_) => ErrorKind::Validation,
            NavError::GraphFull { .. }
            | NavError::NeighborsFull { .. }
            | NavError::AgentLimit { .. } => ErrorKind::Capacity,
            NavError::UnknownAgent(_) => ErrorKind::NotFound,
            NavError::Io(_) => ErrorKind::Io,
        }
    }
}

/// Why a plan request yielded no path.
///
/// Capability and team filtering are expected outcomes, not bugs: they
/// surface as `NoStartNode`, `NoGoalNode`, or `Unreachable`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanError {
    #[error("navigation graph has no live nodes")]
    EmptyGraph,

    #[error("no usable node near the start position")]
    NoStartNode,

    #[error("no usable node near the goal position")]
    NoGoalNode,

    #[error("goal is unreachable with the agent's capabilities")]
    Unreachable,

    #[error("search expanded {0} nodes without reaching the goal")]
    ExpansionLimit(usize),
}

impl PlanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlanError::EmptyGraph => ErrorKind::Validation,
            _ => ErrorKind::NotFound,
        }
    }
}

pub type Result<T> = std::result::Result<T, NavError>;

// gloombot_nav: waypoint navigation library for team-based combat bots.
//
// This crate contains the navigation backbone for autonomous agents: a
// persistent waypoint graph of traversable space, capability-aware A*
// planning over it, and per-agent path following. It has no engine
// dependencies and can be tested, benchmarked, and run headless; the game
// supplies positions and consumes steering points.
//
// Module overview:
// - `navigator.rs`:   NavSystem: owns graph, agents and plan queue; tick loop.
// - `nav.rs`:         NavGraph arena: nodes, symmetric edges, nearest-node queries.
// - `nav_file.rs`:    Binary `.nav` level files (validate-then-commit load).
// - `pathfinding.rs`: A* over the graph, filtered by a capability profile.
// - `follower.rs`:    PathFollower state machine (NoPath/Following/Arrived/Stale).
// - `queue.rs`:       PlanQueue, one pending request per agent, FIFO.
// - `capability.rs`:  GameClass, ClassMovement table, CapabilityProfile.
// - `config.rs`:      NavConfig: all tunable limits and distances, from JSON.
// - `error.rs`:       NavError / PlanError and their ErrorKind taxonomy.
// - `types.rs`:       Vec3, NodeId, AgentId, Team and the bitflag sets.
//
// The companion crate `gloombot_navtool` inspects `.nav` files and runs
// plans against them from the command line.
//
// **Critical constraint: determinism.** Every operation is a pure function
// of its inputs. No `HashMap`, no system time, no randomness. Use
// `BTreeMap` for ordered collections.

pub mod capability;
pub mod config;
pub mod error;
pub mod follower;
pub mod nav;
pub mod nav_file;
pub mod navigator;
pub mod pathfinding;
pub mod queue;
pub mod types;

pub use capability::{CapabilityProfile, GameClass};
pub use config::NavConfig;
pub use error::{ErrorKind, NavError, PlanError};
pub use follower::{FollowState, PathFollower, StaleReason};
pub use nav::{NavGraph, NavNode};
pub use navigator::{NavEvent, NavSystem, StepResult};
pub use pathfinding::PathResult;
pub use types::{AgentId, MoveCapabilities, MoveType, NodeFlags, NodeId, Team, TeamAccess, Vec3};

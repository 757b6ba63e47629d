// Core types shared across the navigation crate.
//
// Defines world positions (`Vec3`), the compact node and agent identifiers,
// team affiliation, and the tagged flag sets used by nodes, edges, and
// agents (`NodeFlags`, `TeamAccess`, `MoveType`, `MoveCapabilities`).
//
// The numeric values of `NodeFlags`, `TeamAccess`, and `MoveType` are part of
// the `.nav` file format (see `nav_file.rs`) and must never be renumbered.
//
// **Critical constraint: determinism.** Nothing here reads ambient state.
// Distances use plain f32 arithmetic; callers that order by distance use
// `total_cmp`.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Sub;

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A position in world space, in map units.
///
/// Follows the engine's convention: X and Y span the horizontal plane and Z
/// points up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Squared Euclidean distance. Used for all nearest-node comparisons.
    pub fn distance_squared(self, other: Self) -> f32 {
        let d = self - other;
        d.dot(d)
    }

    pub fn distance(self, other: Self) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Shortest distance from `self` to the segment `a`–`b`. Degenerate
    /// segments (a == b) fall back to point distance.
    pub fn distance_to_segment(self, a: Self, b: Self) -> f32 {
        let ab = b - a;
        let len_sq = ab.dot(ab);
        if len_sq <= f32::EPSILON {
            return self.distance(a);
        }
        let t = ((self - a).dot(ab) / len_sq).clamp(0.0, 1.0);
        let closest = Self::new(a.x + ab.x * t, a.y + ab.y * t, a.z + ab.z * t);
        self.distance(closest)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Compact identifier for a navigation node. Always equal to the node's
/// storage slot in `NavGraph`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier for an agent (bot) using the navigation system. Assigned by
/// the caller, typically the bot's client slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AgentId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

/// The two opposing sides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Team {
    Human,
    Alien,
}

impl Team {
    /// The team-access bit a node must carry for this team to use it.
    pub fn access(self) -> TeamAccess {
        match self {
            Team::Human => TeamAccess::HUMAN,
            Team::Alien => TeamAccess::ALIEN,
        }
    }
}

bitflags! {
    /// Which teams may use a node.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct TeamAccess: u32 {
        const HUMAN = 0x01;
        const ALIEN = 0x02;
        const ALL = Self::HUMAN.bits() | Self::ALIEN.bits();
    }
}

// ---------------------------------------------------------------------------
// Node types and movement
// ---------------------------------------------------------------------------

bitflags! {
    /// Node type bitmask. A single node may carry several types, e.g. a ledge
    /// at the edge of a pool can be both `GROUND` and `WATER`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct NodeFlags: u32 {
        /// Standard walkable floor position.
        const GROUND = 0x0001;
        /// Requires a jump to reach.
        const JUMP = 0x0002;
        /// Wall or ceiling surface only wall-walking classes can hold.
        const WALLCLIMB = 0x0004;
        /// Aerial node.
        const FLY = 0x0008;
        /// Underwater / swim node.
        const WATER = 0x0010;
        const LADDER = 0x0020;
        /// Human teleporter spawn anchor.
        const TELEPORTER = 0x0040;
        /// Alien egg spawn anchor.
        const EGG = 0x0080;
        /// Good defensive / camping position.
        const CAMP = 0x0100;
        /// Good ranged-attack position.
        const SNIPE = 0x0200;
        /// Good ambush position.
        const AMBUSH = 0x0400;
        /// Item, health, or ammo pickup.
        const ITEM = 0x0800;

        // Bits written by newer tools survive a load/save cycle.
        const _ = !0;
    }
}

/// The movement capability an edge demands of whoever traverses it.
///
/// Discriminants are the values stored in the nav file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(i32)]
pub enum MoveType {
    Walk = 0,
    Jump = 1,
    Climb = 2,
    Fly = 3,
    Swim = 4,
    Ladder = 5,
}

impl MoveType {
    pub const ALL: [MoveType; 6] = [
        MoveType::Walk,
        MoveType::Jump,
        MoveType::Climb,
        MoveType::Fly,
        MoveType::Swim,
        MoveType::Ladder,
    ];

    /// Decode a stored movement type. Returns `None` for unknown values.
    pub fn from_raw(raw: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.raw() == raw)
    }

    pub fn raw(self) -> i32 {
        self as i32
    }

    /// The capability bit an agent needs to traverse an edge of this type.
    pub fn capability(self) -> MoveCapabilities {
        match self {
            MoveType::Walk => MoveCapabilities::WALK,
            MoveType::Jump => MoveCapabilities::JUMP,
            MoveType::Climb => MoveCapabilities::CLIMB,
            MoveType::Fly => MoveCapabilities::FLY,
            MoveType::Swim => MoveCapabilities::SWIM,
            MoveType::Ladder => MoveCapabilities::LADDER,
        }
    }
}

bitflags! {
    /// The set of movement abilities an agent has.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct MoveCapabilities: u8 {
        const WALK = 0x01;
        const JUMP = 0x02;
        const CLIMB = 0x04;
        const FLY = 0x08;
        const SWIM = 0x10;
        const LADDER = 0x20;
    }
}

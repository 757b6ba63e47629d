// Agent capability profiles: what a bot can traverse and which nodes its
// team may use.
//
// Movement differences between player classes (wall-walking aliens, the
// flying Wraith, ladder-using humans) are data, not code. Each `GameClass`
// maps to a `ClassMovement` entry in the config's class table; the
// pathfinder only ever sees the resulting `CapabilityProfile` and never
// branches on class.
//
// An edge is traversable iff the profile holds the capability bit for the
// edge's `MoveType` AND the edge's target node admits the profile's team.
//
// See also: `config.rs` where the class table lives, `pathfinding.rs` which
// filters edges through `CapabilityProfile`, `types.rs` for the flag types.

use crate::config::NavConfig;
use crate::error::NavError;
use crate::nav::{NavEdge, NavGraph, NavNode};
use crate::types::{MoveCapabilities, MoveType, Team};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Player classes, humans first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GameClass {
    Grunt,
    ShockTrooper,
    Biotech,
    HeavyTrooper,
    Commando,
    Exterminator,
    Engineer,
    Mech,
    Hatchling,
    Drone,
    Wraith,
    Kamikaze,
    Stinger,
    Guardian,
    Breeder,
    Stalker,
}

impl GameClass {
    pub const ALL: [GameClass; 16] = [
        GameClass::Grunt,
        GameClass::ShockTrooper,
        GameClass::Biotech,
        GameClass::HeavyTrooper,
        GameClass::Commando,
        GameClass::Exterminator,
        GameClass::Engineer,
        GameClass::Mech,
        GameClass::Hatchling,
        GameClass::Drone,
        GameClass::Wraith,
        GameClass::Kamikaze,
        GameClass::Stinger,
        GameClass::Guardian,
        GameClass::Breeder,
        GameClass::Stalker,
    ];

    pub fn team(self) -> Team {
        if self <= GameClass::Mech {
            Team::Human
        } else {
            Team::Alien
        }
    }

    /// In-game display name.
    pub fn name(self) -> &'static str {
        match self {
            GameClass::Grunt => "Grunt",
            GameClass::ShockTrooper => "ST",
            GameClass::Biotech => "Biotech",
            GameClass::HeavyTrooper => "HT",
            GameClass::Commando => "Commando",
            GameClass::Exterminator => "Exterminator",
            GameClass::Engineer => "Engineer",
            GameClass::Mech => "Mech",
            GameClass::Hatchling => "Hatchling",
            GameClass::Drone => "Drone",
            GameClass::Wraith => "Wraith",
            GameClass::Kamikaze => "Kamikaze",
            GameClass::Stinger => "Stinger",
            GameClass::Guardian => "Guardian",
            GameClass::Breeder => "Breeder",
            GameClass::Stalker => "Stalker",
        }
    }
}

impl fmt::Display for GameClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts the display name or the enum name, case-insensitively
/// ("ST", "shocktrooper").
impl FromStr for GameClass {
    type Err = NavError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GameClass::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s) || format!("{c:?}").eq_ignore_ascii_case(s))
            .ok_or_else(|| NavError::Validation(format!("unknown class {s:?}")))
    }
}

/// Config table entry: the team and movement abilities of one class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassMovement {
    pub team: Team,
    pub moves: MoveCapabilities,
}

impl ClassMovement {
    /// Built-in movement for a class. Everyone walks, jumps and swims;
    /// humans use ladders, wall-walking aliens climb, the Wraith flies.
    pub fn builtin(class: GameClass) -> Self {
        let base = MoveCapabilities::WALK | MoveCapabilities::JUMP | MoveCapabilities::SWIM;
        let extra = match class {
            GameClass::Wraith => MoveCapabilities::FLY,
            c if c.team() == Team::Human => MoveCapabilities::LADDER,
            _ => MoveCapabilities::CLIMB,
        };
        Self {
            team: class.team(),
            moves: base | extra,
        }
    }
}

/// The built-in class table, one entry per `GameClass`.
pub fn default_class_table() -> BTreeMap<GameClass, ClassMovement> {
    GameClass::ALL
        .into_iter()
        .map(|c| (c, ClassMovement::builtin(c)))
        .collect()
}

/// Team plus movement abilities of one agent. Immutable for the life of a
/// plan; changing it invalidates any path planned under the old profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityProfile {
    pub team: Team,
    pub moves: MoveCapabilities,
}

impl CapabilityProfile {
    pub fn new(team: Team, moves: MoveCapabilities) -> Self {
        Self { team, moves }
    }

    /// Profile for a class, from the config's class table. Classes missing
    /// from the table get their built-in movement.
    pub fn for_class(config: &NavConfig, class: GameClass) -> Self {
        let entry = config
            .classes
            .get(&class)
            .cloned()
            .unwrap_or_else(|| ClassMovement::builtin(class));
        Self::new(entry.team, entry.moves)
    }

    pub fn can_traverse(&self, move_type: MoveType) -> bool {
        self.moves.contains(move_type.capability())
    }

    /// Whether the node admits this profile's team.
    pub fn can_enter(&self, node: &NavNode) -> bool {
        node.team_access.contains(self.team.access())
    }

    /// Whether an edge may be followed: capability for its move type and
    /// team access at its target.
    pub fn can_follow(&self, graph: &NavGraph, edge: &NavEdge) -> bool {
        self.can_traverse(edge.move_type) && graph.node(edge.to).is_some_and(|n| self.can_enter(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NodeFlags, TeamAccess, Vec3};

    #[test]
    fn teams_split_at_mech() {
        let humans = GameClass::ALL.iter().filter(|c| c.team() == Team::Human).count();
        assert_eq!(humans, 8);
        assert_eq!(GameClass::Mech.team(), Team::Human);
        assert_eq!(GameClass::Hatchling.team(), Team::Alien);
    }

    #[test]
    fn builtin_movement_by_class() {
        let grunt = ClassMovement::builtin(GameClass::Grunt);
        assert!(grunt.moves.contains(MoveCapabilities::LADDER));
        assert!(!grunt.moves.contains(MoveCapabilities::CLIMB));

        let drone = ClassMovement::builtin(GameClass::Drone);
        assert!(drone.moves.contains(MoveCapabilities::CLIMB));
        assert!(!drone.moves.contains(MoveCapabilities::FLY));

        let wraith = ClassMovement::builtin(GameClass::Wraith);
        assert!(wraith.moves.contains(MoveCapabilities::FLY));
        assert!(!wraith.moves.contains(MoveCapabilities::CLIMB));

        for class in GameClass::ALL {
            assert!(ClassMovement::builtin(class).moves.contains(MoveCapabilities::WALK));
        }
    }

    #[test]
    fn parse_class_names() {
        assert_eq!("ST".parse::<GameClass>().unwrap(), GameClass::ShockTrooper);
        assert_eq!("shocktrooper".parse::<GameClass>().unwrap(), GameClass::ShockTrooper);
        assert_eq!("wraith".parse::<GameClass>().unwrap(), GameClass::Wraith);
        assert!("Marine".parse::<GameClass>().is_err());
    }

    #[test]
    fn profile_reads_config_table() {
        let mut config = NavConfig::default();
        config.classes.insert(
            GameClass::Grunt,
            ClassMovement {
                team: Team::Human,
                moves: MoveCapabilities::WALK,
            },
        );
        let grunt = CapabilityProfile::for_class(&config, GameClass::Grunt);
        assert!(!grunt.can_traverse(MoveType::Jump));

        config.classes.remove(&GameClass::Drone);
        let drone = CapabilityProfile::for_class(&config, GameClass::Drone);
        assert!(drone.can_traverse(MoveType::Climb));
    }

    #[test]
    fn follow_needs_capability_and_team_access() {
        let mut graph = NavGraph::new();
        let a = graph.add(Vec3::ZERO, NodeFlags::GROUND).unwrap();
        let b = graph.add(Vec3::new(0.0, 0.0, 64.0), NodeFlags::WALLCLIMB).unwrap();
        graph.connect(a, b, 64.0, MoveType::Climb).unwrap();
        let edge = graph.neighbors(a)[0];

        let config = NavConfig::default();
        let drone = CapabilityProfile::for_class(&config, GameClass::Drone);
        let grunt = CapabilityProfile::for_class(&config, GameClass::Grunt);
        assert!(drone.can_follow(&graph, &edge));
        assert!(!grunt.can_follow(&graph, &edge));

        graph.set_team_access(b, TeamAccess::HUMAN).unwrap();
        assert!(!drone.can_follow(&graph, &edge));
    }
}

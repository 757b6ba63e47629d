// Data-driven navigation configuration.
//
// All tunable navigation parameters live in `NavConfig`, loaded from JSON at
// startup. Navigation code never hard-codes limits or distances; it reads
// them from the config. Every field has a default, so a config file only
// needs to name what it overrides (`{}` is a valid config).
//
// Class movement data (team, capability bits) lives in `ClassMovement`
// entries keyed by `GameClass` in the `classes` map (see `capability.rs`).
//
// See also: `navigator.rs` which owns the `NavConfig`, `pathfinding.rs` for
// `SearchLimits`, `capability.rs` for the class table.
//
// **Critical constraint: determinism.** The class table is a `BTreeMap` so
// serialized configs are stable and iteration order never varies.

use crate::capability::{ClassMovement, GameClass, default_class_table};
use crate::error::{NavError, Result};
use crate::nav::MAX_NAV_NODES;
use crate::pathfinding::SearchLimits;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level navigation configuration. Loaded from JSON, never mutated by
/// the navigation system itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    /// Node capacity of each level graph.
    pub max_nodes: usize,

    /// Longest path handed to an agent. Longer routes are truncated to
    /// their last `max_path_nodes` nodes.
    pub max_path_nodes: usize,

    /// Node expansions a single A* search may perform before giving up.
    pub max_search_expansions: usize,

    /// Maximum distance for snapping start/goal positions onto the graph.
    /// Zero or negative means unlimited.
    pub snap_max_range: f32,

    /// An agent this close to its target node counts as having reached it.
    pub arrival_distance: f32,

    /// How far an agent may stray from its current path leg before the path
    /// is considered stale.
    pub corridor_slack: f32,

    /// Queued plan requests serviced per `NavSystem::tick`.
    pub plans_per_tick: usize,

    /// Maximum registered agents.
    pub max_agents: usize,

    /// Directory holding `<level>.nav` files.
    pub maps_dir: PathBuf,

    /// Whether an in-game regenerate request is honored.
    pub nav_autogen: bool,

    /// Per-class team and movement abilities.
    pub classes: BTreeMap<GameClass, ClassMovement>,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            max_nodes: MAX_NAV_NODES,
            max_path_nodes: 256,
            max_search_expansions: 8192,
            snap_max_range: 0.0,
            arrival_distance: 32.0,
            corridor_slack: 256.0,
            plans_per_tick: 2,
            max_agents: 16,
            maps_dir: PathBuf::from("maps"),
            nav_autogen: true,
            classes: default_class_table(),
        }
    }
}

impl NavConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: NavConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn search_limits(&self) -> SearchLimits {
        SearchLimits {
            max_path_nodes: self.max_path_nodes,
            max_expansions: self.max_search_expansions,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.max_path_nodes == 0 {
            return Err(NavError::Validation("max_path_nodes must be at least 1".into()));
        }
        if self.max_search_expansions == 0 {
            return Err(NavError::Validation(
                "max_search_expansions must be at least 1".into(),
            ));
        }
        if self.plans_per_tick == 0 {
            return Err(NavError::Validation("plans_per_tick must be at least 1".into()));
        }
        if self.max_agents == 0 {
            return Err(NavError::Validation("max_agents must be at least 1".into()));
        }
        if !self.snap_max_range.is_finite() {
            return Err(NavError::Validation(format!(
                "snap_max_range must be a finite number, got {}",
                self.snap_max_range
            )));
        }
        if !self.arrival_distance.is_finite() || self.arrival_distance < 0.0 {
            return Err(NavError::Validation(format!(
                "arrival_distance must be a non-negative number, got {}",
                self.arrival_distance
            )));
        }
        if !self.corridor_slack.is_finite() || self.corridor_slack <= 0.0 {
            return Err(NavError::Validation(format!(
                "corridor_slack must be positive, got {}",
                self.corridor_slack
            )));
        }
        if let Some((class, entry)) = self.classes.iter().find(|(c, e)| c.team() != e.team) {
            return Err(NavError::Validation(format!(
                "class {class} listed under team {:?}",
                entry.team
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::{MoveCapabilities, Team};

    #[test]
    fn default_config_serializes() {
        let config = NavConfig::default();
        let json = config.to_json().unwrap();
        let restored = NavConfig::from_json(&json).unwrap();
        assert_eq!(config.max_nodes, restored.max_nodes);
        assert_eq!(config.max_path_nodes, restored.max_path_nodes);
        assert_eq!(config.maps_dir, restored.maps_dir);
        assert_eq!(config.classes, restored.classes);
    }

    #[test]
    fn empty_object_is_default() {
        let config = NavConfig::from_json("{}").unwrap();
        assert_eq!(config.max_nodes, 1024);
        assert_eq!(config.max_path_nodes, 256);
        assert_eq!(config.plans_per_tick, 2);
        assert_eq!(config.classes.len(), 16);
        assert!(config.nav_autogen);
    }

    #[test]
    fn config_loads_from_json_string() {
        let json = r#"{
            "max_nodes": 512,
            "snap_max_range": 400.0,
            "maps_dir": "baseq2/maps",
            "nav_autogen": false,
            "classes": {
                "Wraith": { "team": "Alien", "moves": "WALK | FLY" }
            }
        }"#;
        let config = NavConfig::from_json(json).unwrap();
        assert_eq!(config.max_nodes, 512);
        assert_eq!(config.snap_max_range, 400.0);
        assert_eq!(config.maps_dir, PathBuf::from("baseq2/maps"));
        assert!(!config.nav_autogen);
        assert_eq!(config.classes.len(), 1);
        let wraith = &config.classes[&GameClass::Wraith];
        assert_eq!(wraith.moves, MoveCapabilities::WALK | MoveCapabilities::FLY);
        // Untouched fields keep defaults.
        assert_eq!(config.arrival_distance, 32.0);
    }

    #[test]
    fn rejects_bad_values() {
        let bad_json = NavConfig::from_json("{ \"max_nodes\": \"many\" }").unwrap_err();
        assert_eq!(bad_json.kind(), ErrorKind::Validation);

        for zeroed in ["max_path_nodes", "max_search_expansions", "plans_per_tick", "max_agents"] {
            let err = NavConfig::from_json(&format!("{{ \"{zeroed}\": 0 }}")).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{zeroed}");
        }

        for range in [f32::INFINITY, f32::NAN] {
            let config = NavConfig {
                snap_max_range: range,
                ..NavConfig::default()
            };
            assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::Validation);
        }

        let wrong_team = r#"{ "classes": { "Grunt": { "team": "Alien", "moves": "WALK" } } }"#;
        assert!(NavConfig::from_json(wrong_team).is_err());
    }

    #[test]
    fn search_limits_follow_config() {
        let config = NavConfig {
            max_path_nodes: 10,
            max_search_expansions: 99,
            ..NavConfig::default()
        };
        let limits = config.search_limits();
        assert_eq!(limits.max_path_nodes, 10);
        assert_eq!(limits.max_expansions, 99);
        assert_eq!(config.classes[&GameClass::Grunt].team, Team::Human);
    }
}

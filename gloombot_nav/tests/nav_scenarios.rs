// End-to-end navigation scenarios through the public API: build a level
// graph, persist it, reload it, plan for different classes and follow the
// result.

use gloombot_nav::nav_file;
use gloombot_nav::pathfinding::plan_path;
use gloombot_nav::{
    AgentId, CapabilityProfile, ErrorKind, FollowState, GameClass, MoveType, NavConfig, NavEvent,
    NavGraph, NavSystem, NodeFlags, NodeId, PlanError, StaleReason, TeamAccess, Vec3,
};
use std::collections::BTreeSet;
use tempfile::TempDir;

fn x(v: f32) -> Vec3 {
    Vec3::new(v, 0.0, 0.0)
}

/// Nodes 0, 1, 2 at x = 0, 100, 200; 0↔1 walk cost 100, 1↔2 climb cost 100.
fn three_node_graph() -> NavGraph {
    let mut graph = NavGraph::new();
    for v in [0.0, 100.0, 200.0] {
        graph.add(x(v), NodeFlags::GROUND).unwrap();
    }
    graph.connect(NodeId(0), NodeId(1), 100.0, MoveType::Walk).unwrap();
    graph.connect(NodeId(1), NodeId(2), 100.0, MoveType::Climb).unwrap();
    graph
}

/// Edge sets as comparable (from, to, cost bits, move type) tuples.
fn edge_set(graph: &NavGraph) -> BTreeSet<(u32, u32, u32, i32)> {
    graph
        .nodes()
        .flat_map(|n| {
            n.edges
                .iter()
                .map(move |e| (n.id.0, e.to.0, e.cost.to_bits(), e.move_type.raw()))
        })
        .collect()
}

#[test]
fn climb_route_depends_on_class() {
    let graph = three_node_graph();
    let config = NavConfig::default();
    let grunt = CapabilityProfile::for_class(&config, GameClass::Grunt);
    let stalker = CapabilityProfile::for_class(&config, GameClass::Stalker);

    assert_eq!(
        plan_path(&graph, x(0.0), x(200.0), &grunt, &config).unwrap_err(),
        PlanError::Unreachable
    );
    let path = plan_path(&graph, x(0.0), x(200.0), &stalker, &config).unwrap();
    assert_eq!(path.nodes, vec![NodeId(0), NodeId(1), NodeId(2)]);
    assert_eq!(path.total_cost, 200.0);
}

#[test]
fn removing_middle_node_isolates_ends() {
    let mut graph = three_node_graph();
    assert!(graph.remove(NodeId(1)));
    assert!(graph.neighbors(NodeId(0)).is_empty());
    assert!(graph.neighbors(NodeId(2)).is_empty());
}

#[test]
fn save_then_load_reproduces_graph() {
    let tmp = TempDir::new().unwrap();
    let mut graph = three_node_graph();
    graph.set_team_access(NodeId(2), TeamAccess::ALIEN).unwrap();
    graph
        .set_flags(NodeId(1), NodeFlags::GROUND | NodeFlags::SNIPE)
        .unwrap();
    nav_file::save_level(tmp.path(), "bunker", &graph).unwrap();

    let mut loaded = NavGraph::new();
    nav_file::load_level(tmp.path(), "bunker", &mut loaded).unwrap();
    assert_eq!(loaded.live_count(), 3);
    for (a, b) in graph.nodes().zip(loaded.nodes()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.position, b.position);
        assert_eq!(a.flags, b.flags);
        assert_eq!(a.team_access, b.team_access);
    }
    assert_eq!(edge_set(&graph), edge_set(&loaded));
}

#[test]
fn truncated_file_leaves_graph_untouched() {
    let tmp = TempDir::new().unwrap();
    let path = nav_file::save_level(tmp.path(), "bunker", &three_node_graph()).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 5]).unwrap();

    let mut graph = NavGraph::new();
    graph.add(x(42.0), NodeFlags::ITEM).unwrap();
    let err = nav_file::load_level(tmp.path(), "bunker", &mut graph).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(graph.live_count(), 1);
    assert!(graph.node(NodeId(0)).unwrap().flags.contains(NodeFlags::ITEM));
}

#[test]
fn agents_follow_and_replan_after_level_reload() {
    let tmp = TempDir::new().unwrap();
    nav_file::save_level(tmp.path(), "bunker", &three_node_graph()).unwrap();

    let config = NavConfig {
        maps_dir: tmp.path().to_path_buf(),
        ..NavConfig::default()
    };
    let mut nav = NavSystem::new(config);
    assert_eq!(nav.load_level("bunker").unwrap(), 3);

    let wraith = AgentId(4);
    let breeder = AgentId(5);
    let profile = |class| CapabilityProfile::for_class(nav.config(), class);
    let (wraith_profile, breeder_profile) = (profile(GameClass::Wraith), profile(GameClass::Breeder));
    nav.register_agent(wraith, wraith_profile, x(0.0)).unwrap();
    nav.register_agent(breeder, breeder_profile, x(0.0)).unwrap();

    nav.request_path(wraith, x(0.0), x(200.0)).unwrap();
    nav.request_path(breeder, x(0.0), x(200.0)).unwrap();
    let step = nav.tick();
    assert!(matches!(
        step.events[0],
        NavEvent::PathFailed {
            error: PlanError::Unreachable,
            ..
        }
    ));
    assert!(matches!(step.events[1], NavEvent::PathReady { nodes: 3, .. }));

    assert_eq!(nav.update_agent(breeder, x(5.0)).unwrap(), Some(x(100.0)));

    nav.regenerate().unwrap();
    assert_eq!(
        nav.agent_state(breeder),
        Some(FollowState::Stale(StaleReason::GraphChanged))
    );
    assert_eq!(nav.update_agent(breeder, x(10.0)).unwrap(), None);

    nav.tick();
    assert_eq!(nav.agent_state(breeder), Some(FollowState::Following));
    assert_eq!(nav.update_agent(breeder, x(10.0)).unwrap(), Some(x(100.0)));
}

#[test]
fn knocked_off_course_replans_from_new_position() {
    let mut graph_nav = NavSystem::new(NavConfig::default());
    for v in [0.0, 500.0, 1000.0] {
        graph_nav.add_node(x(v), NodeFlags::GROUND).unwrap();
    }
    let lateral = graph_nav
        .add_node(Vec3::new(500.0, 600.0, 0.0), NodeFlags::GROUND)
        .unwrap();
    graph_nav.connect(NodeId(0), NodeId(1), 500.0, MoveType::Walk).unwrap();
    graph_nav.connect(NodeId(1), NodeId(2), 500.0, MoveType::Walk).unwrap();
    graph_nav.connect(lateral, NodeId(2), 800.0, MoveType::Walk).unwrap();

    let agent = AgentId(0);
    let profile = CapabilityProfile::for_class(graph_nav.config(), GameClass::Commando);
    graph_nav.register_agent(agent, profile, x(0.0)).unwrap();
    graph_nav.plan_now(agent, x(0.0), x(1000.0)).unwrap();
    graph_nav.update_agent(agent, x(0.0)).unwrap();

    // Thrown far from the 0-1 leg, next to the lateral node.
    let thrown = Vec3::new(500.0, 590.0, 0.0);
    assert_eq!(graph_nav.update_agent(agent, thrown).unwrap(), None);
    assert_eq!(
        graph_nav.agent_state(agent),
        Some(FollowState::Stale(StaleReason::OffCorridor))
    );

    graph_nav.tick();
    let follower = &graph_nav.agent(agent).unwrap().follower;
    assert_eq!(follower.path(), &[lateral, NodeId(2)]);
}

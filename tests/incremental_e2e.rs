mod common;

use common::{pick_place_domain, placement_interval, sample_pose_stream, uniform_poses};
use kyroplan::{
    solve_incremental, ActionSchema, Atom, BestFirstPlanner, Domain, IncrementalConfig, Problem, SearchConfig,
    SolveStatus, TimeBoundedPlanner, Value,
};
use std::time::Duration;

fn rooms_domain() -> Domain {
    Domain::new(vec![ActionSchema::new("walk", &["?from", "?to"])
        .precondition(Atom::from_symbols("in", &["?from"]))
        .precondition(Atom::from_symbols("door", &["?from", "?to"]))
        .add(Atom::from_symbols("in", &["?to"]))
        .delete(Atom::from_symbols("in", &["?from"]))])
}

#[test]
fn plan_without_streams_needs_no_instance() {
    let problem = Problem::builder(rooms_domain())
        .init("in", [Value::from("hall")])
        .init("door", [Value::from("hall"), Value::from("kitchen")])
        .init("door", [Value::from("kitchen"), Value::from("pantry")])
        .goal("in", [Value::from("pantry")])
        .build()
        .unwrap();

    let solution = solve_incremental(&problem, &BestFirstPlanner::default(), &IncrementalConfig::default()).unwrap();

    assert_eq!(solution.status, SolveStatus::Solved);
    assert_eq!(solution.stats.complexity, 0);
    assert_eq!(solution.stats.stream_calls, 0);
    assert_eq!(solution.stats.instances, 0);
    let plan = solution.plan.unwrap();
    let names: Vec<_> = plan.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["walk", "walk"]);
    assert_eq!(plan[1].args, vec![Value::from("kitchen"), Value::from("pantry")]);
    assert_eq!(solution.cost, Some(2.0));
}

#[test]
fn unreachable_goal_without_streams_is_infeasible() {
    let problem = Problem::builder(rooms_domain())
        .init("in", [Value::from("hall")])
        .goal("in", [Value::from("pantry")])
        .build()
        .unwrap();

    let solution = solve_incremental(&problem, &BestFirstPlanner::default(), &IncrementalConfig::default()).unwrap();

    assert_eq!(solution.status, SolveStatus::Infeasible);
    assert_eq!(solution.stats.planner_calls, 1);
}

#[test]
fn samples_a_placement_at_the_first_complexity_bound() {
    let problem = Problem::builder(pick_place_domain())
        .external(sample_pose_stream(uniform_poses(11)))
        .init("placeable", [Value::from("A"), Value::from("red")])
        .init("at-pose", [Value::from("A"), Value::Float(0.0)])
        .init("hand-empty", std::iter::empty())
        .goal("on", [Value::from("A"), Value::from("red")])
        .build()
        .unwrap();

    let planner = TimeBoundedPlanner::new(
        BestFirstPlanner::new(SearchConfig { max_expansions: 10_000 }),
        Duration::from_secs(10),
    );
    let solution = solve_incremental(&problem, &planner, &IncrementalConfig::default()).unwrap();

    assert_eq!(solution.status, SolveStatus::Solved);
    assert_eq!(solution.stats.complexity, 1);
    assert_eq!(solution.stats.stream_calls, 1);
    let plan = solution.plan.unwrap();
    assert_eq!(plan.len(), 2);
    assert_eq!(plan[1].name, "place");

    let (lo, hi) = placement_interval(&Value::from("red"));
    let pose = plan[1].args[1].as_float().unwrap();
    assert!((lo..=hi).contains(&pose));
    assert!(solution
        .facts
        .iter()
        .any(|f| f.predicate == "contained" && f.args[1] == plan[1].args[1]));
}

#[test]
fn separate_episodes_do_not_share_work() {
    let problem = Problem::builder(pick_place_domain())
        .external(sample_pose_stream(uniform_poses(3)))
        .init("placeable", [Value::from("A"), Value::from("red")])
        .init("at-pose", [Value::from("A"), Value::Float(0.0)])
        .init("hand-empty", std::iter::empty())
        .goal("on", [Value::from("A"), Value::from("red")])
        .build()
        .unwrap();

    let first = solve_incremental(&problem, &BestFirstPlanner::default(), &IncrementalConfig::default()).unwrap();
    let second = solve_incremental(&problem, &BestFirstPlanner::default(), &IncrementalConfig::default()).unwrap();

    assert_ne!(first.stats.episode_id, second.stats.episode_id);
    assert_eq!(first.stats.stream_calls, second.stats.stream_calls);
    assert_eq!(first.plan, second.plan);
}

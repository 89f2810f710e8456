//! Incremental algorithm: certify, then replan.
//!
//! Only real facts are ever planned with. Each round evaluates every
//! instance callable within the current complexity bound, breadth-first by
//! call depth, exhausts eager externals, and asks the planner. A failed
//! round raises the bound by one. The run is infeasible once the planner
//! says so and no instance is left to call at any bound.

use std::time::Instant;

use tracing::{debug, info};

use crate::algorithms::{evaluate, evaluate_eager, expired, finish, LoopCounters, Solution, SolveStatus};
use crate::config::IncrementalConfig;
use crate::episode::Episode;
use crate::error::KyroResult;
use crate::external::InstanceId;
use crate::planner::{Planner, PlannerOutcome};
use crate::problem::Problem;

/// Solve `problem` by repeated real evaluation and replanning.
///
/// # Errors
///
/// Returns a validation error for a malformed problem or config, and an
/// execution error if an invariant is violated while running.
pub fn solve_incremental(problem: &Problem, planner: &dyn Planner, config: &IncrementalConfig) -> KyroResult<Solution> {
    config.validate()?;
    let start = Instant::now();
    let deadline = config.deadline(start);
    let mut episode = Episode::new(problem)?;
    let mut counters = LoopCounters::default();

    loop {
        if expired(deadline) {
            return finish(&episode, start, counters, SolveStatus::Timeout, None);
        }
        counters.iterations += 1;

        evaluate_eager(&mut episode, config.eager_call_limit, deadline, |e| e.info().eager)?;
        let calls = evaluate_bounded(&mut episode, counters.complexity, deadline)?;
        if expired(deadline) {
            return finish(&episode, start, counters, SolveStatus::Timeout, None);
        }

        let mut input = episode.planner_input(false)?;
        input.deadline = deadline;
        counters.planner_calls += 1;
        debug!(
            complexity = counters.complexity,
            calls,
            facts = input.facts.len(),
            "calling planner"
        );

        match planner.solve(&input) {
            PlannerOutcome::Plan(sketch) => {
                info!(
                    complexity = counters.complexity,
                    actions = sketch.actions.len(),
                    cost = sketch.cost,
                    "plan found"
                );
                return finish(&episode, start, counters, SolveStatus::Solved, Some(&sketch));
            }
            PlannerOutcome::Timeout => {
                return finish(&episode, start, counters, SolveStatus::Timeout, None);
            }
            PlannerOutcome::Infeasible { reason } => {
                episode.discover_instances(false)?;
                let exhausted = episode.instances().iter().all(|i| i.is_terminated());
                let capped = config.max_complexity.is_some_and(|max| counters.complexity >= max);
                if exhausted || capped {
                    info!(complexity = counters.complexity, exhausted, %reason, "infeasible");
                    return finish(&episode, start, counters, SolveStatus::Infeasible, None);
                }
                counters.complexity += 1;
                info!(complexity = counters.complexity, "raising complexity bound");
            }
        }
    }
}

/// Call every grounded instance whose next call fits within `bound`, in
/// order of call depth, until nothing more fits. Returns the calls made.
fn evaluate_bounded(episode: &mut Episode, bound: usize, deadline: Option<Instant>) -> KyroResult<usize> {
    let mut calls = 0;
    loop {
        episode.discover_instances(false)?;
        let mut callable: Vec<(usize, InstanceId)> = Vec::new();
        for instance in episode.instances().iter() {
            let depth = instance.complexity() + instance.calls();
            if instance.is_terminated() || depth > bound || !episode.is_grounded(instance.id())? {
                continue;
            }
            callable.push((depth, instance.id()));
        }
        if callable.is_empty() || expired(deadline) {
            return Ok(calls);
        }
        callable.sort_unstable();
        for (_, id) in callable {
            evaluate(episode, id, None)?;
            calls += 1;
        }
    }
}

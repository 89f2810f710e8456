//! Focused algorithm: plan optimistically, then certify what the plan uses.
//!
//! The planner sees real facts together with optimistic facts asserted by
//! expanded instances. When it finds no plan, one more instance is expanded
//! optimistically, cheapest certification effort first. When it finds a
//! plan that still rests on optimistic facts, the first instance of its
//! stream plan is resolved for real against the rest of the plan, and its
//! verified result is promoted over the optimistic commitment.

use std::cmp::Ordering;
use std::time::Instant;

use tracing::{debug, info};

use crate::algorithms::{evaluate, evaluate_eager, expired, finish, LoopCounters, Solution, SolveStatus};
use crate::config::FocusedConfig;
use crate::domain::GroundAction;
use crate::episode::Episode;
use crate::error::{KyroError, KyroResult};
use crate::external::{BoundPolicy, InstanceId};
use crate::planner::{PlanSketch, Planner, PlannerOutcome};
use crate::problem::Problem;

/// Solve `problem` by optimistic planning and lazy certification.
///
/// # Errors
///
/// Returns a validation error for a malformed problem or config, and an
/// execution error if an invariant is violated while running.
pub fn solve_focused(problem: &Problem, planner: &dyn Planner, config: &FocusedConfig) -> KyroResult<Solution> {
    config.validate()?;
    let start = Instant::now();
    let deadline = config.deadline(start);
    let mut episode = Episode::new(problem)?;
    let mut counters = LoopCounters::default();

    loop {
        if expired(deadline) || counters.iterations >= config.max_iterations {
            info!(iterations = counters.iterations, "budget exhausted");
            return finish(&episode, start, counters, SolveStatus::Timeout, None);
        }
        counters.iterations += 1;

        evaluate_eager(&mut episode, config.eager_call_limit, deadline, |e| {
            e.info().eager || e.info().bound == BoundPolicy::Empty
        })?;
        episode.discover_instances(true)?;

        let mut input = episode.planner_input(true)?;
        input.max_effort = config.max_effort;
        input.effort_weight = config.effort_weight.unwrap_or(0.0);
        input.deadline = deadline;
        counters.planner_calls += 1;

        let sketch = match planner.solve(&input) {
            PlannerOutcome::Plan(sketch) => sketch,
            PlannerOutcome::Timeout => return finish(&episode, start, counters, SolveStatus::Timeout, None),
            PlannerOutcome::Infeasible { reason } => {
                let Some(id) = select_expansion(&episode, config)? else {
                    info!(iterations = counters.iterations, %reason, "no instance left to expand");
                    return finish(&episode, start, counters, SolveStatus::Infeasible, None);
                };
                expand(&mut episode, id)?;
                continue;
            }
        };

        let stream_plan = episode.stream_plan(&sketch)?;
        if stream_plan.is_empty() && !sketch.actions.iter().any(GroundAction::is_optimistic) {
            info!(
                iterations = counters.iterations,
                actions = sketch.actions.len(),
                cost = sketch.cost,
                "plan found"
            );
            return finish(&episode, start, counters, SolveStatus::Solved, Some(&sketch));
        }
        resolve(&mut episode, &sketch, &stream_plan, config, deadline)?;
    }
}

/// Optimistically expand one instance and assert its facts.
fn expand(episode: &mut Episode, id: InstanceId) -> KyroResult<()> {
    if let Some(result) = episode.next_optimistic(id)? {
        let added = episode.add_optimistic(&result)?;
        debug!(instance = %id, added, "expanded instance");
    }
    Ok(())
}

/// The most cost-effective instance that can still be expanded.
///
/// Ties on effort go to the instance expanded fewer times, then to the one
/// whose inputs carry the lowest placeholder serial, then to the oldest.
fn select_expansion(episode: &Episode, config: &FocusedConfig) -> KyroResult<Option<InstanceId>> {
    let mut best: Option<(f64, usize, u32, InstanceId)> = None;
    for instance in episode.instances().iter() {
        let bound = episode.external(instance.external())?.info().bound;
        let reusable = !instance.is_live() || bound == BoundPolicy::Unique;
        if instance.is_terminated()
            || bound == BoundPolicy::Empty
            || !reusable
            || instance.optimistic_calls() >= config.max_optimistic_calls
        {
            continue;
        }
        let domain = episode.domain_facts(instance.id())?;
        if !domain.iter().all(|f| episode.store().contains(f)) {
            continue;
        }
        let serial = instance
            .inputs()
            .iter()
            .filter_map(|o| o.as_optimistic())
            .map(|o| o.serial())
            .min()
            .unwrap_or(0);
        let key = (
            episode.instance_effort(instance.id())?,
            instance.optimistic_calls(),
            serial,
            instance.id(),
        );
        let better = best.map_or(true, |b| {
            key.0
                .total_cmp(&b.0)
                .then_with(|| (key.1, key.2, key.3).cmp(&(b.1, b.2, b.3)))
                == Ordering::Less
        });
        if better {
            best = Some(key);
        }
    }
    Ok(best.map(|(_, _, _, id)| id))
}

/// Resolve the first instance of the stream plan for real.
///
/// Retries while the instance produces nothing, up to `max_attempts`
/// failed calls over the episode; then the instance is disabled. An
/// instance that is exhausted without a result has its optimistic facts
/// withdrawn so that the planner looks for another skeleton.
fn resolve(
    episode: &mut Episode,
    sketch: &PlanSketch,
    stream_plan: &[InstanceId],
    config: &FocusedConfig,
    deadline: Option<Instant>,
) -> KyroResult<()> {
    let mut target = None;
    for id in stream_plan {
        if episode.is_grounded(*id)? {
            target = Some(*id);
            break;
        }
    }
    let Some(target) = target else {
        return Err(KyroError::internal(format!(
            "no resolvable instance in a stream plan of {} for a plan of {} actions",
            stream_plan.len(),
            sketch.actions.len()
        )));
    };
    let context = episode.immediate_context(target, stream_plan)?;
    debug!(instance = %target, plan = stream_plan.len(), "resolving instance");

    loop {
        let instance = episode.instance(target)?;
        if instance.is_terminated() {
            episode.retract_instance(target)?;
            return Ok(());
        }
        if evaluate(episode, target, Some(&context))? > 0 {
            return Ok(());
        }
        let attempts = episode.note_failed_attempt(target)?;
        if attempts >= config.max_attempts {
            episode.disable(target)?;
            return Ok(());
        }
        if expired(deadline) {
            return Ok(());
        }
    }
}

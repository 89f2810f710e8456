//! Top-level solving algorithms.
//!
//! Both algorithms run one [`Episode`](crate::episode::Episode) to
//! completion and report a [`Solution`]. Exhaustion, sampler failure,
//! planner infeasibility and timeouts are part of the normal control flow
//! and never surface as `Err`; only declaration errors and invariant
//! violations do.

pub mod focused;
pub mod incremental;

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::StreamContext;
use crate::episode::{Episode, EpisodeId};
use crate::error::KyroResult;
use crate::external::{External, Instance, InstanceId};
use crate::planner::PlanSketch;
use crate::value::Value;

pub use focused::solve_focused;
pub use incremental::solve_incremental;

/// How a solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// A fully grounded plan was found.
    Solved,
    /// No plan exists under the streams evaluated so far, and no further
    /// evaluation is possible.
    Infeasible,
    /// The time or iteration budget ran out.
    Timeout,
}

impl SolveStatus {
    /// Returns true if a plan was found.
    #[must_use]
    pub const fn is_solved(self) -> bool {
        matches!(self, Self::Solved)
    }
}

/// One step of a solution plan, with raw argument values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanAction {
    /// Action schema name.
    pub name: String,
    /// Raw values bound to the schema parameters, in order.
    pub args: Vec<Value>,
    /// Cost of this step.
    pub cost: f64,
}

/// Ordered actions of a solution.
pub type Plan = Vec<PlanAction>;

/// A real fact of the episode, with raw argument values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedFact {
    /// Predicate name.
    pub predicate: String,
    /// Raw argument values.
    pub args: Vec<Value>,
}

/// Work done by one solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveStats {
    /// Episode that produced the solution.
    pub episode_id: EpisodeId,
    /// Wall-clock start of the episode.
    pub started_at: DateTime<Utc>,
    /// Time spent in the solve.
    pub elapsed_ms: u64,
    /// Outer loop iterations.
    pub iterations: usize,
    /// Calls into the planner.
    pub planner_calls: usize,
    /// Real generator steps across all instances.
    pub stream_calls: usize,
    /// Optimistic results created.
    pub optimistic_calls: usize,
    /// Optimistic objects replaced by real ones.
    pub promotions: usize,
    /// Optimistic instances retracted after a plan failed to resolve.
    pub retractions: usize,
    /// Instances disabled after too many failed attempts.
    pub disabled: usize,
    /// Instances created.
    pub instances: usize,
    /// Interned objects at the end of the episode.
    pub objects: usize,
    /// Final complexity bound; zero for the focused algorithm.
    pub complexity: usize,
}

/// Outcome of a solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// How the solve ended.
    pub status: SolveStatus,
    /// Present only when `status` is `Solved`.
    pub plan: Option<Plan>,
    /// Total plan cost, alongside `plan`.
    pub cost: Option<f64>,
    /// Work counters.
    pub stats: SolveStats,
    /// Real facts of the episode, in the order they became real.
    pub facts: Vec<EvaluatedFact>,
}

impl Solution {
    /// Returns true if `status` is `Solved`.
    #[must_use]
    pub const fn is_solved(&self) -> bool {
        self.status.is_solved()
    }
}

/// Loop counters kept by the algorithms themselves.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct LoopCounters {
    pub iterations: usize,
    pub planner_calls: usize,
    pub complexity: usize,
}

pub(crate) fn finish(
    episode: &Episode,
    start: Instant,
    counters: LoopCounters,
    status: SolveStatus,
    sketch: Option<&PlanSketch>,
) -> KyroResult<Solution> {
    let plan = match sketch {
        Some(sketch) if status.is_solved() => Some(episode.plan_actions(sketch)?),
        _ => None,
    };
    let work = episode.counters();
    let stats = SolveStats {
        episode_id: episode.id(),
        started_at: episode.started_at(),
        elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        iterations: counters.iterations,
        planner_calls: counters.planner_calls,
        stream_calls: work.stream_calls,
        optimistic_calls: work.optimistic_calls,
        promotions: work.promotions,
        retractions: work.retractions,
        disabled: episode.instances().iter().filter(|i| i.is_disabled()).count(),
        instances: episode.instances().len(),
        objects: episode.objects().len(),
        complexity: counters.complexity,
    };
    Ok(Solution {
        status,
        cost: plan.as_ref().and(sketch).map(|s| s.cost),
        plan,
        stats,
        facts: episode.evaluated_facts()?,
    })
}

pub(crate) fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

/// Evaluate every grounded instance of the selected externals until it is
/// enumerated or has used `limit` calls, discovering new instances as facts
/// become real. Returns the number of calls made.
pub(crate) fn evaluate_eager(
    episode: &mut Episode,
    limit: usize,
    deadline: Option<Instant>,
    select: impl Fn(&External) -> bool,
) -> KyroResult<usize> {
    let mut calls = 0;
    loop {
        episode.discover_instances(false)?;
        let mut pending: Vec<InstanceId> = Vec::new();
        for instance in episode.instances().iter() {
            if instance.is_terminated() || instance.calls() >= limit || !select(episode.external(instance.external())?) {
                continue;
            }
            if episode.is_grounded(instance.id())? {
                pending.push(instance.id());
            }
        }
        if pending.is_empty() || expired(deadline) {
            return Ok(calls);
        }
        for id in pending {
            evaluate(episode, id, None)?;
            calls += 1;
        }
        debug!(calls, "eager pass");
    }
}

/// One real call; the first result replaces a live optimistic commitment.
pub(crate) fn evaluate(
    episode: &mut Episode,
    id: InstanceId,
    context: Option<&StreamContext>,
) -> KyroResult<usize> {
    let results = episode.next_results(id, context)?;
    let live = episode.instance(id).map(Instance::is_live)?;
    for (i, result) in results.iter().enumerate() {
        if i == 0 && live {
            episode.promote(result)?;
        } else {
            episode.record_real(result)?;
        }
    }
    Ok(results.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&SolveStatus::Infeasible).unwrap(), "\"infeasible\"");
        assert!(SolveStatus::Solved.is_solved());
        assert!(!SolveStatus::Timeout.is_solved());
    }

    #[test]
    fn expired_deadline() {
        assert!(!expired(None));
        assert!(expired(Some(Instant::now())));
    }
}

//! Classical planner interface.
//!
//! The planner is an external collaborator: it receives grounded facts,
//! compiled action schemas and a goal, and answers with a plan, a proof of
//! infeasibility, or a timeout. Optimistic facts are passed alongside real
//! ones and are indistinguishable to the planner apart from their effort.

pub mod search;

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{ActionSchema, GroundAction};
use crate::expression::Fact;

pub use search::BestFirstPlanner;

/// Everything a planner call sees.
#[derive(Debug, Clone, Default)]
pub struct PlannerInput {
    /// Action schemas with every constant compiled to an object handle.
    pub actions: Vec<ActionSchema>,
    /// Facts true in the initial state.
    pub facts: Vec<Fact>,
    /// Conjunctive goal.
    pub goal: Vec<Fact>,
    /// Known function values, used for action costs.
    pub function_values: HashMap<Fact, f64>,
    /// Effort of certifying each optimistic fact; absent means real.
    pub fact_effort: HashMap<Fact, f64>,
    /// Skeletons whose total effort exceeds this cap are rejected.
    pub max_effort: Option<f64>,
    /// Weight of effort in the objective; zero ignores effort.
    pub effort_weight: f64,
    /// Episode deadline; planners should answer `Timeout` past it.
    pub deadline: Option<Instant>,
}

impl PlannerInput {
    /// Search priority of a partial plan: `cost + effort_weight * effort`.
    ///
    /// A zero weight drops the effort term, so unreachable facts with
    /// infinite effort never turn the priority into NaN.
    #[must_use]
    pub fn priority(&self, cost: f64, effort: f64) -> f64 {
        if self.effort_weight > 0.0 {
            cost + self.effort_weight * effort
        } else {
            cost
        }
    }
}

/// A plan returned by a planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSketch {
    /// Ground actions in execution order.
    pub actions: Vec<GroundAction>,
    /// Sum of action costs.
    pub cost: f64,
    /// Sum of precondition efforts.
    pub effort: f64,
}

/// Outcome of one planner call.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannerOutcome {
    /// A plan reaching the goal.
    Plan(PlanSketch),
    /// No plan exists for this input.
    Infeasible {
        /// Why the search gave up.
        reason: String,
    },
    /// The planner ran out of time.
    Timeout,
}

/// A classical planner.
pub trait Planner: Send + Sync {
    /// Solve one grounded problem. Must not panic on unsolvable input.
    fn solve(&self, input: &PlannerInput) -> PlannerOutcome;
}

impl<P: Planner + ?Sized> Planner for Arc<P> {
    fn solve(&self, input: &PlannerInput) -> PlannerOutcome {
        (**self).solve(input)
    }
}

/// Runs an inner planner on a worker thread with a wall-clock budget.
///
/// An overrun returns `Timeout`; the worker is left to finish on its own
/// since the inner call is opaque.
#[derive(Debug)]
pub struct TimeBoundedPlanner<P> {
    inner: Arc<P>,
    timeout: Duration,
}

impl<P: Planner + 'static> TimeBoundedPlanner<P> {
    /// Wraps `inner`, giving each call at most `timeout`.
    #[must_use]
    pub fn new(inner: P, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            timeout,
        }
    }
}

impl<P: Planner + 'static> Planner for TimeBoundedPlanner<P> {
    fn solve(&self, input: &PlannerInput) -> PlannerOutcome {
        let budget = input
            .deadline
            .map_or(self.timeout, |d| d.saturating_duration_since(Instant::now()).min(self.timeout));
        let (tx, rx) = bounded(1);
        let inner = Arc::clone(&self.inner);
        let job = input.clone();

        let spawned = thread::Builder::new()
            .name("kyroplan-planner".to_string())
            .spawn(move || {
                let _ = tx.send(inner.solve(&job));
            });
        if let Err(err) = spawned {
            warn!(error = %err, "failed to spawn planner worker; planning inline");
            return self.inner.solve(input);
        }

        match rx.recv_timeout(budget) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => PlannerOutcome::Timeout,
            Err(RecvTimeoutError::Disconnected) => PlannerOutcome::Infeasible {
                reason: "planner worker exited without an answer".to_string(),
            },
        }
    }
}

//! Solver configuration.
//!
//! Configs are plain serde structs with defaults and a `validate()` that
//! rejects out-of-range values before an episode starts.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Budget for the reference search planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of node expansions per planner call.
    pub max_expansions: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { max_expansions: 100_000 }
    }
}

impl SearchConfig {
    /// Rejects a zero expansion budget.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_expansions == 0 {
            return Err(invalid("search.max_expansions must be positive"));
        }
        Ok(())
    }
}

/// Configuration of the incremental algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncrementalConfig {
    /// Wall-clock budget for the whole episode.
    pub max_time_ms: Option<u64>,
    /// Give up (infeasible) once the complexity bound exceeds this value.
    pub max_complexity: Option<usize>,
    /// Cap on real calls per eager instance.
    pub eager_call_limit: usize,
}

impl Default for IncrementalConfig {
    fn default() -> Self {
        Self {
            max_time_ms: None,
            max_complexity: None,
            eager_call_limit: 100,
        }
    }
}

impl IncrementalConfig {
    /// Rejects a zero eager call limit.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.eager_call_limit == 0 {
            return Err(invalid("eager_call_limit must be positive"));
        }
        Ok(())
    }

    pub(crate) fn deadline(&self, start: Instant) -> Option<Instant> {
        deadline(start, self.max_time_ms)
    }
}

/// Configuration of the focused algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusedConfig {
    /// Wall-clock budget for the whole episode.
    pub max_time_ms: Option<u64>,
    /// Cap on planner round trips.
    pub max_iterations: usize,
    /// Failed real calls after which an instance is disabled.
    pub max_attempts: usize,
    /// Optimistic expansions allowed per instance.
    pub max_optimistic_calls: usize,
    /// Reject skeletons whose total effort exceeds this cap.
    pub max_effort: Option<f64>,
    /// Weight of effort in the planner objective; `None` or zero ignores effort.
    pub effort_weight: Option<f64>,
    /// Cap on real calls per eager instance.
    pub eager_call_limit: usize,
}

impl Default for FocusedConfig {
    fn default() -> Self {
        Self {
            max_time_ms: None,
            max_iterations: 1_000,
            max_attempts: 5,
            max_optimistic_calls: 8,
            max_effort: None,
            effort_weight: Some(1.0),
            eager_call_limit: 100,
        }
    }
}

impl FocusedConfig {
    /// Rejects zero budgets and negative or non-finite effort settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations must be positive"));
        }
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts must be positive"));
        }
        if self.max_optimistic_calls == 0 {
            return Err(invalid("max_optimistic_calls must be positive"));
        }
        if self.eager_call_limit == 0 {
            return Err(invalid("eager_call_limit must be positive"));
        }
        if let Some(cap) = self.max_effort {
            if cap.is_nan() || cap < 0.0 {
                return Err(invalid(format!("max_effort {cap} must be non-negative")));
            }
        }
        if let Some(weight) = self.effort_weight {
            if !weight.is_finite() || weight < 0.0 {
                return Err(invalid(format!("effort_weight {weight} must be finite and non-negative")));
            }
        }
        Ok(())
    }

    pub(crate) fn deadline(&self, start: Instant) -> Option<Instant> {
        deadline(start, self.max_time_ms)
    }
}

fn deadline(start: Instant, max_time_ms: Option<u64>) -> Option<Instant> {
    max_time_ms.map(|ms| start + Duration::from_millis(ms))
}

fn invalid(reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidConfig { reason: reason.into() }
}

//! Per-external search configuration.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// How optimistic outputs of an external are represented during focused search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundPolicy {
    /// One set of placeholders per instance, returned by every call.
    #[default]
    Shared,
    /// Fresh placeholders on every call.
    Unique,
    /// One set of placeholders shared by all instances of the external.
    PerExternal,
    /// No optimistic results; the external is only evaluated for real.
    Empty,
}

/// Expected effort of certifying a stream result.
///
/// Geometric model: each attempt costs `1 + overhead` and succeeds with
/// probability `p_success`; the free, certain stream has effort zero.
#[must_use]
pub fn expected_effort(overhead: f64, p_success: f64) -> f64 {
    if p_success <= 0.0 {
        return f64::INFINITY;
    }
    (1.0 + overhead) / p_success - 1.0
}

/// Search configuration attached to an external.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Evaluate exhaustively before each planner call instead of lazily.
    pub eager: bool,
    /// Probability that one call produces a usable result.
    pub p_success: f64,
    /// Relative cost of one call.
    pub overhead: f64,
    /// Optimistic output representation.
    pub bound: BoundPolicy,
}

impl Default for StreamInfo {
    fn default() -> Self {
        Self {
            eager: false,
            p_success: 1.0,
            overhead: 0.0,
            bound: BoundPolicy::Shared,
        }
    }
}

impl StreamInfo {
    /// Info for an eagerly evaluated external.
    #[must_use]
    pub fn eager() -> Self {
        Self {
            eager: true,
            ..Self::default()
        }
    }

    /// Sets the success probability.
    #[must_use]
    pub fn with_p_success(mut self, p_success: f64) -> Self {
        self.p_success = p_success;
        self
    }

    /// Sets the per-call overhead.
    #[must_use]
    pub fn with_overhead(mut self, overhead: f64) -> Self {
        self.overhead = overhead;
        self
    }

    /// Sets the optimistic object policy.
    #[must_use]
    pub fn with_bound(mut self, bound: BoundPolicy) -> Self {
        self.bound = bound;
        self
    }

    /// Derived effort, see [`expected_effort`].
    #[must_use]
    pub fn effort(&self) -> f64 {
        expected_effort(self.overhead, self.p_success)
    }

    /// Validate ranges for the external named `name`.
    pub fn validate(&self, name: &str) -> Result<(), ValidationError> {
        if !(0.0..=1.0).contains(&self.p_success) {
            return Err(ValidationError::InvalidStreamInfo {
                name: name.to_string(),
                reason: format!("p_success {} is outside [0, 1]", self.p_success),
            });
        }
        if !self.overhead.is_finite() || self.overhead < 0.0 {
            return Err(ValidationError::InvalidStreamInfo {
                name: name.to_string(),
                reason: format!("overhead {} must be finite and non-negative", self.overhead),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_info_is_free() {
        let info = StreamInfo::default();
        assert!(info.validate("s").is_ok());
        assert_eq!(info.effort(), 0.0);
        assert_eq!(info.bound, BoundPolicy::Shared);
    }

    #[test]
    fn unlikely_streams_cost_more() {
        let likely = StreamInfo::default().with_p_success(0.9);
        let unlikely = StreamInfo::default().with_p_success(0.1);
        assert!(unlikely.effort() > likely.effort());

        let cheap = StreamInfo::default().with_overhead(1.0).with_p_success(0.5);
        let pricey = StreamInfo::default().with_overhead(4.0).with_p_success(0.5);
        assert!(pricey.effort() > cheap.effort());
    }

    #[test]
    fn impossible_stream_has_infinite_effort() {
        assert!(StreamInfo::eager().with_p_success(0.0).effort().is_infinite());
    }

    #[test]
    fn validate_rejects_bad_ranges() {
        assert!(StreamInfo::default().with_p_success(1.5).validate("s").is_err());
        assert!(StreamInfo::default().with_p_success(f64::NAN).validate("s").is_err());
        assert!(StreamInfo::default().with_overhead(-1.0).validate("s").is_err());
        assert!(StreamInfo::default().with_overhead(f64::INFINITY).validate("s").is_err());
    }

    #[test]
    fn info_serialization() {
        let info = StreamInfo::eager().with_bound(BoundPolicy::Empty);
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"empty\""));
        let back: StreamInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info, back);
    }
}

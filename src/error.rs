//! Error types for KyroPlan.
//!
//! All errors in KyroPlan are strongly typed using thiserror.
//! Only declaration errors and invariant violations are ever returned as
//! `Err`; sampler failures, exhaustion, planner infeasibility and timeouts
//! are absorbed by the algorithms and reported through `SolveStatus`.

use thiserror::Error;

/// Declaration errors detected at load time, before any search.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A stream lists the same output parameter twice.
    #[error("Output '{parameter}' of stream '{stream}' is not unique")]
    DuplicateOutput {
        /// Stream name.
        stream: String,
        /// Repeated parameter.
        parameter: String,
    },

    /// A stream parameter appears among both its inputs and outputs.
    #[error("Parameter '{parameter}' of stream '{stream}' is both an input and an output")]
    InputOutputOverlap {
        /// Stream name.
        stream: String,
        /// Overlapping parameter.
        parameter: String,
    },

    /// An external lists the same input parameter twice.
    #[error("Input '{parameter}' of '{external}' is declared more than once")]
    DuplicateInput {
        /// External name.
        external: String,
        /// Repeated parameter.
        parameter: String,
    },

    /// An input is not mentioned by any domain atom.
    #[error("Input '{parameter}' of '{external}' does not appear in its domain")]
    UnconstrainedInput {
        /// External name.
        external: String,
        /// Unconstrained parameter.
        parameter: String,
    },

    /// A certified atom mentions a parameter the stream neither takes nor produces.
    #[error("Parameter '{parameter}' certified by '{stream}' is not among its inputs or outputs")]
    DanglingParameter {
        /// Stream name.
        stream: String,
        /// Unknown parameter.
        parameter: String,
    },

    /// A declaration has no registered implementation.
    #[error("No implementation registered for external '{name}'")]
    UnknownExternal {
        /// Declared name.
        name: String,
    },

    /// Declaration and implementation disagree on the external kind.
    #[error("External '{name}' is declared as a {declared} but implemented as a {implemented}")]
    KindMismatch {
        /// External name.
        name: String,
        /// Kind named by the declaration.
        declared: &'static str,
        /// Kind of the registered implementation.
        implemented: &'static str,
    },

    /// Two externals share a name.
    #[error("External '{name}' is declared more than once")]
    DuplicateExternal {
        /// Repeated name.
        name: String,
    },

    /// A predicate, action or parameter name is malformed.
    #[error("Invalid {kind} name '{name}'")]
    InvalidName {
        /// What the name identifies.
        kind: &'static str,
        /// Offending name.
        name: String,
    },

    /// An action schema is malformed.
    #[error("Invalid action '{action}': {reason}")]
    InvalidAction {
        /// Action name.
        action: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Stream info is out of range.
    #[error("Invalid stream info for '{name}': {reason}")]
    InvalidStreamInfo {
        /// External name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A solver configuration is out of range.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with it.
        reason: String,
    },

    /// The problem as a whole is inconsistent.
    #[error("Invalid problem: {reason}")]
    InvalidProblem {
        /// What is wrong with it.
        reason: String,
    },
}

/// Invariant violations raised while an episode runs.
///
/// These signal programming errors (a malformed declaration that slipped
/// through, or an algorithm misusing an instance) and abort the episode.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// An exhausted or disabled instance was asked for more results.
    #[error("Instance {instance} of '{external}' was stepped after it was {state}")]
    InstanceTerminated {
        /// External name.
        external: String,
        /// Instance rendering.
        instance: String,
        /// Terminal state reached.
        state: &'static str,
    },

    /// Real results were requested while some input is still optimistic.
    #[error("Instance {instance} of '{external}' was called with unresolved inputs")]
    OptimisticInput {
        /// External name.
        external: String,
        /// Instance rendering.
        instance: String,
    },

    /// An optimistic object reached a place that needs a real value.
    #[error("Object {object} is still optimistic")]
    UnresolvedObject {
        /// Object rendering.
        object: String,
    },

    /// Grounding met a parameter with no binding.
    #[error("Parameter '{parameter}' is unbound while grounding '{predicate}'")]
    UnboundParameter {
        /// Predicate being grounded.
        predicate: String,
        /// Missing parameter.
        parameter: String,
    },

    /// Grounding met a raw value that was never interned.
    #[error("Constant in '{predicate}' was not interned before grounding")]
    UninternedConstant {
        /// Predicate being grounded.
        predicate: String,
    },

    /// A sampler returned a tuple of the wrong width.
    #[error("'{external}' produced {actual} output values, expected {expected}")]
    OutputArity {
        /// External name.
        external: String,
        /// Declared output count.
        expected: usize,
        /// Returned value count.
        actual: usize,
    },

    /// A handle does not belong to this episode.
    #[error("Unknown {kind} handle: {id}")]
    UnknownHandle {
        /// Handle type.
        kind: &'static str,
        /// Handle rendering.
        id: String,
    },
}

/// Failure reported by a sampler, cost function or test.
///
/// Never propagated out of an instance: a failing generator is treated as
/// exhausted for this and every later call.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SamplerError {
    message: String,
}

impl SamplerError {
    /// Creates a sampler error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Top-level error type for KyroPlan.
#[derive(Debug, Error)]
pub enum KyroError {
    /// Rejected declaration or configuration.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Broken invariant during a run.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Unexpected internal failure.
    #[error("Internal error: {message}")]
    Internal {
        /// Failure description.
        message: String,
    },
}

impl KyroError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for KyroPlan operations.
pub type KyroResult<T> = Result<T, KyroError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_duplicate_output() {
        let err = ValidationError::DuplicateOutput {
            stream: "sample-pose".to_string(),
            parameter: "?p".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("sample-pose"));
        assert!(msg.contains("?p"));
        assert!(msg.contains("not unique"));
    }

    #[test]
    fn test_execution_error_output_arity() {
        let err = ExecutionError::OutputArity {
            external: "ik".to_string(),
            expected: 2,
            actual: 1,
        };
        let msg = format!("{err}");
        assert!(msg.contains("ik"));
        assert!(msg.contains("expected 2"));
    }

    #[test]
    fn test_kyro_error_from_validation() {
        let err: KyroError = ValidationError::UnknownExternal {
            name: "plan-motion".to_string(),
        }
        .into();
        assert!(err.is_validation());
        assert!(!err.is_execution());
        assert!(err.to_string().contains("plan-motion"));
    }

    #[test]
    fn test_kyro_error_from_execution() {
        let err: KyroError = ExecutionError::UnboundParameter {
            predicate: "pose".to_string(),
            parameter: "?p".to_string(),
        }
        .into();
        assert!(err.is_execution());
        assert!(err.to_string().contains("unbound"));
    }

    #[test]
    fn test_kyro_error_internal() {
        let err = KyroError::internal("unexpected state");
        assert!(err.is_internal());
        assert!(err.to_string().contains("unexpected state"));
    }

    #[test]
    fn test_sampler_error_message() {
        let err = SamplerError::new("ik failed");
        assert_eq!(err.message(), "ik failed");
        assert_eq!(err.to_string(), "ik failed");
    }
}

//! # KyroPlan - Stream-Certified Task Planning
//!
//! KyroPlan bridges classical symbolic planning with lazy sampling
//! procedures. Streams generate values (poses, grasps, costs) that satisfy
//! declared preconditions and certify declared facts; the planner only
//! ever sees facts, and the engine decides which streams to call, how to
//! stand in for values that were not sampled yet, and how to verify an
//! optimistic plan against real samples.
//!
//! ## Core Concepts
//!
//! - **External**: a stream, function or predicate declaration
//! - **Instance**: an external bound to concrete inputs, memoized per episode
//! - **Optimistic object**: a placeholder for an output that was not sampled yet
//! - **Episode**: the isolated state of one solver run
//! - **Incremental / focused**: the two solving algorithms
//!
//! ## Usage
//!
//! ```rust
//! use kyroplan::generator::from_gen_fn;
//! use kyroplan::{
//!     solve_focused, ActionSchema, Atom, BestFirstPlanner, Domain, FocusedConfig, Problem, SolveStatus, Stream,
//!     Value,
//! };
//!
//! let place = ActionSchema::new("place", &["?b", "?p", "?r"])
//!     .precondition(Atom::from_symbols("unplaced", &["?b"]))
//!     .precondition(Atom::from_symbols("contained", &["?b", "?p", "?r"]))
//!     .add(Atom::from_symbols("on", &["?b", "?r"]))
//!     .delete(Atom::from_symbols("unplaced", &["?b"]));
//!
//! let sample_pose = Stream::new(
//!     "sample-pose",
//!     from_gen_fn(|_: &[Value]| (0..).map(|i: i32| vec![Value::Float(f64::from(i) * 0.5)])),
//!     vec!["?b".into(), "?r".into()],
//!     vec![Atom::from_symbols("placeable", &["?b", "?r"])],
//!     vec!["?p".into()],
//!     vec![Atom::from_symbols("contained", &["?b", "?p", "?r"])],
//! )?;
//!
//! let problem = Problem::builder(Domain::new(vec![place]))
//!     .external(sample_pose)
//!     .init("placeable", [Value::from("A"), Value::from("red")])
//!     .init("unplaced", [Value::from("A")])
//!     .goal("on", [Value::from("A"), Value::from("red")])
//!     .build()?;
//!
//! let solution = solve_focused(&problem, &BestFirstPlanner::default(), &FocusedConfig::default())?;
//! assert_eq!(solution.status, SolveStatus::Solved);
//! # Ok::<(), kyroplan::KyroError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core model
pub mod error;
pub mod expression;
pub mod object;
pub mod value;

// Declarations
pub mod domain;
pub mod external;
pub mod generator;
pub mod problem;

// Episode state
pub mod context;
pub mod episode;
pub mod evaluation;

// Solving
pub mod algorithms;
pub mod config;
pub mod planner;

// Re-export primary types at crate root for convenience
pub use algorithms::{
    solve_focused, solve_incremental, EvaluatedFact, Plan, PlanAction, Solution, SolveStats, SolveStatus,
};
pub use config::{FocusedConfig, IncrementalConfig, SearchConfig};
pub use context::StreamContext;
pub use domain::{ActionCost, ActionSchema, Domain, GroundAction};
pub use episode::{Episode, EpisodeId};
pub use error::{ExecutionError, KyroError, KyroResult, SamplerError, ValidationError};
pub use evaluation::{Evaluation, EvaluationKind, EvaluationStore};
pub use expression::{Atom, Bindings, Fact, Formula, Term};
pub use external::{
    bind_externals, BoundPolicy, External, ExternalDeclaration, ExternalId, ExternalKind, Function, Implementations,
    Instance, InstanceId, InstanceState, Predicate, Stream, StreamInfo, StreamResult,
};
pub use generator::{Generator, OutputValues};
pub use object::{ObjectId, ObjectRef, OptimisticId};
pub use planner::{BestFirstPlanner, PlanSketch, Planner, PlannerInput, PlannerOutcome, TimeBoundedPlanner};
pub use problem::Problem;
pub use value::Value;

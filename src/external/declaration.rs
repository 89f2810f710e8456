//! Declarative external descriptions and their binding to callables.
//!
//! Declarations are plain data (serde) as produced by a stream description
//! parser. `bind_externals` pairs each one with the callable registered
//! under its name and fails fast on anything malformed, so no search ever
//! starts from an invalid declaration set.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::expression::Formula;
use crate::external::{External, Function, Predicate, Stream, StreamInfo};
use crate::generator::{CostFn, GenFn, TestFn};

/// Declaration of one external, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExternalDeclaration {
    /// A conditional generator.
    Stream {
        /// External name.
        name: String,
        /// Input parameters.
        inputs: Vec<String>,
        /// Atoms the inputs must satisfy.
        #[serde(default)]
        domain: Formula,
        /// Output parameters.
        outputs: Vec<String>,
        /// Atoms certified for each generated tuple.
        #[serde(default)]
        certified: Formula,
        /// Scheduling hints.
        #[serde(default)]
        info: StreamInfo,
    },
    /// A cost function.
    Function {
        /// External name.
        name: String,
        /// Input parameters.
        inputs: Vec<String>,
        /// Atoms the inputs must satisfy.
        #[serde(default)]
        domain: Formula,
        /// Value assumed before evaluation.
        #[serde(default)]
        lower_bound: f64,
        /// Scheduling hints.
        #[serde(default)]
        info: StreamInfo,
    },
    /// A boolean test.
    Predicate {
        /// External name.
        name: String,
        /// Input parameters.
        inputs: Vec<String>,
        /// Atoms the inputs must satisfy.
        #[serde(default)]
        domain: Formula,
        /// Scheduling hints.
        #[serde(default)]
        info: StreamInfo,
    },
}

impl ExternalDeclaration {
    /// Declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Stream { name, .. } | Self::Function { name, .. } | Self::Predicate { name, .. } => name,
        }
    }

    /// Kind, as written in declarations.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Stream { .. } => "stream",
            Self::Function { .. } => "function",
            Self::Predicate { .. } => "predicate",
        }
    }

    /// Bind the declaration to its registered implementation.
    pub fn bind(&self, implementations: &Implementations) -> Result<External, ValidationError> {
        let implementation = implementations.get(self.name()).ok_or_else(|| ValidationError::UnknownExternal {
            name: self.name().to_string(),
        })?;
        let mismatch = || ValidationError::KindMismatch {
            name: self.name().to_string(),
            declared: self.kind_name(),
            implemented: implementation.kind_name(),
        };

        let (external, info) = match (self, implementation) {
            (
                Self::Stream {
                    name,
                    inputs,
                    domain,
                    outputs,
                    certified,
                    info,
                },
                Implementation::Generator(gen_fn),
            ) => {
                let stream = Stream::new(
                    name.clone(),
                    gen_fn.clone(),
                    inputs.clone(),
                    domain.flatten(),
                    outputs.clone(),
                    certified.flatten(),
                )?;
                (External::from(stream), info)
            }
            (
                Self::Function {
                    name,
                    inputs,
                    domain,
                    lower_bound,
                    info,
                },
                Implementation::Function(cost_fn),
            ) => {
                let function = Function::new(name.clone(), cost_fn.clone(), inputs.clone(), domain.flatten())?
                    .with_lower_bound(*lower_bound);
                (External::from(function), info)
            }
            (
                Self::Predicate {
                    name,
                    inputs,
                    domain,
                    info,
                },
                Implementation::Test(test_fn),
            ) => {
                let predicate = Predicate::new(name.clone(), test_fn.clone(), inputs.clone(), domain.flatten())?;
                (External::from(predicate), info)
            }
            _ => return Err(mismatch()),
        };
        external.with_info(*info)
    }
}

/// A callable registered for an external name.
#[derive(Clone)]
pub enum Implementation {
    /// Sampler for a stream.
    Generator(GenFn),
    /// Evaluator for a function.
    Function(CostFn),
    /// Test for a predicate.
    Test(TestFn),
}

impl Implementation {
    /// Kind of external this callable implements.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Generator(_) => "stream",
            Self::Function(_) => "function",
            Self::Test(_) => "predicate",
        }
    }
}

impl std::fmt::Debug for Implementation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Implementation::{}", self.kind_name())
    }
}

/// Registry of callables by external name.
#[derive(Debug, Clone, Default)]
pub struct Implementations {
    entries: HashMap<String, Implementation>,
}

impl Implementations {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a stream sampler.
    #[must_use]
    pub fn with_generator(mut self, name: impl Into<String>, gen_fn: GenFn) -> Self {
        self.insert(name, Implementation::Generator(gen_fn));
        self
    }

    /// Registers a cost function.
    #[must_use]
    pub fn with_function(mut self, name: impl Into<String>, cost_fn: CostFn) -> Self {
        self.insert(name, Implementation::Function(cost_fn));
        self
    }

    /// Registers a predicate test.
    #[must_use]
    pub fn with_test(mut self, name: impl Into<String>, test_fn: TestFn) -> Self {
        self.insert(name, Implementation::Test(test_fn));
        self
    }

    /// Register a callable, replacing any previous one with the same name.
    pub fn insert(&mut self, name: impl Into<String>, implementation: Implementation) {
        self.entries.insert(name.into(), implementation);
    }

    /// Callable registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Implementation> {
        self.entries.get(name)
    }
}

/// Bind every declaration, applying per-name `StreamInfo` overrides.
///
/// Fails on duplicate names, unregistered implementations, kind mismatches,
/// malformed parameters and overrides naming no declared external.
pub fn bind_externals(
    declarations: &[ExternalDeclaration],
    implementations: &Implementations,
    infos: &HashMap<String, StreamInfo>,
) -> Result<Vec<External>, ValidationError> {
    let mut seen = HashSet::new();
    let mut externals = Vec::with_capacity(declarations.len());
    for declaration in declarations {
        if !seen.insert(declaration.name()) {
            return Err(ValidationError::DuplicateExternal {
                name: declaration.name().to_string(),
            });
        }
        let mut external = declaration.bind(implementations)?;
        if let Some(info) = infos.get(declaration.name()) {
            external = external.with_info(*info)?;
        }
        externals.push(external);
    }
    if let Some(name) = infos.keys().find(|name| !seen.contains(name.as_str())) {
        return Err(ValidationError::UnknownExternal { name: name.clone() });
    }
    Ok(externals)
}

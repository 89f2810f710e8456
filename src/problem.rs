//! Problem descriptions.
//!
//! A problem bundles the domain, the externals and the initial and goal
//! facts over raw values. It is validated once when built and consumed by
//! every episode that solves it; it carries no search state of its own.

use std::collections::HashSet;

use crate::domain::{ActionSchema, Domain};
use crate::error::ValidationError;
use crate::expression::{validate_name, Atom, Term};
use crate::external::External;
use crate::value::Value;

/// A planning problem with streams.
#[derive(Debug, Clone)]
pub struct Problem {
    domain: Domain,
    externals: Vec<External>,
    init: Vec<Atom>,
    goal: Vec<Atom>,
}

impl Problem {
    /// Start building a problem over `domain`.
    #[must_use]
    pub fn builder(domain: Domain) -> ProblemBuilder {
        ProblemBuilder {
            domain,
            externals: Vec::new(),
            init: Vec::new(),
            goal: Vec::new(),
        }
    }

    /// Planning domain.
    #[must_use]
    pub const fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Action schemas of the domain.
    #[must_use]
    pub fn actions(&self) -> &[ActionSchema] {
        &self.domain.actions
    }

    /// Declared externals.
    #[must_use]
    pub fn externals(&self) -> &[External] {
        &self.externals
    }

    /// Initial state atoms.
    #[must_use]
    pub fn init(&self) -> &[Atom] {
        &self.init
    }

    /// Goal conjunction.
    #[must_use]
    pub fn goal(&self) -> &[Atom] {
        &self.goal
    }

    /// Re-run load-time validation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.domain.validate()?;

        let mut names = HashSet::new();
        for external in &self.externals {
            if !names.insert(external.name()) {
                return Err(ValidationError::DuplicateExternal {
                    name: external.name().to_string(),
                });
            }
            external.info().validate(external.name())?;
        }
        if let Some(action) = self.domain.actions.iter().find(|a| names.contains(a.name.as_str())) {
            return Err(ValidationError::InvalidProblem {
                reason: format!("'{}' names both an action and an external", action.name),
            });
        }

        for (role, atoms) in [("initial", &self.init), ("goal", &self.goal)] {
            for atom in atoms {
                validate_name("predicate", &atom.predicate)?;
                if !atom.is_ground() {
                    return Err(ValidationError::InvalidProblem {
                        reason: format!("{role} fact {atom} contains a parameter"),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Builder for [`Problem`].
#[derive(Debug)]
pub struct ProblemBuilder {
    domain: Domain,
    externals: Vec<External>,
    init: Vec<Atom>,
    goal: Vec<Atom>,
}

impl ProblemBuilder {
    /// Adds one external.
    #[must_use]
    pub fn external(mut self, external: impl Into<External>) -> Self {
        self.externals.push(external.into());
        self
    }

    /// Adds several externals.
    #[must_use]
    pub fn externals(mut self, externals: impl IntoIterator<Item = External>) -> Self {
        self.externals.extend(externals);
        self
    }

    /// Add an initial fact.
    #[must_use]
    pub fn init(mut self, predicate: impl Into<String>, args: impl IntoIterator<Item = Value>) -> Self {
        self.init.push(constant_atom(predicate, args));
        self
    }

    /// Add a goal fact.
    #[must_use]
    pub fn goal(mut self, predicate: impl Into<String>, args: impl IntoIterator<Item = Value>) -> Self {
        self.goal.push(constant_atom(predicate, args));
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<Problem, ValidationError> {
        let problem = Problem {
            domain: self.domain,
            externals: self.externals,
            init: self.init,
            goal: self.goal,
        };
        problem.validate()?;
        Ok(problem)
    }
}

fn constant_atom(predicate: impl Into<String>, args: impl IntoIterator<Item = Value>) -> Atom {
    Atom::new(predicate, args.into_iter().map(Term::Value).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::Predicate;
    use std::sync::Arc;

    fn safe() -> Predicate {
        Predicate::new(
            "safe",
            Arc::new(|_: &[Value]| Ok(true)),
            vec!["?q".to_string()],
            vec![Atom::from_symbols("conf", &["?q"])],
        )
        .unwrap()
    }

    #[test]
    fn builds_valid_problem() {
        let problem = Problem::builder(Domain::default())
            .external(safe())
            .init("conf", [Value::Float(0.0)])
            .goal("conf", [Value::Float(0.0)])
            .build()
            .unwrap();
        assert_eq!(problem.externals().len(), 1);
        assert_eq!(problem.init().len(), 1);
        assert!(problem.init()[0].is_ground());
    }

    #[test]
    fn duplicate_externals_are_rejected() {
        let err = Problem::builder(Domain::default())
            .external(safe())
            .external(safe())
            .build()
            .unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateExternal { .. }));
    }

    #[test]
    fn invalid_predicate_names_are_rejected() {
        let err = Problem::builder(Domain::default())
            .init("not a name", [Value::Int(1)])
            .build()
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidName { .. }));
    }
}

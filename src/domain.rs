//! Symbolic action schemas.
//!
//! Actions are STRIPS-style: a conjunction of positive preconditions, add
//! and delete effects, and a cost that is either fixed or read from a
//! function value certified by a `Function` external.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ExecutionError, KyroResult, ValidationError};
use crate::expression::{ground, ground_all, validate_name, validate_parameter, Atom, Bindings, Fact, Term};
use crate::object::ObjectRef;

/// How an action's cost is determined.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ActionCost {
    /// Every application costs one.
    #[default]
    Unit,
    /// Fixed non-negative cost.
    Constant(f64),
    /// Value of a function head over the action's parameters.
    Function(Atom),
}

/// A parameterised action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSchema {
    /// Action name.
    pub name: String,
    /// Parameters, each starting with `?`.
    pub parameters: Vec<String>,
    /// Atoms that must hold before the action.
    #[serde(default)]
    pub preconditions: Vec<Atom>,
    /// Atoms made true.
    #[serde(default)]
    pub add_effects: Vec<Atom>,
    /// Atoms made false.
    #[serde(default)]
    pub delete_effects: Vec<Atom>,
    /// How the action is priced.
    #[serde(default)]
    pub cost: ActionCost,
}

impl ActionSchema {
    /// Start an action with the given parameters.
    ///
    /// ```
    /// use kyroplan::{ActionSchema, Atom};
    ///
    /// let pick = ActionSchema::new("pick", &["?b", "?p"])
    ///     .precondition(Atom::from_symbols("at-pose", &["?b", "?p"]))
    ///     .precondition(Atom::from_symbols("hand-empty", &[]))
    ///     .add(Atom::from_symbols("holding", &["?b"]))
    ///     .delete(Atom::from_symbols("at-pose", &["?b", "?p"]))
    ///     .delete(Atom::from_symbols("hand-empty", &[]));
    /// assert!(pick.validate().is_ok());
    /// ```
    #[must_use]
    pub fn new(name: impl Into<String>, parameters: &[&str]) -> Self {
        Self {
            name: name.into(),
            parameters: parameters.iter().map(ToString::to_string).collect(),
            preconditions: Vec::new(),
            add_effects: Vec::new(),
            delete_effects: Vec::new(),
            cost: ActionCost::Unit,
        }
    }

    /// Adds a precondition.
    #[must_use]
    pub fn precondition(mut self, atom: Atom) -> Self {
        self.preconditions.push(atom);
        self
    }

    /// Adds an add effect.
    #[must_use]
    pub fn add(mut self, atom: Atom) -> Self {
        self.add_effects.push(atom);
        self
    }

    /// Adds a delete effect.
    #[must_use]
    pub fn delete(mut self, atom: Atom) -> Self {
        self.delete_effects.push(atom);
        self
    }

    /// Sets the cost.
    #[must_use]
    pub fn cost(mut self, cost: ActionCost) -> Self {
        self.cost = cost;
        self
    }

    /// Check names and parameter usage.
    ///
    /// Every parameter must occur in some precondition, so matching the
    /// preconditions always yields a complete binding.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidAction {
            action: self.name.clone(),
            reason,
        };
        validate_name("action", &self.name)?;

        let mut declared = HashSet::new();
        for p in &self.parameters {
            validate_parameter(p)?;
            if !declared.insert(p.as_str()) {
                return Err(invalid(format!("parameter {p} is declared twice")));
            }
        }

        let mut constrained = HashSet::new();
        for atom in &self.preconditions {
            validate_name("predicate", &atom.predicate)?;
            constrained.extend(atom.parameters());
        }
        if let Some(p) = self.parameters.iter().find(|p| !constrained.contains(p.as_str())) {
            return Err(invalid(format!("parameter {p} does not occur in any precondition")));
        }

        let cost_atom = match &self.cost {
            ActionCost::Function(atom) => Some(atom),
            ActionCost::Constant(c) if !c.is_finite() || *c < 0.0 => {
                return Err(invalid(format!("cost {c} must be finite and non-negative")));
            }
            _ => None,
        };
        for atom in self.preconditions.iter().chain(&self.add_effects).chain(&self.delete_effects).chain(cost_atom) {
            validate_name("predicate", &atom.predicate)?;
            if let Some(p) = atom.parameters().into_iter().find(|p| !declared.contains(p)) {
                return Err(invalid(format!("{p} in {atom} is not a parameter")));
            }
        }
        Ok(())
    }

    /// Ground the action under complete `bindings`.
    ///
    /// Returns `Ok(None)` when the cost is a function value that is not
    /// known yet; such an action is not applicable.
    pub fn instantiate(&self, bindings: &Bindings, functions: &HashMap<Fact, f64>) -> KyroResult<Option<GroundAction>> {
        let (cost, cost_function) = match &self.cost {
            ActionCost::Unit => (1.0, None),
            ActionCost::Constant(c) => (*c, None),
            ActionCost::Function(atom) => {
                let head = ground(atom, bindings)?;
                match functions.get(&head) {
                    Some(value) => (*value, Some(head)),
                    None => return Ok(None),
                }
            }
        };
        let args = self
            .parameters
            .iter()
            .map(|p| {
                bindings.get(p).copied().ok_or_else(|| {
                    ExecutionError::UnboundParameter {
                        predicate: self.name.clone(),
                        parameter: p.clone(),
                    }
                    .into()
                })
            })
            .collect::<KyroResult<Vec<ObjectRef>>>()?;
        Ok(Some(GroundAction {
            name: self.name.clone(),
            args,
            preconditions: ground_all(&self.preconditions, bindings)?,
            add_effects: ground_all(&self.add_effects, bindings)?,
            delete_effects: ground_all(&self.delete_effects, bindings)?,
            cost,
            cost_function,
        }))
    }

    /// Map every constant term through `f`.
    pub(crate) fn map_terms(&mut self, f: &mut dyn FnMut(&mut Term)) {
        let cost_atom = match &mut self.cost {
            ActionCost::Function(atom) => Some(atom),
            _ => None,
        };
        for atom in self
            .preconditions
            .iter_mut()
            .chain(self.add_effects.iter_mut())
            .chain(self.delete_effects.iter_mut())
            .chain(cost_atom)
        {
            atom.args.iter_mut().for_each(&mut *f);
        }
    }
}

/// The set of actions available to the planner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    /// Action schemas, names unique.
    pub actions: Vec<ActionSchema>,
}

impl Domain {
    /// Creates a domain from its actions.
    #[must_use]
    pub fn new(actions: Vec<ActionSchema>) -> Self {
        Self { actions }
    }

    /// Validate every action and reject duplicate names.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut names = HashSet::new();
        for action in &self.actions {
            action.validate()?;
            if !names.insert(action.name.as_str()) {
                return Err(ValidationError::InvalidAction {
                    action: action.name.clone(),
                    reason: "declared more than once".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Predicates that some action adds or deletes.
    #[must_use]
    pub fn fluent_predicates(&self) -> HashSet<&str> {
        self.actions
            .iter()
            .flat_map(|a| a.add_effects.iter().chain(&a.delete_effects))
            .map(|atom| atom.predicate.as_str())
            .collect()
    }
}

/// A fully instantiated action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundAction {
    /// Schema name.
    pub name: String,
    /// Objects bound to the schema parameters.
    pub args: Vec<ObjectRef>,
    /// Ground preconditions.
    pub preconditions: Vec<Fact>,
    /// Ground add effects.
    pub add_effects: Vec<Fact>,
    /// Ground delete effects.
    pub delete_effects: Vec<Fact>,
    /// Resolved cost.
    pub cost: f64,
    /// Function head the cost was read from.
    pub cost_function: Option<Fact>,
}

impl GroundAction {
    /// Returns true if any argument is still a placeholder.
    #[must_use]
    pub fn is_optimistic(&self) -> bool {
        self.args.iter().any(|a| a.is_optimistic())
    }
}

impl fmt::Display for GroundAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.name)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::bind;
    use crate::object::ObjectTable;
    use crate::value::Value;

    fn place() -> ActionSchema {
        ActionSchema::new("place", &["?b", "?p", "?r"])
            .precondition(Atom::from_symbols("holding", &["?b"]))
            .precondition(Atom::from_symbols("contained", &["?b", "?p", "?r"]))
            .add(Atom::from_symbols("at-pose", &["?b", "?p"]))
            .add(Atom::from_symbols("in", &["?b", "?r"]))
            .delete(Atom::from_symbols("holding", &["?b"]))
            .cost(ActionCost::Function(Atom::from_symbols("distance", &["?p", "?r"])))
    }

    #[test]
    fn valid_schema() {
        assert!(place().validate().is_ok());
        assert!(Domain::new(vec![place()]).validate().is_ok());
    }

    #[test]
    fn unconstrained_parameter_is_rejected() {
        let action = ActionSchema::new("wave", &["?hand"]);
        let err = action.validate().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidAction { .. }));
    }

    #[test]
    fn effect_parameter_must_be_declared() {
        let action = ActionSchema::new("move", &["?b"])
            .precondition(Atom::from_symbols("block", &["?b"]))
            .add(Atom::from_symbols("at", &["?b", "?q"]));
        assert!(action.validate().is_err());
    }

    #[test]
    fn duplicate_actions_are_rejected() {
        assert!(Domain::new(vec![place(), place()]).validate().is_err());
    }

    #[test]
    fn instantiate_reads_function_cost() {
        let mut objects = ObjectTable::new();
        let args: Vec<ObjectRef> = ["A", "p", "red"]
            .iter()
            .map(|s| ObjectRef::Real(objects.intern(Value::from(*s))))
            .collect();
        let schema = place();
        let bindings = bind(&schema.parameters, &args);

        assert!(schema.instantiate(&bindings, &HashMap::new()).unwrap().is_none());

        let mut functions = HashMap::new();
        functions.insert(Fact::new("distance", vec![args[1], args[2]]), 2.5);
        let action = schema.instantiate(&bindings, &functions).unwrap().unwrap();
        assert_eq!(action.cost, 2.5);
        assert_eq!(action.args, args);
        assert_eq!(action.add_effects.len(), 2);
        assert_eq!(format!("{action}"), "(place v0 v1 v2)");
    }

    #[test]
    fn fluent_predicates_come_from_effects() {
        let domain = Domain::new(vec![place()]);
        let fluents = domain.fluent_predicates();
        assert!(fluents.contains("holding"));
        assert!(fluents.contains("at-pose"));
        assert!(!fluents.contains("contained"));
    }
}

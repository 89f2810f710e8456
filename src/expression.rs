//! Facts, atoms and substitution.
//!
//! An `Atom` is a `(predicate arg...)` tuple whose arguments may still be
//! parameters (`?x`), raw constants awaiting interning, or object handles.
//! A `Fact` is a fully ground atom over `ObjectRef`s and is what the
//! evaluation store and planner operate on.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ExecutionError, KyroResult, ValidationError};
use crate::object::{ObjectId, ObjectRef, OptimisticId};
use crate::value::Value;

/// Partial assignment of parameter names to objects.
///
/// Ordered so that iteration (and therefore instance creation order) is
/// deterministic.
pub type Bindings = BTreeMap<String, ObjectRef>;

/// Returns true if `symbol` names a parameter.
///
/// Parameters are recognised by naming convention alone: a leading `?`.
#[must_use]
pub fn is_parameter(symbol: &str) -> bool {
    symbol.starts_with('?')
}

static NAME_RE: OnceLock<Option<Regex>> = OnceLock::new();
static PARAM_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn matches(cell: &'static OnceLock<Option<Regex>>, pattern: &str, text: &str) -> bool {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(text))
}

/// Validate a predicate, action or external name.
pub fn validate_name(kind: &'static str, name: &str) -> Result<(), ValidationError> {
    if matches(&NAME_RE, r"^[A-Za-z][A-Za-z0-9_-]*$", name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidName {
            kind,
            name: name.to_string(),
        })
    }
}

/// Validate a parameter name (`?x`).
pub fn validate_parameter(name: &str) -> Result<(), ValidationError> {
    if matches(&PARAM_RE, r"^\?[A-Za-z][A-Za-z0-9_-]*$", name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidName {
            kind: "parameter",
            name: name.to_string(),
        })
    }
}

/// One argument position of an atom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Term {
    /// A parameter such as `?p`.
    Param(String),
    /// A raw constant, interned when the episode compiles its declarations.
    Value(Value),
    /// An episode object handle.
    Object(ObjectRef),
}

impl Term {
    /// Parameter term.
    #[must_use]
    pub fn param(name: impl Into<String>) -> Self {
        Self::Param(name.into())
    }

    /// Constant term.
    #[must_use]
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    /// Parses a symbol: `?x` becomes a parameter, anything else a string constant.
    #[must_use]
    pub fn symbol(symbol: &str) -> Self {
        if is_parameter(symbol) {
            Self::Param(symbol.to_string())
        } else {
            Self::Value(Value::String(symbol.to_string()))
        }
    }

    /// The parameter name, if this is a parameter.
    #[must_use]
    pub fn as_param(&self) -> Option<&str> {
        match self {
            Self::Param(p) => Some(p),
            _ => None,
        }
    }
}

impl From<ObjectRef> for Term {
    fn from(object: ObjectRef) -> Self {
        Self::Object(object)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Param(p) => write!(f, "{p}"),
            Self::Value(v) => write!(f, "{v}"),
            Self::Object(o) => write!(f, "{o}"),
        }
    }
}

/// A `(predicate arg...)` tuple, possibly containing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// Predicate name.
    pub predicate: String,
    /// Arguments.
    pub args: Vec<Term>,
}

impl Atom {
    /// Creates an atom.
    #[must_use]
    pub fn new(predicate: impl Into<String>, args: Vec<Term>) -> Self {
        Self {
            predicate: predicate.into(),
            args,
        }
    }

    /// Builds an atom from symbols; `?`-prefixed symbols are parameters.
    ///
    /// ```
    /// use kyroplan::{Atom, Term};
    ///
    /// let atom = Atom::from_symbols("contained", &["?b", "?p", "red"]);
    /// assert_eq!(atom.args[0], Term::param("?b"));
    /// assert_eq!(atom.parameters(), vec!["?b", "?p"]);
    /// ```
    #[must_use]
    pub fn from_symbols(predicate: impl Into<String>, symbols: &[&str]) -> Self {
        Self::new(predicate, symbols.iter().map(|s| Term::symbol(s)).collect())
    }

    /// Distinct parameters in order of first occurrence.
    #[must_use]
    pub fn parameters(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for term in &self.args {
            if let Some(p) = term.as_param() {
                if !out.contains(&p) {
                    out.push(p);
                }
            }
        }
        out
    }

    /// Returns true if no argument is a parameter.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        self.args.iter().all(|t| t.as_param().is_none())
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.predicate)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        write!(f, ")")
    }
}

/// Conjunctive formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Formula {
    /// A single atom.
    Atom(Atom),
    /// Conjunction of sub-formulas.
    And(Vec<Formula>),
}

impl Formula {
    /// Conjunction of the given formulas.
    #[must_use]
    pub fn and(parts: impl IntoIterator<Item = Formula>) -> Self {
        Self::And(parts.into_iter().collect())
    }

    /// Flatten nested conjunctions into an ordered atom list.
    #[must_use]
    pub fn flatten(&self) -> Vec<Atom> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(&self, out: &mut Vec<Atom>) {
        match self {
            Self::Atom(atom) => out.push(atom.clone()),
            Self::And(parts) => {
                for part in parts {
                    part.flatten_into(out);
                }
            }
        }
    }
}

impl Default for Formula {
    /// The empty conjunction, which always holds.
    fn default() -> Self {
        Self::And(Vec::new())
    }
}

impl From<Atom> for Formula {
    fn from(atom: Atom) -> Self {
        Self::Atom(atom)
    }
}

/// A ground fact over object handles.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fact {
    /// Predicate name.
    pub predicate: String,
    /// Arguments.
    pub args: Vec<ObjectRef>,
}

impl Fact {
    /// Creates a fact.
    #[must_use]
    pub fn new(predicate: impl Into<String>, args: Vec<ObjectRef>) -> Self {
        Self {
            predicate: predicate.into(),
            args,
        }
    }

    /// Returns true if any argument is a placeholder.
    #[must_use]
    pub fn is_optimistic(&self) -> bool {
        self.args.iter().any(|a| a.is_optimistic())
    }

    /// Placeholders among the arguments, in order.
    pub fn optimistic_args(&self) -> impl Iterator<Item = OptimisticId> + '_ {
        self.args.iter().filter_map(|a| a.as_optimistic())
    }

    /// Replace resolved placeholders with their real objects.
    #[must_use]
    pub fn relabel(&self, mapping: &HashMap<OptimisticId, ObjectId>) -> Self {
        let args = self
            .args
            .iter()
            .map(|a| match a {
                ObjectRef::Optimistic(id) => mapping.get(id).map_or(*a, |real| ObjectRef::Real(*real)),
                ObjectRef::Real(_) => *a,
            })
            .collect();
        Self::new(self.predicate.clone(), args)
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.predicate)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        write!(f, ")")
    }
}

/// Replace bound parameters; unbound parameters and other terms are left untouched.
#[must_use]
pub fn substitute(atom: &Atom, bindings: &Bindings) -> Atom {
    let args = atom
        .args
        .iter()
        .map(|t| match t {
            Term::Param(p) => bindings.get(p).map_or_else(|| t.clone(), |o| Term::Object(*o)),
            other => other.clone(),
        })
        .collect();
    Atom::new(atom.predicate.clone(), args)
}

/// Ground an atom completely.
///
/// A parameter missing from `bindings` means the declaration that produced
/// the atom is malformed; this is reported as an invariant violation.
pub fn ground(atom: &Atom, bindings: &Bindings) -> KyroResult<Fact> {
    let bound = substitute(atom, bindings);
    let mut args = Vec::with_capacity(bound.args.len());
    for term in bound.args {
        match term {
            Term::Object(o) => args.push(o),
            Term::Param(parameter) => {
                return Err(ExecutionError::UnboundParameter {
                    predicate: atom.predicate.clone(),
                    parameter,
                }
                .into())
            }
            Term::Value(_) => {
                return Err(ExecutionError::UninternedConstant {
                    predicate: atom.predicate.clone(),
                }
                .into())
            }
        }
    }
    Ok(Fact::new(atom.predicate.clone(), args))
}

/// Ground every atom of a conjunction.
pub fn ground_all(atoms: &[Atom], bindings: &Bindings) -> KyroResult<Vec<Fact>> {
    atoms.iter().map(|a| ground(a, bindings)).collect()
}

/// Bindings mapping `params[i]` to `objects[i]`.
#[must_use]
pub fn bind(params: &[String], objects: &[ObjectRef]) -> Bindings {
    params.iter().cloned().zip(objects.iter().copied()).collect()
}

/// Extend `bindings` so that `atom` matches `fact`.
#[must_use]
pub fn unify(atom: &Atom, fact: &Fact, bindings: &Bindings) -> Option<Bindings> {
    if atom.predicate != fact.predicate || atom.args.len() != fact.args.len() {
        return None;
    }
    let mut out = bindings.clone();
    for (term, object) in atom.args.iter().zip(&fact.args) {
        match term {
            Term::Object(o) => {
                if o != object {
                    return None;
                }
            }
            Term::Param(p) => match out.get(p) {
                Some(bound) if bound != object => return None,
                Some(_) => {}
                None => {
                    out.insert(p.clone(), *object);
                }
            },
            Term::Value(_) => return None,
        }
    }
    Some(out)
}

/// Something facts can be matched against.
pub trait FactSource {
    /// Facts with the given predicate, in a deterministic order.
    fn candidates(&self, predicate: &str) -> Vec<&Fact>;
}

/// Every extension of `bindings` under which all `atoms` hold in `source`.
///
/// Atoms are matched left to right, so the output order is deterministic
/// for a deterministic source.
#[must_use]
pub fn match_conjunction(atoms: &[Atom], bindings: &Bindings, source: &dyn FactSource) -> Vec<Bindings> {
    let mut out = Vec::new();
    match_rec(atoms, bindings, source, &mut out, usize::MAX);
    out
}

/// First extension of `bindings` under which all `atoms` hold, if any.
#[must_use]
pub fn first_match(atoms: &[Atom], bindings: &Bindings, source: &dyn FactSource) -> Option<Bindings> {
    let mut out = Vec::new();
    match_rec(atoms, bindings, source, &mut out, 1);
    out.pop()
}

fn match_rec(
    atoms: &[Atom],
    bindings: &Bindings,
    source: &dyn FactSource,
    out: &mut Vec<Bindings>,
    limit: usize,
) {
    if out.len() >= limit {
        return;
    }
    let Some((head, rest)) = atoms.split_first() else {
        out.push(bindings.clone());
        return;
    };
    for fact in source.candidates(&head.predicate) {
        if let Some(extended) = unify(head, fact, bindings) {
            match_rec(rest, &extended, source, out, limit);
            if out.len() >= limit {
                return;
            }
        }
    }
}

impl FactSource for [Fact] {
    fn candidates(&self, predicate: &str) -> Vec<&Fact> {
        self.iter().filter(|f| f.predicate == predicate).collect()
    }
}

impl FactSource for Vec<Fact> {
    fn candidates(&self, predicate: &str) -> Vec<&Fact> {
        self.as_slice().candidates(predicate)
    }
}

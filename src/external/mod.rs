//! Externals: streams, functions and predicates.
//!
//! All three share one shape (a name, ordered inputs, a domain over those
//! inputs and a `StreamInfo`) and differ in what a successful call yields:
//! new output objects plus certified facts, a scalar cost, or the truth of
//! a test. They are modelled as a closed union over a shared trait.

pub mod declaration;
pub mod info;
pub mod instance;
pub mod result;

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SamplerError, ValidationError};
use crate::expression::{validate_name, validate_parameter, Atom, Term};
use crate::generator::{cost_generator, test_generator, CostFn, GenFn, Generator, TestFn};
use crate::value::Value;

pub use declaration::{bind_externals, ExternalDeclaration, Implementation, Implementations};
pub use info::{expected_effort, BoundPolicy, StreamInfo};
pub use instance::{Instance, InstanceId, InstanceState, InstanceTable};
pub use result::{ResultValue, StreamResult};

/// Index of an external within its problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(u32);

impl ExternalId {
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    /// Position of the external in its problem.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Discriminant of an external.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalKind {
    /// Conditional generator of new objects.
    Stream,
    /// Numeric cost function.
    Function,
    /// Boolean test.
    Predicate,
}

impl fmt::Display for ExternalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream => write!(f, "stream"),
            Self::Function => write!(f, "function"),
            Self::Predicate => write!(f, "predicate"),
        }
    }
}

/// Interface shared by every external kind.
pub trait ExternalSpec {
    /// Declared name.
    fn name(&self) -> &str;

    /// Ordered input parameter names.
    fn inputs(&self) -> &[String];

    /// Preconditions over the inputs.
    fn domain(&self) -> &[Atom];

    /// Search configuration.
    fn info(&self) -> &StreamInfo;

    /// Declared output parameter names (streams only).
    fn outputs(&self) -> &[String] {
        &[]
    }

    /// Facts a successful result certifies, over inputs and outputs.
    fn certified(&self) -> Vec<Atom>;

    /// Create the generator for one input binding.
    fn generator(&self, inputs: &[Value]) -> Result<Box<dyn Generator>, SamplerError>;

    /// Effort of one call, derived from `info`.
    fn effort(&self) -> f64 {
        self.info().effort()
    }

    /// The `(name ?inputs...)` atom.
    fn head(&self) -> Atom {
        Atom::new(self.name(), self.inputs().iter().map(Term::param).collect())
    }
}

/// Conditional generator of new objects.
#[derive(Clone)]
pub struct Stream {
    name: String,
    inputs: Vec<String>,
    domain: Vec<Atom>,
    outputs: Vec<String>,
    certified: Vec<Atom>,
    gen_fn: GenFn,
    info: StreamInfo,
}

impl Stream {
    /// Declare a stream, validating its parameters.
    pub fn new(
        name: impl Into<String>,
        gen_fn: GenFn,
        inputs: Vec<String>,
        domain: Vec<Atom>,
        outputs: Vec<String>,
        certified: Vec<Atom>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        validate_signature(&name, &inputs, &domain)?;

        let mut seen = HashSet::new();
        for p in &outputs {
            validate_parameter(p)?;
            if !seen.insert(p.as_str()) {
                return Err(ValidationError::DuplicateOutput {
                    stream: name,
                    parameter: p.clone(),
                });
            }
        }
        if let Some(p) = inputs.iter().find(|p| seen.contains(p.as_str())) {
            return Err(ValidationError::InputOutputOverlap {
                stream: name,
                parameter: p.clone(),
            });
        }
        for atom in &certified {
            validate_name("predicate", &atom.predicate)?;
            for p in atom.parameters() {
                if !inputs.iter().any(|i| i == p) && !seen.contains(p) {
                    return Err(ValidationError::DanglingParameter {
                        stream: name,
                        parameter: p.to_string(),
                    });
                }
            }
        }

        Ok(Self {
            name,
            inputs,
            domain,
            outputs,
            certified,
            gen_fn,
            info: StreamInfo::default(),
        })
    }
}

impl ExternalSpec for Stream {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> &[String] {
        &self.inputs
    }

    fn domain(&self) -> &[Atom] {
        &self.domain
    }

    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn outputs(&self) -> &[String] {
        &self.outputs
    }

    fn certified(&self) -> Vec<Atom> {
        self.certified.clone()
    }

    fn generator(&self, inputs: &[Value]) -> Result<Box<dyn Generator>, SamplerError> {
        (self.gen_fn)(inputs)
    }
}

/// Numeric function of its inputs, used as an action cost.
#[derive(Clone)]
pub struct Function {
    name: String,
    inputs: Vec<String>,
    domain: Vec<Atom>,
    cost_fn: CostFn,
    lower_bound: f64,
    info: StreamInfo,
}

impl Function {
    /// Declare a function, validating its parameters.
    pub fn new(
        name: impl Into<String>,
        cost_fn: CostFn,
        inputs: Vec<String>,
        domain: Vec<Atom>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        validate_signature(&name, &inputs, &domain)?;
        Ok(Self {
            name,
            inputs,
            domain,
            cost_fn,
            lower_bound: 0.0,
            info: StreamInfo::default(),
        })
    }

    /// Value assumed for unevaluated calls during focused search.
    #[must_use]
    pub fn with_lower_bound(mut self, lower_bound: f64) -> Self {
        self.lower_bound = lower_bound;
        self
    }

    /// Value assumed for the function before it is evaluated.
    #[must_use]
    pub const fn lower_bound(&self) -> f64 {
        self.lower_bound
    }
}

impl ExternalSpec for Function {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> &[String] {
        &self.inputs
    }

    fn domain(&self) -> &[Atom] {
        &self.domain
    }

    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn certified(&self) -> Vec<Atom> {
        Vec::new()
    }

    fn generator(&self, inputs: &[Value]) -> Result<Box<dyn Generator>, SamplerError> {
        Ok(cost_generator(&self.cost_fn, inputs))
    }
}

/// Boolean test of its inputs; certifies its own head atom when it holds.
#[derive(Clone)]
pub struct Predicate {
    name: String,
    inputs: Vec<String>,
    domain: Vec<Atom>,
    test_fn: TestFn,
    info: StreamInfo,
}

impl Predicate {
    /// Declare a predicate, validating its parameters.
    pub fn new(
        name: impl Into<String>,
        test_fn: TestFn,
        inputs: Vec<String>,
        domain: Vec<Atom>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        validate_signature(&name, &inputs, &domain)?;
        Ok(Self {
            name,
            inputs,
            domain,
            test_fn,
            info: StreamInfo::default(),
        })
    }

    /// Evaluate the test on raw input values.
    pub fn test(&self, inputs: &[Value]) -> Result<bool, SamplerError> {
        (self.test_fn)(inputs)
    }
}

impl ExternalSpec for Predicate {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> &[String] {
        &self.inputs
    }

    fn domain(&self) -> &[Atom] {
        &self.domain
    }

    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn certified(&self) -> Vec<Atom> {
        vec![self.head()]
    }

    fn generator(&self, inputs: &[Value]) -> Result<Box<dyn Generator>, SamplerError> {
        Ok(test_generator(&self.test_fn, inputs))
    }
}

fn validate_signature(name: &str, inputs: &[String], domain: &[Atom]) -> Result<(), ValidationError> {
    validate_name("external", name)?;
    let mut seen = HashSet::new();
    for p in inputs {
        validate_parameter(p)?;
        if !seen.insert(p.as_str()) {
            return Err(ValidationError::DuplicateInput {
                external: name.to_string(),
                parameter: p.clone(),
            });
        }
    }
    let mut constrained = HashSet::new();
    for atom in domain {
        validate_name("predicate", &atom.predicate)?;
        for p in atom.parameters() {
            if !seen.contains(p) {
                return Err(ValidationError::DanglingParameter {
                    stream: name.to_string(),
                    parameter: p.to_string(),
                });
            }
            constrained.insert(p);
        }
    }
    // Instances are discovered by matching the domain, so every input must occur in it.
    if let Some(p) = inputs.iter().find(|p| !constrained.contains(p.as_str())) {
        return Err(ValidationError::UnconstrainedInput {
            external: name.to_string(),
            parameter: p.clone(),
        });
    }
    Ok(())
}

/// A declared external procedure.
#[derive(Clone)]
pub enum External {
    /// A conditional generator.
    Stream(Stream),
    /// A cost function.
    Function(Function),
    /// A boolean test.
    Predicate(Predicate),
}

impl External {
    /// Shared interface of the wrapped declaration.
    #[must_use]
    pub fn spec(&self) -> &dyn ExternalSpec {
        match self {
            Self::Stream(s) => s,
            Self::Function(f) => f,
            Self::Predicate(p) => p,
        }
    }

    /// Which kind of external this is.
    #[must_use]
    pub const fn kind(&self) -> ExternalKind {
        match self {
            Self::Stream(_) => ExternalKind::Stream,
            Self::Function(_) => ExternalKind::Function,
            Self::Predicate(_) => ExternalKind::Predicate,
        }
    }

    /// Declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.spec().name()
    }

    /// Input parameters, in order.
    #[must_use]
    pub fn inputs(&self) -> &[String] {
        self.spec().inputs()
    }

    /// Atoms the inputs must satisfy.
    #[must_use]
    pub fn domain(&self) -> &[Atom] {
        self.spec().domain()
    }

    /// Output parameters; empty for functions and tests.
    #[must_use]
    pub fn outputs(&self) -> &[String] {
        self.spec().outputs()
    }

    /// Scheduling hints.
    #[must_use]
    pub fn info(&self) -> &StreamInfo {
        self.spec().info()
    }

    /// Expected cost of one successful evaluation.
    #[must_use]
    pub fn effort(&self) -> f64 {
        self.spec().effort()
    }

    /// Atom naming one evaluation of this external.
    #[must_use]
    pub fn head(&self) -> Atom {
        self.spec().head()
    }

    /// Certified-postcondition template.
    #[must_use]
    pub fn certified(&self) -> Vec<Atom> {
        self.spec().certified()
    }

    /// Create the generator for one input binding.
    pub fn generator(&self, inputs: &[Value]) -> Result<Box<dyn Generator>, SamplerError> {
        self.spec().generator(inputs)
    }

    /// Replace the search configuration, validating it.
    pub fn with_info(mut self, info: StreamInfo) -> Result<Self, ValidationError> {
        info.validate(self.name())?;
        match &mut self {
            Self::Stream(s) => s.info = info,
            Self::Function(f) => f.info = info,
            Self::Predicate(p) => p.info = info,
        }
        Ok(self)
    }

    /// Map every constant term of every template through `f`.
    pub(crate) fn map_terms(&mut self, f: &mut dyn FnMut(&mut Term)) {
        let atoms: Vec<&mut Vec<Atom>> = match self {
            Self::Stream(s) => vec![&mut s.domain, &mut s.certified],
            Self::Function(x) => vec![&mut x.domain],
            Self::Predicate(p) => vec![&mut p.domain],
        };
        for list in atoms {
            for atom in list.iter_mut() {
                atom.args.iter_mut().for_each(&mut *f);
            }
        }
    }
}

impl From<Stream> for External {
    fn from(s: Stream) -> Self {
        Self::Stream(s)
    }
}

impl From<Function> for External {
    fn from(f: Function) -> Self {
        Self::Function(f)
    }
}

impl From<Predicate> for External {
    fn from(p: Predicate) -> Self {
        Self::Predicate(p)
    }
}

impl fmt::Debug for External {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("External")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .field("inputs", &self.inputs())
            .field("outputs", &self.outputs())
            .field("info", self.info())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for External {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:({})->({})", self.name(), self.inputs().join(" "), self.outputs().join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{from_fn, from_rule};
    use std::sync::Arc;

    fn params(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    fn ik_stream(outputs: &[&str], certified: Vec<Atom>) -> Result<Stream, ValidationError> {
        Stream::new(
            "inverse-kinematics",
            from_fn(|inputs: &[Value]| Ok(Some(inputs.to_vec()))),
            params(&["?b", "?p"]),
            vec![Atom::from_symbols("pose", &["?b", "?p"])],
            params(outputs),
            certified,
        )
    }

    #[test]
    fn stream_declaration_is_valid() {
        let stream = ik_stream(&["?q"], vec![Atom::from_symbols("kin", &["?b", "?p", "?q"])]).unwrap();
        let external = External::from(stream);
        assert_eq!(external.kind(), ExternalKind::Stream);
        assert_eq!(external.outputs(), &["?q".to_string()]);
        assert_eq!(external.certified().len(), 1);
        assert_eq!(format!("{external}"), "inverse-kinematics:(?b ?p)->(?q)");
    }

    #[test]
    fn duplicate_outputs_are_rejected() {
        let err = ik_stream(&["?q", "?q"], Vec::new()).err().unwrap();
        assert!(matches!(err, ValidationError::DuplicateOutput { .. }));
    }

    #[test]
    fn input_output_overlap_is_rejected() {
        let err = ik_stream(&["?p"], Vec::new()).err().unwrap();
        assert!(matches!(err, ValidationError::InputOutputOverlap { .. }));
    }

    #[test]
    fn dangling_certified_parameter_is_rejected() {
        let err = ik_stream(&["?q"], vec![Atom::from_symbols("kin", &["?b", "?g"])])
            .err()
            .unwrap();
        assert!(matches!(err, ValidationError::DanglingParameter { ref parameter, .. } if parameter == "?g"));
    }

    #[test]
    fn dangling_domain_parameter_is_rejected() {
        let err = Predicate::new(
            "cfree",
            Arc::new(|_: &[Value]| Ok(true)),
            params(&["?b"]),
            vec![Atom::from_symbols("pose", &["?b", "?p"])],
        )
        .err()
        .unwrap();
        assert!(matches!(err, ValidationError::DanglingParameter { .. }));
    }

    #[test]
    fn inputs_must_appear_in_domain() {
        let err = Predicate::new(
            "cfree",
            Arc::new(|_: &[Value]| Ok(true)),
            params(&["?b", "?p"]),
            vec![Atom::from_symbols("block", &["?b"])],
        )
        .err()
        .unwrap();
        assert!(matches!(err, ValidationError::UnconstrainedInput { ref parameter, .. } if parameter == "?p"));

        let err = Predicate::new("twice", Arc::new(|_: &[Value]| Ok(true)), params(&["?b", "?b"]), Vec::new())
            .err()
            .unwrap();
        assert!(matches!(err, ValidationError::DuplicateInput { .. }));
    }

    #[test]
    fn predicate_certifies_its_head() {
        let predicate = Predicate::new(
            "cfree",
            Arc::new(|_: &[Value]| Ok(true)),
            params(&["?b1", "?b2"]),
            vec![Atom::from_symbols("block", &["?b1"]), Atom::from_symbols("block", &["?b2"])],
        )
        .unwrap();
        assert!(predicate.test(&[Value::from("A"), Value::from("B")]).unwrap());
        let external = External::from(predicate);
        assert_eq!(external.certified(), vec![Atom::from_symbols("cfree", &["?b1", "?b2"])]);
    }

    #[test]
    fn with_info_validates() {
        let external = External::from(
            Stream::new("rule", from_rule(), Vec::new(), Vec::new(), Vec::new(), Vec::new()).unwrap(),
        );
        assert!(external.clone().with_info(StreamInfo::default().with_p_success(2.0)).is_err());
        let eager = external.with_info(StreamInfo::eager()).unwrap();
        assert!(eager.info().eager);
    }

    #[test]
    fn function_has_no_certified_facts() {
        let function = Function::new(
            "distance",
            Arc::new(|_: &[Value]| Ok(1.0)),
            params(&["?q1", "?q2"]),
            vec![Atom::from_symbols("motion", &["?q1", "?q2"])],
        )
        .unwrap()
        .with_lower_bound(0.5);
        assert_eq!(function.lower_bound(), 0.5);
        let external = External::from(function);
        assert!(external.certified().is_empty());
        assert_eq!(external.head(), Atom::from_symbols("distance", &["?q1", "?q2"]));
    }
}

//! Results produced by instance calls.

use serde::{Deserialize, Serialize};

use crate::error::{ExecutionError, KyroResult};
use crate::expression::{bind, ground, ground_all, Bindings, Fact};
use crate::external::{External, ExternalId, InstanceId};
use crate::object::ObjectRef;

/// What a successful call yielded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ResultValue {
    /// Output objects of a stream, aligned with its declared outputs.
    Objects(Vec<ObjectRef>),
    /// Value of a function.
    Cost(f64),
    /// A predicate holds.
    Holds,
}

/// One output of one instance call; immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamResult {
    /// Instance that produced the result.
    pub instance: InstanceId,
    /// External of that instance.
    pub external: ExternalId,
    /// Inputs the instance was called with.
    pub inputs: Vec<ObjectRef>,
    /// What the call produced.
    pub value: ResultValue,
    /// True for a placeholder result.
    pub optimistic: bool,
}

impl StreamResult {
    /// Output objects, empty for functions and predicates.
    #[must_use]
    pub fn outputs(&self) -> &[ObjectRef] {
        match &self.value {
            ResultValue::Objects(objects) => objects,
            ResultValue::Cost(_) | ResultValue::Holds => &[],
        }
    }

    /// Bindings of the external's inputs and outputs.
    pub fn mapping(&self, external: &External) -> KyroResult<Bindings> {
        let outputs = self.outputs();
        if outputs.len() != external.outputs().len() {
            return Err(ExecutionError::OutputArity {
                external: external.name().to_string(),
                expected: external.outputs().len(),
                actual: outputs.len(),
            }
            .into());
        }
        let mut bindings = bind(external.inputs(), &self.inputs);
        bindings.extend(bind(external.outputs(), outputs));
        Ok(bindings)
    }

    /// Certified facts with inputs and outputs substituted.
    pub fn get_certified(&self, external: &External) -> KyroResult<Vec<Fact>> {
        if matches!(self.value, ResultValue::Cost(_)) {
            return Ok(Vec::new());
        }
        ground_all(&external.certified(), &self.mapping(external)?)
    }

    /// Domain facts the result was produced under.
    pub fn get_domain(&self, external: &External) -> KyroResult<Vec<Fact>> {
        ground_all(external.domain(), &bind(external.inputs(), &self.inputs))
    }

    /// `(head, value)` of a function result.
    pub fn function_value(&self, external: &External) -> KyroResult<Option<(Fact, f64)>> {
        match self.value {
            ResultValue::Cost(cost) => {
                let head = ground(&external.head(), &bind(external.inputs(), &self.inputs))?;
                Ok(Some((head, cost)))
            }
            _ => Ok(None),
        }
    }
}

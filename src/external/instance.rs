//! Instances: one external bound to one tuple of input objects.
//!
//! An instance owns the lazily created generator for its binding and the
//! results it has produced. The `InstanceTable` memoizes instances by
//! `(external, inputs)` so a binding is never sampled twice in one episode.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::StreamContext;
use crate::error::{ExecutionError, KyroResult};
use crate::external::{External, ExternalId, StreamResult};
use crate::generator::{Generator, OutputValues};
use crate::object::{ObjectRef, OptimisticId};
use crate::value::Value;

/// Handle of an instance within its episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(u32);

impl InstanceId {
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    /// Position in the instance table; also the creation order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// Lifecycle state of an instance.
///
/// `Enumerated` and `Disabled` are terminal for the rest of the episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    /// Created but never called.
    Fresh,
    /// Called at least once and may yield more.
    Active,
    /// The sampler reported it has nothing more to give.
    Enumerated,
    /// Switched off after too many failed attempts.
    Disabled,
}

impl InstanceState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Active => "active",
            Self::Enumerated => "enumerated",
            Self::Disabled => "disabled",
        }
    }
}

/// One external bound to concrete inputs.
pub struct Instance {
    id: InstanceId,
    external: ExternalId,
    inputs: Vec<ObjectRef>,
    generator: Option<Box<dyn Generator>>,
    enumerated: bool,
    disabled: bool,
    results: Vec<StreamResult>,
    optimistic_results: Vec<StreamResult>,
    /// Placeholders currently standing in for this instance's outputs.
    pub(crate) optimistic_outputs: Option<Vec<OptimisticId>>,
    /// True while optimistic facts derived from this instance are asserted.
    pub(crate) live: bool,
    calls: usize,
    pub(crate) attempts: usize,
    optimistic_calls: usize,
    complexity: usize,
}

impl Instance {
    fn new(id: InstanceId, external: ExternalId, inputs: Vec<ObjectRef>, complexity: usize) -> Self {
        Self {
            id,
            external,
            inputs,
            generator: None,
            enumerated: false,
            disabled: false,
            results: Vec::new(),
            optimistic_results: Vec::new(),
            optimistic_outputs: None,
            live: false,
            calls: 0,
            attempts: 0,
            optimistic_calls: 0,
            complexity,
        }
    }

    /// Handle within the episode.
    #[must_use]
    pub const fn id(&self) -> InstanceId {
        self.id
    }

    /// External this instance evaluates.
    #[must_use]
    pub const fn external(&self) -> ExternalId {
        self.external
    }

    /// Input objects, in declaration order.
    #[must_use]
    pub fn inputs(&self) -> &[ObjectRef] {
        &self.inputs
    }

    /// Returns true if every input is a real object.
    #[must_use]
    pub fn has_real_inputs(&self) -> bool {
        self.inputs.iter().all(|o| o.is_real())
    }

    /// Returns true once the sampler is exhausted.
    #[must_use]
    pub const fn is_enumerated(&self) -> bool {
        self.enumerated
    }

    /// Returns true once switched off by the episode.
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns true once no further real call is allowed.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        self.enumerated || self.disabled
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> InstanceState {
        if self.disabled {
            InstanceState::Disabled
        } else if self.enumerated {
            InstanceState::Enumerated
        } else if self.calls == 0 {
            InstanceState::Fresh
        } else {
            InstanceState::Active
        }
    }

    /// Real results produced so far, in order.
    #[must_use]
    pub fn results(&self) -> &[StreamResult] {
        &self.results
    }

    /// Optimistic results handed out so far, in order.
    #[must_use]
    pub fn optimistic_results(&self) -> &[StreamResult] {
        &self.optimistic_results
    }

    /// Number of real generator steps taken.
    #[must_use]
    pub const fn calls(&self) -> usize {
        self.calls
    }

    /// Number of resolution attempts that produced nothing.
    #[must_use]
    pub const fn attempts(&self) -> usize {
        self.attempts
    }

    /// Number of optimistic results created.
    #[must_use]
    pub const fn optimistic_calls(&self) -> usize {
        self.optimistic_calls
    }

    /// Returns true while optimistic facts derived from the instance are asserted.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.live
    }

    /// Stream depth of the instance: one more than its deepest domain fact.
    #[must_use]
    pub const fn complexity(&self) -> usize {
        self.complexity
    }

    /// Exclude the instance from further consideration this episode.
    pub(crate) fn disable(&mut self) {
        self.disabled = true;
        self.generator = None;
    }

    pub(crate) fn push_result(&mut self, result: StreamResult) {
        self.results.push(result);
    }

    pub(crate) fn push_optimistic(&mut self, result: StreamResult) {
        self.optimistic_calls += 1;
        self.live = true;
        self.optimistic_results.push(result);
    }

    /// Advance the generator by one step.
    ///
    /// With a context and a context-aware generator the step is first
    /// offered the context; an empty answer falls back to one unconstrained
    /// step. A failing sampler is recorded as exhaustion.
    pub(crate) fn next_outputs(
        &mut self,
        external: &External,
        inputs: &[Value],
        context: Option<&StreamContext>,
    ) -> KyroResult<Vec<OutputValues>> {
        if self.is_terminated() {
            return Err(ExecutionError::InstanceTerminated {
                external: external.name().to_string(),
                instance: self.id.to_string(),
                state: self.state().as_str(),
            }
            .into());
        }
        self.calls += 1;

        let generator = match self.generator.take() {
            Some(generator) => generator,
            None => match external.generator(inputs) {
                Ok(generator) => generator,
                Err(err) => {
                    warn!(external = %external.name(), instance = %self.id, error = %err, "generator construction failed");
                    self.enumerated = true;
                    return Ok(Vec::new());
                }
            },
        };
        let generator = self.generator.insert(generator);

        let step = match context {
            Some(ctx) if generator.uses_context() => match generator.generate(Some(ctx)) {
                Ok(batch) if batch.is_empty() && !generator.is_enumerated() => generator.generate(None),
                other => other,
            },
            _ => generator.generate(None),
        };

        match step {
            Ok(batch) => {
                if generator.is_enumerated() {
                    self.enumerated = true;
                    self.generator = None;
                }
                debug!(
                    external = %external.name(),
                    instance = %self.id,
                    call = self.calls,
                    produced = batch.len(),
                    enumerated = self.enumerated,
                    "instance step"
                );
                Ok(batch)
            }
            Err(err) => {
                warn!(external = %external.name(), instance = %self.id, error = %err, "sampler failed; treating as exhausted");
                self.enumerated = true;
                self.generator = None;
                Ok(Vec::new())
            }
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("external", &self.external)
            .field("inputs", &self.inputs)
            .field("state", &self.state())
            .field("results", &self.results.len())
            .field("calls", &self.calls)
            .field("attempts", &self.attempts)
            .field("optimistic_calls", &self.optimistic_calls)
            .finish_non_exhaustive()
    }
}

/// Memo table of the instances of one episode.
#[derive(Debug, Default)]
pub struct InstanceTable {
    instances: Vec<Instance>,
    memo: HashMap<(ExternalId, Vec<ObjectRef>), InstanceId>,
}

impl InstanceTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the instance for `(external, inputs)`, creating it on first use.
    ///
    /// The boolean is true when the instance was created by this call.
    pub fn get_instance(&mut self, external: ExternalId, inputs: Vec<ObjectRef>, complexity: usize) -> (InstanceId, bool) {
        let key = (external, inputs);
        if let Some(id) = self.memo.get(&key) {
            return (*id, false);
        }
        let id = InstanceId::from_index(self.instances.len());
        self.instances.push(Instance::new(id, external, key.1.clone(), complexity));
        self.memo.insert(key, id);
        (id, true)
    }

    /// Look up an existing instance without creating it.
    #[must_use]
    pub fn find(&self, external: ExternalId, inputs: &[ObjectRef]) -> Option<InstanceId> {
        self.memo.get(&(external, inputs.to_vec())).copied()
    }

    /// Instance with the given handle.
    pub fn get(&self, id: InstanceId) -> KyroResult<&Instance> {
        self.instances.get(id.index()).ok_or_else(|| unknown(id))
    }

    /// Mutable instance with the given handle.
    pub fn get_mut(&mut self, id: InstanceId) -> KyroResult<&mut Instance> {
        self.instances.get_mut(id.index()).ok_or_else(|| unknown(id))
    }

    /// Instances in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Instance> {
        self.instances.iter_mut()
    }

    /// Number of instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Returns true if no instance was created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

fn unknown(id: InstanceId) -> crate::error::KyroError {
    ExecutionError::UnknownHandle {
        kind: "instance",
        id: id.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Atom;
    use crate::external::Stream;
    use crate::generator::{from_gen_fn, from_list_fn, Generator};
    use crate::object::ObjectTable;
    use crate::error::SamplerError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn stream(gen_fn: crate::generator::GenFn) -> External {
        External::from(
            Stream::new(
                "sample",
                gen_fn,
                vec!["?r".to_string()],
                vec![Atom::from_symbols("region", &["?r"])],
                vec!["?p".to_string()],
                vec![Atom::from_symbols("pose", &["?p"])],
            )
            .unwrap(),
        )
    }

    fn real_inputs() -> Vec<ObjectRef> {
        let mut objects = ObjectTable::new();
        vec![ObjectRef::Real(objects.intern(Value::from("red")))]
    }

    #[test]
    fn memoization_returns_the_same_instance() {
        let mut table = InstanceTable::new();
        let e = ExternalId::from_index(0);
        let inputs = real_inputs();
        let (a, created_a) = table.get_instance(e, inputs.clone(), 1);
        let (b, created_b) = table.get_instance(e, inputs.clone(), 1);
        assert_eq!(a, b);
        assert!(created_a);
        assert!(!created_b);
        assert_eq!(table.len(), 1);
        let (c, _) = table.get_instance(ExternalId::from_index(1), inputs, 1);
        assert_ne!(a, c);
    }

    #[test]
    fn finite_generator_enumerates() {
        let external = stream(from_gen_fn(|_: &[Value]| (0..2).map(|i| vec![Value::Int(i)])));
        let mut table = InstanceTable::new();
        let (id, _) = table.get_instance(ExternalId::from_index(0), real_inputs(), 1);
        let instance = table.get_mut(id).unwrap();
        assert_eq!(instance.state(), InstanceState::Fresh);

        let values = [Value::from("red")];
        assert_eq!(instance.next_outputs(&external, &values, None).unwrap().len(), 1);
        assert_eq!(instance.state(), InstanceState::Active);
        assert_eq!(instance.next_outputs(&external, &values, None).unwrap().len(), 1);
        assert!(instance.next_outputs(&external, &values, None).unwrap().is_empty());
        assert!(instance.is_enumerated());

        let err = instance.next_outputs(&external, &values, None).unwrap_err();
        assert!(err.is_execution());
    }

    #[test]
    fn sampler_failure_is_exhaustion() {
        let external = stream(from_list_fn(|_| Err(SamplerError::new("ik failed"))));
        let mut table = InstanceTable::new();
        let (id, _) = table.get_instance(ExternalId::from_index(0), real_inputs(), 1);
        let instance = table.get_mut(id).unwrap();
        assert!(instance.next_outputs(&external, &[Value::from("red")], None).unwrap().is_empty());
        assert_eq!(instance.state(), InstanceState::Enumerated);
    }

    #[test]
    fn disabled_instance_rejects_calls() {
        let external = stream(from_gen_fn(|_: &[Value]| std::iter::repeat(vec![Value::Int(0)])));
        let mut table = InstanceTable::new();
        let (id, _) = table.get_instance(ExternalId::from_index(0), real_inputs(), 1);
        let instance = table.get_mut(id).unwrap();
        instance.disable();
        assert_eq!(instance.state(), InstanceState::Disabled);
        assert!(instance.next_outputs(&external, &[Value::from("red")], None).is_err());
    }

    struct ContextCounter {
        context_steps: Arc<AtomicUsize>,
    }

    impl Generator for ContextCounter {
        fn generate(&mut self, context: Option<&StreamContext>) -> Result<Vec<OutputValues>, SamplerError> {
            if context.is_some() {
                self.context_steps.fetch_add(1, Ordering::SeqCst);
                return Ok(Vec::new());
            }
            Ok(vec![vec![Value::Int(7)]])
        }

        fn is_enumerated(&self) -> bool {
            false
        }

        fn uses_context(&self) -> bool {
            true
        }
    }

    #[test]
    fn empty_context_step_falls_back_to_unconstrained_step() {
        let steps = Arc::new(AtomicUsize::new(0));
        let seen_steps = Arc::clone(&steps);
        let external = stream(crate::generator::from_generator_fn(move |_: &[Value]| ContextCounter {
            context_steps: Arc::clone(&seen_steps),
        }));
        let mut table = InstanceTable::new();
        let (id, _) = table.get_instance(ExternalId::from_index(0), real_inputs(), 1);
        let instance = table.get_mut(id).unwrap();

        let mut context = StreamContext::new();
        context.insert("cfree", vec![Some(Value::Int(1)), None]);
        let batch = instance.next_outputs(&external, &[Value::from("red")], Some(&context)).unwrap();
        assert_eq!(batch, vec![vec![Value::Int(7)]]);
        assert_eq!(steps.load(Ordering::SeqCst), 1);
        assert_eq!(instance.calls(), 1);
    }
}

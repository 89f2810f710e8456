//! Episodes: the explicit state of one solver run.
//!
//! An `Episode` owns everything one run mutates: the object table, the
//! instance memo, the evaluation store and the placeholder bookkeeping.
//! Nothing is shared between episodes, so two runs over the same problem
//! are fully isolated and a new run always starts from the initial facts.
//!
//! Both algorithms drive an episode through the same operations:
//! `discover_instances`, `next_results` and `record_real` for real
//! evaluation, and `next_optimistic`, `add_optimistic`, `promote` and
//! `retract_instance` for the optimistic layer.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::algorithms::{EvaluatedFact, PlanAction};
use crate::context::StreamContext;
use crate::domain::ActionSchema;
use crate::error::{ExecutionError, KyroError, KyroResult};
use crate::evaluation::{EvaluationKind, EvaluationStore, Promotion};
use crate::expression::{bind, ground, ground_all, Atom, Bindings, Fact, Term};
use crate::external::{
    BoundPolicy, External, ExternalId, ExternalKind, Instance, InstanceId, InstanceTable, ResultValue,
    StreamResult,
};
use crate::object::{ObjectId, ObjectRef, ObjectTable, OptimisticId};
use crate::planner::{PlanSketch, PlannerInput};
use crate::problem::Problem;
use crate::value::Value;

/// Unique identifier of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpisodeId(Uuid);

impl EpisodeId {
    /// Creates a new random episode ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EpisodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Work counters of an episode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeCounters {
    /// Real generator steps.
    pub stream_calls: usize,
    /// Optimistic results handed out.
    pub optimistic_calls: usize,
    /// Verified results promoted over optimistic ones.
    pub promotions: usize,
    /// Optimistic facts withdrawn after a failed or abandoned instance.
    pub retractions: usize,
}

/// State of one solver run.
#[derive(Debug)]
pub struct Episode {
    id: EpisodeId,
    started_at: DateTime<Utc>,
    externals: Vec<External>,
    actions: Vec<ActionSchema>,
    goal: Vec<Fact>,
    objects: ObjectTable,
    instances: InstanceTable,
    store: EvaluationStore,
    per_external: HashMap<ExternalId, Vec<OptimisticId>>,
    counters: EpisodeCounters,
}

impl Episode {
    /// Start an episode: intern every constant and seed the initial facts.
    pub fn new(problem: &Problem) -> KyroResult<Self> {
        problem.validate()?;

        let mut objects = ObjectTable::new();
        let mut compile = |term: &mut Term| {
            if let Term::Value(value) = term {
                let id = objects.intern(value.clone());
                *term = Term::Object(ObjectRef::Real(id));
            }
        };

        let mut externals = problem.externals().to_vec();
        for external in &mut externals {
            external.map_terms(&mut compile);
        }
        let mut actions = problem.actions().to_vec();
        for action in &mut actions {
            action.map_terms(&mut compile);
        }
        let mut compile_facts = |atoms: &[Atom]| -> KyroResult<Vec<Fact>> {
            atoms
                .iter()
                .map(|atom| {
                    let mut atom = atom.clone();
                    atom.args.iter_mut().for_each(&mut compile);
                    ground(&atom, &Bindings::new())
                })
                .collect()
        };
        let init = compile_facts(problem.init())?;
        let goal = compile_facts(problem.goal())?;

        let mut store = EvaluationStore::new();
        for fact in init {
            store.add_real(fact, None, 0);
        }

        let episode = Self {
            id: EpisodeId::new(),
            started_at: Utc::now(),
            externals,
            actions,
            goal,
            objects,
            instances: InstanceTable::new(),
            store,
            per_external: HashMap::new(),
            counters: EpisodeCounters::default(),
        };
        info!(
            episode = %episode.id,
            externals = episode.externals.len(),
            facts = episode.store.real_len(),
            "episode started"
        );
        Ok(episode)
    }

    /// Unique id of this run.
    #[must_use]
    pub const fn id(&self) -> EpisodeId {
        self.id
    }

    /// Wall-clock start.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Objects interned so far.
    #[must_use]
    pub const fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    /// Facts and function values evaluated so far.
    #[must_use]
    pub const fn store(&self) -> &EvaluationStore {
        &self.store
    }

    /// Instances created so far.
    #[must_use]
    pub const fn instances(&self) -> &InstanceTable {
        &self.instances
    }

    /// Bound externals, indexed by `ExternalId`.
    #[must_use]
    pub fn externals(&self) -> &[External] {
        &self.externals
    }

    /// Ground goal.
    #[must_use]
    pub fn goal(&self) -> &[Fact] {
        &self.goal
    }

    /// Work done so far.
    #[must_use]
    pub const fn counters(&self) -> EpisodeCounters {
        self.counters
    }

    /// External with the given handle.
    pub fn external(&self, id: ExternalId) -> KyroResult<&External> {
        lookup(&self.externals, id)
    }

    /// Id of the external with the given name.
    #[must_use]
    pub fn external_id(&self, name: &str) -> Option<ExternalId> {
        self.externals
            .iter()
            .position(|e| e.name() == name)
            .map(ExternalId::from_index)
    }

    /// Instance with the given handle.
    pub fn instance(&self, id: InstanceId) -> KyroResult<&Instance> {
        self.instances.get(id)
    }

    /// Intern a value into this episode.
    pub fn intern(&mut self, value: Value) -> ObjectRef {
        ObjectRef::Real(self.objects.intern(value))
    }

    /// The memoized instance of `external` for `inputs`.
    ///
    /// At most one instance exists per `(external, inputs)` pair for the
    /// lifetime of the episode.
    pub fn get_instance(&mut self, external: ExternalId, inputs: Vec<ObjectRef>) -> KyroResult<InstanceId> {
        if let Some(id) = self.instances.find(external, &inputs) {
            return Ok(id);
        }
        let decl = lookup(&self.externals, external)?;
        let domain = ground_all(decl.domain(), &bind(decl.inputs(), &inputs))?;
        let level = domain
            .iter()
            .filter_map(|f| self.store.get(f))
            .map(|e| e.level)
            .max()
            .unwrap_or(0);
        let (id, _) = self.instances.get_instance(external, inputs, level + 1);
        debug!(external = %decl.name(), instance = %id, complexity = level + 1, "instance created");
        Ok(id)
    }

    /// Domain facts of an instance, grounded on its inputs.
    pub fn domain_facts(&self, id: InstanceId) -> KyroResult<Vec<Fact>> {
        let instance = self.instances.get(id)?;
        let external = self.external(instance.external())?;
        ground_all(external.domain(), &bind(external.inputs(), instance.inputs()))
    }

    /// Returns true if the instance can be evaluated for real: every input
    /// is a real object and every domain fact is real.
    pub fn is_grounded(&self, id: InstanceId) -> KyroResult<bool> {
        if !self.instances.get(id)?.has_real_inputs() {
            return Ok(false);
        }
        Ok(self.domain_facts(id)?.iter().all(|f| self.store.is_real(f)))
    }

    /// Count one resolution attempt that produced nothing.
    pub(crate) fn note_failed_attempt(&mut self, id: InstanceId) -> KyroResult<usize> {
        let instance = self.instances.get_mut(id)?;
        instance.attempts += 1;
        Ok(instance.attempts)
    }

    /// Create instances for every domain match not seen before.
    ///
    /// Returns the new instances in creation order.
    pub fn discover_instances(&mut self, include_optimistic: bool) -> KyroResult<Vec<InstanceId>> {
        let mut pending = Vec::new();
        for (i, external) in self.externals.iter().enumerate() {
            let id = ExternalId::from_index(i);
            for bindings in self.store.matches(external.domain(), &Bindings::new(), include_optimistic) {
                let inputs = external
                    .inputs()
                    .iter()
                    .map(|p| {
                        bindings.get(p).copied().ok_or_else(|| {
                            KyroError::from(ExecutionError::UnboundParameter {
                                predicate: external.name().to_string(),
                                parameter: p.clone(),
                            })
                        })
                    })
                    .collect::<KyroResult<Vec<_>>>()?;
                if self.instances.find(id, &inputs).is_none() {
                    pending.push((id, inputs));
                }
            }
        }
        let mut created = Vec::new();
        for (external, inputs) in pending {
            if self.instances.find(external, &inputs).is_none() {
                created.push(self.get_instance(external, inputs)?);
            }
        }
        Ok(created)
    }

    /// Advance an instance by one real step and wrap its output as results.
    ///
    /// Output values are interned. Results are recorded on the instance but
    /// not yet asserted; see [`Episode::record_real`] and [`Episode::promote`].
    pub fn next_results(&mut self, id: InstanceId, context: Option<&StreamContext>) -> KyroResult<Vec<StreamResult>> {
        let instance = self.instances.get(id)?;
        let external_id = instance.external();
        let inputs = instance.inputs().to_vec();
        let external = lookup(&self.externals, external_id)?;
        let real_inputs = inputs
            .iter()
            .map(|o| {
                o.as_real().ok_or_else(|| {
                    KyroError::from(ExecutionError::OptimisticInput {
                        external: external.name().to_string(),
                        instance: id.to_string(),
                    })
                })
            })
            .collect::<KyroResult<Vec<ObjectId>>>()?;
        let values = self.objects.values(&real_inputs)?;

        let batch = self.instances.get_mut(id)?.next_outputs(external, &values, context)?;
        self.counters.stream_calls += 1;

        let mut results = Vec::with_capacity(batch.len());
        for tuple in batch {
            let value = match external.kind() {
                ExternalKind::Stream => {
                    if tuple.len() != external.outputs().len() {
                        return Err(ExecutionError::OutputArity {
                            external: external.name().to_string(),
                            expected: external.outputs().len(),
                            actual: tuple.len(),
                        }
                        .into());
                    }
                    ResultValue::Objects(
                        tuple
                            .into_iter()
                            .map(|v| ObjectRef::Real(self.objects.intern(v)))
                            .collect(),
                    )
                }
                ExternalKind::Function => match tuple.first().and_then(Value::as_float) {
                    Some(cost) => ResultValue::Cost(cost),
                    None => {
                        return Err(ExecutionError::OutputArity {
                            external: external.name().to_string(),
                            expected: 1,
                            actual: tuple.len(),
                        }
                        .into())
                    }
                },
                ExternalKind::Predicate => ResultValue::Holds,
            };
            results.push(StreamResult {
                instance: id,
                external: external_id,
                inputs: inputs.clone(),
                value,
                optimistic: false,
            });
        }

        let instance = self.instances.get_mut(id)?;
        for result in &results {
            instance.push_result(result.clone());
        }
        Ok(results)
    }

    /// Assert a real result's certified facts and function value.
    ///
    /// Returns the number of facts that became real.
    pub fn record_real(&mut self, result: &StreamResult) -> KyroResult<usize> {
        let instance = self.instances.get(result.instance)?;
        let level = instance.complexity() + instance.calls().saturating_sub(1);
        let external = self.external(result.external)?;
        let certified = result.get_certified(external)?;
        let function = result.function_value(external)?;

        let mut added = 0;
        for fact in certified {
            if self.store.add_real(fact, Some(result.instance), level) {
                added += 1;
            }
        }
        if let Some((head, value)) = function {
            self.store
                .set_function(head, value, EvaluationKind::Real, Some(result.instance));
        }
        Ok(added)
    }

    /// Produce at most one optimistic result for an instance.
    ///
    /// Under `Shared` the same placeholders are returned until they are
    /// resolved or abandoned; under `Unique` every call mints new ones;
    /// under `PerExternal` all instances of the external share one set.
    /// `Empty` externals never produce optimistic results.
    pub fn next_optimistic(&mut self, id: InstanceId) -> KyroResult<Option<StreamResult>> {
        let instance = self.instances.get(id)?;
        let external_id = instance.external();
        let external = lookup(&self.externals, external_id)?;
        let bound = external.info().bound;
        if instance.is_terminated() || bound == BoundPolicy::Empty {
            return Ok(None);
        }

        let arity = external.outputs().len();
        let (value, placeholders) = match external {
            External::Stream(_) => {
                let existing = match bound {
                    BoundPolicy::Shared => instance.optimistic_outputs.clone(),
                    BoundPolicy::PerExternal => self.per_external.get(&external_id).cloned(),
                    BoundPolicy::Unique | BoundPolicy::Empty => None,
                };
                let placeholders = match existing {
                    Some(placeholders) => placeholders,
                    None => (0..arity).map(|i| self.objects.create_optimistic(id, i)).collect(),
                };
                if bound == BoundPolicy::PerExternal {
                    self.per_external.insert(external_id, placeholders.clone());
                }
                let objects = placeholders.iter().copied().map(ObjectRef::Optimistic).collect();
                (ResultValue::Objects(objects), Some(placeholders))
            }
            External::Function(function) => (ResultValue::Cost(function.lower_bound()), None),
            External::Predicate(_) => (ResultValue::Holds, None),
        };

        let instance = self.instances.get_mut(id)?;
        let result = StreamResult {
            instance: id,
            external: external_id,
            inputs: instance.inputs().to_vec(),
            value,
            optimistic: true,
        };
        if placeholders.is_some() {
            instance.optimistic_outputs = placeholders;
        }
        instance.push_optimistic(result.clone());
        self.counters.optimistic_calls += 1;
        Ok(Some(result))
    }

    /// Assert an optimistic result's certified facts and function value.
    pub fn add_optimistic(&mut self, result: &StreamResult) -> KyroResult<usize> {
        let external = self.external(result.external)?;
        let certified = result.get_certified(external)?;
        let function = result.function_value(external)?;

        let mut added = 0;
        for fact in certified {
            if self.store.add_optimistic(fact, result.instance) {
                added += 1;
            }
        }
        if let Some((head, value)) = function {
            self.store
                .set_function(head, value, EvaluationKind::Optimistic, Some(result.instance));
        }
        Ok(added)
    }

    /// Promote a verified result over the optimistic commitment of its instance.
    ///
    /// The instance's placeholders are resolved to the result's outputs,
    /// its optimistic facts become real, and every optimistic fact that
    /// depends on a resolved placeholder is withdrawn. All checks happen
    /// before the first mutation, so a failed promotion changes nothing.
    pub fn promote(&mut self, result: &StreamResult) -> KyroResult<()> {
        let id = result.instance;
        let instance = self.instances.get(id)?;
        let external = self.external(result.external)?;

        let mut mapping = HashMap::new();
        if let Some(placeholders) = &instance.optimistic_outputs {
            let outputs = result.outputs();
            if outputs.len() != placeholders.len() {
                return Err(ExecutionError::OutputArity {
                    external: external.name().to_string(),
                    expected: placeholders.len(),
                    actual: outputs.len(),
                }
                .into());
            }
            for (placeholder, output) in placeholders.iter().zip(outputs) {
                let real = output.as_real().ok_or_else(|| {
                    KyroError::from(ExecutionError::UnresolvedObject {
                        object: output.to_string(),
                    })
                })?;
                mapping.insert(*placeholder, real);
            }
        }
        let certified = result.get_certified(external)?;
        let function = result.function_value(external)?;
        let level = instance.complexity() + instance.calls().saturating_sub(1);

        let mut stale_objects: HashSet<OptimisticId> = instance
            .optimistic_results()
            .iter()
            .flat_map(StreamResult::outputs)
            .filter_map(|o| o.as_optimistic())
            .chain(mapping.keys().copied())
            .collect();
        let mut stale_instances = HashSet::new();
        self.collect_stale(&mut stale_objects, &mut stale_instances, Some(id))?;

        for (placeholder, real) in &mapping {
            self.objects.resolve(*placeholder, *real);
        }
        let retracted = self.store.promote(
            Promotion {
                source: Some(id),
                level,
                certified,
                function,
                stale_objects: stale_objects.clone(),
                stale_instances: stale_instances.clone(),
            },
            &mapping,
        );
        self.reset_optimistic(&stale_objects, &stale_instances, Some(id));
        self.counters.promotions += 1;
        self.counters.retractions += retracted;
        info!(
            instance = %id,
            resolved = mapping.len(),
            invalidated = stale_instances.len(),
            "promoted result"
        );
        Ok(())
    }

    /// Withdraw every optimistic fact that depends on an instance.
    ///
    /// Used when the instance is enumerated without a usable result or
    /// disabled. Returns the number of facts withdrawn.
    pub fn retract_instance(&mut self, id: InstanceId) -> KyroResult<usize> {
        let instance = self.instances.get(id)?;
        let mut stale_objects: HashSet<OptimisticId> = instance
            .optimistic_results()
            .iter()
            .flat_map(StreamResult::outputs)
            .filter_map(|o| o.as_optimistic())
            .collect();
        let mut stale_instances: HashSet<InstanceId> = [id].into_iter().collect();
        self.collect_stale(&mut stale_objects, &mut stale_instances, None)?;

        let retracted = self.store.retract(&stale_objects, &stale_instances);
        self.reset_optimistic(&stale_objects, &stale_instances, None);
        self.counters.retractions += retracted;
        debug!(instance = %id, retracted, "retracted optimistic facts");
        Ok(retracted)
    }

    /// Disable an instance for the rest of the episode and withdraw its
    /// optimistic facts.
    pub fn disable(&mut self, id: InstanceId) -> KyroResult<usize> {
        let instance = self.instances.get_mut(id)?;
        instance.disable();
        warn!(instance = %id, attempts = instance.attempts(), "instance disabled");
        self.retract_instance(id)
    }

    /// Extend the stale sets to a fixpoint: a live instance is stale when
    /// it consumes a stale placeholder, owns one, or relies on a domain fact
    /// asserted by a stale instance.
    fn collect_stale(
        &self,
        stale_objects: &mut HashSet<OptimisticId>,
        stale_instances: &mut HashSet<InstanceId>,
        keep: Option<InstanceId>,
    ) -> KyroResult<()> {
        loop {
            let mut changed = false;
            for instance in self.instances.iter() {
                let id = instance.id();
                if !instance.live || Some(id) == keep || stale_instances.contains(&id) {
                    continue;
                }
                let mut stale = instance
                    .inputs()
                    .iter()
                    .chain(instance.optimistic_results().iter().flat_map(StreamResult::outputs))
                    .filter_map(|o| o.as_optimistic())
                    .any(|o| stale_objects.contains(&o));
                if !stale {
                    let external = self.external(instance.external())?;
                    let domain = ground_all(external.domain(), &bind(external.inputs(), instance.inputs()))?;
                    stale = domain.iter().any(|f| {
                        self.store
                            .get(f)
                            .is_some_and(|e| !e.is_real() && e.source.is_some_and(|s| stale_instances.contains(&s)))
                    });
                }
                if stale {
                    stale_instances.insert(id);
                    stale_objects.extend(
                        instance
                            .optimistic_results()
                            .iter()
                            .flat_map(StreamResult::outputs)
                            .filter_map(|o| o.as_optimistic()),
                    );
                    changed = true;
                }
            }
            if !changed {
                return Ok(());
            }
        }
    }

    fn reset_optimistic(
        &mut self,
        stale_objects: &HashSet<OptimisticId>,
        stale_instances: &HashSet<InstanceId>,
        promoted: Option<InstanceId>,
    ) {
        for instance in self.instances.iter_mut() {
            let id = instance.id();
            if Some(id) == promoted || stale_instances.contains(&id) {
                instance.live = false;
                instance.optimistic_outputs = None;
            }
        }
        self.per_external
            .retain(|_, placeholders| !placeholders.iter().any(|p| stale_objects.contains(p)));
    }

    /// Instances an optimistic fact or function value transitively rests on.
    pub fn support(&self, facts: &[Fact]) -> KyroResult<BTreeSet<InstanceId>> {
        self.support_of(facts.to_vec(), Vec::new())
    }

    fn support_of(&self, mut facts: Vec<Fact>, mut objects: Vec<OptimisticId>) -> KyroResult<BTreeSet<InstanceId>> {
        let mut support = BTreeSet::new();
        let mut seen = HashSet::new();
        loop {
            let mut sources = Vec::new();
            if let Some(fact) = facts.pop() {
                if !seen.insert(fact.clone()) {
                    continue;
                }
                if let Some(evaluation) = self.store.get(&fact) {
                    if !evaluation.is_real() {
                        sources.extend(evaluation.source);
                    }
                }
                if let Some(value) = self.store.function(&fact) {
                    if value.kind == EvaluationKind::Optimistic {
                        sources.extend(value.source);
                    }
                }
                objects.extend(fact.optimistic_args());
            } else if let Some(object) = objects.pop() {
                sources.extend(self.objects.optimistic(object).map(|o| o.instance));
            } else {
                return Ok(support);
            }
            for source in sources {
                if !support.insert(source) {
                    continue;
                }
                let instance = self.instances.get(source)?;
                let external = self.external(instance.external())?;
                facts.extend(ground_all(external.domain(), &bind(external.inputs(), instance.inputs()))?);
                objects.extend(instance.inputs().iter().filter_map(|o| o.as_optimistic()));
            }
        }
    }

    /// Total effort of the unverified instances behind each optimistic
    /// fact and function value.
    pub fn fact_efforts(&self) -> KyroResult<HashMap<Fact, f64>> {
        let mut efforts = HashMap::new();
        let heads: Vec<Fact> = self
            .store
            .optimistic_facts()
            .map(|e| e.fact.clone())
            .chain(self.store.optimistic_functions().map(|(head, _)| head.clone()))
            .collect();
        for fact in heads {
            let mut effort = 0.0;
            for id in self.support(std::slice::from_ref(&fact))? {
                effort += self.external(self.instances.get(id)?.external())?.effort();
            }
            efforts.insert(fact, effort);
        }
        Ok(efforts)
    }

    /// Effort of certifying one instance, including its unverified ancestors.
    pub fn instance_effort(&self, id: InstanceId) -> KyroResult<f64> {
        let instance = self.instances.get(id)?;
        let external = self.external(instance.external())?;
        let domain = ground_all(external.domain(), &bind(external.inputs(), instance.inputs()))?;
        let mut effort = external.effort();
        for ancestor in self.support(&domain)? {
            if ancestor != id {
                effort += self.external(self.instances.get(ancestor)?.external())?.effort();
            }
        }
        Ok(effort)
    }

    /// Unverified instances a candidate plan depends on, in dependency order.
    ///
    /// Instance ids are minted after every fact and placeholder an
    /// instance consumes, so ascending id order is a topological order.
    pub fn stream_plan(&self, sketch: &PlanSketch) -> KyroResult<Vec<InstanceId>> {
        let mut used: Vec<Fact> = Vec::new();
        let mut placeholders = Vec::new();
        for action in &sketch.actions {
            used.extend(action.preconditions.iter().filter(|f| self.store.contains(f)).cloned());
            used.extend(action.cost_function.iter().cloned());
            placeholders.extend(action.args.iter().filter_map(|a| a.as_optimistic()));
        }
        used.extend(self.goal.iter().filter(|f| self.store.contains(f)).cloned());
        Ok(self.support_of(used, placeholders)?.into_iter().collect())
    }

    /// Context for resolving `target`: the calls later in `stream_plan`
    /// that consume the target's placeholders.
    pub fn immediate_context(&self, target: InstanceId, stream_plan: &[InstanceId]) -> KyroResult<StreamContext> {
        let instance = self.instances.get(target)?;
        let outputs: HashSet<OptimisticId> = instance.optimistic_outputs.iter().flatten().copied().collect();
        let mut tail = Vec::new();
        for id in stream_plan.iter().skip_while(|id| **id != target).skip(1) {
            let consumer = self.instances.get(*id)?;
            tail.push((self.external(consumer.external())?.name(), consumer.inputs()));
        }
        Ok(StreamContext::immediate(&outputs, tail, &self.objects))
    }

    /// Input for one planner call over real, or real and optimistic, facts.
    pub fn planner_input(&self, include_optimistic: bool) -> KyroResult<PlannerInput> {
        Ok(PlannerInput {
            actions: self.actions.clone(),
            facts: self.store.facts(include_optimistic),
            goal: self.goal.clone(),
            function_values: self.store.function_values(include_optimistic),
            fact_effort: if include_optimistic {
                self.fact_efforts()?
            } else {
                HashMap::new()
            },
            ..PlannerInput::default()
        })
    }

    /// Convert a fully grounded plan into raw values.
    pub fn plan_actions(&self, sketch: &PlanSketch) -> KyroResult<Vec<PlanAction>> {
        sketch
            .actions
            .iter()
            .map(|action| {
                Ok(PlanAction {
                    name: action.name.clone(),
                    args: self.resolve_values(&action.args)?,
                    cost: action.cost,
                })
            })
            .collect()
    }

    /// Real facts of the episode as raw values, in insertion order.
    pub fn evaluated_facts(&self) -> KyroResult<Vec<EvaluatedFact>> {
        self.store
            .real_facts()
            .map(|fact| {
                Ok(EvaluatedFact {
                    predicate: fact.predicate.clone(),
                    args: self.resolve_values(&fact.args)?,
                })
            })
            .collect()
    }

    fn resolve_values(&self, args: &[ObjectRef]) -> KyroResult<Vec<Value>> {
        args.iter()
            .map(|a| {
                let id = a.as_real().ok_or_else(|| {
                    KyroError::from(ExecutionError::UnresolvedObject { object: a.to_string() })
                })?;
                self.objects.value(id).cloned()
            })
            .collect()
    }
}

fn lookup(externals: &[External], id: ExternalId) -> KyroResult<&External> {
    externals.get(id.index()).ok_or_else(|| {
        ExecutionError::UnknownHandle {
            kind: "external",
            id: id.to_string(),
        }
        .into()
    })
}

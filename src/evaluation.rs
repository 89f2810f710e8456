//! Evaluation store: facts known so far, real or optimistic.
//!
//! Real facts come from the initial state or from verified results and are
//! never removed or downgraded. Optimistic facts are assumptions derived
//! from optimistic results; they are either promoted to real when their
//! result is verified or retracted when the instance behind them fails.
//!
//! Facts are kept in insertion order so that every query, and therefore
//! every algorithm built on top of the store, is deterministic.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::expression::{first_match, match_conjunction, Atom, Bindings, Fact, FactSource};
use crate::external::InstanceId;
use crate::object::OptimisticId;

/// Whether a fact is verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationKind {
    /// Produced by a real call or given in the initial state.
    Real,
    /// Assumed by an optimistic result.
    Optimistic,
}

/// A stored fact with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// The fact itself.
    pub fact: Fact,
    /// Whether it is verified.
    pub kind: EvaluationKind,
    /// Instance whose result asserted the fact; `None` for the initial state.
    pub source: Option<InstanceId>,
    /// Stream depth at which the fact became known.
    pub level: usize,
    active: bool,
}

impl Evaluation {
    /// Returns true for a verified fact.
    #[must_use]
    pub fn is_real(&self) -> bool {
        self.kind == EvaluationKind::Real
    }
}

/// A function value with its provenance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FunctionValue {
    /// Function value.
    pub value: f64,
    /// Whether it is verified.
    pub kind: EvaluationKind,
    /// Instance that produced it.
    pub source: Option<InstanceId>,
}

/// Everything one promotion changes, applied in a single step.
#[derive(Debug, Default)]
pub(crate) struct Promotion {
    /// Instance whose result was verified.
    pub source: Option<InstanceId>,
    pub level: usize,
    /// Real facts certified by the verified result.
    pub certified: Vec<Fact>,
    pub function: Option<(Fact, f64)>,
    /// Placeholders resolved or abandoned by this step.
    pub stale_objects: HashSet<OptimisticId>,
    /// Instances whose optimistic facts no longer hold.
    pub stale_instances: HashSet<InstanceId>,
}

/// The facts of one episode.
#[derive(Debug, Default)]
pub struct EvaluationStore {
    entries: Vec<Evaluation>,
    index: HashMap<Fact, usize>,
    by_predicate: HashMap<String, Vec<usize>>,
    functions: BTreeMap<Fact, FunctionValue>,
    real: usize,
}

impl EvaluationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assert a verified fact. Returns true if the fact was not real before.
    pub fn add_real(&mut self, fact: Fact, source: Option<InstanceId>, level: usize) -> bool {
        if let Some(&i) = self.index.get(&fact) {
            let entry = &mut self.entries[i];
            if entry.active && entry.is_real() {
                return false;
            }
            entry.kind = EvaluationKind::Real;
            entry.source = source;
            entry.level = level;
            entry.active = true;
            self.real += 1;
            return true;
        }
        self.insert(fact, EvaluationKind::Real, source, level);
        self.real += 1;
        true
    }

    /// Assert an assumed fact. Never downgrades a real fact.
    pub fn add_optimistic(&mut self, fact: Fact, source: InstanceId) -> bool {
        if let Some(&i) = self.index.get(&fact) {
            let entry = &mut self.entries[i];
            if entry.active {
                return false;
            }
            entry.kind = EvaluationKind::Optimistic;
            entry.source = Some(source);
            entry.active = true;
            return true;
        }
        self.insert(fact, EvaluationKind::Optimistic, Some(source), 0);
        true
    }

    fn insert(&mut self, fact: Fact, kind: EvaluationKind, source: Option<InstanceId>, level: usize) {
        let i = self.entries.len();
        self.by_predicate.entry(fact.predicate.clone()).or_default().push(i);
        self.index.insert(fact.clone(), i);
        self.entries.push(Evaluation {
            fact,
            kind,
            source,
            level,
            active: true,
        });
    }

    /// Record a function value. Real values are final; optimistic values
    /// only fill gaps.
    pub fn set_function(&mut self, head: Fact, value: f64, kind: EvaluationKind, source: Option<InstanceId>) -> bool {
        match self.functions.get(&head) {
            Some(existing) if existing.kind == EvaluationKind::Real => false,
            Some(_) if kind == EvaluationKind::Optimistic => false,
            _ => {
                self.functions.insert(head, FunctionValue { value, kind, source });
                true
            }
        }
    }

    /// Value of a function head, if known.
    #[must_use]
    pub fn function(&self, head: &Fact) -> Option<&FunctionValue> {
        self.functions.get(head)
    }

    /// Function values visible to a planner.
    #[must_use]
    pub fn function_values(&self, include_optimistic: bool) -> HashMap<Fact, f64> {
        self.functions
            .iter()
            .filter(|(_, v)| include_optimistic || v.kind == EvaluationKind::Real)
            .map(|(head, v)| (head.clone(), v.value))
            .collect()
    }

    /// Optimistic function values with their sources.
    pub fn optimistic_functions(&self) -> impl Iterator<Item = (&Fact, &FunctionValue)> {
        self.functions.iter().filter(|(_, v)| v.kind == EvaluationKind::Optimistic)
    }

    /// The live evaluation of a fact.
    #[must_use]
    pub fn get(&self, fact: &Fact) -> Option<&Evaluation> {
        self.index.get(fact).map(|&i| &self.entries[i]).filter(|e| e.active)
    }

    /// Returns true if the fact is live.
    #[must_use]
    pub fn contains(&self, fact: &Fact) -> bool {
        self.get(fact).is_some()
    }

    /// Returns true if the fact is live and verified.
    #[must_use]
    pub fn is_real(&self, fact: &Fact) -> bool {
        self.get(fact).is_some_and(Evaluation::is_real)
    }

    /// Live evaluations in insertion order.
    pub fn evaluations(&self) -> impl Iterator<Item = &Evaluation> {
        self.entries.iter().filter(|e| e.active)
    }

    /// Live verified facts in insertion order.
    pub fn real_facts(&self) -> impl Iterator<Item = &Fact> {
        self.evaluations().filter(|e| e.is_real()).map(|e| &e.fact)
    }

    /// Live optimistic evaluations in insertion order.
    pub fn optimistic_facts(&self) -> impl Iterator<Item = &Evaluation> {
        self.evaluations().filter(|e| !e.is_real())
    }

    /// Facts visible to a planner, in insertion order.
    #[must_use]
    pub fn facts(&self, include_optimistic: bool) -> Vec<Fact> {
        self.evaluations()
            .filter(|e| include_optimistic || e.is_real())
            .map(|e| e.fact.clone())
            .collect()
    }

    /// Number of real facts.
    #[must_use]
    pub const fn real_len(&self) -> usize {
        self.real
    }

    /// Number of live facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.evaluations().count()
    }

    /// Returns true if no fact is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Query view over real facts only, or over real and optimistic facts.
    #[must_use]
    pub const fn view(&self, include_optimistic: bool) -> StoreView<'_> {
        StoreView {
            store: self,
            include_optimistic,
        }
    }

    /// First extension of `bindings` under which `domain` holds.
    #[must_use]
    pub fn satisfies(&self, domain: &[Atom], bindings: &Bindings, include_optimistic: bool) -> Option<Bindings> {
        first_match(domain, bindings, &self.view(include_optimistic))
    }

    /// Every extension of `bindings` under which `domain` holds.
    #[must_use]
    pub fn matches(&self, domain: &[Atom], bindings: &Bindings, include_optimistic: bool) -> Vec<Bindings> {
        match_conjunction(domain, bindings, &self.view(include_optimistic))
    }

    /// Apply a promotion: certified facts become real, every optimistic fact
    /// of the verified instance is relabeled through `mapping`, and facts
    /// touching stale placeholders or stale instances are retracted.
    /// Returns the number of facts retracted.
    pub(crate) fn promote(&mut self, promotion: Promotion, mapping: &HashMap<OptimisticId, crate::object::ObjectId>) -> usize {
        let Promotion {
            source,
            level,
            certified,
            function,
            stale_objects,
            stale_instances,
        } = promotion;

        let relabeled: Vec<Fact> = self
            .optimistic_facts()
            .filter(|e| source.is_some() && e.source == source)
            .map(|e| e.fact.relabel(mapping))
            .filter(|f| !f.is_optimistic())
            .collect();
        for fact in certified.into_iter().chain(relabeled) {
            self.add_real(fact, source, level);
        }
        if let Some((head, value)) = function {
            self.set_function(head, value, EvaluationKind::Real, source);
        }
        self.retract(&stale_objects, &stale_instances)
    }

    /// Retract optimistic facts and function values that reference a stale
    /// placeholder or were asserted by a stale instance. Returns the number
    /// of facts retracted.
    pub(crate) fn retract(&mut self, stale_objects: &HashSet<OptimisticId>, stale_instances: &HashSet<InstanceId>) -> usize {
        let is_stale = |fact: &Fact, source: Option<InstanceId>| {
            source.is_some_and(|s| stale_instances.contains(&s)) || fact.optimistic_args().any(|o| stale_objects.contains(&o))
        };
        let mut retracted = 0;
        for entry in &mut self.entries {
            if entry.active && !entry.is_real() && is_stale(&entry.fact, entry.source) {
                entry.active = false;
                retracted += 1;
            }
        }
        self.functions
            .retain(|head, v| v.kind == EvaluationKind::Real || !is_stale(head, v.source));
        retracted
    }
}

/// Read-only view of an `EvaluationStore` used for matching.
#[derive(Debug, Clone, Copy)]
pub struct StoreView<'a> {
    store: &'a EvaluationStore,
    include_optimistic: bool,
}

impl FactSource for StoreView<'_> {
    fn candidates(&self, predicate: &str) -> Vec<&Fact> {
        let Some(indices) = self.store.by_predicate.get(predicate) else {
            return Vec::new();
        };
        indices
            .iter()
            .map(|&i| &self.store.entries[i])
            .filter(|e| e.active && (self.include_optimistic || e.is_real()))
            .map(|e| &e.fact)
            .collect()
    }
}

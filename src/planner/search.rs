//! Reference planner: forward best-first search over STRIPS actions.
//!
//! Facts whose predicate no action changes are static; they are indexed
//! once and never copied into search states. Nodes are ordered by
//! `cost + effort_weight * effort` (plain cost when the weight is zero),
//! ties broken by insertion order, so the search is deterministic for a
//! deterministic input.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};
use std::time::Instant;

use tracing::debug;

use crate::config::SearchConfig;
use crate::domain::GroundAction;
use crate::error::KyroResult;
use crate::expression::{match_conjunction, Bindings, Fact, FactSource};
use crate::planner::{PlanSketch, Planner, PlannerInput, PlannerOutcome};

type State = BTreeSet<Fact>;

/// Uniform-cost style best-first planner.
#[derive(Debug, Clone, Copy, Default)]
pub struct BestFirstPlanner {
    config: SearchConfig,
}

impl BestFirstPlanner {
    /// Creates a planner with the given search budget.
    #[must_use]
    pub const fn new(config: SearchConfig) -> Self {
        Self { config }
    }
}

impl Planner for BestFirstPlanner {
    fn solve(&self, input: &PlannerInput) -> PlannerOutcome {
        match self.search(input) {
            Ok(outcome) => outcome,
            Err(err) => PlannerOutcome::Infeasible {
                reason: err.to_string(),
            },
        }
    }
}

struct Node {
    state: State,
    cost: f64,
    effort: f64,
    parent: Option<usize>,
    action: Option<GroundAction>,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    priority: f64,
    serial: usize,
    node: usize,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed so that `BinaryHeap` pops the lowest priority first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.serial.cmp(&self.serial))
    }
}

struct StateSource<'a> {
    statics: &'a HashMap<String, Vec<Fact>>,
    state: &'a State,
}

impl FactSource for StateSource<'_> {
    fn candidates(&self, predicate: &str) -> Vec<&Fact> {
        let mut out: Vec<&Fact> = self.statics.get(predicate).map(|v| v.iter().collect()).unwrap_or_default();
        out.extend(self.state.iter().filter(|f| f.predicate == predicate));
        out
    }
}

impl BestFirstPlanner {
    fn search(&self, input: &PlannerInput) -> KyroResult<PlannerOutcome> {
        let fluents: HashSet<&str> = input
            .actions
            .iter()
            .flat_map(|a| a.add_effects.iter().chain(&a.delete_effects))
            .map(|atom| atom.predicate.as_str())
            .collect();

        let mut statics: HashMap<String, Vec<Fact>> = HashMap::new();
        let mut static_set = HashSet::new();
        let mut initial = State::new();
        for fact in &input.facts {
            if fluents.contains(fact.predicate.as_str()) {
                initial.insert(fact.clone());
            } else if static_set.insert(fact.clone()) {
                statics.entry(fact.predicate.clone()).or_default().push(fact.clone());
            }
        }
        let holds = |state: &State, fact: &Fact| static_set.contains(fact) || state.contains(fact);

        let mut nodes = vec![Node {
            state: initial.clone(),
            cost: 0.0,
            effort: 0.0,
            parent: None,
            action: None,
        }];
        let mut best: HashMap<State, f64> = HashMap::new();
        best.insert(initial, 0.0);
        let mut open = BinaryHeap::new();
        open.push(Entry {
            priority: 0.0,
            serial: 0,
            node: 0,
        });
        let mut serial = 1;
        let mut expansions = 0;

        while let Some(entry) = open.pop() {
            if input.deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(PlannerOutcome::Timeout);
            }
            let node = &nodes[entry.node];
            if best.get(&node.state).is_some_and(|p| *p < entry.priority) {
                continue;
            }
            if input.goal.iter().all(|g| holds(&node.state, g)) {
                debug!(expansions, cost = node.cost, "plan found");
                return Ok(PlannerOutcome::Plan(extract(&nodes, entry.node)));
            }
            if expansions >= self.config.max_expansions {
                return Ok(PlannerOutcome::Infeasible {
                    reason: format!("expansion limit {} reached", self.config.max_expansions),
                });
            }
            expansions += 1;

            let source = StateSource {
                statics: &statics,
                state: &node.state,
            };
            let mut successors = Vec::new();
            for schema in &input.actions {
                for bindings in match_conjunction(&schema.preconditions, &Bindings::new(), &source) {
                    let Some(action) = schema.instantiate(&bindings, &input.function_values)? else {
                        continue;
                    };
                    let effort: f64 = action
                        .preconditions
                        .iter()
                        .chain(&action.cost_function)
                        .filter_map(|f| input.fact_effort.get(f))
                        .sum();
                    let total_effort = node.effort + effort;
                    if input.max_effort.is_some_and(|cap| total_effort > cap) {
                        continue;
                    }
                    let mut state = node.state.clone();
                    for fact in &action.delete_effects {
                        state.remove(fact);
                    }
                    for fact in &action.add_effects {
                        if !static_set.contains(fact) {
                            state.insert(fact.clone());
                        }
                    }
                    let cost = node.cost + action.cost;
                    let priority = input.priority(cost, total_effort);
                    if best.get(&state).is_some_and(|p| *p <= priority) {
                        continue;
                    }
                    best.insert(state.clone(), priority);
                    successors.push(Node {
                        state,
                        cost,
                        effort: total_effort,
                        parent: Some(entry.node),
                        action: Some(action),
                    });
                }
            }
            for successor in successors {
                let priority = input.priority(successor.cost, successor.effort);
                nodes.push(successor);
                open.push(Entry {
                    priority,
                    serial,
                    node: nodes.len() - 1,
                });
                serial += 1;
            }
        }

        Ok(PlannerOutcome::Infeasible {
            reason: format!("search space exhausted after {expansions} expansions"),
        })
    }
}

fn extract(nodes: &[Node], goal: usize) -> PlanSketch {
    let mut actions = Vec::new();
    let mut current = Some(goal);
    while let Some(i) = current {
        if let Some(action) = &nodes[i].action {
            actions.push(action.clone());
        }
        current = nodes[i].parent;
    }
    actions.reverse();
    PlanSketch {
        actions,
        cost: nodes[goal].cost,
        effort: nodes[goal].effort,
    }
}

//! Plan context handed to context-aware generators.
//!
//! When an instance is resolved during focused search, the stream calls that
//! remain in the candidate plan and consume its not-yet-sampled outputs are
//! summarised here, keyed by external name. Each entry is the argument tuple
//! of one such call, with `None` for arguments that are still optimistic
//! (including the outputs being sampled right now).

use std::collections::{BTreeMap, HashSet};

use crate::object::{ObjectRef, ObjectTable, OptimisticId};
use crate::value::Value;

/// Argument tuple of one pending call; `None` marks an unresolved argument.
pub type ContextArgs = Vec<Option<Value>>;

/// Committed argument bindings of the calls that follow the target instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamContext {
    patterns: BTreeMap<String, Vec<ContextArgs>>,
}

impl StreamContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the immediate context of a target instance.
    ///
    /// `tail` lists `(external name, inputs)` of the remaining stream plan.
    /// Only calls that consume one of `target_outputs` are recorded.
    pub fn immediate<'a>(
        target_outputs: &HashSet<OptimisticId>,
        tail: impl IntoIterator<Item = (&'a str, &'a [ObjectRef])>,
        objects: &ObjectTable,
    ) -> Self {
        let mut context = Self::new();
        for (pattern, inputs) in tail {
            let consumes_target = inputs
                .iter()
                .filter_map(|o| o.as_optimistic())
                .any(|id| target_outputs.contains(&id));
            if !consumes_target {
                continue;
            }
            let args = inputs.iter().map(|o| objects.value_of(*o).cloned()).collect();
            context.insert(pattern, args);
        }
        context
    }

    /// Record one call under `pattern`.
    pub fn insert(&mut self, pattern: impl Into<String>, args: ContextArgs) {
        let entries = self.patterns.entry(pattern.into()).or_default();
        if !entries.contains(&args) {
            entries.push(args);
        }
    }

    /// Calls recorded under `pattern`.
    #[must_use]
    pub fn get(&self, pattern: &str) -> &[ContextArgs] {
        self.patterns.get(pattern).map_or(&[], Vec::as_slice)
    }

    /// Pattern names present in this context.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.keys().map(String::as_str)
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

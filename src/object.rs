//! Plan-time object handles.
//!
//! Concrete values are interned into small arena indices (`ObjectId`) so
//! facts can be hashed and compared cheaply for the whole episode. Outputs
//! that have not been sampled yet are represented by `OptimisticId`s, each
//! traceable to exactly one instance output slot.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ExecutionError, KyroResult};
use crate::external::InstanceId;
use crate::value::{Fingerprint, Value};

/// Handle of an interned concrete value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(u32);

impl ObjectId {
    /// Arena index of this object.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Serial id of an optimistic placeholder.
///
/// Ids increase monotonically within an episode and are never reused, so
/// they double as a deterministic tie-breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptimisticId(u32);

impl OptimisticId {
    /// Serial number of this placeholder.
    #[must_use]
    pub const fn serial(self) -> u32 {
        self.0
    }
}

impl fmt::Display for OptimisticId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#x{}", self.0)
    }
}

/// An argument of a ground fact: either a real object or a placeholder.
///
/// The two variants never compare equal, so an optimistic object can never
/// be mistaken for a concrete one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ObjectRef {
    /// A concrete, interned value.
    Real(ObjectId),
    /// A placeholder standing for a value not yet produced.
    Optimistic(OptimisticId),
}

impl ObjectRef {
    /// Returns true for a concrete object.
    #[must_use]
    pub const fn is_real(self) -> bool {
        matches!(self, Self::Real(_))
    }

    /// Returns true for a placeholder.
    #[must_use]
    pub const fn is_optimistic(self) -> bool {
        matches!(self, Self::Optimistic(_))
    }

    /// The interned id, if concrete.
    #[must_use]
    pub const fn as_real(self) -> Option<ObjectId> {
        match self {
            Self::Real(id) => Some(id),
            Self::Optimistic(_) => None,
        }
    }

    /// The placeholder id, if optimistic.
    #[must_use]
    pub const fn as_optimistic(self) -> Option<OptimisticId> {
        match self {
            Self::Optimistic(id) => Some(id),
            Self::Real(_) => None,
        }
    }
}

impl From<ObjectId> for ObjectRef {
    fn from(id: ObjectId) -> Self {
        Self::Real(id)
    }
}

impl From<OptimisticId> for ObjectRef {
    fn from(id: OptimisticId) -> Self {
        Self::Optimistic(id)
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real(id) => write!(f, "{id}"),
            Self::Optimistic(id) => write!(f, "{id}"),
        }
    }
}

/// The `output_index`-th declared output of one instance, before sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OptimisticObject {
    /// Serial id.
    pub id: OptimisticId,
    /// Instance whose output this stands for.
    pub instance: InstanceId,
    /// Position among the external's declared outputs.
    pub output_index: usize,
}

/// Episode-scoped interning table.
///
/// Grows monotonically: nothing is evicted while the episode runs, so every
/// handle stays valid until the table is dropped with its episode.
#[derive(Debug, Default)]
pub struct ObjectTable {
    values: Vec<Value>,
    by_fingerprint: HashMap<Fingerprint, Vec<ObjectId>>,
    optimistic: Vec<OptimisticObject>,
    resolved: HashMap<OptimisticId, ObjectId>,
}

impl ObjectTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a value, returning the existing handle for an equal value.
    #[allow(clippy::cast_possible_truncation)]
    pub fn intern(&mut self, value: Value) -> ObjectId {
        let fingerprint = value.fingerprint();
        if let Some(candidates) = self.by_fingerprint.get(&fingerprint) {
            for &id in candidates {
                if self.values[id.index()] == value {
                    return id;
                }
            }
        }
        let id = ObjectId(self.values.len() as u32);
        self.values.push(value);
        self.by_fingerprint.entry(fingerprint).or_default().push(id);
        id
    }

    /// Find the handle of an already interned value.
    #[must_use]
    pub fn lookup(&self, value: &Value) -> Option<ObjectId> {
        self.by_fingerprint
            .get(&value.fingerprint())?
            .iter()
            .copied()
            .find(|id| self.values[id.index()] == *value)
    }

    /// Value wrapped by an object.
    pub fn value(&self, id: ObjectId) -> KyroResult<&Value> {
        self.values.get(id.index()).ok_or_else(|| {
            ExecutionError::UnknownHandle {
                kind: "object",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// Values of a tuple of real objects.
    pub fn values(&self, ids: &[ObjectId]) -> KyroResult<Vec<Value>> {
        ids.iter().map(|id| self.value(*id).cloned()).collect()
    }

    /// Value of a reference, or `None` while it is still optimistic.
    #[must_use]
    pub fn value_of(&self, object: ObjectRef) -> Option<&Value> {
        object.as_real().and_then(|id| self.values.get(id.index()))
    }

    /// Mint a fresh placeholder for one output slot of an instance.
    #[allow(clippy::cast_possible_truncation)]
    pub fn create_optimistic(&mut self, instance: InstanceId, output_index: usize) -> OptimisticId {
        let id = OptimisticId(self.optimistic.len() as u32);
        self.optimistic.push(OptimisticObject {
            id,
            instance,
            output_index,
        });
        id
    }

    /// Look up a placeholder.
    #[must_use]
    pub fn optimistic(&self, id: OptimisticId) -> Option<&OptimisticObject> {
        self.optimistic.get(id.0 as usize)
    }

    /// Record that a placeholder was resolved to a real object.
    pub(crate) fn resolve(&mut self, id: OptimisticId, real: ObjectId) {
        self.resolved.insert(id, real);
    }

    /// Real object a placeholder was resolved to, if any.
    #[must_use]
    pub fn resolution(&self, id: OptimisticId) -> Option<ObjectId> {
        self.resolved.get(&id).copied()
    }

    /// Number of interned values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing was interned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of placeholders minted so far.
    #[must_use]
    pub fn optimistic_len(&self) -> usize {
        self.optimistic.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let mut table = ObjectTable::new();
        let a = table.intern(Value::from("block0"));
        let b = table.intern(Value::from("block0"));
        let c = table.intern(Value::from("block1"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(a).unwrap(), &Value::from("block0"));
    }

    #[test]
    fn intern_floats_and_vectors() {
        let mut table = ObjectTable::new();
        let a = table.intern(Value::Vector(vec![7.5, 0.0]));
        let b = table.intern(Value::Vector(vec![7.5, 0.0]));
        let c = table.intern(Value::Float(7.5));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.lookup(&Value::Float(7.5)), Some(c));
        assert_eq!(table.lookup(&Value::Float(8.0)), None);
    }

    #[test]
    fn optimistic_ids_are_monotonic_and_distinct_from_objects() {
        let mut table = ObjectTable::new();
        let real = table.intern(Value::Int(0));
        let instance = InstanceId::from_index(0);
        let first = table.create_optimistic(instance, 0);
        let second = table.create_optimistic(instance, 0);
        assert!(first < second);
        assert_ne!(ObjectRef::from(real), ObjectRef::from(first));
        assert_eq!(table.optimistic(second).unwrap().instance, instance);
        assert!(table.value_of(ObjectRef::from(first)).is_none());
    }

    #[test]
    fn unknown_handle_is_an_execution_error() {
        let table = ObjectTable::new();
        let err = table.value(ObjectId(3)).unwrap_err();
        assert!(err.is_execution());
    }

    #[test]
    fn resolution_is_recorded() {
        let mut table = ObjectTable::new();
        let opt = table.create_optimistic(InstanceId::from_index(1), 0);
        let real = table.intern(Value::Float(1.0));
        assert_eq!(table.resolution(opt), None);
        table.resolve(opt, real);
        assert_eq!(table.resolution(opt), Some(real));
    }
}

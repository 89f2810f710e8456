//! Raw plan-time values.
//!
//! Values are what samplers consume and produce: block names, poses,
//! grasps, trajectories, numeric costs. The engine never inspects them;
//! it only interns them into `Object` handles.

use serde::{Deserialize, Serialize};

/// A raw value wrapped by a concrete `Object`.
///
/// # Examples
///
/// ```
/// use kyroplan::Value;
///
/// let block = Value::from("block0");
/// let pose = Value::Vector(vec![7.5, 0.0]);
///
/// assert!(block.is_string());
/// assert_eq!(pose.as_vector(), Some(&[7.5, 0.0][..]));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating-point number.
    Float(f64),
    /// Text or symbol.
    String(String),
    /// Numeric vector, such as a pose or configuration.
    Vector(Vec<f64>),
    /// Heterogeneous list.
    List(Vec<Value>),
    /// Arbitrary JSON payload.
    Structured(serde_json::Value),
    /// Absence of a value.
    Null,
}

/// Stable content fingerprint of a value.
pub type Fingerprint = [u8; 32];

impl Value {
    /// Returns true for `Bool`.
    #[must_use]
    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    /// Returns true for `Int`.
    #[must_use]
    pub const fn is_int(&self) -> bool {
        matches!(self, Self::Int(_))
    }

    /// Returns true for `Float`.
    #[must_use]
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float(_))
    }

    /// Returns true for `String`.
    #[must_use]
    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    /// Returns true for `Vector`.
    #[must_use]
    pub const fn is_vector(&self) -> bool {
        matches!(self, Self::Vector(_))
    }

    /// Returns true for `Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The boolean, if this is a `Bool`.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The integer, if this is an `Int`.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The number, widening `Int` to `f64`.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// The text, if this is a `String`.
    #[must_use]
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// The components, if this is a `Vector`.
    #[must_use]
    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            Self::Vector(v) => Some(v),
            _ => None,
        }
    }

    /// The items, if this is a `List`.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Vector(_) => "vector",
            Self::List(_) => "list",
            Self::Structured(_) => "structured",
            Self::Null => "null",
        }
    }

    /// Content fingerprint: blake3 over the canonical JSON encoding.
    ///
    /// Equal values always share a fingerprint, which lets values that are
    /// not `Hash` (floats, nested JSON) key the interning table.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        let bytes = serde_json::to_vec(self).unwrap_or_else(|_| format!("{self:?}").into_bytes());
        *blake3::hash(&bytes).as_bytes()
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
            Self::Vector(v) => {
                write!(f, "[")?;
                for (i, x) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{x}")?;
                }
                write!(f, "]")
            }
            Self::List(v) => {
                write!(f, "(")?;
                for (i, x) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{x}")?;
                }
                write!(f, ")")
            }
            Self::Structured(v) => write!(f, "{v}"),
            Self::Null => write!(f, "null"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Self::Vector(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Structured(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_float() {
        let val = Value::Float(2.5);
        assert!(val.is_float());
        assert_eq!(val.as_float(), Some(2.5));
        assert_eq!(val.type_name(), "float");
    }

    #[test]
    fn test_value_int_reads_as_float() {
        let val = Value::Int(42);
        assert_eq!(val.as_int(), Some(42));
        assert_eq!(val.as_float(), Some(42.0));
    }

    #[test]
    fn test_value_vector() {
        let val = Value::from(vec![1.0, 2.0]);
        assert!(val.is_vector());
        assert_eq!(val.as_vector(), Some(&[1.0, 2.0][..]));
        assert_eq!(format!("{val}"), "[1, 2]");
    }

    #[test]
    fn test_value_display() {
        assert_eq!(format!("{}", Value::from("block0")), "block0");
        assert_eq!(format!("{}", Value::Bool(true)), "true");
        assert_eq!(
            format!("{}", Value::List(vec![Value::Int(1), Value::from("a")])),
            "(1 a)"
        );
        assert_eq!(format!("{}", Value::Null), "null");
    }

    #[test]
    fn test_fingerprint_equal_values() {
        let a = Value::Vector(vec![0.5, 1.25]);
        let b = Value::Vector(vec![0.5, 1.25]);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_distinguishes_types() {
        assert_ne!(Value::Int(1).fingerprint(), Value::Float(1.0).fingerprint());
        assert_ne!(
            Value::from("1").fingerprint(),
            Value::Int(1).fingerprint()
        );
    }

    #[test]
    fn test_value_serialization() {
        let val = Value::List(vec![Value::from("b"), Value::Vector(vec![3.0])]);
        let json = serde_json::to_string(&val).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(val, back);
    }
}

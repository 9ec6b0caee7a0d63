//! Transfer values

use alloc::boxed::Box;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::table::{Matrix, NamedVector, Table};
use crate::ConversionError;

/// Shape tag of a [`Value`], one per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Shape {
    Null,
    Bool,
    Int,
    Float,
    Complex,
    Text,
    Sequence,
    Array,
    Mapping,
    Set,
    Table,
    Matrix,
    NamedVector,
    Unrepresentable,
}

impl Shape {
    pub const ALL: [Shape; 14] = [
        Shape::Null,
        Shape::Bool,
        Shape::Int,
        Shape::Float,
        Shape::Complex,
        Shape::Text,
        Shape::Sequence,
        Shape::Array,
        Shape::Mapping,
        Shape::Set,
        Shape::Table,
        Shape::Matrix,
        Shape::NamedVector,
        Shape::Unrepresentable,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Shape::Null => "null",
            Shape::Bool => "bool",
            Shape::Int => "int",
            Shape::Float => "float",
            Shape::Complex => "complex",
            Shape::Text => "text",
            Shape::Sequence => "sequence",
            Shape::Array => "array",
            Shape::Mapping => "mapping",
            Shape::Set => "set",
            Shape::Table => "table",
            Shape::Matrix => "matrix",
            Shape::NamedVector => "named-vector",
            Shape::Unrepresentable => "unrepresentable",
        }
    }
}

/// Packed, homogeneously typed one-dimensional array.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TypedArray {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Bool(Vec<bool>),
}

impl TypedArray {
    pub fn len(&self) -> usize {
        match self {
            TypedArray::Int(items) => items.len(),
            TypedArray::Float(items) => items.len(),
            TypedArray::Bool(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type name used by the transfer grammar (`int64`, `float64`, `bool`).
    pub fn dtype(&self) -> &'static str {
        match self {
            TypedArray::Int(_) => "int64",
            TypedArray::Float(_) => "float64",
            TypedArray::Bool(_) => "bool",
        }
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        match self {
            TypedArray::Int(items) => items.get(index).map(|v| Value::Int(*v)),
            TypedArray::Float(items) => items.get(index).map(|v| Value::Float(*v)),
            TypedArray::Bool(items) => items.get(index).map(|v| Value::Bool(*v)),
        }
    }

    pub fn to_values(&self) -> Vec<Value> {
        (0..self.len()).filter_map(|i| self.get(i)).collect()
    }

    /// Pack a list of values if they are all ints, all bools, or a mix of
    /// ints and floats with at least one float.
    ///
    /// Bools never mix with numbers here; `[1, true]` stays a generic list.
    /// Empty input yields `None` because an empty list has no element type.
    pub fn pack(values: &[Value]) -> Option<TypedArray> {
        if values.iter().any(Value::is_null) {
            return None;
        }
        match homogeneity(values, false)? {
            ElementClass::Bool => Some(TypedArray::Bool(
                values.iter().filter_map(Value::as_bool).collect(),
            )),
            ElementClass::Numeric => {
                if values.iter().all(|v| matches!(v, Value::Int(_))) {
                    Some(TypedArray::Int(
                        values.iter().filter_map(Value::as_i64).collect(),
                    ))
                } else {
                    Some(TypedArray::Float(
                        values.iter().filter_map(Value::as_f64).collect(),
                    ))
                }
            }
            ElementClass::Other(_) => None,
        }
    }
}

impl From<Vec<i64>> for TypedArray {
    fn from(v: Vec<i64>) -> Self {
        TypedArray::Int(v)
    }
}

impl From<Vec<f64>> for TypedArray {
    fn from(v: Vec<f64>) -> Self {
        TypedArray::Float(v)
    }
}

impl From<Vec<bool>> for TypedArray {
    fn from(v: Vec<bool>) -> Self {
        TypedArray::Bool(v)
    }
}

/// Element class used by the homogeneity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementClass {
    Bool,
    /// Ints and floats (and bools, when they are treated as numeric).
    Numeric,
    Other(Shape),
}

/// Returns the shared element class of `values`, or `None` when the values
/// are heterogeneous or empty.
///
/// With `bool_is_numeric` set, bools are compatible with ints and floats.
/// Table-column coercion uses that mode; shape classification does not.
/// Nulls are ignored so that a column with missing cells keeps its type.
pub fn homogeneity(values: &[Value], bool_is_numeric: bool) -> Option<ElementClass> {
    let mut class = None;
    for value in values.iter().filter(|v| !v.is_null()) {
        let this = match value {
            Value::Bool(_) if bool_is_numeric => ElementClass::Numeric,
            Value::Bool(_) => ElementClass::Bool,
            Value::Int(_) | Value::Float(_) => ElementClass::Numeric,
            other => ElementClass::Other(other.shape()),
        };
        match class {
            None => class = Some(this),
            Some(existing) if existing == this => {}
            Some(_) => return None,
        }
    }
    class
}

/// A value that can cross the host/guest boundary.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    // Scalars
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex { re: f64, im: f64 },
    Text(String),

    // Containers
    Sequence(Vec<Value>),
    Array(TypedArray),
    Mapping(Vec<(String, Value)>),
    Set(Vec<Value>),

    // Structured data, transferred through staged files or wrappers
    Table(Table),
    Matrix(Matrix),
    NamedVector(NamedVector),

    /// Placeholder for something that matched no known shape.
    Unrepresentable { tag: String, description: String },
}

impl Value {
    pub fn shape(&self) -> Shape {
        match self {
            Value::Null => Shape::Null,
            Value::Bool(_) => Shape::Bool,
            Value::Int(_) => Shape::Int,
            Value::Float(_) => Shape::Float,
            Value::Complex { .. } => Shape::Complex,
            Value::Text(_) => Shape::Text,
            Value::Sequence(_) => Shape::Sequence,
            Value::Array(_) => Shape::Array,
            Value::Mapping(_) => Shape::Mapping,
            Value::Set(_) => Shape::Set,
            Value::Table(_) => Shape::Table,
            Value::Matrix(_) => Shape::Matrix,
            Value::NamedVector(_) => Shape::NamedVector,
            Value::Unrepresentable { .. } => Shape::Unrepresentable,
        }
    }

    pub fn unrepresentable(tag: impl Into<String>, description: impl Into<String>) -> Self {
        Value::Unrepresentable {
            tag: tag.into(),
            description: description.into(),
        }
    }

    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of the value. Ints widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a key in a mapping.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Mapping(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Nesting depth; scalars have depth 1.
    pub fn depth(&self) -> usize {
        let children = match self {
            Value::Sequence(items) | Value::Set(items) => {
                items.iter().map(Value::depth).max().unwrap_or(0)
            }
            Value::Mapping(entries) => entries.iter().map(|(_, v)| v.depth()).max().unwrap_or(0),
            Value::NamedVector(named) => named.values().iter().map(Value::depth).max().unwrap_or(0),
            Value::Array(_) | Value::Table(_) | Value::Matrix(_) => 1,
            _ => 0,
        };
        children + 1
    }

    /// Plain text rendering used when a value has to be coerced into a text
    /// cell. Null renders as `None` so the caller can keep it missing.
    pub fn display_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(format!("{:?}", f)),
            Value::Complex { re, im } => Some(format!("{}{:+}im", re, im)),
            Value::Text(s) => Some(s.clone()),
            Value::Unrepresentable { description, .. } => Some(description.clone()),
            other => Some(format!("{:?}", other)),
        }
    }
}

// ============================================================================
// From implementations
// ============================================================================

impl From<bool> for Value {
    fn from(v: bool) -> Self { Value::Bool(v) }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self { Value::Int(v as i64) }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self { Value::Int(v) }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self { Value::Float(v as f64) }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self { Value::Float(v) }
}

impl From<String> for Value {
    fn from(v: String) -> Self { Value::Text(v) }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self { Value::Text(String::from(v)) }
}

impl From<TypedArray> for Value {
    fn from(v: TypedArray) -> Self { Value::Array(v) }
}

impl From<Table> for Value {
    fn from(v: Table) -> Self { Value::Table(v) }
}

impl From<Matrix> for Value {
    fn from(v: Matrix) -> Self { Value::Matrix(v) }
}

impl From<NamedVector> for Value {
    fn from(v: NamedVector) -> Self { Value::NamedVector(v) }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Sequence(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(x) => x.into(),
            None => Value::Null,
        }
    }
}

impl<T: Into<Value>> From<Box<T>> for Value {
    fn from(v: Box<T>) -> Self {
        (*v).into()
    }
}

// ============================================================================
// TryFrom implementations
// ============================================================================

fn mismatch(expected: &str, got: &Value) -> ConversionError {
    ConversionError::TypeMismatch {
        expected: String::from(expected),
        got: String::from(got.shape().name()),
    }
}

impl TryFrom<Value> for bool {
    type Error = ConversionError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::Bool(x) => Ok(x),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = ConversionError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::Int(x) => Ok(x),
            other => Err(mismatch("int", &other)),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = ConversionError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::Float(x) => Ok(x),
            Value::Int(x) => Ok(x as f64),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = ConversionError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::Text(x) => Ok(x),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl<T: TryFrom<Value, Error = ConversionError>> TryFrom<Value> for Vec<T> {
    type Error = ConversionError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        let items = match v {
            Value::Sequence(items) | Value::Set(items) => items,
            Value::Array(array) => array.to_values(),
            other => return Err(mismatch("sequence", &other)),
        };
        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| T::try_from(item).map_err(|e| ConversionError::IndexError(i, Box::new(e))))
            .collect()
    }
}

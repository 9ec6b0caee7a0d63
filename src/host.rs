//! Host object model
//!
//! [`HostValue`] is what the embedding application holds: a dynamically
//! typed object with the same overlaps a scripting runtime has. A `Bool` is
//! also integral, a `Str` and a `Bytes` are also sequences. The classifier
//! resolves those overlaps with an explicit rule order.

use std::collections::HashMap;

use jlbridge_value::{Column, Matrix, MatrixData, NamedVector, Table, TableError, TypedArray, Value};
use serde_json::Value as Json;
use thiserror::Error;

/// Longest text produced by [`HostValue::short_repr`].
const SHORT_REPR_LEN: usize = 40;

#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Float32(f32),
    Complex(f64, f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<HostValue>),
    Tuple(Vec<HostValue>),
    /// One-dimensional numeric array.
    NdArray(Vec<HostValue>),
    Dict(Vec<(HostValue, HostValue)>),
    Set(Vec<HostValue>),
    Matrix(Matrix),
    DataFrame(Table),
    Series(NamedVector),
    /// Any other host object, known only by its type name and repr.
    Object { type_name: String, repr: String },
}

impl HostValue {
    pub fn type_name(&self) -> &str {
        match self {
            HostValue::None => "NoneType",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Float(_) => "float",
            HostValue::Float32(_) => "float32",
            HostValue::Complex(..) => "complex",
            HostValue::Str(_) => "str",
            HostValue::Bytes(_) => "bytes",
            HostValue::List(_) => "list",
            HostValue::Tuple(_) => "tuple",
            HostValue::NdArray(_) => "ndarray",
            HostValue::Dict(_) => "dict",
            HostValue::Set(_) => "set",
            HostValue::Matrix(_) => "matrix",
            HostValue::DataFrame(_) => "DataFrame",
            HostValue::Series(_) => "Series",
            HostValue::Object { type_name, .. } => type_name,
        }
    }

    // ------------------------------------------------------------------------
    // Category predicates. These overlap on purpose.
    // ------------------------------------------------------------------------

    pub fn is_bool(&self) -> bool {
        matches!(self, HostValue::Bool(_))
    }

    /// Bools count as integral.
    pub fn is_integral(&self) -> bool {
        matches!(self, HostValue::Bool(_) | HostValue::Int(_))
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, HostValue::Float(_) | HostValue::Float32(_))
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, HostValue::Complex(..))
    }

    pub fn is_text(&self) -> bool {
        matches!(self, HostValue::Str(_))
    }

    /// Strings and byte strings count as sequences.
    pub fn is_sequence(&self) -> bool {
        matches!(
            self,
            HostValue::Str(_)
                | HostValue::Bytes(_)
                | HostValue::List(_)
                | HostValue::Tuple(_)
                | HostValue::NdArray(_)
        )
    }

    pub fn sequence_len(&self) -> Option<usize> {
        match self {
            HostValue::Str(s) => Some(s.chars().count()),
            HostValue::Bytes(b) => Some(b.len()),
            HostValue::List(items) | HostValue::Tuple(items) | HostValue::NdArray(items) => {
                Some(items.len())
            }
            _ => None,
        }
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self, HostValue::Dict(_))
    }

    pub fn is_set(&self) -> bool {
        matches!(self, HostValue::Set(_))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, HostValue::None)
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self, HostValue::Matrix(_))
    }

    pub fn is_table(&self) -> bool {
        matches!(self, HostValue::DataFrame(_))
    }

    pub fn is_series(&self) -> bool {
        matches!(self, HostValue::Series(_))
    }

    // ------------------------------------------------------------------------
    // Text forms
    // ------------------------------------------------------------------------

    /// Display form, used when a non-text mapping key has to become text.
    pub fn display(&self) -> String {
        match self {
            HostValue::None => "None".to_string(),
            HostValue::Bool(true) => "True".to_string(),
            HostValue::Bool(false) => "False".to_string(),
            HostValue::Int(i) => i.to_string(),
            HostValue::Float(f) => format!("{:?}", f),
            HostValue::Float32(f) => format!("{:?}", f),
            HostValue::Complex(re, im) => format!("({}{:+}j)", re, im),
            HostValue::Str(s) => s.clone(),
            HostValue::Bytes(b) => format!("b{:?}", String::from_utf8_lossy(b)),
            HostValue::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(HostValue::display).collect();
                if parts.len() == 1 {
                    format!("({},)", parts[0])
                } else {
                    format!("({})", parts.join(", "))
                }
            }
            HostValue::List(items) | HostValue::NdArray(items) => {
                let parts: Vec<String> = items.iter().map(HostValue::display).collect();
                format!("[{}]", parts.join(", "))
            }
            HostValue::Object { repr, .. } => repr.clone(),
            other => format!("<{}>", other.type_name()),
        }
    }

    /// Display form cut to a readable length.
    pub fn short_repr(&self) -> String {
        let full = self.display();
        if full.chars().count() <= SHORT_REPR_LEN {
            return full;
        }
        let head: String = full.chars().take(SHORT_REPR_LEN - 3).collect();
        format!("{}...", head)
    }

    /// Build a host value from JSON.
    ///
    /// Plain JSON maps onto the obvious host types. Objects with a single
    /// `$`-prefixed key describe the richer host types:
    ///
    /// | key | payload |
    /// |-----|---------|
    /// | `$complex` | `[re, im]` |
    /// | `$float32` | number |
    /// | `$tuple`, `$set`, `$ndarray` | array |
    /// | `$bytes` | array of integers 0..=255 |
    /// | `$matrix` | array of equal-length numeric rows |
    /// | `$table` | object of column name to array of cells |
    /// | `$series` | `{"labels": [...], "values": [...]}` |
    /// | `$object` | `{"type": "...", "repr": "..."}` |
    pub fn from_json(json: &Json) -> Result<HostValue, HostValueError> {
        match json {
            Json::Null => Ok(HostValue::None),
            Json::Bool(b) => Ok(HostValue::Bool(*b)),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Ok(HostValue::Int(i)),
                None => Ok(HostValue::Float(n.as_f64().unwrap_or(f64::NAN))),
            },
            Json::String(s) => Ok(HostValue::Str(s.clone())),
            Json::Array(items) => Ok(HostValue::List(from_json_items(items)?)),
            Json::Object(map) => {
                if map.len() == 1 {
                    if let Some((key, payload)) = map.iter().next() {
                        if let Some(tag) = key.strip_prefix('$') {
                            return from_tagged_json(tag, payload);
                        }
                    }
                }
                map.iter()
                    .map(|(k, v)| Ok((HostValue::Str(k.clone()), HostValue::from_json(v)?)))
                    .collect::<Result<Vec<_>, _>>()
                    .map(HostValue::Dict)
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum HostValueError {
    #[error("Invalid ${tag} value: {reason}")]
    InvalidTagged { tag: String, reason: String },

    #[error("Unknown tag ${0}")]
    UnknownTag(String),

    #[error("Invalid table: {0}")]
    Table(#[from] TableError),
}

fn invalid(tag: &str, reason: &str) -> HostValueError {
    HostValueError::InvalidTagged {
        tag: tag.to_string(),
        reason: reason.to_string(),
    }
}

fn from_json_items(items: &[Json]) -> Result<Vec<HostValue>, HostValueError> {
    items.iter().map(HostValue::from_json).collect()
}

fn json_array<'a>(tag: &str, payload: &'a Json) -> Result<&'a Vec<Json>, HostValueError> {
    payload.as_array().ok_or_else(|| invalid(tag, "expected an array"))
}

fn from_tagged_json(tag: &str, payload: &Json) -> Result<HostValue, HostValueError> {
    match tag {
        "complex" => match json_array(tag, payload)?.as_slice() {
            [re, im] => Ok(HostValue::Complex(
                re.as_f64().ok_or_else(|| invalid(tag, "real part is not a number"))?,
                im.as_f64().ok_or_else(|| invalid(tag, "imaginary part is not a number"))?,
            )),
            _ => Err(invalid(tag, "expected [re, im]")),
        },
        "float32" => payload
            .as_f64()
            .map(|f| HostValue::Float32(f as f32))
            .ok_or_else(|| invalid(tag, "expected a number")),
        "tuple" => Ok(HostValue::Tuple(from_json_items(json_array(tag, payload)?)?)),
        "set" => Ok(HostValue::Set(from_json_items(json_array(tag, payload)?)?)),
        "ndarray" => Ok(HostValue::NdArray(from_json_items(json_array(tag, payload)?)?)),
        "bytes" => json_array(tag, payload)?
            .iter()
            .map(|b| {
                b.as_u64()
                    .and_then(|b| u8::try_from(b).ok())
                    .ok_or_else(|| invalid(tag, "bytes must be integers 0..=255"))
            })
            .collect::<Result<Vec<u8>, _>>()
            .map(HostValue::Bytes),
        "matrix" => {
            let rows = json_array(tag, payload)?;
            let cols = rows.first().and_then(Json::as_array).map(Vec::len).unwrap_or(0);
            let cells: Vec<&Json> = rows
                .iter()
                .map(|row| row.as_array().ok_or_else(|| invalid(tag, "rows must be arrays")))
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .flatten()
                .collect();
            let data = if cells.iter().all(|c| c.is_i64()) {
                MatrixData::Int(cells.iter().filter_map(|c| c.as_i64()).collect())
            } else if cells.iter().all(|c| c.is_number()) {
                MatrixData::Float(cells.iter().filter_map(|c| c.as_f64()).collect())
            } else {
                return Err(invalid(tag, "cells must be numbers"));
            };
            Ok(HostValue::Matrix(Matrix::try_new(rows.len(), cols, data)?))
        }
        "table" => {
            let columns = payload
                .as_object()
                .ok_or_else(|| invalid(tag, "expected an object of columns"))?;
            let mut table = Table::new();
            for (name, cells) in columns {
                let cells = json_array(tag, cells)?
                    .iter()
                    .map(|cell| HostValue::from_json(cell).map(|h| Value::from(&h)))
                    .collect::<Result<Vec<_>, _>>()?;
                table.push_column(name.clone(), Column::from_values(cells))?;
            }
            Ok(HostValue::DataFrame(table))
        }
        "series" => {
            let labels = payload
                .get("labels")
                .and_then(Json::as_array)
                .ok_or_else(|| invalid(tag, "missing labels"))?
                .iter()
                .map(|l| match l {
                    Json::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            let values = payload
                .get("values")
                .and_then(Json::as_array)
                .ok_or_else(|| invalid(tag, "missing values"))?
                .iter()
                .map(|v| HostValue::from_json(v).map(|h| Value::from(&h)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(HostValue::Series(NamedVector::try_new(labels, values)?))
        }
        "object" => Ok(HostValue::Object {
            type_name: payload
                .get("type")
                .and_then(Json::as_str)
                .unwrap_or("object")
                .to_string(),
            repr: payload
                .get("repr")
                .and_then(Json::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        other => Err(HostValueError::UnknownTag(other.to_string())),
    }
}

// ============================================================================
// Conversions
// ============================================================================

/// Scalar-level view of a host value, used for table cells and series
/// values. Containers go through the classifier instead.
impl From<&HostValue> for Value {
    fn from(host: &HostValue) -> Self {
        match host {
            HostValue::None => Value::Null,
            HostValue::Bool(b) => Value::Bool(*b),
            HostValue::Int(i) => Value::Int(*i),
            HostValue::Float(f) => Value::Float(*f),
            HostValue::Float32(f) => Value::Float(*f as f64),
            HostValue::Complex(re, im) => Value::Complex { re: *re, im: *im },
            HostValue::Str(s) => Value::Text(s.clone()),
            other => Value::unrepresentable(other.type_name(), other.short_repr()),
        }
    }
}

/// Materialize an imported value as a host object.
impl From<Value> for HostValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => HostValue::None,
            Value::Bool(b) => HostValue::Bool(b),
            Value::Int(i) => HostValue::Int(i),
            Value::Float(f) => HostValue::Float(f),
            Value::Complex { re, im } => HostValue::Complex(re, im),
            Value::Text(s) => HostValue::Str(s),
            Value::Sequence(items) => HostValue::List(items.into_iter().map(HostValue::from).collect()),
            Value::Array(array) => HostValue::NdArray(match array {
                TypedArray::Int(items) => items.into_iter().map(HostValue::Int).collect(),
                TypedArray::Float(items) => items.into_iter().map(HostValue::Float).collect(),
                TypedArray::Bool(items) => items.into_iter().map(HostValue::Bool).collect(),
            }),
            Value::Mapping(entries) => HostValue::Dict(
                entries
                    .into_iter()
                    .map(|(k, v)| (HostValue::Str(k), HostValue::from(v)))
                    .collect(),
            ),
            Value::Set(items) => HostValue::Set(items.into_iter().map(HostValue::from).collect()),
            Value::Table(table) => HostValue::DataFrame(table),
            Value::Matrix(matrix) => HostValue::Matrix(matrix),
            Value::NamedVector(named) => HostValue::Series(named),
            Value::Unrepresentable { tag, description } => HostValue::Object {
                type_name: tag,
                repr: description,
            },
        }
    }
}

impl From<bool> for HostValue {
    fn from(v: bool) -> Self { HostValue::Bool(v) }
}

impl From<i64> for HostValue {
    fn from(v: i64) -> Self { HostValue::Int(v) }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self { HostValue::Float(v) }
}

impl From<&str> for HostValue {
    fn from(v: &str) -> Self { HostValue::Str(v.to_string()) }
}

impl From<String> for HostValue {
    fn from(v: String) -> Self { HostValue::Str(v) }
}

// ============================================================================
// Host variable table
// ============================================================================

/// The host's table of named variables.
pub trait VariableStore {
    fn get(&self, name: &str) -> Option<&HostValue>;
    fn set(&mut self, name: &str, value: HostValue);
}

impl VariableStore for HashMap<String, HostValue> {
    fn get(&self, name: &str) -> Option<&HostValue> {
        HashMap::get(self, name)
    }

    fn set(&mut self, name: &str, value: HostValue) {
        self.insert(name.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn short_repr_truncates() {
        let long = HostValue::Str("x".repeat(100));
        let short = long.short_repr();
        assert_eq!(short.chars().count(), SHORT_REPR_LEN);
        assert!(short.ends_with("..."));
    }

    #[test]
    fn tuple_display_matches_host_syntax() {
        let pair = HostValue::Tuple(vec![HostValue::Int(1), HostValue::Int(2)]);
        assert_eq!(pair.display(), "(1, 2)");
        let single = HostValue::Tuple(vec![HostValue::Int(1)]);
        assert_eq!(single.display(), "(1,)");
    }

    #[test]
    fn tagged_json_builds_rich_values() {
        let matrix = HostValue::from_json(&json!({"$matrix": [[1, 2], [3, 4]]})).unwrap();
        let HostValue::Matrix(matrix) = matrix else {
            panic!("expected matrix");
        };
        assert_eq!((matrix.rows(), matrix.cols()), (2, 2));
        assert_eq!(matrix.get(1, 0), Some(Value::Int(3)));

        let table = HostValue::from_json(&json!({"$table": {"a": [1, 2], "b": ["x", null]}})).unwrap();
        let HostValue::DataFrame(table) = table else {
            panic!("expected table");
        };
        assert_eq!(table.nrows(), 2);
        assert_eq!(table.column("b"), Some(&Column::Text(vec![Some("x".to_string()), None])));
    }

    #[test]
    fn unknown_tag_is_an_error() {
        assert!(matches!(
            HostValue::from_json(&json!({"$frobnicate": 1})),
            Err(HostValueError::UnknownTag(tag)) if tag == "frobnicate"
        ));
    }
}

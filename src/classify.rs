//! Shape classification
//!
//! Host categories overlap: a bool is integral and a string is a sequence.
//! Rather than leaning on the order of an `if` ladder, the priority is an
//! explicit table evaluated top to bottom, first match wins.
//!
//! ```text
//!   bool > integral > floating > complex > text > empty-sequence > sequence
//!        > mapping > set > null > matrix > table > series > unrepresentable
//! ```
//!
//! Classification never fails. Anything the table does not cover, and any
//! subtree nested deeper than [`Limits::max_depth`], becomes
//! [`Value::Unrepresentable`].

use jlbridge_value::{TypedArray, Value};
use tracing::warn;

use crate::config::Limits;
use crate::host::HostValue;

/// Tag given to subtrees cut off by the depth limit.
pub const DEPTH_EXCEEDED: &str = "depth-exceeded";

/// One entry of the classification table.
pub struct Rule {
    pub name: &'static str,
    pub matches: fn(&HostValue) -> bool,
    pub build: fn(&mut Classifier<'_>, &HostValue) -> Value,
}

pub static RULES: &[Rule] = &[
    Rule { name: "bool", matches: HostValue::is_bool, build: build_bool },
    Rule { name: "integral", matches: HostValue::is_integral, build: build_int },
    Rule { name: "floating", matches: HostValue::is_floating, build: build_float },
    Rule { name: "complex", matches: HostValue::is_complex, build: build_complex },
    Rule { name: "text", matches: HostValue::is_text, build: build_text },
    Rule { name: "empty-sequence", matches: is_empty_sequence, build: build_empty_sequence },
    Rule { name: "sequence", matches: HostValue::is_sequence, build: build_sequence },
    Rule { name: "mapping", matches: HostValue::is_mapping, build: build_mapping },
    Rule { name: "set", matches: HostValue::is_set, build: build_set },
    Rule { name: "null", matches: HostValue::is_none, build: build_null },
    Rule { name: "matrix", matches: HostValue::is_matrix, build: build_matrix },
    Rule { name: "table", matches: HostValue::is_table, build: build_table },
    Rule { name: "series", matches: HostValue::is_series, build: build_series },
    Rule { name: "unrepresentable", matches: always, build: build_unrepresentable },
];

/// Rule names in evaluation order.
pub fn rule_names() -> Vec<&'static str> {
    RULES.iter().map(|rule| rule.name).collect()
}

/// Classify with default limits.
pub fn classify(value: &HostValue) -> Value {
    classify_with(value, &Limits::default())
}

pub fn classify_with(value: &HostValue, limits: &Limits) -> Value {
    Classifier::new(limits).classify(value)
}

/// Recursive walker carrying the current nesting depth.
pub struct Classifier<'a> {
    limits: &'a Limits,
    depth: usize,
}

impl<'a> Classifier<'a> {
    pub fn new(limits: &'a Limits) -> Self {
        Self { limits, depth: 0 }
    }

    pub fn classify(&mut self, value: &HostValue) -> Value {
        if self.depth >= self.limits.max_depth {
            warn!(
                max_depth = self.limits.max_depth,
                type_name = value.type_name(),
                "value nested too deeply, replacing with placeholder"
            );
            return Value::unrepresentable(
                DEPTH_EXCEEDED,
                format!("{} nested deeper than {} levels", value.type_name(), self.limits.max_depth),
            );
        }

        self.depth += 1;
        let result = match RULES.iter().find(|rule| (rule.matches)(value)) {
            Some(rule) => (rule.build)(self, value),
            None => build_unrepresentable(self, value),
        };
        self.depth -= 1;
        result
    }

    fn classify_all<'v>(&mut self, items: impl IntoIterator<Item = &'v HostValue>) -> Vec<Value> {
        items.into_iter().map(|item| self.classify(item)).collect()
    }
}

// ============================================================================
// Predicates not covered by HostValue itself
// ============================================================================

fn is_empty_sequence(value: &HostValue) -> bool {
    value.sequence_len() == Some(0)
}

fn always(_: &HostValue) -> bool {
    true
}

// ============================================================================
// Builders
// ============================================================================

fn build_bool(_: &mut Classifier<'_>, value: &HostValue) -> Value {
    match value {
        HostValue::Bool(b) => Value::Bool(*b),
        other => build_unrepresentable_value(other),
    }
}

fn build_int(_: &mut Classifier<'_>, value: &HostValue) -> Value {
    match value {
        HostValue::Int(i) => Value::Int(*i),
        HostValue::Bool(b) => Value::Int(*b as i64),
        other => build_unrepresentable_value(other),
    }
}

fn build_float(_: &mut Classifier<'_>, value: &HostValue) -> Value {
    match value {
        HostValue::Float(f) => Value::Float(*f),
        HostValue::Float32(f) => Value::Float(*f as f64),
        other => build_unrepresentable_value(other),
    }
}

fn build_complex(_: &mut Classifier<'_>, value: &HostValue) -> Value {
    match value {
        HostValue::Complex(re, im) => Value::Complex { re: *re, im: *im },
        other => build_unrepresentable_value(other),
    }
}

fn build_text(_: &mut Classifier<'_>, value: &HostValue) -> Value {
    match value {
        HostValue::Str(s) => Value::Text(s.clone()),
        other => build_unrepresentable_value(other),
    }
}

fn build_empty_sequence(_: &mut Classifier<'_>, _: &HostValue) -> Value {
    Value::Sequence(Vec::new())
}

/// Elements are classified one by one; a homogeneous numeric or bool result
/// is packed into a typed array so the element type survives the trip.
fn build_sequence(classifier: &mut Classifier<'_>, value: &HostValue) -> Value {
    let items = match value {
        HostValue::Bytes(bytes) => bytes.iter().map(|b| Value::Int(*b as i64)).collect(),
        HostValue::List(items) | HostValue::Tuple(items) | HostValue::NdArray(items) => {
            classifier.classify_all(items)
        }
        other => return build_unrepresentable_value(other),
    };
    match TypedArray::pack(&items) {
        Some(array) => Value::Array(array),
        None => Value::Sequence(items),
    }
}

fn build_mapping(classifier: &mut Classifier<'_>, value: &HostValue) -> Value {
    let HostValue::Dict(entries) = value else {
        return build_unrepresentable_value(value);
    };
    Value::Mapping(
        entries
            .iter()
            .map(|(key, item)| {
                let key = match key {
                    HostValue::Str(s) => s.clone(),
                    other => other.display(),
                };
                (key, classifier.classify(item))
            })
            .collect(),
    )
}

fn build_set(classifier: &mut Classifier<'_>, value: &HostValue) -> Value {
    match value {
        HostValue::Set(items) => Value::Set(classifier.classify_all(items)),
        other => build_unrepresentable_value(other),
    }
}

fn build_null(_: &mut Classifier<'_>, _: &HostValue) -> Value {
    Value::Null
}

fn build_matrix(_: &mut Classifier<'_>, value: &HostValue) -> Value {
    match value {
        HostValue::Matrix(matrix) => Value::Matrix(matrix.clone()),
        other => build_unrepresentable_value(other),
    }
}

fn build_table(_: &mut Classifier<'_>, value: &HostValue) -> Value {
    match value {
        HostValue::DataFrame(table) => Value::Table(table.clone()),
        other => build_unrepresentable_value(other),
    }
}

fn build_series(_: &mut Classifier<'_>, value: &HostValue) -> Value {
    match value {
        HostValue::Series(named) => Value::NamedVector(named.clone()),
        other => build_unrepresentable_value(other),
    }
}

fn build_unrepresentable(_: &mut Classifier<'_>, value: &HostValue) -> Value {
    build_unrepresentable_value(value)
}

fn build_unrepresentable_value(value: &HostValue) -> Value {
    Value::unrepresentable(value.type_name(), value.short_repr())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builder_matches_its_predicate() {
        let samples = [
            HostValue::Bool(true),
            HostValue::Int(3),
            HostValue::Float(1.5),
            HostValue::Complex(1.0, 2.0),
            HostValue::Str("a".into()),
            HostValue::List(vec![]),
            HostValue::None,
        ];
        for sample in &samples {
            let value = classify(sample);
            assert_ne!(value.shape(), jlbridge_value::Shape::Unrepresentable, "{:?}", sample);
        }
    }

    #[test]
    fn last_rule_is_the_catch_all() {
        assert_eq!(rule_names().last(), Some(&"unrepresentable"));
    }
}

//! Guest encoder
//!
//! Renders a [`Value`] as Julia source that evaluates to the equivalent
//! Julia value. Scalars and containers become literals; tables and matrices
//! are written to a [`StagedFile`] and referenced by a reload expression.
//!
//! | value | Julia |
//! |-------|-------|
//! | `Null` | `NaN` |
//! | `Float(1.5)` | `Float64(1.5)` |
//! | `Text("a\"b")` | `raw"a\"b"` |
//! | `Array(Int[1, 2])` | `Int64[1, 2]` |
//! | `Mapping` | `Dict{String,Any}(raw"k" => v)` |
//! | `Table` | `DataFrame(Arrow.Table(raw"/tmp/jlbridge-x.feather"))` |
//! | `Matrix` | `Matrix(DataFrame(Arrow.Table(raw"...")))` |
//! | `NamedVector` | `NamedArray(Int64[1, 2], (String[raw"a", raw"b"],))` |

use std::fmt::Write as _;

use jlbridge_value::{homogeneity, ElementClass, NamedVector, Shape, Table, TypedArray, Value};
use tracing::{debug, warn};

use crate::config::StagingConfig;
use crate::error::TransferError;
use crate::packages::Package;
use crate::stage::{StageError, StagedFile};

/// Encoded value: Julia source plus the staged files it reads.
///
/// The staged files must stay alive until the guest has executed `source`;
/// dropping the `Encoded` removes them.
#[derive(Debug)]
pub struct Encoded {
    pub source: String,
    pub staged: Vec<StagedFile>,
    pub packages: Vec<Package>,
}

impl Encoded {
    pub fn needs_staging(&self) -> bool {
        !self.staged.is_empty()
    }
}

pub struct GuestEncoder<'a> {
    staging: &'a StagingConfig,
}

impl<'a> GuestEncoder<'a> {
    pub fn new(staging: &'a StagingConfig) -> Self {
        Self { staging }
    }

    pub fn encode(&self, value: &Value) -> Result<Encoded, TransferError> {
        let mut source = String::new();
        let mut staged = Vec::new();
        self.write_value(value, &mut source, &mut staged)?;
        let packages = required_packages(&source);
        debug!(shape = value.shape().name(), ?packages, staged = staged.len(), "encoded value");
        Ok(Encoded {
            source,
            staged,
            packages,
        })
    }

    /// `name = <encoded value>`.
    pub fn encode_assignment(&self, name: &str, value: &Value) -> Result<Encoded, TransferError> {
        let mut encoded = self.encode(value)?;
        encoded.source = format!("{} = {}", name, encoded.source);
        Ok(encoded)
    }

    fn write_value(
        &self,
        value: &Value,
        out: &mut String,
        staged: &mut Vec<StagedFile>,
    ) -> Result<(), TransferError> {
        match value {
            Value::Null => out.push_str("NaN"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Int(i) => write_int(*i, out),
            Value::Float(f) => write_float(*f, out),
            Value::Complex { re, im } => {
                out.push_str("complex(");
                write_float(*re, out);
                out.push(',');
                write_float(*im, out);
                out.push(')');
            }
            Value::Text(s) => write_raw_string(s, out),
            Value::Sequence(items) => self.write_sequence(items, out, staged)?,
            Value::Array(array) => write_array(array, out),
            Value::Mapping(entries) => {
                out.push_str("Dict{String,Any}(");
                for (i, (key, item)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    write_raw_string(key, out);
                    out.push_str(" => ");
                    self.write_value(item, out, staged)?;
                }
                out.push(')');
            }
            Value::Set(items) => self.write_set(items, out, staged)?,
            Value::Table(table) => {
                let path = self.stage_table(table, staged)?;
                out.push_str("DataFrame(Arrow.Table(");
                write_raw_string(&path, out);
                out.push_str("))");
            }
            Value::Matrix(matrix) => {
                let path = self.stage_table(&matrix.to_table(), staged)?;
                out.push_str("Matrix(DataFrame(Arrow.Table(");
                write_raw_string(&path, out);
                out.push_str(")))");
            }
            Value::NamedVector(named) => self.write_named(named, out, staged)?,
            Value::Unrepresentable { description, .. } => {
                write_raw_string(&format!("Unsupported datatype {}", description), out)
            }
        }
        Ok(())
    }

    fn write_items(
        &self,
        items: &[Value],
        out: &mut String,
        staged: &mut Vec<StagedFile>,
    ) -> Result<(), TransferError> {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write_value(item, out, staged)?;
        }
        Ok(())
    }

    fn write_sequence(
        &self,
        items: &[Value],
        out: &mut String,
        staged: &mut Vec<StagedFile>,
    ) -> Result<(), TransferError> {
        if items.is_empty() {
            out.push_str("[]");
            return Ok(());
        }
        out.push_str(element_type(items));
        out.push('[');
        self.write_items(items, out, staged)?;
        out.push(']');
        Ok(())
    }

    /// Elements are written in the order of their encoded text so the same
    /// set always produces the same source.
    fn write_set(
        &self,
        items: &[Value],
        out: &mut String,
        staged: &mut Vec<StagedFile>,
    ) -> Result<(), TransferError> {
        if items.is_empty() {
            out.push_str("Set{Any}()");
            return Ok(());
        }
        let mut encoded = Vec::with_capacity(items.len());
        for item in items {
            let mut text = String::new();
            self.write_value(item, &mut text, staged)?;
            encoded.push(text);
        }
        encoded.sort();
        encoded.dedup();

        let element = element_type(items);
        if element == "Any" {
            out.push_str("Set{Any}(Any[");
        } else {
            out.push_str("Set(");
            out.push_str(element);
            out.push('[');
        }
        out.push_str(&encoded.join(", "));
        out.push_str("])");
        Ok(())
    }

    fn write_named(
        &self,
        named: &NamedVector,
        out: &mut String,
        staged: &mut Vec<StagedFile>,
    ) -> Result<(), TransferError> {
        out.push_str("NamedArray(");
        match TypedArray::pack(named.values()) {
            Some(array) => write_array(&array, out),
            None => self.write_sequence(named.values(), out, staged)?,
        }
        out.push_str(", (String[");
        for (i, label) in named.labels().iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            write_raw_string(label, out);
        }
        out.push_str("],))");
        Ok(())
    }

    /// Write `table` to a new staged file and return its path.
    ///
    /// A column-type failure gets exactly one retry with mixed columns
    /// coerced; anything else, including a staging directory that cannot be
    /// written, is a [`TransferError::StagedWriteFailure`].
    fn stage_table(&self, table: &Table, staged: &mut Vec<StagedFile>) -> Result<String, TransferError> {
        let file = StagedFile::create(self.staging).map_err(|e| TransferError::StagedWriteFailure {
            path: self.staging.dir(),
            reason: e.to_string(),
        })?;
        let failure = |file: &StagedFile, e: StageError| TransferError::StagedWriteFailure {
            path: file.path().to_path_buf(),
            reason: e.to_string(),
        };

        match file.write_table(table) {
            Ok(()) => {}
            Err(StageError::ColumnType(column)) => {
                warn!(%column, "column has mixed types, retrying with coerced columns");
                file.write_table(&table.coerced())
                    .map_err(|e| failure(&file, e))?;
            }
            Err(e) => return Err(failure(&file, e)),
        }

        let path = file.path().to_string_lossy().into_owned();
        staged.push(file);
        Ok(path)
    }
}

// ============================================================================
// Literals
// ============================================================================

fn write_int(i: i64, out: &mut String) {
    // -9223372036854775808 parses as an Int128 negation in Julia.
    if i == i64::MIN {
        out.push_str("typemin(Int64)");
    } else {
        let _ = write!(out, "{}", i);
    }
}

fn write_float(f: f64, out: &mut String) {
    if f.is_nan() {
        out.push_str("NaN");
    } else if f.is_infinite() {
        out.push_str(if f > 0.0 { "Inf" } else { "-Inf" });
    } else {
        let _ = write!(out, "Float64({:?})", f);
    }
}

/// Julia `raw"..."` literal. Only quotes and the backslashes directly in
/// front of them (or in front of the closing quote) need escaping.
pub fn write_raw_string(s: &str, out: &mut String) {
    out.push_str("raw\"");
    let mut backslashes = 0;
    for ch in s.chars() {
        match ch {
            '\\' => {
                backslashes += 1;
                out.push('\\');
            }
            '"' => {
                out.extend(std::iter::repeat('\\').take(backslashes + 1));
                out.push('"');
                backslashes = 0;
            }
            other => {
                backslashes = 0;
                out.push(other);
            }
        }
    }
    out.extend(std::iter::repeat('\\').take(backslashes));
    out.push('"');
}

pub fn raw_string(s: &str) -> String {
    let mut out = String::new();
    write_raw_string(s, &mut out);
    out
}

fn write_array(array: &TypedArray, out: &mut String) {
    match array {
        TypedArray::Int(items) => {
            out.push_str("Int64[");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_int(*item, out);
            }
        }
        TypedArray::Float(items) => {
            out.push_str("Float64[");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_float(*item, out);
            }
        }
        TypedArray::Bool(items) => {
            out.push_str("Bool[");
            let items: Vec<&str> = items.iter().map(|b| if *b { "true" } else { "false" }).collect();
            out.push_str(&items.join(", "));
        }
    }
    out.push(']');
}

/// Julia element type for a literal holding `items`.
fn element_type(items: &[Value]) -> &'static str {
    if items.iter().any(Value::is_null) {
        return "Any";
    }
    match homogeneity(items, false) {
        Some(ElementClass::Bool) => "Bool",
        Some(ElementClass::Numeric) if items.iter().all(|v| matches!(v, Value::Int(_))) => "Int64",
        Some(ElementClass::Numeric) => "Float64",
        Some(ElementClass::Other(Shape::Text)) => "String",
        _ => "Any",
    }
}

// ============================================================================
// Package detection
// ============================================================================

const PACKAGE_MARKERS: &[(&str, Package)] = &[
    ("Arrow.", Package::Arrow),
    ("NamedArray", Package::NamedArrays),
    ("DataFrame", Package::DataFrames),
];

/// Optional packages an encoded source needs, found by the names of the
/// wrapper calls it contains. Text inside `raw"..."` literals is skipped, so
/// a string that merely mentions a package name does not count.
pub fn required_packages(source: &str) -> Vec<Package> {
    let code = strip_raw_strings(source);
    let mut packages: Vec<Package> = PACKAGE_MARKERS
        .iter()
        .filter(|(marker, _)| code.contains(marker))
        .map(|(_, package)| *package)
        .collect();
    packages.sort();
    packages.dedup();
    packages
}

fn strip_raw_strings(source: &str) -> String {
    let mut code = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find("raw\"") {
        code.push_str(&rest[..start]);
        let body = &rest[start + 4..];
        let mut backslashes = 0;
        let mut end = body.len();
        for (i, ch) in body.char_indices() {
            match ch {
                '\\' => backslashes += 1,
                '"' if backslashes % 2 == 0 => {
                    end = i + 1;
                    break;
                }
                _ => backslashes = 0,
            }
        }
        code.push_str("\"\"");
        rest = &body[end.min(body.len())..];
    }
    code.push_str(rest);
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_strings_escape_quotes_and_trailing_backslashes() {
        assert_eq!(raw_string("plain"), r#"raw"plain""#);
        assert_eq!(raw_string(r#"a"b"#), r#"raw"a\"b""#);
        assert_eq!(raw_string(r#"a\"b"#), r#"raw"a\\\"b""#);
        assert_eq!(raw_string(r"dir\"), r#"raw"dir\\""#);
        assert_eq!(raw_string(r"a\b$c"), r#"raw"a\b$c""#);
    }

    #[test]
    fn package_detection_ignores_string_contents() {
        assert_eq!(
            required_packages(r#"x = raw"DataFrame(Arrow.Table(\"x\"))""#),
            Vec::<Package>::new()
        );
        assert_eq!(
            required_packages(r#"x = Matrix(DataFrame(Arrow.Table(raw"/tmp/a.feather")))"#),
            vec![Package::Arrow, Package::DataFrames]
        );
        assert_eq!(
            required_packages(r#"x = NamedArray(Int64[1], (String[raw"a"],))"#),
            vec![Package::NamedArrays]
        );
    }

    #[test]
    fn int64_min_uses_typemin() {
        let mut out = String::new();
        write_int(i64::MIN, &mut out);
        assert_eq!(out, "typemin(Int64)");
    }
}

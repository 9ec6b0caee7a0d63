//! Simulated Julia session for integration tests.
//!
//! `FakeJulia` understands the Julia subset the encoder emits and answers
//! `__jlbridge_repr(x)` the way the guest decoder library does, including
//! `REQUIRE:` answers while optional packages are missing and staged files
//! for tables and matrices. Guest variables are stored as `Value`s.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use jlbridge::{
    Matrix, MessageKind, NamedVector, Response, Session, SessionError, StagedFile, StagingConfig,
    Table, TypedArray, Value,
};
use serde_json::json;
use tempfile::TempDir;

pub struct FakeJulia {
    pub vars: HashMap<String, Value>,
    /// Transfer expressions returned verbatim for a variable.
    pub scripted: HashMap<String, String>,
    pub executed: Vec<String>,
    pub requests: Vec<String>,
    pub warnings: Vec<String>,
    /// Modules brought in by install snippets, in order.
    pub installs: Vec<String>,
    pub loaded: BTreeSet<String>,
    pub library_installed: bool,
    /// Host staged files the guest read.
    pub staged_reads: Vec<PathBuf>,
    /// Staged files the guest wrote for the host.
    pub staged_writes: Vec<PathBuf>,
    staging: StagingConfig,
    dir: TempDir,
}

impl FakeJulia {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let staging = StagingConfig {
            dir: Some(dir.path().to_path_buf()),
            prefix: "jl_".to_string(),
            ..StagingConfig::default()
        };
        Self {
            vars: HashMap::new(),
            scripted: HashMap::new(),
            executed: Vec::new(),
            requests: Vec::new(),
            warnings: Vec::new(),
            installs: Vec::new(),
            loaded: BTreeSet::new(),
            library_installed: false,
            staged_reads: Vec::new(),
            staged_writes: Vec::new(),
            staging,
            dir,
        }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Staging settings for a host that shares this guest's temp directory.
    pub fn host_staging(&self) -> StagingConfig {
        StagingConfig {
            dir: Some(self.dir.path().to_path_buf()),
            ..StagingConfig::default()
        }
    }

    pub fn define(&mut self, name: &str, value: impl Into<Value>) {
        self.vars.insert(name.to_string(), value.into());
    }

    pub fn script(&mut self, name: &str, expression: &str) {
        self.scripted.insert(name.to_string(), expression.to_string());
    }

    pub fn assignments(&self) -> Vec<&String> {
        self.executed.iter().filter(|code| is_assignment(code)).collect()
    }

    fn require(&self, module: &str) -> Result<(), SessionError> {
        if self.loaded.contains(module) {
            Ok(())
        } else {
            Err(SessionError::Execution(format!("UndefVarError: `{}` not defined", module)))
        }
    }

    fn assign(&mut self, name: &str, source: &str, on_error: &str) -> Result<(), SessionError> {
        if source.contains("Arrow.") {
            self.require("Arrow")?;
        }
        if source.contains("DataFrame(") {
            self.require("DataFrames")?;
        }
        if source.contains("NamedArray(") {
            self.require("NamedArrays")?;
        }
        let mut parser = JuliaParser::new(source);
        let value = parser
            .value()
            .map_err(|e| SessionError::Execution(format!("{}: {}", on_error, e)))?;
        self.staged_reads.append(&mut parser.reads);
        self.vars.insert(name.to_string(), value);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Guest decoder library, simulated
    // ------------------------------------------------------------------------

    fn repr(&mut self, value: &Value) -> Result<String, String> {
        Ok(match value {
            Value::Null => "null".to_string(),
            Value::Float(f) if f.is_nan() => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format!("f64({})", number(*f)),
            Value::Complex { re, im } => format!("complex({},{})", number(*re), number(*im)),
            Value::Text(s) => julia_string(s),
            Value::Sequence(items) => format!("[{}]", self.repr_all(items)?),
            Value::Array(array) => match array {
                TypedArray::Int(items) => format!(
                    "array(int64,[{}])",
                    items.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
                ),
                TypedArray::Float(items) => format!(
                    "array(float64,[{}])",
                    items.iter().map(|f| number(*f)).collect::<Vec<_>>().join(",")
                ),
                TypedArray::Bool(items) => format!(
                    "array(bool,[{}])",
                    items.iter().map(bool::to_string).collect::<Vec<_>>().join(",")
                ),
            },
            Value::Mapping(entries) => {
                let mut parts = Vec::new();
                for (key, item) in entries {
                    parts.push(format!("{}:{}", julia_string(key), self.repr(item)?));
                }
                format!("{{{}}}", parts.join(","))
            }
            Value::Set(items) => format!("set([{}])", self.repr_all(items)?),
            Value::Table(table) => {
                if !self.loaded.contains("Arrow") {
                    return Err("arrow".to_string());
                }
                format!("table({})", julia_string(&self.write_staged(table)))
            }
            Value::Matrix(matrix) => {
                if !self.loaded.contains("DataFrames") {
                    return Err("dataframes".to_string());
                }
                if !self.loaded.contains("Arrow") {
                    return Err("arrow".to_string());
                }
                format!("matrix({})", julia_string(&self.write_staged(&matrix.to_table())))
            }
            Value::NamedVector(named) => {
                let labels: Vec<String> = named.labels().iter().map(|l| julia_string(l)).collect();
                format!("named([{}],[{}])", self.repr_all(named.values())?, labels.join(","))
            }
            Value::Unrepresentable { tag, description } => {
                format!("unrepresentable({},{})", julia_string(tag), julia_string(description))
            }
        })
    }

    fn repr_all(&mut self, items: &[Value]) -> Result<String, String> {
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            parts.push(self.repr(item)?);
        }
        Ok(parts.join(","))
    }

    fn write_staged(&mut self, table: &Table) -> String {
        let file = StagedFile::create(&self.staging).expect("create staged file");
        file.write_table(table).expect("write staged file");
        let path = file.keep();
        self.staged_writes.push(path.clone());
        path.to_string_lossy().into_owned()
    }

    fn decoder_answer(&mut self, name: &str) -> Option<String> {
        if let Some(expression) = self.scripted.get(name) {
            return Some(expression.clone());
        }
        let value = self.vars.get(name)?.clone();
        Some(match self.repr(&value) {
            Ok(expression) => expression,
            Err(package) => format!("REQUIRE:{}", package),
        })
    }
}

impl Default for FakeJulia {
    fn default() -> Self {
        Self::new()
    }
}

impl Session for FakeJulia {
    fn execute(
        &mut self,
        code: &str,
        _store_result: bool,
        _silent: bool,
        on_error: &str,
    ) -> Result<(), SessionError> {
        self.executed.push(code.to_string());

        if code.contains("function __jlbridge_repr(obj)") {
            self.library_installed = true;
            return Ok(());
        }
        if let Some(rest) = code.strip_prefix("try\n  using ") {
            let module = rest.lines().next().unwrap_or_default().trim().to_string();
            self.installs.push(module.clone());
            self.loaded.insert(module);
            return Ok(());
        }
        if is_assignment(code) {
            if let Some((name, source)) = code.split_once(" = ") {
                return self.assign(name, source, on_error);
            }
        }
        Ok(())
    }

    fn get_response(
        &mut self,
        code: &str,
        kinds: &[MessageKind],
        name_filter: Option<&[&str]>,
    ) -> Result<Response, SessionError> {
        self.requests.push(code.to_string());

        let mut response: Response = Vec::new();
        if code == "versioninfo(verbose=true)" {
            response.push((MessageKind::Stream, json!({"name": "stdout", "text": "Julia Version 1.10.0"})));
            response.push((MessageKind::Stream, json!({"name": "stderr", "text": "noise"})));
            response.push((MessageKind::Stream, json!({"name": "stdout", "text": "Platform Info:"})));
        } else if let Some(name) = code
            .strip_prefix("__jlbridge_repr(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let answer = if self.library_installed {
                self.decoder_answer(name)
            } else {
                None
            };
            match answer {
                Some(expression) => response.push((
                    MessageKind::ExecuteResult,
                    json!({"data": {"text/plain": julia_string(&expression)}}),
                )),
                None => response.push((
                    MessageKind::Error,
                    json!({"ename": "UndefVarError", "evalue": format!("{} not defined", name)}),
                )),
            }
        }

        Ok(response
            .into_iter()
            .filter(|(kind, _)| kinds.contains(kind))
            .filter(|(kind, payload)| {
                *kind != MessageKind::Stream
                    || name_filter.map_or(true, |names| {
                        payload["name"].as_str().is_some_and(|n| names.contains(&n))
                    })
            })
            .collect())
    }

    fn warn(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }
}

fn is_assignment(code: &str) -> bool {
    !code.starts_with("try") && !code.contains("function ") && code.contains(" = ")
}

/// Julia `repr` of a float, spelled the way the decoder library spells it.
fn number(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        format!("{:?}", f)
    }
}

/// Julia `repr` of a string.
pub fn julia_string(s: &str) -> String {
    let mut out = String::from("\"");
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '$' => out.push_str("\\$"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

// ============================================================================
// Julia subset parser
// ============================================================================

struct JuliaParser<'a> {
    src: &'a str,
    pos: usize,
    reads: Vec<PathBuf>,
}

impl<'a> JuliaParser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            reads: Vec::new(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        while self.rest().starts_with([' ', '\n', '\t']) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<(), String> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(format!("expected {:?} at {:?}", token, self.rest()))
        }
    }

    fn value(&mut self) -> Result<Value, String> {
        self.skip_ws();
        if self.rest().starts_with("raw\"") {
            return Ok(Value::Text(self.raw_string()?));
        }
        if self.eat("NaN") {
            return Ok(Value::Null);
        }
        if self.eat("-Inf") {
            return Ok(Value::Float(f64::NEG_INFINITY));
        }
        if self.eat("Inf") {
            return Ok(Value::Float(f64::INFINITY));
        }
        if self.eat("true") {
            return Ok(Value::Bool(true));
        }
        if self.eat("false") {
            return Ok(Value::Bool(false));
        }
        if self.eat("typemin(Int64)") {
            return Ok(Value::Int(i64::MIN));
        }
        if self.eat("Float64(") {
            let f = self.number()?;
            self.expect(")")?;
            return Ok(Value::Float(f));
        }
        if self.eat("complex(") {
            let re = self.float_arg()?;
            self.expect(",")?;
            let im = self.float_arg()?;
            self.expect(")")?;
            return Ok(Value::Complex { re, im });
        }
        if self.eat("Matrix(DataFrame(Arrow.Table(") {
            let table = self.staged()?;
            self.expect(")))")?;
            return Matrix::from_table(&table).map(Value::Matrix).map_err(|e| e.to_string());
        }
        if self.eat("DataFrame(Arrow.Table(") {
            let table = self.staged()?;
            self.expect("))")?;
            return Ok(Value::Table(table));
        }
        if self.eat("Dict{String,Any}(") {
            let mut entries = Vec::new();
            while !self.eat(")") {
                let key = self.raw_string()?;
                self.expect("=>")?;
                entries.push((key, self.value()?));
                self.eat(",");
            }
            return Ok(Value::Mapping(entries));
        }
        if self.eat("Set{Any}()") {
            return Ok(Value::Set(Vec::new()));
        }
        if self.eat("Set{Any}(") || self.eat("Set(") {
            let items = self.typed_list()?;
            self.expect(")")?;
            return Ok(Value::Set(items.into_items()));
        }
        if self.eat("NamedArray(") {
            let values = self.typed_list()?.into_items();
            self.expect(",")?;
            self.expect("(String[")?;
            let mut labels = Vec::new();
            while !self.eat("]") {
                labels.push(self.raw_string()?);
                self.eat(",");
            }
            self.expect(",))")?;
            return NamedVector::try_new(labels, values)
                .map(Value::NamedVector)
                .map_err(|e| e.to_string());
        }
        if ["Int64[", "Float64[", "Bool[", "String[", "Any[", "["]
            .iter()
            .any(|p| self.rest().starts_with(p))
        {
            return Ok(self.typed_list()?.into_value());
        }
        if self.rest().starts_with(|c: char| c == '-' || c.is_ascii_digit()) {
            let text = self.number_text();
            return text.parse().map(Value::Int).map_err(|e| format!("{}: {}", text, e));
        }
        Err(format!("unsupported Julia at {:?}", self.rest()))
    }

    fn float_arg(&mut self) -> Result<f64, String> {
        match self.value()? {
            Value::Null => Ok(f64::NAN),
            Value::Float(f) => Ok(f),
            other => Err(format!("not a float: {:?}", other)),
        }
    }

    fn number_text(&mut self) -> &'a str {
        self.skip_ws();
        let start = self.pos;
        let bytes = self.src.as_bytes();
        while self.pos < bytes.len()
            && (bytes[self.pos].is_ascii_digit() || b"-+.eE".contains(&bytes[self.pos]))
        {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    fn number(&mut self) -> Result<f64, String> {
        let text = self.number_text();
        text.parse().map_err(|e| format!("{}: {}", text, e))
    }

    fn raw_string(&mut self) -> Result<String, String> {
        self.expect("raw\"")?;
        let mut out = String::new();
        let mut backslashes = 0usize;
        let mut chars = self.rest().char_indices();
        loop {
            let Some((i, ch)) = chars.next() else {
                return Err("unterminated raw string".to_string());
            };
            match ch {
                '\\' => backslashes += 1,
                '"' => {
                    // n backslashes before a quote stand for n / 2 backslashes;
                    // an odd count escapes the quote itself.
                    out.extend(std::iter::repeat('\\').take(backslashes / 2));
                    if backslashes % 2 == 1 {
                        out.push('"');
                        backslashes = 0;
                        continue;
                    }
                    self.pos += i + 1;
                    return Ok(out);
                }
                other => {
                    out.extend(std::iter::repeat('\\').take(backslashes));
                    backslashes = 0;
                    out.push(other);
                }
            }
        }
    }

    fn staged(&mut self) -> Result<Table, String> {
        let path = PathBuf::from(self.raw_string()?);
        self.reads.push(path.clone());
        // The host owns and removes the file; read it in place.
        jlbridge::stage::read_table_at(&path).map_err(|e| format!("{}: {}", path.display(), e))
    }

    fn typed_list(&mut self) -> Result<TypedList, String> {
        self.skip_ws();
        let kind = if self.eat("Int64[") {
            ListKind::Int
        } else if self.eat("Float64[") {
            ListKind::Float
        } else if self.eat("Bool[") {
            ListKind::Bool
        } else if self.eat("String[") || self.eat("Any[") || self.eat("[") {
            ListKind::Any
        } else {
            return Err(format!("expected a vector at {:?}", self.rest()));
        };
        let mut items = Vec::new();
        while !self.eat("]") {
            items.push(self.value()?);
            self.eat(",");
        }
        Ok(TypedList { kind, items })
    }
}

enum ListKind {
    Int,
    Float,
    Bool,
    Any,
}

struct TypedList {
    kind: ListKind,
    items: Vec<Value>,
}

impl TypedList {
    fn into_value(self) -> Value {
        match self.kind {
            ListKind::Int => Value::Array(TypedArray::Int(
                self.items.iter().filter_map(Value::as_i64).collect(),
            )),
            ListKind::Float => Value::Array(TypedArray::Float(
                self.items
                    .iter()
                    .map(|v| v.as_f64().unwrap_or(f64::NAN))
                    .collect(),
            )),
            ListKind::Bool => Value::Array(TypedArray::Bool(
                self.items.iter().filter_map(Value::as_bool).collect(),
            )),
            ListKind::Any => Value::Sequence(self.items),
        }
    }

    fn into_items(self) -> Vec<Value> {
        match self.into_value() {
            Value::Array(array) => array.to_values(),
            Value::Sequence(items) => items,
            _ => Vec::new(),
        }
    }
}

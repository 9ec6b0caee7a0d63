//! Transfer expressions
//!
//! The guest decoder library answers every import with a short expression in
//! a fixed constant grammar. The host parses it with the explicit parser in
//! this module; nothing the guest sends is ever evaluated.
//!
//! ```text
//! expr   := null | true | false | int | float | f64(number)
//!         | complex(number, number) | string
//!         | [expr, ...] | {string: expr, ...} | set([expr, ...])
//!         | array(int64|float64|bool, [number, ...])
//!         | named([expr, ...], [string, ...])
//!         | table(string) | matrix(string)
//!         | unrepresentable(string, string)
//! number := int | float | nan | inf | -inf
//! ```
//!
//! Strings use Julia escape rules, so the same lexer also unwraps the
//! `text/plain` form in which a session returns a string result.

mod lexer;
mod parser;

pub use lexer::{tokenize, unescape, Token, TokenKind};
pub use parser::parse;

use jlbridge_value::{Matrix, NamedVector, Table, TableError, TypedArray, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExprError {
    #[error("unexpected character {ch:?} at {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("expected {expected}, found {found} at {offset}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
        offset: usize,
    },

    #[error("expected {expected}, found end of input at {offset}")]
    UnexpectedEof { expected: &'static str, offset: usize },

    #[error("unterminated string starting at {offset}")]
    UnterminatedString { offset: usize },

    #[error("invalid escape sequence at {offset}")]
    InvalidEscape { offset: usize },

    #[error("string starting at {offset} is not valid UTF-8")]
    InvalidUtf8 { offset: usize },

    #[error("invalid number {text:?} at {offset}")]
    InvalidNumber { text: String, offset: usize },

    #[error("unknown form '{name}' at {offset}")]
    UnknownForm { name: String, offset: usize },

    #[error("unknown array type '{name}' at {offset}")]
    UnknownDtype { name: String, offset: usize },

    #[error("nesting deeper than {max} at {offset}")]
    DepthExceeded { max: usize, offset: usize },

    #[error("trailing input at {offset}")]
    TrailingInput { offset: usize },

    #[error("expression of {len} bytes exceeds limit of {max}")]
    TooLong { len: usize, max: usize },

    #[error("invalid value: {0}")]
    Table(#[from] TableError),
}

/// Parsed transfer expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(f64, f64),
    Str(String),
    List(Vec<Expr>),
    Map(Vec<(String, Expr)>),
    Set(Vec<Expr>),
    Array(TypedArray),
    Named { values: Vec<Expr>, labels: Vec<String> },
    /// Staged table written by the guest.
    Table(String),
    /// Staged matrix written by the guest.
    Matrix(String),
    Unrepresentable { tag: String, description: String },
}

/// Loads the staged files an expression refers to.
pub trait Reload {
    type Error: From<TableError>;

    fn table(&mut self, path: &str) -> Result<Table, Self::Error>;
    fn matrix(&mut self, path: &str) -> Result<Matrix, Self::Error>;
}

impl Expr {
    /// Staged file paths referenced anywhere in the expression.
    pub fn staged_paths(&self) -> Vec<&str> {
        let mut paths = Vec::new();
        self.collect_paths(&mut paths);
        paths
    }

    fn collect_paths<'a>(&'a self, paths: &mut Vec<&'a str>) {
        match self {
            Expr::Table(path) | Expr::Matrix(path) => paths.push(path),
            Expr::List(items) | Expr::Set(items) => {
                items.iter().for_each(|item| item.collect_paths(paths))
            }
            Expr::Named { values, .. } => values.iter().for_each(|item| item.collect_paths(paths)),
            Expr::Map(entries) => entries.iter().for_each(|(_, item)| item.collect_paths(paths)),
            _ => {}
        }
    }

    /// Turn the expression into a value, loading staged files through `reload`.
    pub fn materialize<R: Reload>(self, reload: &mut R) -> Result<Value, R::Error> {
        Ok(match self {
            Expr::Null => Value::Null,
            Expr::Bool(b) => Value::Bool(b),
            Expr::Int(i) => Value::Int(i),
            Expr::Float(f) => Value::Float(f),
            Expr::Complex(re, im) => Value::Complex { re, im },
            Expr::Str(s) => Value::Text(s),
            Expr::List(items) => Value::Sequence(materialize_all(items, reload)?),
            Expr::Set(items) => Value::Set(materialize_all(items, reload)?),
            Expr::Map(entries) => Value::Mapping(
                entries
                    .into_iter()
                    .map(|(key, item)| Ok::<_, R::Error>((key, item.materialize(reload)?)))
                    .collect::<Result<_, _>>()?,
            ),
            Expr::Array(array) => Value::Array(array),
            Expr::Named { values, labels } => {
                let values = materialize_all(values, reload)?;
                Value::NamedVector(NamedVector::try_new(labels, values)?)
            }
            Expr::Table(path) => Value::Table(reload.table(&path)?),
            Expr::Matrix(path) => Value::Matrix(reload.matrix(&path)?),
            Expr::Unrepresentable { tag, description } => Value::Unrepresentable { tag, description },
        })
    }
}

fn materialize_all<R: Reload>(items: Vec<Expr>, reload: &mut R) -> Result<Vec<Value>, R::Error> {
    items.into_iter().map(|item| item.materialize(reload)).collect()
}

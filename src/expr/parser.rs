//! Recursive-descent parser for transfer expressions.

use jlbridge_value::TypedArray;

use super::lexer::{tokenize, Token, TokenKind};
use super::{Expr, ExprError};
use crate::config::Limits;

pub fn parse(src: &str, limits: &Limits) -> Result<Expr, ExprError> {
    if src.len() > limits.max_expression_len {
        return Err(ExprError::TooLong {
            len: src.len(),
            max: limits.max_expression_len,
        });
    }
    let tokens = tokenize(src)?;
    let mut parser = Parser::new(tokens, limits.max_depth);
    let expr = parser.parse_expr(0)?;
    parser.expect_eof()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    max_depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>, max_depth: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            max_depth,
        }
    }

    fn peek(&self) -> &Token {
        // The lexer always terminates the stream with Eof.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn next(&mut self) -> Token {
        let tok = self.peek().clone();
        if !matches!(tok.kind, TokenKind::Eof) {
            self.pos += 1;
        }
        tok
    }

    fn unexpected(tok: &Token, expected: &'static str) -> ExprError {
        match tok.kind {
            TokenKind::Eof => ExprError::UnexpectedEof {
                expected,
                offset: tok.offset,
            },
            ref other => ExprError::UnexpectedToken {
                found: other.describe(),
                expected,
                offset: tok.offset,
            },
        }
    }

    fn expect_symbol(&mut self, expected: char, what: &'static str) -> Result<(), ExprError> {
        let tok = self.next();
        match tok.kind {
            TokenKind::Symbol(ch) if ch == expected => Ok(()),
            _ => Err(Self::unexpected(&tok, what)),
        }
    }

    fn accept_symbol(&mut self, expected: char) -> bool {
        if matches!(self.peek().kind, TokenKind::Symbol(ch) if ch == expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_eof(&mut self) -> Result<(), ExprError> {
        let tok = self.next();
        match tok.kind {
            TokenKind::Eof => Ok(()),
            _ => Err(ExprError::TrailingInput { offset: tok.offset }),
        }
    }

    fn expect_string(&mut self) -> Result<String, ExprError> {
        let tok = self.next();
        match tok.kind {
            TokenKind::Str(s) => Ok(s),
            _ => Err(Self::unexpected(&tok, "string")),
        }
    }

    fn expect_ident(&mut self) -> Result<(String, usize), ExprError> {
        let tok = self.next();
        match tok.kind {
            TokenKind::Ident(name) => Ok((name, tok.offset)),
            _ => Err(Self::unexpected(&tok, "identifier")),
        }
    }

    fn expect_number(&mut self) -> Result<f64, ExprError> {
        let tok = self.next();
        match tok.kind {
            TokenKind::Int(i) => Ok(i as f64),
            TokenKind::Float(f) => Ok(f),
            _ => Err(Self::unexpected(&tok, "number")),
        }
    }

    fn enter(&self, depth: usize) -> Result<usize, ExprError> {
        if depth >= self.max_depth {
            return Err(ExprError::DepthExceeded {
                max: self.max_depth,
                offset: self.peek().offset,
            });
        }
        Ok(depth + 1)
    }

    /// Comma-separated items up to `close`; a trailing comma is allowed.
    fn list_of<T>(
        &mut self,
        close: char,
        mut item: impl FnMut(&mut Self) -> Result<T, ExprError>,
    ) -> Result<Vec<T>, ExprError> {
        let mut items = Vec::new();
        loop {
            if self.accept_symbol(close) {
                return Ok(items);
            }
            items.push(item(self)?);
            if !self.accept_symbol(',') {
                let tok = self.next();
                return match tok.kind {
                    TokenKind::Symbol(ch) if ch == close => Ok(items),
                    _ => Err(Self::unexpected(&tok, "',' or closing bracket")),
                };
            }
        }
    }

    fn parse_expr(&mut self, depth: usize) -> Result<Expr, ExprError> {
        let tok = self.next();
        match tok.kind {
            TokenKind::Int(i) => Ok(Expr::Int(i)),
            TokenKind::Float(f) => Ok(Expr::Float(f)),
            TokenKind::Str(s) => Ok(Expr::Str(s)),
            TokenKind::Symbol('[') => {
                let depth = self.enter(depth)?;
                Ok(Expr::List(self.list_of(']', |p| p.parse_expr(depth))?))
            }
            TokenKind::Symbol('{') => {
                let depth = self.enter(depth)?;
                let entries = self.list_of('}', |p| {
                    let key = p.expect_string()?;
                    p.expect_symbol(':', "':'")?;
                    Ok((key, p.parse_expr(depth)?))
                })?;
                Ok(Expr::Map(entries))
            }
            TokenKind::Ident(name) => match name.as_str() {
                "null" => Ok(Expr::Null),
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                _ => self.parse_call(&name, tok.offset, depth),
            },
            _ => Err(Self::unexpected(&tok, "expression")),
        }
    }

    fn parse_call(&mut self, name: &str, offset: usize, depth: usize) -> Result<Expr, ExprError> {
        self.expect_symbol('(', "'('")?;
        let expr = match name {
            "f64" => Expr::Float(self.expect_number()?),
            "complex" => {
                let re = self.expect_number()?;
                self.expect_symbol(',', "','")?;
                Expr::Complex(re, self.expect_number()?)
            }
            "set" => {
                let depth = self.enter(depth)?;
                self.expect_symbol('[', "'['")?;
                Expr::Set(self.list_of(']', |p| p.parse_expr(depth))?)
            }
            "array" => {
                let (dtype, dtype_offset) = self.expect_ident()?;
                self.expect_symbol(',', "','")?;
                self.expect_symbol('[', "'['")?;
                Expr::Array(self.parse_typed_array(&dtype, dtype_offset)?)
            }
            "named" => {
                let depth = self.enter(depth)?;
                self.expect_symbol('[', "'['")?;
                let values = self.list_of(']', |p| p.parse_expr(depth))?;
                self.expect_symbol(',', "','")?;
                self.expect_symbol('[', "'['")?;
                let labels = self.list_of(']', |p| p.expect_string())?;
                Expr::Named { values, labels }
            }
            "table" => Expr::Table(self.expect_string()?),
            "matrix" => Expr::Matrix(self.expect_string()?),
            "unrepresentable" => {
                let tag = self.expect_string()?;
                self.expect_symbol(',', "','")?;
                let description = self.expect_string()?;
                Expr::Unrepresentable { tag, description }
            }
            other => {
                return Err(ExprError::UnknownForm {
                    name: other.to_string(),
                    offset,
                })
            }
        };
        self.accept_symbol(',');
        self.expect_symbol(')', "')'")?;
        Ok(expr)
    }

    fn parse_typed_array(&mut self, dtype: &str, offset: usize) -> Result<TypedArray, ExprError> {
        match dtype {
            "int64" => Ok(TypedArray::Int(self.list_of(']', |p| {
                let tok = p.next();
                match tok.kind {
                    TokenKind::Int(i) => Ok(i),
                    _ => Err(Self::unexpected(&tok, "integer")),
                }
            })?)),
            "float64" => Ok(TypedArray::Float(self.list_of(']', |p| p.expect_number())?)),
            "bool" => Ok(TypedArray::Bool(self.list_of(']', |p| {
                let tok = p.next();
                match &tok.kind {
                    TokenKind::Ident(word) if word == "true" => Ok(true),
                    TokenKind::Ident(word) if word == "false" => Ok(false),
                    _ => Err(Self::unexpected(&tok, "true or false")),
                }
            })?)),
            other => Err(ExprError::UnknownDtype {
                name: other.to_string(),
                offset,
            }),
        }
    }
}

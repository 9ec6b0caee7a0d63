//! Transfer values for the jlbridge marshaling engine.
//!
//! A [`Value`] is the closed set of shapes that can cross the boundary between
//! the host process and a Julia session. Host objects are classified into a
//! `Value` before they are rendered as Julia source, and transfer expressions
//! produced by the guest are parsed back into a `Value`.
//!
//! ```text
//! host object ──classify──▶ Value ──encode──▶ Julia source
//! Julia value ──guest lib──▶ transfer expr ──parse──▶ Value
//! ```
//!
//! This crate is `no_std` compatible (with `alloc`) so the same types can be
//! shared by tooling that does not link the full bridge.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod table;
mod value;

pub use table::{Column, ColumnKind, Matrix, MatrixData, NamedVector, Table, TableError};
pub use value::{homogeneity, ElementClass, Shape, TypedArray, Value};

use alloc::boxed::Box;
use alloc::string::String;
use core::fmt;

/// Error returned when a [`Value`] cannot be converted into a Rust type.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionError {
    /// The value had a different shape than the target type.
    TypeMismatch { expected: String, got: String },
    /// A sequence element failed to convert.
    IndexError(usize, Box<ConversionError>),
    /// A mapping entry failed to convert.
    KeyError(String, Box<ConversionError>),
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch { expected, got } => {
                write!(f, "type mismatch: expected {}, got {}", expected, got)
            }
            Self::IndexError(index, inner) => write!(f, "element {}: {}", index, inner),
            Self::KeyError(key, inner) => write!(f, "key {:?}: {}", key, inner),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConversionError {}

//! Guest decoder library
//!
//! The Julia side of an import is a fixed library of routines checked in as
//! `decoder.jl`. It is installed once per session and acts as the protocol
//! contract between host and guest: the routines emit the transfer grammar
//! parsed by [`crate::expr`], one routine per [`Shape`].
//!
//! The library is versioned with [`PROTOCOL_VERSION`] and identified by a
//! SHA-256 fingerprint over version and source, so a host can tell whether
//! the copy installed in a session is the one it expects.

use jlbridge_value::Shape;
use sha2::{Digest, Sha256};

/// Version of the transfer grammar spoken by `decoder.jl`.
pub const PROTOCOL_VERSION: u32 = 1;

/// Julia source of the library.
pub const SOURCE: &str = include_str!("decoder.jl");

/// Guest function that converts one value.
pub const ENTRY_POINT: &str = "__jlbridge_repr";

/// Prefix of the answer returned when an optional package is missing.
pub const REQUIRE_PREFIX: &str = "REQUIRE:";

/// A guest routine and the shape it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Routine {
    pub shape: Shape,
    pub function: &'static str,
}

pub static ROUTINES: &[Routine] = &[
    Routine { shape: Shape::Null, function: "__jlbridge_null" },
    Routine { shape: Shape::Bool, function: "__jlbridge_bool" },
    Routine { shape: Shape::Int, function: "__jlbridge_int" },
    Routine { shape: Shape::Float, function: "__jlbridge_float" },
    Routine { shape: Shape::Complex, function: "__jlbridge_complex" },
    Routine { shape: Shape::Text, function: "__jlbridge_string" },
    Routine { shape: Shape::Sequence, function: "__jlbridge_list" },
    Routine { shape: Shape::Array, function: "__jlbridge_array" },
    Routine { shape: Shape::Mapping, function: "__jlbridge_dict" },
    Routine { shape: Shape::Set, function: "__jlbridge_set" },
    Routine { shape: Shape::Table, function: "__jlbridge_table" },
    Routine { shape: Shape::Matrix, function: "__jlbridge_matrix" },
    Routine { shape: Shape::NamedVector, function: "__jlbridge_named" },
    Routine { shape: Shape::Unrepresentable, function: "__jlbridge_unrepresentable" },
];

/// SHA-256 fingerprint of the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// First 8 hex characters.
    pub fn to_short_hex(&self) -> String {
        self.0.iter().take(4).map(|b| format!("{:02x}", b)).collect()
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_short_hex())
    }
}

/// Handle on the embedded library.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuestLibrary;

impl GuestLibrary {
    pub fn source(&self) -> &'static str {
        SOURCE
    }

    pub fn version(&self) -> u32 {
        PROTOCOL_VERSION
    }

    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(format!("v{}\n", PROTOCOL_VERSION).as_bytes());
        hasher.update(SOURCE.as_bytes());
        Fingerprint(hasher.finalize().into())
    }

    pub fn routines(&self) -> &'static [Routine] {
        ROUTINES
    }

    pub fn routine(&self, shape: Shape) -> Option<&'static Routine> {
        ROUTINES.iter().find(|routine| routine.shape == shape)
    }

    /// Guest code converting the variable `name`.
    pub fn call(&self, name: &str) -> String {
        format!("{}({})", ENTRY_POINT, name)
    }
}

/// Package named by a `REQUIRE:<package>` answer, if `text` is one.
pub fn required_package(text: &str) -> Option<&str> {
    text.trim()
        .strip_prefix(REQUIRE_PREFIX)
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

//! jlbridge: value marshaling between a host process and a Julia session
//!
//! The host and the guest share no memory. Values cross the boundary as
//! text over a notebook-style [`Session`], or as a staged columnar file when
//! they are tables or matrices.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      Bridge (per session)                │
//! │                                                          │
//! │  export:  classify ─▶ encode ─────────────▶ Session      │
//! │  import:  Session ─▶ expr::parse ─▶ decode ─▶ HostValue  │
//! │                                                          │
//! │  packages  - lazily installed optional guest packages    │
//! │  guest     - decoder library installed in the guest      │
//! │  stage     - Feather (Arrow IPC) staged files            │
//! ├──────────────────────────────────────────────────────────┤
//! │        jlbridge-value: Value, Table, Matrix, ...         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! let mut vars: HashMap<String, HostValue> = HashMap::new();
//! vars.insert("x".into(), HostValue::List(vec![1.into(), 2.into()]));
//!
//! let mut bridge = Bridge::new(session);
//! bridge.export(&vars, &["x"], None)?;          // x = Int64[1, 2]
//! let imported = bridge.import(&["y"], None);   // None if anything failed
//! ```

pub mod bridge;
pub mod classify;
pub mod config;
pub mod decode;
pub mod encode;
pub mod error;
pub mod expr;
pub mod guest;
pub mod host;
pub mod language;
pub mod packages;
pub mod session;
pub mod stage;

pub use bridge::Bridge;
pub use classify::{classify, classify_with};
pub use config::{BridgeConfig, Limits, StagingConfig};
pub use decode::{HostDecoder, StagedReloader};
pub use encode::{required_packages, Encoded, GuestEncoder};
pub use error::TransferError;
pub use expr::{Expr, ExprError};
pub use guest::GuestLibrary;
pub use host::{HostValue, HostValueError, VariableStore};
pub use language::LanguageInfo;
pub use packages::{LazyPackageLoader, Package, PackageStatus};
pub use session::{MessageKind, Response, Session, SessionError};
pub use stage::{StageError, StagedFile};

pub use jlbridge_value::{
    Column, ColumnKind, Matrix, MatrixData, NamedVector, Shape, Table, TypedArray, Value,
};

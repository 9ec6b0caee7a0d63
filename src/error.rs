//! Transfer errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::expr::ExprError;
use crate::packages::Package;
use crate::session::SessionError;
use crate::stage::StageError;

/// Errors raised while moving values between host and guest.
///
/// Most shape problems never reach the caller: they are folded into
/// placeholder values close to where they happen. What remains here is what
/// the bridge has to report or act on.
#[derive(Debug, Error)]
pub enum TransferError {
    /// A value matched no transferable shape.
    #[error("unsupported shape: {0}")]
    UnsupportedShape(String),

    /// The guest needs an optional package before it can produce a value.
    #[error("guest requires package '{0}'")]
    PackageRequired(Package),

    /// A staged file could not be written, even after the repair pass.
    #[error("failed to stage {path}: {reason}")]
    StagedWriteFailure { path: PathBuf, reason: String },

    /// A transfer expression from the guest could not be turned into a value.
    #[error("failed to decode {name} from {expression:?}: {reason}")]
    DecodeFailure {
        name: String,
        expression: String,
        reason: String,
    },

    /// The guest asked for a package this bridge cannot install.
    #[error("unrecognized optional package '{0}'")]
    UnrecognizedOptionalPackage(String),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("staged file error: {0}")]
    Stage(#[from] StageError),

    #[error("expression error: {0}")]
    Expr(#[from] ExprError),
}

impl TransferError {
    /// Errors that end a whole batch rather than a single value.
    pub fn aborts_batch(&self) -> bool {
        matches!(
            self,
            TransferError::DecodeFailure { .. } | TransferError::Session(_) | TransferError::Expr(_)
        )
    }
}

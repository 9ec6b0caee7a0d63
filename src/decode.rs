//! Host decoder
//!
//! Imports one guest variable:
//!
//! ```text
//!   get_response("__jlbridge_repr(x)")
//!        │
//!        ▼
//!   unescape text/plain ──▶ "REQUIRE:<pkg>" ──▶ load package, ask again
//!        │
//!        ▼
//!   parse transfer expression ──▶ materialize (reload staged files) ──▶ Value
//! ```
//!
//! Each distinct package is loaded at most once per value. A value that keeps
//! asking for the same package, or for one the bridge cannot install, comes
//! back as [`Value::Unrepresentable`] with a warning.

use std::collections::BTreeSet;
use std::path::Path;

use jlbridge_value::{Matrix, Table, Value};
use tracing::{debug, warn};

use crate::config::{Limits, StagingConfig};
use crate::error::TransferError;
use crate::expr::{self, Reload};
use crate::guest::{self, GuestLibrary};
use crate::packages::{LazyPackageLoader, Package};
use crate::session::{plain_text, MessageKind, Session};
use crate::stage::{self, StageError, StagedFile};

pub struct HostDecoder<'a> {
    limits: &'a Limits,
    staging: &'a StagingConfig,
    library: GuestLibrary,
}

impl<'a> HostDecoder<'a> {
    pub fn new(limits: &'a Limits, staging: &'a StagingConfig) -> Self {
        Self {
            limits,
            staging,
            library: GuestLibrary,
        }
    }

    /// Fetch and decode the guest variable `name`.
    pub fn decode<S: Session + ?Sized>(
        &self,
        name: &str,
        session: &mut S,
        loader: &mut LazyPackageLoader,
    ) -> Result<Value, TransferError> {
        let mut attempted = BTreeSet::new();
        loop {
            match self.request(name, session) {
                Ok(expression) => return self.parse_expression(name, &expression),
                Err(TransferError::PackageRequired(package)) => {
                    if !attempted.insert(package) {
                        warn!(%name, %package, "package still required after loading it");
                        session.warn(&format!(
                            "Variable {} still requires package {} after it was loaded",
                            name, package
                        ));
                        return Ok(package_placeholder(name, package.name()));
                    }
                    loader.load_package(package, session)?;
                }
                Err(TransferError::UnrecognizedOptionalPackage(package)) => {
                    warn!(%name, %package, "guest requires an unrecognized package");
                    loader.load(&package, session)?;
                    return Ok(package_placeholder(name, &package));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Ask the guest for the transfer expression of `name`, turning a
    /// `REQUIRE:` answer into the matching error.
    fn request<S: Session + ?Sized>(&self, name: &str, session: &mut S) -> Result<String, TransferError> {
        let call = self.library.call(name);
        let response = session.get_response(&call, &[MessageKind::ExecuteResult], None)?;
        let text = plain_text(&response).ok_or_else(|| TransferError::DecodeFailure {
            name: name.to_string(),
            expression: String::new(),
            reason: "guest returned no result".to_string(),
        })?;
        let expression = expr::unescape(text).map_err(|e| decode_failure(name, text, e))?;
        debug!(%name, len = expression.len(), "received transfer expression");

        match guest::required_package(&expression) {
            Some(package) => match package.parse::<Package>() {
                Ok(package) => Err(TransferError::PackageRequired(package)),
                Err(package) => Err(TransferError::UnrecognizedOptionalPackage(package)),
            },
            None => Ok(expression),
        }
    }

    /// Parse a transfer expression and load any staged files it names.
    /// The staged files are guest temporaries and are removed once read.
    pub fn parse_expression(&self, name: &str, expression: &str) -> Result<Value, TransferError> {
        self.materialize(name, expression, &mut StagedReloader::new(self.staging))
    }

    /// Like [`parse_expression`](Self::parse_expression), but files named by
    /// the expression are read in place and never removed.
    pub fn inspect_expression(&self, name: &str, expression: &str) -> Result<Value, TransferError> {
        self.materialize(name, expression, &mut StagedReloader::borrowing(self.staging))
    }

    fn materialize(
        &self,
        name: &str,
        expression: &str,
        reloader: &mut StagedReloader<'_>,
    ) -> Result<Value, TransferError> {
        let parsed = expr::parse(expression, self.limits).map_err(|e| decode_failure(name, expression, e))?;
        parsed
            .materialize(reloader)
            .map_err(|e| decode_failure(name, expression, e))
    }
}

fn decode_failure(name: &str, expression: &str, reason: impl ToString) -> TransferError {
    TransferError::DecodeFailure {
        name: name.to_string(),
        expression: expression.to_string(),
        reason: reason.to_string(),
    }
}

fn package_placeholder(name: &str, package: &str) -> Value {
    Value::unrepresentable(
        "package-required",
        format!("{} requires package {}", name, package),
    )
}

/// Reads staged files written by the guest. Each file is adopted, read once
/// and removed, unless the reloader only borrows them.
pub struct StagedReloader<'a> {
    staging: &'a StagingConfig,
    reads: usize,
    borrow: bool,
}

impl<'a> StagedReloader<'a> {
    pub fn new(staging: &'a StagingConfig) -> Self {
        Self {
            staging,
            reads: 0,
            borrow: false,
        }
    }

    /// Reader for files the host does not own: any path is read in place and
    /// left on disk.
    pub fn borrowing(staging: &'a StagingConfig) -> Self {
        Self {
            borrow: true,
            ..Self::new(staging)
        }
    }

    /// Number of staged files read so far.
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl Reload for StagedReloader<'_> {
    type Error = StageError;

    fn table(&mut self, path: &str) -> Result<Table, StageError> {
        let table = if self.borrow {
            stage::read_table_at(Path::new(path))?
        } else {
            StagedFile::adopt(path, self.staging)?.read_table()?
        };
        self.reads += 1;
        Ok(table)
    }

    fn matrix(&mut self, path: &str) -> Result<Matrix, StageError> {
        let table = self.table(path)?;
        Ok(Matrix::from_table(&table)?)
    }
}

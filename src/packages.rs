//! Lazy loading of optional guest packages
//!
//! Julia packages take a long time to load, so the codecs for tables,
//! matrices and named vectors are only brought in when a transfer needs them.
//! Each [`Bridge`](crate::Bridge) owns one [`LazyPackageLoader`]; the state
//! lives exactly as long as the guest session it describes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::session::{Session, SessionError};

/// Optional guest package known to the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Package {
    /// Columnar file codec used for staged transfers.
    Arrow,
    /// Labelled vectors.
    NamedArrays,
    /// Tables.
    DataFrames,
}

impl Package {
    pub const ALL: [Package; 3] = [Package::Arrow, Package::NamedArrays, Package::DataFrames];

    /// Name used in `REQUIRE:<name>` sentinels.
    pub fn name(&self) -> &'static str {
        match self {
            Package::Arrow => "arrow",
            Package::NamedArrays => "namedarray",
            Package::DataFrames => "dataframes",
        }
    }

    /// Julia module name.
    pub fn module(&self) -> &'static str {
        match self {
            Package::Arrow => "Arrow",
            Package::NamedArrays => "NamedArrays",
            Package::DataFrames => "DataFrames",
        }
    }

    /// Snippet that imports the package, installing it first if needed.
    pub fn install_snippet(&self) -> String {
        let module = self.module();
        format!(
            "try\n  using {module}\ncatch\n  using Pkg\n  Pkg.add(\"{module}\")\n  using {module}\nend\n"
        )
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Package {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Package::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackageStatus {
    #[default]
    Unloaded,
    Loading,
    Loaded,
}

/// Per-session record of which optional packages are active.
#[derive(Debug, Default)]
pub struct LazyPackageLoader {
    states: BTreeMap<Package, PackageStatus>,
    installs: usize,
}

impl LazyPackageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, package: Package) -> PackageStatus {
        self.states.get(&package).copied().unwrap_or_default()
    }

    pub fn is_loaded(&self, package: Package) -> bool {
        self.status(package) == PackageStatus::Loaded
    }

    pub fn loaded(&self) -> Vec<Package> {
        self.states
            .iter()
            .filter(|(_, status)| **status == PackageStatus::Loaded)
            .map(|(package, _)| *package)
            .collect()
    }

    /// Number of install snippets submitted to the session so far.
    pub fn install_count(&self) -> usize {
        self.installs
    }

    /// Load a package by its sentinel name.
    ///
    /// Returns `Ok(false)` after warning through the session when the name is
    /// not a package this bridge knows how to install; the state is left
    /// untouched in that case.
    pub fn load<S: Session + ?Sized>(&mut self, name: &str, session: &mut S) -> Result<bool, SessionError> {
        match name.parse::<Package>() {
            Ok(package) => self.load_package(package, session),
            Err(name) => {
                warn!(package = %name, "unrecognized optional package");
                session.warn(&format!("Install of package {} is not supported.", name));
                Ok(false)
            }
        }
    }

    pub fn load_package<S: Session + ?Sized>(
        &mut self,
        package: Package,
        session: &mut S,
    ) -> Result<bool, SessionError> {
        if self.is_loaded(package) {
            return Ok(true);
        }

        debug!(%package, "installing optional package");
        self.states.insert(package, PackageStatus::Loading);
        self.installs += 1;
        let on_error = format!("Install of package {} is not supported.", package);
        match session.execute(&package.install_snippet(), true, false, &on_error) {
            Ok(()) => {
                self.states.insert(package, PackageStatus::Loaded);
                Ok(true)
            }
            Err(e) => {
                self.states.insert(package, PackageStatus::Unloaded);
                Err(e)
            }
        }
    }

    /// Forget all packages, e.g. after the guest session restarted.
    pub fn reset(&mut self) {
        self.states.clear();
    }
}

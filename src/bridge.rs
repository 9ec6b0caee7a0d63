//! Transfer surface
//!
//! A [`Bridge`] pairs one guest [`Session`] with the state that belongs to
//! it: the optional packages activated so far and whether the guest decoder
//! library is installed. It owns the session for its whole life, so two
//! transfers can never interleave on the same channel.
//!
//! ```text
//!   export:  VariableStore ─▶ classify ─▶ GuestEncoder ─▶ execute("x = ...")
//!   import:  get_response("__jlbridge_repr(x)") ─▶ HostDecoder ─▶ HostValue
//! ```

use jlbridge_value::Value;
use tracing::{debug, instrument, warn};

use crate::classify::classify_with;
use crate::config::BridgeConfig;
use crate::decode::HostDecoder;
use crate::encode::GuestEncoder;
use crate::error::TransferError;
use crate::guest::GuestLibrary;
use crate::host::{HostValue, VariableStore};
use crate::language::LanguageInfo;
use crate::packages::LazyPackageLoader;
use crate::session::{stream_text, MessageKind, Session};

pub struct Bridge<S: Session> {
    session: S,
    config: BridgeConfig,
    packages: LazyPackageLoader,
    language: LanguageInfo,
    library_installed: bool,
}

impl<S: Session> Bridge<S> {
    pub fn new(session: S) -> Self {
        Self::with_config(session, BridgeConfig::default())
    }

    pub fn with_config(session: S, config: BridgeConfig) -> Self {
        Self {
            session,
            config,
            packages: LazyPackageLoader::new(),
            language: LanguageInfo::julia(),
            library_installed: false,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn packages(&self) -> &LazyPackageLoader {
        &self.packages
    }

    pub fn language(&self) -> &LanguageInfo {
        &self.language
    }

    pub fn library_installed(&self) -> bool {
        self.library_installed
    }

    /// Install the guest decoder library unless this session already has it.
    pub fn install_library(&mut self) -> Result<(), TransferError> {
        if self.library_installed {
            return Ok(());
        }
        let library = GuestLibrary;
        debug!(version = library.version(), fingerprint = %library.fingerprint(), "installing guest library");
        self.session.execute(
            library.source(),
            false,
            true,
            "Failed to install the jlbridge decoder library",
        )?;
        self.library_installed = true;
        Ok(())
    }

    /// Copy host variables into the guest.
    ///
    /// Missing host variables are reported and skipped. Values with no
    /// transferable shape, or whose staged write fails, arrive in the guest
    /// as a placeholder string. Only channel failures end the batch.
    #[instrument(level = "debug", skip(self, vars))]
    pub fn export(
        &mut self,
        vars: &dyn VariableStore,
        names: &[&str],
        rename: Option<&str>,
    ) -> Result<(), TransferError> {
        let targets = self.language.target_names(names, rename);
        for (name, target) in names.iter().zip(targets) {
            let Some(host) = vars.get(name) else {
                warn!(%name, "host variable does not exist");
                self.session.warn(&format!("Variable {} does not exist", name));
                continue;
            };

            let value = classify_with(host, &self.config.limits);
            if let Value::Unrepresentable { description, .. } = &value {
                let error = TransferError::UnsupportedShape(description.clone());
                warn!(%name, %error, "exporting placeholder");
            }

            let encoder = GuestEncoder::new(&self.config.staging);
            let encoded = match encoder.encode_assignment(target, &value) {
                Ok(encoded) => encoded,
                Err(error @ TransferError::StagedWriteFailure { .. }) => {
                    warn!(%name, %error, "staged write failed, exporting placeholder");
                    self.session.warn(&format!("Failed to stage variable {}: {}", name, error));
                    let placeholder = Value::unrepresentable(host.type_name(), host.short_repr());
                    encoder.encode_assignment(target, &placeholder)?
                }
                Err(error) => return Err(error),
            };

            for package in &encoded.packages {
                self.packages.load_package(*package, &mut self.session)?;
            }
            self.session.execute(
                &encoded.source,
                true,
                false,
                &format!("Failed to put variable {} to julia", name),
            )?;
            debug!(%name, %target, staged = encoded.staged.len(), "exported variable");
            // Staged files are removed here, after the guest has read them.
        }
        Ok(())
    }

    /// Copy guest variables to the host.
    ///
    /// Returns `None` if any variable fails; the failure is reported through
    /// the session and no partial result is returned.
    #[instrument(level = "debug", skip(self))]
    pub fn import(&mut self, names: &[&str], rename: Option<&str>) -> Option<Vec<(String, HostValue)>> {
        match self.try_import(names, rename) {
            Ok(values) => Some(values),
            Err(error) => {
                warn!(%error, "import aborted");
                let message = match &error {
                    TransferError::DecodeFailure {
                        name,
                        expression,
                        reason,
                    } => format!("Failed to evaluate {:?} for variable {}: {}", expression, name, reason),
                    other => other.to_string(),
                };
                self.session.warn(&message);
                None
            }
        }
    }

    /// [`import`](Self::import) that writes the result into `vars`.
    /// Nothing is written unless the whole batch succeeds.
    pub fn import_into(&mut self, vars: &mut dyn VariableStore, names: &[&str], rename: Option<&str>) -> bool {
        match self.import(names, rename) {
            Some(values) => {
                for (name, value) in values {
                    vars.set(&name, value);
                }
                true
            }
            None => false,
        }
    }

    /// Import that surfaces the error instead of reporting it.
    pub fn try_import(
        &mut self,
        names: &[&str],
        rename: Option<&str>,
    ) -> Result<Vec<(String, HostValue)>, TransferError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        self.install_library()?;

        let targets = self.language.target_names(names, rename);
        let decoder = HostDecoder::new(&self.config.limits, &self.config.staging);
        let mut values = Vec::with_capacity(names.len());
        for (name, target) in names.iter().zip(targets) {
            let value = decoder.decode(name, &mut self.session, &mut self.packages)?;
            debug!(%name, shape = value.shape().name(), "imported variable");
            values.push((target.to_string(), HostValue::from(value)));
        }
        Ok(values)
    }

    /// Version details of the guest interpreter.
    pub fn session_info(&mut self) -> Result<String, TransferError> {
        let response = self.session.get_response(
            "versioninfo(verbose=true)",
            &[MessageKind::Stream],
            Some(&["stdout"][..]),
        )?;
        Ok(stream_text(&response))
    }

    /// Forget per-session state after the guest restarted.
    pub fn reset_session(&mut self) {
        self.packages.reset();
        self.library_installed = false;
    }
}

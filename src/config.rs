//! Bridge configuration
//!
//! All settings have defaults; a config file only needs to name the fields it
//! overrides.
//!
//! ```json
//! { "limits": { "max_depth": 32 }, "staging": { "dir": "/scratch" } }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Resource limits applied while classifying and parsing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Deepest container nesting accepted in either direction.
    pub max_depth: usize,
    /// Largest transfer expression the host will parse, in bytes.
    pub max_expression_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: 64,
            max_expression_len: 64 * 1024 * 1024,
        }
    }
}

/// Where and how staged transfer files are created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Directory for staged files; the process temp directory when unset.
    pub dir: Option<PathBuf>,
    /// File name prefix of files the host stages.
    pub prefix: String,
    /// File name prefix of files the guest stages (Julia's `tempname()`).
    pub guest_prefix: String,
    pub suffix: String,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            prefix: "jlbridge-".to_string(),
            guest_prefix: "jl_".to_string(),
            suffix: ".feather".to_string(),
        }
    }
}

impl StagingConfig {
    pub fn dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Whether `path` looks like a file the guest staged for this bridge:
    /// directly inside the staging directory, named like `tempname()`
    /// output plus the suffix.
    pub fn accepts(&self, path: &Path) -> bool {
        if !path.is_absolute() {
            return false;
        }
        let named = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| {
                name.len() > self.guest_prefix.len() + self.suffix.len()
                    && name.starts_with(&self.guest_prefix)
                    && name.ends_with(&self.suffix)
            });
        named && path.parent().is_some_and(|parent| same_dir(parent, &self.dir()))
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    // The temp directory is often reached through a symlink (/tmp on macOS).
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub limits: Limits,
    pub staging: StagingConfig,
}

impl BridgeConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        Self::from_json(&text)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path.display(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config = BridgeConfig::from_json(r#"{"limits": {"max_depth": 8}}"#).unwrap();
        assert_eq!(config.limits.max_depth, 8);
        assert_eq!(config.limits.max_expression_len, Limits::default().max_expression_len);
        assert_eq!(config.staging, StagingConfig::default());
    }

    #[test]
    fn only_guest_temp_files_are_accepted() {
        let staging = StagingConfig::default();
        let dir = std::env::temp_dir();
        assert!(staging.accepts(&dir.join("jl_abc.feather")));
        assert!(!staging.accepts(&dir.join("jl_.feather")));
        assert!(!staging.accepts(&dir.join("jl_abc")));
        assert!(!staging.accepts(&dir.join("mydata.feather")));
        assert!(!staging.accepts(&dir.join("nested").join("jl_abc.feather")));
        assert!(!staging.accepts(Path::new("/etc/passwd")));
        assert!(!staging.accepts(Path::new("jl_abc.feather")));
    }
}

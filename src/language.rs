//! Julia language descriptor
//!
//! Static facts a notebook front end needs about the guest language: which
//! kernels speak Julia, the colour of its cells, and which variable a line of
//! code assigns to.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

static ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([_A-Za-z0-9\.]+)\s*=.*$").expect("assignment pattern is valid")
});

#[derive(Debug, Clone)]
pub struct LanguageInfo {
    pub name: &'static str,
    pub background_color: &'static str,
    /// Kernel name globs, e.g. `julia-?.?`.
    pub kernel_patterns: &'static [&'static str],
}

impl LanguageInfo {
    pub fn julia() -> Self {
        Self {
            name: "Julia",
            background_color: "#ebd8eb",
            kernel_patterns: &["julia-?.?"],
        }
    }

    /// Whether `kernel` (e.g. `julia-1.9`) is a kernel for this language.
    pub fn matches_kernel(&self, kernel: &str) -> bool {
        self.kernel_patterns
            .iter()
            .any(|pattern| glob_regex(pattern).is_some_and(|re| re.is_match(kernel)))
    }

    /// Variable assigned by a line such as `x = 1`.
    pub fn assigned_variable<'l>(&self, line: &'l str) -> Option<&'l str> {
        ASSIGNMENT
            .captures(line)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str())
    }

    /// Names the transferred variables get on the receiving side.
    ///
    /// With a rename every name maps to it, so only the last transfer
    /// survives; that is reported once.
    pub fn target_names<'n>(&self, names: &[&'n str], rename: Option<&'n str>) -> Vec<&'n str> {
        match rename {
            Some(rename) => {
                if names.len() > 1 {
                    warn!(%rename, count = names.len(), "several variables share one name");
                }
                names.iter().map(|_| rename).collect()
            }
            None => names.to_vec(),
        }
    }
}

/// `?` matches one character, `*` any run; everything else is literal.
fn glob_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '?' => re.push('.'),
            '*' => re.push_str(".*"),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

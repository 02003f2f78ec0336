//! Release identifier resolution.
//!
//! The identifier comes from `--ref` when given, otherwise from the project's
//! `VERSION` file. Path separators are replaced so refs like
//! `refs/tags/v1.2.3` can be embedded in file names.

use anyhow::{Context, Result, bail};
use std::fmt;
use std::path::Path;

/// Name of the version file at the project root.
pub const VERSION_FILE_NAME: &str = "VERSION";

/// A release identifier that is safe to embed in archive file names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseId(String);

impl ReleaseId {
    /// Build an identifier from a raw ref, normalizing path separators to `_`.
    pub fn from_raw(raw: &str) -> Self {
        Self(raw.replace(['/', '\\'], "_"))
    }

    /// Resolve the release identifier for a run.
    ///
    /// Priority:
    /// 1. `ref_override` (the `--ref` flag), if non-empty after trimming
    /// 2. trimmed contents of `<root>/VERSION`
    pub fn resolve(ref_override: Option<&str>, root: &Path) -> Result<Self> {
        if let Some(r) = ref_override.map(str::trim).filter(|r| !r.is_empty()) {
            return Ok(Self::from_raw(r));
        }

        let path = root.join(VERSION_FILE_NAME);
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read version file at {}", path.display()))?;
        let version = contents.trim();
        if version.is_empty() {
            bail!("version file at {} is empty", path.display());
        }
        Ok(Self::from_raw(version))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

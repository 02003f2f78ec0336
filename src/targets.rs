//! The cross-compilation target matrix.
//!
//! Each [`TargetDescriptor`] names one `GOOS`/`GOARCH` pair, the directory and
//! archive suffix it is published under, and the archive format used for it.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path};

/// Archive format produced for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    /// `.zip`, used for Windows targets.
    Zip,
    /// Gzip-compressed tarball (`.tar.gz`).
    Gztar,
}

impl ArchiveFormat {
    /// File extension including the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => ".zip",
            ArchiveFormat::Gztar => ".tar.gz",
        }
    }

    /// Tag as written in config files.
    pub fn tag(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Gztar => "gztar",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One entry of the build matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    /// Toolchain OS identifier, exported as `GOOS`.
    pub os: String,
    /// Toolchain architecture identifier, exported as `GOARCH`.
    pub arch: String,
    /// Human-readable target name (e.g. "linux-x86_64").
    pub name: String,
    pub format: ArchiveFormat,
}

impl TargetDescriptor {
    pub fn new(os: &str, arch: &str, name: &str, format: ArchiveFormat) -> Self {
        Self {
            os: os.to_string(),
            arch: arch.to_string(),
            name: name.to_string(),
            format,
        }
    }

    /// Archive file name for this target: `{prefix}-{release}-{name}{ext}`.
    pub fn archive_file_name(&self, prefix: &str, release: &str) -> String {
        format!(
            "{prefix}-{release}-{}{}",
            self.name,
            self.format.extension()
        )
    }
}

/// The matrix every release is built for, in build order.
pub fn default_targets() -> Vec<TargetDescriptor> {
    use ArchiveFormat::{Gztar, Zip};

    [
        ("windows", "amd64", "windows-x86_64", Zip),
        ("windows", "arm64", "windows-arm64", Zip),
        ("darwin", "amd64", "macos-x86_64", Gztar),
        ("darwin", "arm64", "macos-arm64", Gztar),
        ("linux", "amd64", "linux-x86_64", Gztar),
        ("linux", "arm64", "linux-arm64", Gztar),
        ("linux", "386", "linux-i386", Gztar),
        ("freebsd", "amd64", "freebsd-x86_64", Gztar),
        ("freebsd", "arm64", "freebsd-arm64", Gztar),
        ("freebsd", "386", "freebsd-i386", Gztar),
    ]
    .into_iter()
    .map(|(os, arch, name, format)| TargetDescriptor::new(os, arch, name, format))
    .collect()
}

/// Reject matrices that would produce colliding output paths.
pub fn validate_targets(targets: &[TargetDescriptor]) -> Result<()> {
    if targets.is_empty() {
        bail!("target matrix is empty");
    }

    let mut seen = HashSet::new();
    for t in targets {
        if t.os.trim().is_empty() || t.arch.trim().is_empty() || t.name.trim().is_empty() {
            bail!("target entry has an empty os, arch or name: {t:?}");
        }
        if t.name.contains(['/', '\\']) || !is_single_normal_component(&t.name) {
            bail!(
                "target name '{}' must be a plain directory name (no separators, '.' or '..')",
                t.name
            );
        }
        if !seen.insert(t.name.as_str()) {
            bail!("duplicate target name '{}' in matrix", t.name);
        }
    }
    Ok(())
}

/// True when `name` is exactly one ordinary path component.
fn is_single_normal_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Restrict `all` to the names in `only`, keeping matrix order.
///
/// An empty `only` selects everything. Unknown names are an error that
/// lists what is available.
pub fn select_targets(all: &[TargetDescriptor], only: &[String]) -> Result<Vec<TargetDescriptor>> {
    if only.is_empty() {
        return Ok(all.to_vec());
    }

    for wanted in only {
        if !all.iter().any(|t| &t.name == wanted) {
            bail!(
                "Unknown target '{wanted}'. Available targets: [{}]",
                all.iter()
                    .map(|t| t.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }

    Ok(all
        .iter()
        .filter(|t| only.contains(&t.name))
        .cloned()
        .collect())
}

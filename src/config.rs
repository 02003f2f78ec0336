//! Packaging configuration.
//!
//! An optional `dist.toml` at the project root can override the archive
//! prefix, the toolchain program, the output locations and the target
//! matrix. Every field is optional; absent or empty values resolve to the
//! built-in defaults.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

use crate::targets::{self, TargetDescriptor};

/// Config file looked up at the project root when `--config` is not given.
pub const CONFIG_FILE_NAME: &str = "dist.toml";

/// Default archive name prefix.
pub const DEFAULT_PREFIX: &str = "vince";

/// Default toolchain program.
pub const DEFAULT_BUILD_PROGRAM: &str = "go";

/// Default parent directory of per-target build output, relative to the root.
pub const DEFAULT_OUTPUT_DIR: &str = "target";

/// Default directory for packaged archives, relative to the root.
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

/// Contents of `dist.toml`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DistConfig {
    /// Prefix of every archive name (`{prefix}-{release}-{target}`).
    pub prefix: Option<String>,
    /// Program invoked for `build` and `mod tidy`.
    pub build_program: Option<String>,
    /// Parent directory of `<target-name>/` build output.
    pub output_dir: Option<String>,
    /// Directory archives are written to.
    pub artifacts_dir: Option<String>,
    /// Replaces the built-in matrix when present.
    pub targets: Option<Vec<TargetDescriptor>>,
}

impl DistConfig {
    /// Default config path for a project root.
    pub fn default_path(root: &Path) -> PathBuf {
        root.join(CONFIG_FILE_NAME)
    }

    /// Load config for a run.
    ///
    /// With `explicit`, the file must exist. Otherwise `<root>/dist.toml` is
    /// read if present and defaults are used if it is not. Parse errors are
    /// always hard failures.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => {
                let path = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    root.join(path)
                };
                let contents = std::fs::read_to_string(&path).with_context(|| {
                    format!("failed to read config file at {}", path.display())
                })?;
                Self::parse(&contents, &path)
            }
            None => Self::load_from(&Self::default_path(root)),
        }
    }

    /// Load config from a specific path. Returns defaults if the file does not exist.
    fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => {
                Err(e).with_context(|| format!("failed to read config file at {}", path.display()))
            }
        }
    }

    fn parse(contents: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .with_context(|| format!("failed to parse config file at {}", path.display()))?;
        if let Some(targets) = &config.targets {
            targets::validate_targets(targets)
                .with_context(|| format!("invalid target matrix in {}", path.display()))?;
        }
        for (key, value) in [
            ("output_dir", &config.output_dir),
            ("artifacts_dir", &config.artifacts_dir),
        ] {
            if let Some(dir) = non_empty(value) {
                validate_relative_dir(key, dir)
                    .with_context(|| format!("invalid config file at {}", path.display()))?;
            }
        }
        let prefix = config.prefix();
        if prefix.contains(['/', '\\']) {
            bail!(
                "prefix '{prefix}' in {} must not contain path separators",
                path.display()
            );
        }
        Ok(config)
    }

    pub fn prefix(&self) -> &str {
        non_empty(&self.prefix).unwrap_or(DEFAULT_PREFIX)
    }

    pub fn build_program(&self) -> &str {
        non_empty(&self.build_program).unwrap_or(DEFAULT_BUILD_PROGRAM)
    }

    pub fn output_dir(&self) -> &str {
        non_empty(&self.output_dir).unwrap_or(DEFAULT_OUTPUT_DIR)
    }

    pub fn artifacts_dir(&self) -> &str {
        non_empty(&self.artifacts_dir).unwrap_or(DEFAULT_ARTIFACTS_DIR)
    }

    /// The effective matrix: configured targets, or the built-in list.
    pub fn targets(&self) -> Vec<TargetDescriptor> {
        match &self.targets {
            Some(t) => t.clone(),
            None => targets::default_targets(),
        }
    }
}

/// Treat empty or whitespace-only strings as absent.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Output locations must stay inside the project root: relative, and made of
/// ordinary components only.
fn validate_relative_dir(key: &str, dir: &str) -> Result<()> {
    let path = Path::new(dir);
    let ordinary = path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    let named = path.components().any(|c| matches!(c, Component::Normal(_)));
    if !ordinary || !named {
        bail!("{key} '{dir}' must be a relative path inside the project root without '..'");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets::ArchiveFormat;
    use tempfile::TempDir;

    fn root_with_config(contents: &str) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), contents).unwrap();
        dir
    }

    #[test]
    fn missing_default_config_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = DistConfig::load(dir.path(), None).unwrap();
        assert_eq!(config, DistConfig::default());
        assert_eq!(config.prefix(), "vince");
        assert_eq!(config.build_program(), "go");
        assert_eq!(config.output_dir(), "target");
        assert_eq!(config.artifacts_dir(), "artifacts");
        assert_eq!(config.targets(), targets::default_targets());
    }

    #[test]
    fn missing_explicit_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DistConfig::load(dir.path(), Some(Path::new("other.toml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn explicit_relative_path_is_resolved_against_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ci.toml"), "prefix = \"vince-ci\"\n").unwrap();
        let config = DistConfig::load(dir.path(), Some(Path::new("ci.toml"))).unwrap();
        assert_eq!(config.prefix(), "vince-ci");
    }

    #[test]
    fn scalar_overrides() {
        let dir = root_with_config(
            "prefix = \"tool\"\nbuild_program = \"/opt/go/bin/go\"\noutput_dir = \"out\"\nartifacts_dir = \"dist\"\n",
        );
        let config = DistConfig::load(dir.path(), None).unwrap();
        assert_eq!(config.prefix(), "tool");
        assert_eq!(config.build_program(), "/opt/go/bin/go");
        assert_eq!(config.output_dir(), "out");
        assert_eq!(config.artifacts_dir(), "dist");
    }

    #[test]
    fn empty_strings_fall_back_to_defaults() {
        let dir = root_with_config("prefix = \"  \"\nbuild_program = \"\"\n");
        let config = DistConfig::load(dir.path(), None).unwrap();
        assert_eq!(config.prefix(), DEFAULT_PREFIX);
        assert_eq!(config.build_program(), DEFAULT_BUILD_PROGRAM);
    }

    #[test]
    fn configured_matrix_replaces_default() {
        let dir = root_with_config(
            r#"
[[targets]]
os = "linux"
arch = "riscv64"
name = "linux-riscv64"
format = "gztar"

[[targets]]
os = "windows"
arch = "386"
name = "windows-i386"
format = "zip"
"#,
        );
        let config = DistConfig::load(dir.path(), None).unwrap();
        let targets = config.targets();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].name, "linux-riscv64");
        assert_eq!(targets[1].format, ArchiveFormat::Zip);
    }

    #[test]
    fn duplicate_target_names_rejected() {
        let dir = root_with_config(
            r#"
[[targets]]
os = "linux"
arch = "amd64"
name = "same"
format = "gztar"

[[targets]]
os = "linux"
arch = "arm64"
name = "same"
format = "gztar"
"#,
        );
        let err = DistConfig::load(dir.path(), None).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate target name"));
    }

    #[test]
    fn unknown_archive_format_rejected() {
        let dir = root_with_config(
            "[[targets]]\nos = \"linux\"\narch = \"amd64\"\nname = \"l\"\nformat = \"rar\"\n",
        );
        assert!(DistConfig::load(dir.path(), None).is_err());
    }

    #[test]
    fn unknown_key_rejected() {
        let dir = root_with_config("prefx = \"typo\"\n");
        let err = DistConfig::load(dir.path(), None).unwrap_err();
        assert!(err.to_string().contains("failed to parse config file"));
    }

    #[test]
    fn output_locations_must_stay_under_root() {
        for (key, value) in [
            ("output_dir", "/"),
            ("output_dir", ".."),
            ("output_dir", "."),
            ("artifacts_dir", "../outside"),
            ("artifacts_dir", "dist/../../x"),
            ("artifacts_dir", "/tmp/artifacts"),
        ] {
            let dir = root_with_config(&format!("{key} = \"{value}\"\n"));
            let err = DistConfig::load(dir.path(), None).unwrap_err();
            assert!(
                format!("{err:#}").contains("relative path inside the project root"),
                "{key}={value}: {err:#}"
            );
        }
    }

    #[test]
    fn nested_output_locations_are_allowed() {
        let dir = root_with_config("output_dir = \"build/out\"\nartifacts_dir = \"./dist\"\n");
        let config = DistConfig::load(dir.path(), None).unwrap();
        assert_eq!(config.output_dir(), "build/out");
        assert_eq!(config.artifacts_dir(), "./dist");
    }

    #[test]
    fn dot_dot_target_name_rejected() {
        let dir = root_with_config(
            "[[targets]]\nos = \"linux\"\narch = \"amd64\"\nname = \"..\"\nformat = \"gztar\"\n",
        );
        let err = DistConfig::load(dir.path(), None).unwrap_err();
        assert!(format!("{err:#}").contains("plain directory name"));
    }

    #[test]
    fn prefix_with_separator_rejected() {
        let dir = root_with_config("prefix = \"../vince\"\n");
        let err = DistConfig::load(dir.path(), None).unwrap_err();
        assert!(err.to_string().contains("must not contain path separators"));
    }
}

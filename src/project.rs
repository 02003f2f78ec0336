//! Project root resolution.
//!
//! Every path the packager reads or writes is relative to the project root,
//! and every subprocess runs there. The root is resolved once and passed
//! around explicitly; the process working directory is never changed.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

use crate::git;
use crate::release::VERSION_FILE_NAME;

/// Environment variable that overrides root discovery.
pub const ROOT_ENV_VAR: &str = "VINCE_DIST_ROOT";

/// Resolve the project root.
///
/// Priority (highest wins):
/// 1. `explicit`, the `--root` CLI flag
/// 2. `VINCE_DIST_ROOT` environment variable
/// 3. nearest ancestor of the running executable that contains `VERSION`
/// 4. `git rev-parse --show-toplevel` from the current directory
///
/// Empty values at any layer fall through to the next.
pub fn resolve_root(explicit: Option<&Path>) -> Result<PathBuf> {
    let env_value = std::env::var(ROOT_ENV_VAR).ok();
    let exe = std::env::current_exe().ok();
    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    resolve_root_with(explicit, env_value.as_deref(), exe.as_deref(), &cwd)
}

/// Resolver with every input supplied by the caller.
pub fn resolve_root_with(
    explicit: Option<&Path>,
    env_value: Option<&str>,
    exe: Option<&Path>,
    cwd: &Path,
) -> Result<PathBuf> {
    let configured = explicit
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .or_else(|| {
            env_value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        });

    if let Some(root) = configured {
        let root = if root.is_absolute() { root } else { cwd.join(root) };
        if !root.is_dir() {
            bail!("project root {} is not a directory", root.display());
        }
        return Ok(root);
    }

    if let Some(root) = exe.and_then(find_marked_ancestor) {
        return Ok(root);
    }

    git::repo_root(cwd).context(
        "could not locate the project root; pass --root or set VINCE_DIST_ROOT",
    )
}

/// Walk up from `start` looking for a directory that holds a `VERSION` file.
fn find_marked_ancestor(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .skip(1)
        .find(|dir| dir.join(VERSION_FILE_NAME).is_file())
        .map(Path::to_path_buf)
}

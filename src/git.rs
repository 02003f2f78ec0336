//! Git helpers used as the last resort for locating the project root.
//!
//! Shells out to `git` via `std::process::Command`.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Run a git command in `dir` and return its stdout as a trimmed `String`.
/// Returns an error if the command exits with a non-zero status.
fn git_output(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .context("failed to execute git")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "git {} failed (exit {}): {}",
            args.join(" "),
            output.status,
            stderr.trim()
        );
    }

    let stdout = String::from_utf8(output.stdout).context("git output was not valid UTF-8")?;
    Ok(stdout.trim().to_string())
}

/// Return the top-level directory of the repository containing `dir`
/// (`git rev-parse --show-toplevel`).
pub fn repo_root(dir: &Path) -> Result<PathBuf> {
    let path = git_output(dir, &["rev-parse", "--show-toplevel"])?;
    if path.is_empty() {
        bail!("git reported an empty repository root for {}", dir.display());
    }
    Ok(PathBuf::from(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_root_of_fresh_repository() {
        let dir = tempfile::tempdir().unwrap();
        let init = Command::new("git")
            .args(["init", "-q"])
            .current_dir(dir.path())
            .status();
        if !matches!(init, Ok(s) if s.success()) {
            // git not installed in this environment
            return;
        }

        let root = repo_root(dir.path()).unwrap();
        assert_eq!(
            root.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }
}

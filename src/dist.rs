//! The build-and-package run over the target matrix.
//!
//! For each target, in order: ensure `<output_dir>/<name>/` exists, run the
//! toolchain with `GOOS`/`GOARCH` set for that target, then archive the
//! directory's contents into `<artifacts_dir>/<prefix>-<release>-<name>.<ext>`.
//! The first failing step ends the run.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::archive;
use crate::checksums;
use crate::output;
use crate::process::{EnvOverlay, Executor, Invocation};
use crate::release::ReleaseId;
use crate::targets::{self, TargetDescriptor};

/// Where a run reads and writes, all under the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub root: PathBuf,
    /// Parent of per-target output, relative to `root` (`target`).
    pub output_dir: String,
    /// Archive directory, relative to `root` (`artifacts`).
    pub artifacts_dir: String,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>, output_dir: &str, artifacts_dir: &str) -> Self {
        Self {
            root: root.into(),
            output_dir: output_dir.trim_end_matches('/').to_string(),
            artifacts_dir: artifacts_dir.trim_end_matches('/').to_string(),
        }
    }

    /// On-disk output directory for a target.
    pub fn target_dir(&self, target: &TargetDescriptor) -> PathBuf {
        self.root.join(&self.output_dir).join(&target.name)
    }

    /// Output directory as passed to the toolchain, relative to the root with
    /// a trailing slash (`target/linux-x86_64/`).
    pub fn target_dir_arg(&self, target: &TargetDescriptor) -> String {
        format!("{}/{}/", self.output_dir, target.name)
    }

    pub fn artifacts_path(&self) -> PathBuf {
        self.root.join(&self.artifacts_dir)
    }
}

/// Flags controlling a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DistOptions {
    /// Refresh the dependency lock (`go mod tidy`) before building.
    pub tidy: bool,
    /// Build against the vendored dependency set (`-mod vendor`).
    pub locked: bool,
    /// Remove each target's output directory before building it.
    pub clean: bool,
    /// Write a SHA256 manifest next to the archives.
    pub checksums: bool,
}

/// Everything needed to run the matrix.
#[derive(Debug, Clone)]
pub struct DistPlan {
    pub layout: Layout,
    pub build_program: String,
    pub prefix: String,
    pub release: ReleaseId,
    pub targets: Vec<TargetDescriptor>,
    pub options: DistOptions,
}

/// One packaged target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedTarget {
    pub target: String,
    pub archive: PathBuf,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistReport {
    /// Archives in matrix order.
    pub packaged: Vec<PackagedTarget>,
    pub checksums: Option<PathBuf>,
}

impl DistReport {
    pub fn archives(&self) -> Vec<PathBuf> {
        self.packaged.iter().map(|p| p.archive.clone()).collect()
    }
}

/// The dependency lock refresh command: `<program> mod tidy`.
pub fn tidy_invocation(build_program: &str, layout: &Layout) -> Invocation {
    Invocation::new(build_program, &layout.root).args(["mod", "tidy"])
}

/// The build command for one target:
/// `<program> build -v [-mod vendor] -o <output_dir>/<name>/ .`
/// with `GOOS`/`GOARCH` in the overlay.
pub fn build_invocation(
    build_program: &str,
    target: &TargetDescriptor,
    layout: &Layout,
    options: &DistOptions,
) -> Invocation {
    let mut args = vec!["build".to_string(), "-v".to_string()];
    if options.locked {
        args.extend(["-mod".to_string(), "vendor".to_string()]);
    }
    args.extend(["-o".to_string(), layout.target_dir_arg(target), ".".to_string()]);

    Invocation::new(build_program, &layout.root)
        .args(args)
        .env(
            EnvOverlay::new()
                .with("GOOS", &target.os)
                .with("GOARCH", &target.arch),
        )
}

/// Where a target's archive is written.
pub fn archive_path(plan: &DistPlan, target: &TargetDescriptor) -> PathBuf {
    plan.layout
        .artifacts_path()
        .join(target.archive_file_name(&plan.prefix, plan.release.as_str()))
}

fn prepare_target_dir(dir: &Path, clean: bool) -> Result<()> {
    if clean && dir.exists() {
        output::note(&format!("removing previous output in {}", dir.display()));
        std::fs::remove_dir_all(dir)
            .with_context(|| format!("failed to clean {}", dir.display()))?;
    }
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))
}

/// Build and package every target of `plan.targets`, in order.
///
/// Stops at the first failure; targets after it are not touched.
pub fn run_matrix(plan: &DistPlan, executor: &dyn Executor) -> Result<Vec<PackagedTarget>> {
    targets::validate_targets(&plan.targets)?;
    let mut packaged = Vec::with_capacity(plan.targets.len());

    for target in &plan.targets {
        let dir = plan.layout.target_dir(target);
        prepare_target_dir(&dir, plan.options.clean)?;

        output::action("Building", &format!("target {}", target.name));
        let invocation = build_invocation(&plan.build_program, target, &plan.layout, &plan.options);
        executor.run(&invocation)?;

        output::action(
            "Archiving",
            &format!("\"{}\"", plan.layout.target_dir_arg(target)),
        );
        let archive = archive_path(plan, target);
        archive::create_archive(&dir, &archive, target.format)
            .with_context(|| format!("failed to package target {}", target.name))?;
        output::success("Packaged", &archive.display().to_string());

        packaged.push(PackagedTarget {
            target: target.name.clone(),
            archive,
        });
    }

    Ok(packaged)
}

/// Full run: optional lock refresh, the matrix, then the optional manifest.
pub fn run(plan: &DistPlan, executor: &dyn Executor) -> Result<DistReport> {
    if plan.options.tidy {
        output::action("Tidying", "dependency lock");
        executor.run(&tidy_invocation(&plan.build_program, &plan.layout))?;
    }

    let packaged = run_matrix(plan, executor)?;
    let mut report = DistReport {
        packaged,
        checksums: None,
    };

    if plan.options.checksums {
        let path = checksums::write_manifest(&plan.layout.artifacts_path(), &report.archives())?;
        output::success("Checksums", &path.display().to_string());
        report.checksums = Some(path);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets::{ArchiveFormat, default_targets};

    fn linux() -> TargetDescriptor {
        TargetDescriptor::new("linux", "amd64", "linux-x86_64", ArchiveFormat::Gztar)
    }

    #[test]
    fn build_invocation_for_linux() {
        let layout = Layout::new("/proj", "target", "artifacts");
        let inv = build_invocation("go", &linux(), &layout, &DistOptions::default());
        assert_eq!(inv.display(), "go build -v -o target/linux-x86_64/ .");
        assert_eq!(inv.env.get("GOOS"), Some("linux"));
        assert_eq!(inv.env.get("GOARCH"), Some("amd64"));
        assert_eq!(inv.cwd, PathBuf::from("/proj"));
    }

    #[test]
    fn locked_adds_vendor_mode() {
        let layout = Layout::new("/proj", "target", "artifacts");
        let options = DistOptions {
            locked: true,
            ..DistOptions::default()
        };
        let inv = build_invocation("go", &linux(), &layout, &options);
        assert_eq!(inv.display(), "go build -v -mod vendor -o target/linux-x86_64/ .");
    }

    #[test]
    fn tidy_runs_in_root() {
        let layout = Layout::new("/proj", "target", "artifacts");
        let inv = tidy_invocation("go", &layout);
        assert_eq!(inv.display(), "go mod tidy");
        assert!(inv.env.is_empty());
        assert_eq!(inv.cwd, PathBuf::from("/proj"));
    }

    #[test]
    fn every_default_target_gets_its_own_directory() {
        let layout = Layout::new("/proj", "target/", "artifacts");
        for t in default_targets() {
            assert_eq!(layout.target_dir_arg(&t), format!("target/{}/", t.name));
            assert_eq!(
                layout.target_dir(&t),
                PathBuf::from("/proj").join("target").join(&t.name)
            );
        }
    }

    #[test]
    fn prepare_is_idempotent_and_clean_removes_stale_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("target").join("linux-x86_64");

        prepare_target_dir(&dir, false).unwrap();
        std::fs::write(dir.join("stale"), b"old").unwrap();
        prepare_target_dir(&dir, false).unwrap();
        assert!(dir.join("stale").exists());

        prepare_target_dir(&dir, true).unwrap();
        assert!(dir.is_dir());
        assert!(!dir.join("stale").exists());
    }
}

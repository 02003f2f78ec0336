use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process;

use vince_dist::config::DistConfig;
use vince_dist::dist::{self, DistOptions, DistPlan, Layout};
use vince_dist::output;
use vince_dist::process::{ProcessError, SystemExecutor};
use vince_dist::project;
use vince_dist::release::ReleaseId;
use vince_dist::targets::{self, TargetDescriptor};

/// Cross-compile vince for every supported platform and package each build
/// into a release archive under `artifacts/`.
#[derive(Parser, Debug)]
#[command(
    name = "vince-dist",
    version,
    about,
    after_help = "Examples:\n  vince-dist\n  vince-dist --tidy\n  vince-dist --locked --ref refs/tags/v1.2.3\n  vince-dist --only linux-x86_64 --only windows-x86_64\n  vince-dist --list"
)]
struct Cli {
    /// Run `go mod tidy` before building.
    #[arg(long)]
    tidy: bool,

    /// Use locked package deps from `vendor/`.
    #[arg(long)]
    locked: bool,

    /// Ref tag for CD (if empty, the VERSION file is used).
    #[arg(long = "ref", value_name = "REF")]
    git_ref: Option<String>,

    /// Build only the named target; may be repeated.
    #[arg(long, value_name = "TARGET")]
    only: Vec<String>,

    /// Remove each target's output directory before building it.
    #[arg(long)]
    clean: bool,

    /// Write artifacts/checksums-sha256.txt for the produced archives.
    #[arg(long)]
    checksums: bool,

    /// Project root (defaults to VINCE_DIST_ROOT, then discovery).
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Config file (defaults to dist.toml in the project root, if present).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the target matrix and exit.
    #[arg(long)]
    list: bool,

    /// Show environment overrides for each command.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> DistOptions {
        DistOptions {
            tidy: self.tidy,
            locked: self.locked,
            clean: self.clean,
            checksums: self.checksums,
        }
    }
}

fn print_matrix(targets: &[TargetDescriptor]) {
    for t in targets {
        println!(
            "{:<16} {:<8} {:<6} {}",
            t.name,
            t.os,
            t.arch,
            t.format.extension()
        );
    }
}

fn run(cli: Cli) -> Result<()> {
    output::set_verbose(cli.verbose);

    let root = project::resolve_root(cli.root.as_deref())?;
    output::verbose_detail(&format!("project root: {}", root.display()));

    let config = DistConfig::load(&root, cli.config.as_deref())?;
    let matrix = targets::select_targets(&config.targets(), &cli.only)?;

    if cli.list {
        print_matrix(&matrix);
        return Ok(());
    }

    let release = ReleaseId::resolve(cli.git_ref.as_deref(), &root)?;
    output::action("Release", release.as_str());

    let plan = DistPlan {
        layout: Layout::new(&root, config.output_dir(), config.artifacts_dir()),
        build_program: config.build_program().to_string(),
        prefix: config.prefix().to_string(),
        release,
        targets: matrix,
        options: cli.options(),
    };

    let report = dist::run(&plan, &SystemExecutor)?;
    output::success(
        "Done",
        &format!("packaged {} target(s)", report.packaged.len()),
    );
    Ok(())
}

/// Exit code for a failed run: the failing subprocess's own code, else 1.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ProcessError>())
        .map_or(1, ProcessError::exit_code)
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        output::fail("error:", &format!("{e:#}"));
        process::exit(exit_code_for(&e));
    }
}

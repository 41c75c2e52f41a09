//! Development tasks for the tds-dissect workspace.
//!
//! Run with `cargo run -p xtask -- <command>`.
//!
//! - `ci`: format check, clippy, tests (all feature sets)
//! - `fmt`, `clippy`, `test`, `doc`, `bench`
//! - `fuzz`: run one or every cargo-fuzz target (nightly)

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use xshell::{Shell, cmd};

#[derive(Parser)]
#[command(name = "xtask", about = "Development tasks for tds-dissect")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Format check, clippy and tests
    Ci,
    /// Run cargo fmt (--check by default)
    Fmt {
        /// Apply formatting
        #[arg(long)]
        fix: bool,
    },
    /// Run clippy over all targets, denying warnings
    Clippy,
    /// Run tests with default features, no features and all features
    Test {
        /// Test a single package
        #[arg(short, long)]
        package: Option<String>,
    },
    /// Build documentation
    Doc {
        /// Open in a browser
        #[arg(long)]
        open: bool,
    },
    /// Run the token decoding benchmarks
    Bench {
        /// Benchmark filter
        filter: Option<String>,
    },
    /// Run fuzz targets (requires cargo-fuzz and nightly)
    Fuzz {
        /// Target to run; every target when omitted
        target: Option<String>,
        /// Seconds per target
        #[arg(long, default_value = "60")]
        max_time: u64,
        /// List targets and exit
        #[arg(long)]
        list: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;
    sh.change_dir(workspace_root()?);

    match cli.command {
        Command::Ci => {
            fmt(&sh, false)?;
            clippy(&sh)?;
            test(&sh, None)?;
            println!("CI checks passed");
        }
        Command::Fmt { fix } => fmt(&sh, fix)?,
        Command::Clippy => clippy(&sh)?,
        Command::Test { package } => test(&sh, package.as_deref())?,
        Command::Doc { open } => {
            let open = open.then_some("--open");
            cmd!(sh, "cargo doc --workspace --all-features --no-deps {open...}").run()?;
        }
        Command::Bench { filter } => {
            cmd!(sh, "cargo bench -p tds-wire -- {filter...}").run()?;
        }
        Command::Fuzz {
            target,
            max_time,
            list,
        } => fuzz(&sh, target.as_deref(), max_time, list)?,
    }

    Ok(())
}

fn workspace_root() -> Result<PathBuf> {
    let output = std::process::Command::new(env!("CARGO"))
        .args(["locate-project", "--workspace", "--message-format=plain"])
        .output()
        .context("failed to run cargo locate-project")?;
    let manifest = String::from_utf8(output.stdout).context("invalid UTF-8 from cargo")?;
    Path::new(manifest.trim())
        .parent()
        .map(Path::to_path_buf)
        .context("manifest path has no parent")
}

fn fmt(sh: &Shell, fix: bool) -> Result<()> {
    let check = (!fix).then_some(["--", "--check"]).into_iter().flatten();
    cmd!(sh, "cargo fmt --all {check...}").run()?;
    Ok(())
}

fn clippy(sh: &Shell) -> Result<()> {
    cmd!(sh, "cargo clippy --workspace --all-features --all-targets -- -D warnings").run()?;
    Ok(())
}

fn test(sh: &Shell, package: Option<&str>) -> Result<()> {
    let scope: Vec<&str> = match package {
        Some(pkg) => vec!["-p", pkg],
        None => vec!["--workspace"],
    };
    // Feature-gated conversions and collation decoding change behavior
    let scope = &scope;
    for features in [&[][..], &["--no-default-features"], &["--all-features"]] {
        cmd!(sh, "cargo test {scope...} {features...}").run()?;
    }
    Ok(())
}

fn fuzz_targets(root: &Path) -> Result<Vec<String>> {
    let dir = root.join("fuzz").join("fuzz_targets");
    let mut targets = Vec::new();
    for entry in fs::read_dir(&dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "rs") {
            if let Some(stem) = path.file_stem() {
                targets.push(stem.to_string_lossy().into_owned());
            }
        }
    }
    targets.sort();
    Ok(targets)
}

fn fuzz(sh: &Shell, target: Option<&str>, max_time: u64, list: bool) -> Result<()> {
    let available = fuzz_targets(&sh.current_dir())?;
    if list {
        for name in &available {
            println!("{name}");
        }
        return Ok(());
    }

    let selected: Vec<&str> = match target {
        Some(name) if available.iter().any(|t| t == name) => vec![name],
        Some(name) => bail!("unknown fuzz target `{name}`, see --list"),
        None => available.iter().map(String::as_str).collect(),
    };

    let _dir = sh.push_dir("fuzz");
    let max_time = format!("-max_total_time={max_time}");
    for name in selected {
        println!("fuzzing {name}");
        cmd!(sh, "cargo +nightly fuzz run {name} -- {max_time}").run()?;
    }
    Ok(())
}

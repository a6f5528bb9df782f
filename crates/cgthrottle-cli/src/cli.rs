//! Command-line definition and execution.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, ValueEnum};

use cgthrottle_common::constants::BIN_NAME;
use cgthrottle_core::cgroup::{self, io, Cgroup};
use cgthrottle_core::config::{self, ThrottleConfig};

use crate::output;

/// Apply per-device I/O throttling limits to a cgroup v2 directory.
#[derive(Parser, Debug)]
#[command(name = BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Path to the JSON throttle configuration file.
    #[arg(short, long, env = "THROTTLE_CONFIG")]
    pub config: PathBuf,

    /// Path to the target cgroup directory (e.g. /sys/fs/cgroup/system.slice/app.service).
    #[arg(
        short = 'g',
        long,
        env = "THROTTLE_CGROUP",
        required_unless_present_any = ["dry_run", "print_config"]
    )]
    pub cgroup: Option<PathBuf>,

    /// Check that every configured device exists before applying.
    #[arg(long)]
    pub check_devices: bool,

    /// Resolve and print the io.max lines without writing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the configuration with defaults filled in, then exit.
    #[arg(long, conflicts_with = "dry_run")]
    pub print_config: bool,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Log output formats.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Runs the parsed command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be read, parsed, validated,
/// or applied.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let json = std::fs::read(&cli.config).with_context(|| {
        format!("error reading configuration file {}", cli.config.display())
    })?;
    let config = config::parse_config(&json)
        .with_context(|| format!("invalid configuration in {}", cli.config.display()))?;

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }
    if cli.check_devices {
        config::validate_config(&config).context("device pre-flight check failed")?;
    }
    if cli.dry_run {
        return dry_run(&config, cli.cgroup.as_deref());
    }

    let cgroup_path = cli.cgroup.context("--cgroup is required")?;
    let target = Cgroup::open(&cgroup_path)
        .with_context(|| format!("failed to apply IO limits to {}", cgroup_path.display()))?;
    tracing::info!(cgroup = %target.path().display(), "applying IO limits");
    let applied = target
        .apply_io_limits(&config)
        .with_context(|| format!("failed to apply IO limits to {}", target.path().display()))?;

    println!(
        "IO limits successfully applied to {} ({} device line(s) written)",
        target.path().display(),
        applied.len()
    );
    Ok(())
}

fn dry_run(config: &ThrottleConfig, cgroup_path: Option<&Path>) -> anyhow::Result<()> {
    let planned = cgroup::plan_io_limits(config).context("failed to resolve IO limits")?;

    println!("Planned io.max lines:");
    for limits in &planned {
        println!("  {limits}");
        println!("      {}", output::describe_limits(limits));
    }

    if let Some(path) = cgroup_path {
        let current = io::read_io_max(path)?;
        let merged = planned
            .iter()
            .fold(current.join("\n"), |content, limits| io::merge_io_max(&content, limits));
        println!();
        println!("{} after apply:", path.join("io.max").display());
        for line in merged.lines() {
            println!("  {line}");
        }
    }
    Ok(())
}

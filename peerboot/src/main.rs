//! `peerboot`: launch a local cluster of peer workers and report one verdict.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use peerboot::core::identity::{Ed25519Provider, IdentityProvider};
use peerboot::core::topology::{DEFAULT_HOST, build_with_host};
use peerboot::core::wire;
use peerboot::exit_codes;
use peerboot::io::config::{LaunchConfig, load_config};
use peerboot::launch::bootstrap;
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "peerboot",
    version,
    about = "Bootstrap a local cluster of peer workers"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Launch one worker per slot and print `ok` or `failed`.
    Launch(LaunchArgs),
    /// Print a freshly generated serialized topology.
    Topology(TopologyArgs),
}

#[derive(Args)]
struct LaunchArgs {
    /// Launch config (TOML). Flags below override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Number of worker slots.
    #[arg(short = 'n', long)]
    size: Option<usize>,
    /// Port of slot 0; slot i uses base_port + i.
    #[arg(long)]
    base_port: Option<u16>,
    #[arg(long)]
    host: Option<String>,
    /// Kill workers still running after this many seconds.
    #[arg(long)]
    deadline_secs: Option<u64>,
    /// Write each worker's output to <DIR>/slot-<i>.log.
    #[arg(long)]
    log_dir: Option<PathBuf>,
    /// Write a JSON run report here.
    #[arg(long)]
    report: Option<PathBuf>,
    /// Derive identities from this seed instead of OS entropy.
    #[arg(long)]
    seed: Option<u64>,
    /// Worker executable.
    worker_binary: Option<PathBuf>,
    /// Opaque worker config reference passed to every worker.
    worker_config: Option<String>,
}

#[derive(Args)]
struct TopologyArgs {
    #[arg(short = 'n', long, default_value_t = 4)]
    size: usize,
    #[arg(long, default_value_t = 8000)]
    base_port: u16,
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,
    #[arg(long)]
    seed: Option<u64>,
}

impl LaunchArgs {
    fn resolve_config(&self) -> Result<LaunchConfig> {
        let mut cfg = match &self.config {
            Some(path) if !path.exists() => bail!("config file {} not found", path.display()),
            Some(path) => load_config(path)?,
            None => LaunchConfig::default(),
        };
        if let Some(size) = self.size {
            cfg.cluster_size = size;
        }
        if let Some(base_port) = self.base_port {
            cfg.base_port = base_port;
        }
        if let Some(host) = &self.host {
            cfg.host = host.clone();
        }
        if let Some(deadline_secs) = self.deadline_secs {
            cfg.deadline_secs = Some(deadline_secs);
        }
        if let Some(log_dir) = &self.log_dir {
            cfg.log_dir = Some(log_dir.clone());
        }
        if let Some(report) = &self.report {
            cfg.report_path = Some(report.clone());
        }
        if let Some(worker_binary) = &self.worker_binary {
            cfg.worker_binary = worker_binary.clone();
        }
        if let Some(worker_config) = &self.worker_config {
            cfg.worker_config = worker_config.clone();
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn provider(seed: Option<u64>) -> Box<dyn IdentityProvider> {
    match seed {
        Some(seed) => Box::new(Ed25519Provider::seeded(seed)),
        None => Box::new(Ed25519Provider::os()),
    }
}

fn main() {
    peerboot::logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Launch(args) => cmd_launch(&args),
        Command::Topology(args) => cmd_topology(&args),
    }
}

fn cmd_launch(args: &LaunchArgs) -> Result<i32> {
    let cfg = args.resolve_config()?;
    debug!(?cfg, "launch config resolved");
    let outcome = bootstrap(&cfg, provider(args.seed).as_mut())?;
    println!("{}", outcome.result.verdict_token());
    if let Some(err) = &outcome.report_error {
        eprintln!("warning: {err}");
    }
    if outcome.result.overall_success() {
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::FAILED)
    }
}

fn cmd_topology(args: &TopologyArgs) -> Result<i32> {
    let topology = build_with_host(
        args.size,
        &args.host,
        args.base_port,
        provider(args.seed).as_mut(),
    )?;
    println!("{}", wire::serialize(&topology));
    Ok(exit_codes::OK)
}

//! lidguard - lid suspend enforcement and post-resume recovery
//!
//! # Usage
//!
//! ```bash
//! # Watch the lid (foreground); the default command
//! lidguard monitor
//!
//! # Watch the lid in the background
//! lidguard monitor -d
//!
//! # After a resume, as root: clear stuck inhibitors and reload the lid driver
//! sudo lidguard recover --json
//!
//! # Restart the desktop shell
//! lidguard refresh-shell
//!
//! # Inspect and stop
//! lidguard status
//! lidguard stop
//! ```

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lidguard_core::RecoveryReport;
use lidguard_sys::{
    InhibitorScanner, LidStateReader, RealCommandRunner, SessionEnv, SysinfoSignaller,
    SystemdSuspend,
};
use lidguardd::config::AgentConfig;
use lidguardd::monitor::{spawn_monitor_task, LidMonitor};
use lidguardd::recovery::RecoveryOrchestrator;
use lidguardd::refresh::RefreshChain;

const LOG_TARGETS: &[&str] = &["lidguard", "lidguardd", "lidguard_sys", "lidguard_core"];

/// lidguard - make a closed lid mean suspend
#[derive(Parser, Debug)]
#[command(name = "lidguard", version, about)]
struct Args {
    /// Config file (default: $LIDGUARD_CONFIG, then the user and system config dirs)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch the lid and force a suspend when it closes
    Monitor {
        /// Run as a background daemon (fork to background)
        #[arg(short = 'd', long)]
        daemon: bool,
    },
    /// Post-resume recovery (requires root)
    Recover {
        /// Print the recovery report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Restart the desktop shell
    RefreshShell,
    /// Show lid state, monitor status and sleep blockers
    Status,
    /// Stop the running monitor
    Stop,
}

// ============================================================================
// PID / Log Files
// ============================================================================

fn state_dir() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("lidguard")
}

fn pid_file_path() -> PathBuf {
    state_dir().join("lidguard.pid")
}

fn log_file_path() -> PathBuf {
    state_dir().join("lidguard.log")
}

fn read_pid() -> Option<u32> {
    let mut file = File::open(pid_file_path()).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

fn write_pid() -> Result<()> {
    let path = pid_file_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create state directory")?;
    }
    let mut file = File::create(&path).context("Failed to create PID file")?;
    write!(file, "{}", process::id()).context("Failed to write PID")?;
    Ok(())
}

fn remove_pid_file() {
    let _ = fs::remove_file(pid_file_path());
}

fn is_process_running(pid: u32) -> bool {
    PathBuf::from(format!("/proc/{pid}")).exists()
}

fn is_monitor_running() -> Option<u32> {
    if let Some(pid) = read_pid() {
        if is_process_running(pid) {
            return Some(pid);
        }
        remove_pid_file();
    }
    None
}

fn stop_monitor(pid: u32) -> Result<()> {
    let Ok(raw) = i32::try_from(pid) else {
        bail!("PID {pid} out of range");
    };
    // SAFETY: kill has no memory-safety preconditions
    let result = unsafe { libc::kill(raw, libc::SIGTERM) };
    if result != 0 {
        bail!("Failed to send SIGTERM to process {pid}");
    }
    Ok(())
}

// ============================================================================
// Setup
// ============================================================================

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let mut filter = EnvFilter::from_default_env();
    for target in LOG_TARGETS {
        filter = filter.add_directive(format!("{target}={level}").parse()?);
    }
    // stdout is reserved for command output (`recover --json`)
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn daemonize() -> Result<()> {
    use daemonize::Daemonize;

    let log_path = log_file_path();

    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }

    let stdout = File::create(&log_path).context("Failed to create log file for stdout")?;
    let stderr = stdout
        .try_clone()
        .context("Failed to create log file for stderr")?;

    Daemonize::new()
        .working_directory("/")
        .stdout(stdout)
        .stderr(stderr)
        .start()
        .context("Failed to daemonize")?;

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let command = args.command.unwrap_or(Command::Monitor { daemon: false });

    match command {
        Command::Monitor { daemon } => {
            if let Some(pid) = is_monitor_running() {
                eprintln!("Monitor is already running (PID {pid})");
                eprintln!("Use 'lidguard stop' to stop it first.");
                process::exit(1);
            }

            if daemon {
                daemonize()?;
            }
            init_tracing(args.verbose)?;
            let config = AgentConfig::load(args.config.as_deref())?;

            write_pid()?;
            let result = run_monitor(config);
            remove_pid_file();
            result
        }
        Command::Recover { json } => {
            init_tracing(args.verbose)?;
            let config = AgentConfig::load(args.config.as_deref())?;
            run_recover(config, json)
        }
        Command::RefreshShell => {
            init_tracing(args.verbose)?;
            let config = AgentConfig::load(args.config.as_deref())?;
            run_refresh(config)
        }
        Command::Status => {
            init_tracing(args.verbose)?;
            let config = AgentConfig::load(args.config.as_deref())?;
            run_status(config)
        }
        Command::Stop => {
            if let Some(pid) = is_monitor_running() {
                println!("Stopping monitor (PID {pid})...");
                stop_monitor(pid)?;

                for _ in 0..50 {
                    if !is_process_running(pid) {
                        println!("Monitor stopped.");
                        return Ok(());
                    }
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }

                eprintln!("Monitor did not stop within 5 seconds.");
                process::exit(1);
            } else {
                println!("Monitor is not running.");
                Ok(())
            }
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

#[tokio::main]
async fn run_monitor(config: AgentConfig) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "lidguard monitor starting"
    );

    let source = Arc::new(LidStateReader::new(config.monitor.lid_paths.clone()));
    let suspender = Arc::new(SystemdSuspend::new(Arc::new(RealCommandRunner)));
    let monitor = LidMonitor::new(source, suspender, config.monitor)?;

    if let Err(e) = monitor.preflight() {
        error!(error = %e, "No lid state source, refusing to start");
        return Err(e.into());
    }

    let cancel_token = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown(
        wait_for_shutdown_signal(),
        cancel_token.clone(),
    ));

    let stats = spawn_monitor_task(monitor, cancel_token)
        .await
        .context("Monitor task failed")?;

    info!(
        ticks = stats.ticks,
        faults = stats.faults,
        suspends = stats.suspend_attempts,
        "lidguard monitor stopped"
    );
    Ok(())
}

#[tokio::main]
async fn run_recover(config: AgentConfig, json: bool) -> Result<()> {
    let orchestrator = RecoveryOrchestrator::new(
        Arc::new(LidStateReader::new(config.monitor.lid_paths.clone())),
        Arc::new(RealCommandRunner),
        Arc::new(SysinfoSignaller),
        &config.recovery,
    )?;

    let report = orchestrator
        .run_elevated()
        .await
        .context("Recovery needs root; run it with sudo")?;

    print_report(&report, json)
}

fn print_report(report: &RecoveryReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for step in &report.steps {
        let mark = if step.succeeded { "ok  " } else { "FAIL" };
        println!("[{mark}] {}: {}", step.step, step.message);
    }
    if report.power_owner_still_inhibiting {
        println!("Power owner is still inhibiting sleep.");
    }
    Ok(())
}

#[tokio::main]
async fn run_refresh(config: AgentConfig) -> Result<()> {
    let session = SessionEnv::from_process();
    info!(bus = session.bus_address(), "Refreshing desktop shell");

    let chain = RefreshChain::standard(
        Arc::new(RealCommandRunner),
        Arc::new(SysinfoSignaller),
        session,
        &config.refresh,
    );
    let report = chain.run().await;

    match report.winner() {
        Some(winner) => {
            println!("Shell refreshed via {} ({})", winner.strategy, winner.outcome);
            Ok(())
        }
        None => {
            for attempt in &report.attempts {
                eprintln!("{}: {}", attempt.strategy, attempt.outcome);
            }
            bail!("All shell refresh strategies failed")
        }
    }
}

#[tokio::main]
async fn run_status(config: AgentConfig) -> Result<()> {
    let reader = LidStateReader::new(config.monitor.lid_paths.clone());
    match reader.read_with_source() {
        Some((path, state)) => println!("Lid: {state} ({})", path.display()),
        None => println!("Lid: unknown (no readable source)"),
    }

    match is_monitor_running() {
        Some(pid) => println!("Monitor: running (PID {pid})"),
        None => println!("Monitor: not running"),
    }

    let scanner = InhibitorScanner::new(Arc::new(RealCommandRunner), config.recovery.watch_set()?);
    match scanner.scan_sleep_blockers().await {
        Ok(blockers) if blockers.is_empty() => println!("Sleep blockers: none"),
        Ok(blockers) => {
            println!("Sleep blockers:");
            for record in blockers {
                println!("  {} ({}, {})", record.owner, record.scope, record.mode);
            }
        }
        Err(e) => {
            warn!(error = %e, "Inhibitor scan failed");
            println!("Sleep blockers: unavailable ({e})");
        }
    }
    Ok(())
}

/// Cancels `token` once `signal` reports a shutdown request.
///
/// If the handlers could not be installed the token is left alone; the
/// monitor keeps running until the process is killed.
async fn cancel_on_shutdown<F>(signal: F, token: CancellationToken)
where
    F: std::future::Future<Output = Result<()>>,
{
    if let Err(e) = signal.await {
        error!(error = %e, "Failed to install shutdown signal handlers");
        return;
    }
    info!("Shutdown signal received");
    token.cancel();
}

async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
        }
    }

    Ok(())
}

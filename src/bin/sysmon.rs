//! sysmon - prints host metrics once per interval.
//!
//! Usage:
//!   sysmon                      # human-readable lines, default settings
//!   sysmon -c sysmon.ini        # settings from a config file
//!   sysmon --json -n 5          # five JSON lines, then exit

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use sysmon::config::{DEFAULT_PROC_PATH, DEFAULT_SYS_PATH};
use sysmon::{Engine, EngineOptions, IniConfig, RealFs, Snapshot, SysmonError};

/// Host metrics poller.
#[derive(Parser)]
#[command(name = "sysmon", about = "Host metrics poller", version)]
struct Args {
    /// Configuration file ([sysmon] and [module.<name>] sections).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Stop after this many poll rounds. Runs until interrupted if omitted.
    #[arg(short = 'n', long, value_name = "N")]
    iterations: Option<u64>,

    /// Print one JSON object per round instead of name=value pairs.
    #[arg(long)]
    json: bool,

    /// Path to /proc filesystem.
    #[arg(long, default_value = DEFAULT_PROC_PATH)]
    proc_path: String,

    /// Path to /sys filesystem.
    #[arg(long, default_value = DEFAULT_SYS_PATH)]
    sys_path: String,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber on stderr so stdout carries only
/// snapshot lines.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("sysmon={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn render(snapshot: &Snapshot, json: bool) -> Result<String, SysmonError> {
    if json {
        sysmon::fmt::format_json(snapshot)
    } else {
        Ok(sysmon::fmt::format_human(snapshot))
    }
}

/// Sleeps for `interval`, waking early once `running` is cleared.
fn sleep_interruptible(interval: Duration, running: &AtomicBool) {
    let step = Duration::from_millis(100);
    let mut remaining = interval;
    while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
        let sleep_time = remaining.min(step);
        std::thread::sleep(sleep_time);
        remaining = remaining.saturating_sub(sleep_time);
    }
}

fn run(args: &Args) -> Result<(), SysmonError> {
    let config = match &args.config {
        Some(path) => {
            info!("Loading config from {}", path.display());
            IniConfig::load_file(path)?
        }
        None => IniConfig::default(),
    };
    let options = EngineOptions {
        proc_path: args.proc_path.clone(),
        sys_path: args.sys_path.clone(),
    };

    let mut engine = Engine::new(&config, RealFs::new(), &options)?;
    for status in engine.modules() {
        debug!(
            module = status.name,
            enabled = status.enabled,
            refresh_ms = status.refresh_ms,
            "module status"
        );
    }
    info!(
        "sysmon {} started: {} modules enabled, interval={}ms",
        env!("CARGO_PKG_VERSION"),
        engine.enabled_count(),
        engine.interval_ms()
    );

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let stdout = std::io::stdout();
    let mut rounds: u64 = 0;

    while running.load(Ordering::SeqCst) {
        let snapshot = match engine.poll() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Poll failed: {}", engine.last_error().unwrap_or("unknown error"));
                return Err(e);
            }
        };

        let line = render(&snapshot, args.json)?;
        let mut out = stdout.lock();
        writeln!(out, "{}", line)
            .and_then(|()| out.flush())
            .map_err(|e| SysmonError::io("failed to write snapshot", e))?;
        drop(out);

        rounds += 1;
        if args.iterations.is_some_and(|n| rounds >= n) {
            break;
        }
        sleep_interruptible(engine.interval(), &running);
    }

    info!("Shutting down after {} rounds", rounds);
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("sysmon: {}", e);
            ExitCode::FAILURE
        }
    }
}

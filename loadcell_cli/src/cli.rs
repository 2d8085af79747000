//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "loadcell", version, about = "Load-cell acquisition and calibration")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/loadcell.toml")]
    pub config: PathBuf,

    /// Calibration file; read at startup and rewritten after every change
    #[arg(long, value_name = "FILE")]
    pub calibration: Option<PathBuf>,

    /// Play back a captured dump (index,raw CSV) instead of opening the device
    #[arg(long, value_name = "FILE", global = true)]
    pub replay: Option<PathBuf>,

    /// Print results and errors as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Enable real-time mode (SCHED_FIFO, mlockall)
    #[arg(
        long,
        action = ArgAction::SetTrue,
        long_help = "Enable real-time mode on Linux.\n\nRaises the process to SCHED_FIFO so the bit-banged serial read is not preempted mid-frame (SCK held high for more than 60 us powers the HX711 down), and locks memory according to --rt-lock. Usually needs CAP_SYS_NICE/CAP_IPC_LOCK or root."
    )]
    pub rt: bool,

    /// SCHED_FIFO priority for --rt (clamped to the system range)
    #[arg(long, value_name = "PRIO")]
    pub rt_prio: Option<i32>,

    /// Memory locking mode for --rt
    #[arg(long, value_enum, value_name = "MODE", default_value = "current")]
    pub rt_lock: RtLock,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the calibrated weight
    Weigh {
        /// Keep printing until interrupted
        #[arg(long, action = ArgAction::SetTrue)]
        watch: bool,
        /// Period between readings with --watch
        #[arg(long, value_name = "MS", default_value_t = 500)]
        interval_ms: u64,
    },
    /// Print the filtered average of fresh raw codes
    RawAvg {
        /// Number of samples (default: acquisition.calibration_samples)
        #[arg(long, short = 'n')]
        samples: Option<usize>,
    },
    /// Print buffered raw codes as CSV (index,raw)
    Dump {
        /// Number of most recent samples
        #[arg(long, short = 'n', default_value_t = 10)]
        samples: usize,
    },
    /// Two-point calibration with a known reference weight
    Calibrate {
        /// Reference weight, in the unit weights should be reported in
        #[arg(long)]
        weight: f64,
        /// Do not wait for confirmations on stdin
        #[arg(long, short = 'y', action = ArgAction::SetTrue)]
        yes: bool,
    },
    /// Capture the current load as the new zero
    Tare,
    /// Print the calibration in effect
    ShowCalibration,
    /// Quick health check (front end setup and first samples)
    SelfCheck,
}

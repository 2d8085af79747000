mod cli;
mod commands;
mod error_fmt;
mod frontend;
mod rt;
mod store;

use std::path::Path;
use std::time::Duration;

use clap::Parser;
use eyre::WrapErr;
use loadcell_config::{Config, Logging};
use loadcell_core::conversions::{backend_cfg, frontend_cfg};
use loadcell_core::{CalibrationState, Scale, ScaleError};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::commands::Output;
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::store::FileCalibrationStore;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(err) = run(cli) {
        tracing::error!(error = %err, "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn config_error(e: &eyre::Report) -> eyre::Report {
    eyre::Report::new(ScaleError::Config(format!("{e:#}")))
}

fn load_config(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))
        .map_err(|e| config_error(&e))?;
    let cfg = loadcell_config::load_toml(&text)
        .wrap_err("parse config")
        .map_err(|e| config_error(&e))?;
    cfg.validate().map_err(|e| config_error(&e))?;
    Ok(cfg)
}

fn init_tracing(json: bool, level: &str, logging: &Logging) -> eyre::Result<()> {
    use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let console = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter)
            .boxed()
    };

    let file = match logging.file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name: {}", path.display()))?;
            let appender = match logging.rotation.as_deref() {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            let file_filter = EnvFilter::new(logging.level.as_deref().unwrap_or("info"));
            Some(
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_filter(file_filter)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}

fn starting_calibration(cfg: &Config, file: Option<&Path>) -> eyre::Result<CalibrationState> {
    let persisted = match file {
        Some(path) => loadcell_config::load_calibration_file(path).map_err(|e| config_error(&e))?,
        None => None,
    };
    Ok(cfg
        .effective_calibration(persisted)
        .map_or_else(|| CalibrationState::new(0, 1.0), CalibrationState::from))
}

fn build_scale(cfg: &Config, cli: &Cli, calibration: CalibrationState) -> eyre::Result<Scale> {
    let fe = frontend_cfg(cfg)?;
    let backend = backend_cfg(cfg)?;
    let device = match &cli.replay {
        Some(path) => frontend::replay_frontend(&fe, path).map_err(|e| config_error(&e))?,
        None => frontend::make_frontend(&fe)?,
    };

    let mut builder = Scale::builder()
        .with_frontend(device)
        .with_config(backend)
        .with_calibration(calibration);
    match &cli.calibration {
        Some(path) => builder = builder.with_store(FileCalibrationStore::new(path)),
        None => tracing::warn!("no --calibration file; calibration changes are not saved"),
    }
    builder.try_build()
}

fn run(cli: Cli) -> eyre::Result<()> {
    let _ = color_eyre::install();

    let cfg = load_config(&cli.config)?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), frontend = ?cfg.frontend, "config loaded");

    let calibration = starting_calibration(&cfg, cli.calibration.as_deref())?;
    let out = Output { json: cli.json };

    // Needs no device.
    if matches!(cli.cmd, Commands::ShowCalibration) {
        commands::show_calibration(calibration, out);
        return Ok(());
    }

    rt::setup_rt_once(cli.rt, cli.rt_prio, cli.rt_lock);
    let mut scale = build_scale(&cfg, &cli, calibration)?;
    tracing::info!(frontend = ?cfg.frontend, "backend ready");

    match cli.cmd {
        Commands::Weigh { watch, interval_ms } => {
            commands::weigh(&mut scale, out, watch, Duration::from_millis(interval_ms))
        }
        Commands::RawAvg { samples } => {
            let n = samples.unwrap_or(scale.acquisition_cfg().calibration_samples);
            commands::raw_avg(&mut scale, out, n)
        }
        Commands::Dump { samples } => commands::dump(&mut scale, out, samples),
        Commands::Calibrate { weight, yes } => {
            let stdin = std::io::stdin();
            commands::calibrate(&mut scale, out, weight, yes, &mut stdin.lock())
        }
        Commands::Tare => commands::tare(&mut scale, out),
        Commands::SelfCheck => commands::self_check(&mut scale, out),
        Commands::ShowCalibration => Ok(()),
    }
}

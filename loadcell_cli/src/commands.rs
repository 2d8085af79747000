//! Subcommand implementations over an assembled [`Scale`].

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use eyre::WrapErr;
use loadcell_core::{
    Acquisition, CalibrationPhase, CalibrationState, Calibrator, Scale, ScaleBackend, ScaleError,
    StepOutcome,
};
use serde_json::json;

/// Sleep between buffered-request retries while the queue fills.
const RETRY_PERIOD: Duration = Duration::from_millis(20);
/// Unconfirmed (`--yes`) calibration gives up after this many incomplete
/// captures in one step.
const MAX_UNATTENDED_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
}

impl Output {
    fn emit(self, value: &serde_json::Value, text: impl FnOnce() -> String) {
        if self.json {
            println!("{value}");
        } else {
            println!("{}", text());
        }
    }
}

fn busy() -> eyre::Report {
    eyre::Report::new(ScaleError::Busy)
}

/// Retry a buffered request until it is ready or the request timeout
/// passes.
fn until_ready<T>(
    scale: &mut Scale,
    mut request: impl FnMut(&mut Scale) -> Acquisition<T>,
) -> eyre::Result<T> {
    let deadline = Instant::now() + scale.acquisition_cfg().request_timeout;
    loop {
        match request(scale) {
            Acquisition::Ready(v) => return Ok(v),
            Acquisition::Rejected => return Err(busy()),
            Acquisition::NotReady if Instant::now() >= deadline => {
                return Err(eyre::Report::new(ScaleError::NotReady));
            }
            Acquisition::NotReady => std::thread::sleep(RETRY_PERIOD),
        }
    }
}

/// Displayed weights never go below zero; tare drift reads as empty.
fn show_weight(out: Output, weight: f64) {
    let w = weight.max(0.0);
    out.emit(&json!({ "weight": w }), || format!("{w:.3}"));
}

pub fn weigh(scale: &mut Scale, out: Output, watch: bool, interval: Duration) -> eyre::Result<()> {
    let weight = until_ready(scale, ScaleBackend::request_weight)?;
    show_weight(out, weight);
    if !watch {
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .wrap_err("install Ctrl-C handler")?;

    while !shutdown.load(Ordering::Relaxed) {
        std::thread::sleep(interval);
        if !scale.polling_enabled() {
            continue;
        }
        match scale.request_weight() {
            Acquisition::Ready(w) => show_weight(out, w),
            other => tracing::debug!(?other, "weight not available this period"),
        }
    }
    tracing::info!("watch stopped");
    Ok(())
}

pub fn raw_avg(scale: &mut Scale, out: Output, samples: usize) -> eyre::Result<()> {
    let raw = match scale.capture_raw_average(samples) {
        Acquisition::Ready(raw) => raw,
        Acquisition::NotReady => return Err(eyre::Report::new(ScaleError::NotReady)),
        Acquisition::Rejected => return Err(busy()),
    };
    out.emit(&json!({ "raw_avg": raw, "samples": samples }), || raw.to_string());
    Ok(())
}

pub fn dump(scale: &mut Scale, out: Output, samples: usize) -> eyre::Result<()> {
    // Give the buffer a chance to fill; a short dump is still a dump.
    let want = samples.min(scale.capacity());
    let deadline = Instant::now() + scale.acquisition_cfg().request_timeout;
    while scale.buffered() < want && Instant::now() < deadline {
        std::thread::sleep(RETRY_PERIOD);
    }
    let raw = scale.request_raw_dump(samples).ready().ok_or_else(busy)?;

    if out.json {
        println!("{}", json!({ "samples": raw }));
        return Ok(());
    }
    let mut w = csv::Writer::from_writer(std::io::stdout().lock());
    w.write_record(["index", "raw"])?;
    for (i, r) in raw.iter().enumerate() {
        w.write_record([i.to_string(), r.to_string()])?;
    }
    w.flush()?;
    Ok(())
}

pub fn tare(scale: &mut Scale, out: Output) -> eyre::Result<()> {
    let n = scale.acquisition_cfg().calibration_samples;
    let raw = match scale.capture_raw_average(n) {
        Acquisition::Ready(raw) => raw,
        Acquisition::NotReady => return Err(eyre::Report::new(ScaleError::NotReady)),
        Acquisition::Rejected => return Err(busy()),
    };
    scale.set_tare(raw)?;
    out.emit(&json!({ "tare_raw": raw }), || format!("tare set to raw {raw}"));
    Ok(())
}

pub fn show_calibration(cal: CalibrationState, out: Output) {
    out.emit(
        &json!({ "tare_raw": cal.tare_raw, "scale": cal.scale }),
        || format!("tare_raw = {}\nscale = {}", cal.tare_raw, cal.scale),
    );
}

pub fn self_check(scale: &mut Scale, out: Output) -> eyre::Result<()> {
    let raw = until_ready(scale, |s| match s.latest_raw() {
        Some(raw) => Acquisition::Ready(raw),
        None => Acquisition::NotReady,
    })?;
    let name = scale.frontend_name();
    let errors = scale.producer_errors();
    let stalled = scale.stalled_for_ms();
    out.emit(
        &json!({ "frontend": name, "raw": raw, "producer_errors": errors, "stalled_ms": stalled }),
        || {
            let stalled = stalled.map_or_else(|| "-".to_string(), |ms| ms.to_string());
            format!("ok: frontend={name} raw={raw} producer_errors={errors} stalled_ms={stalled}")
        },
    );
    Ok(())
}

enum Confirm {
    Go,
    Cancel,
}

fn confirm(prompt: &str, yes: bool, input: &mut impl BufRead) -> eyre::Result<Confirm> {
    eprint!("{prompt} ");
    if yes {
        eprintln!();
        return Ok(Confirm::Go);
    }
    eprint!("[Enter = continue, c = cancel] ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(Confirm::Cancel);
    }
    Ok(match line.trim() {
        "c" | "cancel" | "q" => Confirm::Cancel,
        _ => Confirm::Go,
    })
}

pub fn calibrate(
    scale: &mut Scale,
    out: Output,
    reference_weight: f64,
    yes: bool,
    input: &mut impl BufRead,
) -> eyre::Result<()> {
    let mut cal = Calibrator::new(scale.acquisition_cfg().calibration_samples);
    cal.begin(scale, reference_weight)?;

    let mut retries = 0;
    loop {
        let prompt = match cal.phase() {
            CalibrationPhase::AwaitTareConfirm => "Remove all load from the scale.".to_string(),
            CalibrationPhase::AwaitReferenceConfirm => {
                format!("Place the reference weight ({reference_weight}) on the scale.")
            }
            CalibrationPhase::NoCal => {
                return Err(eyre::Report::new(ScaleError::State(
                    "calibration session ended early".into(),
                )));
            }
        };
        if matches!(confirm(&prompt, yes, input)?, Confirm::Cancel) {
            cal.cancel(scale);
            out.emit(&json!({ "calibration": "cancelled" }), || {
                "calibration cancelled".to_string()
            });
            return Ok(());
        }

        match cal.confirm_step(scale)? {
            StepOutcome::TareCaptured(raw) => {
                retries = 0;
                eprintln!("tare captured (raw {raw})");
            }
            StepOutcome::Calibrated(state) => {
                out.emit(
                    &json!({ "tare_raw": state.tare_raw, "scale": state.scale }),
                    || format!("calibrated: tare_raw = {} scale = {}", state.tare_raw, state.scale),
                );
                return Ok(());
            }
            StepOutcome::Retry => {
                retries += 1;
                eprintln!("not enough samples arrived; try again");
                if yes && retries >= MAX_UNATTENDED_RETRIES {
                    cal.cancel(scale);
                    return Err(eyre::Report::new(ScaleError::NotReady));
                }
            }
        }
    }
}

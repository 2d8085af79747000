//! Hardware seams for the load-cell acquisition stack.
//!
//! The decoders in `loadcell_hardware` are written against these traits so
//! they can run on a Raspberry Pi (via `rppal`) or against scripted doubles
//! in tests. Errors cross the trait boundary as `BoxError`.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;

/// Signed, sign-extended 24-bit ADC code.
pub type RawSample = i32;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Serial data line of a bit-banged ADC. The device pulls it low when a
/// conversion is ready, then shifts bits out on it.
pub trait DataLine {
    fn is_high(&mut self) -> Result<bool, BoxError>;

    /// Block until a falling edge is observed. Returns `false` on timeout.
    fn wait_falling_edge(&mut self, timeout: Duration) -> Result<bool, BoxError>;
}

/// Serial clock line driven by the host.
pub trait ClockLine {
    fn set_high(&mut self) -> Result<(), BoxError>;
    fn set_low(&mut self) -> Result<(), BoxError>;
}

/// 8-bit register access on an I2C device.
pub trait RegisterBus {
    fn read_register(&mut self, register: u8) -> Result<u8, BoxError>;
    fn write_register(&mut self, register: u8, value: u8) -> Result<(), BoxError>;
}

/// An ADC front end serviced from a producer thread.
pub trait FrontEnd {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Device bring-up. Runs once before the producer thread starts.
    fn setup(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    /// One producer step. `Ok(None)` means no conversion was taken this time
    /// (not ready, skipped cycle, or timed out waiting for data-ready).
    fn service(&mut self, timeout: Duration) -> Result<Option<RawSample>, BoxError>;
}

impl<F: FrontEnd + ?Sized> FrontEnd for Box<F> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn setup(&mut self) -> Result<(), BoxError> {
        (**self).setup()
    }

    fn service(&mut self, timeout: Duration) -> Result<Option<RawSample>, BoxError> {
        (**self).service(timeout)
    }
}

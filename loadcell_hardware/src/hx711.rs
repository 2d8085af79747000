//! Bit-banged HX711 decoder.
//!
//! The device pulls DT low when a conversion is ready. The host then clocks
//! 24 data bits out MSB-first on SCK, followed by 1..=3 extra pulses that
//! select the gain of the *next* conversion. SCK must not stay high for more
//! than 60 µs or the device powers down mid-read.
use std::time::Duration;

use loadcell_traits::{BoxError, ClockLine, DataLine, FrontEnd, RawSample};
use tracing::trace;

use crate::error::Result;
use crate::util::spin_delay;

pub const DATA_BITS: u32 = 24;
/// Smallest code the converter can produce.
pub const RAW_MIN: RawSample = -(1 << 23);
/// Largest code the converter can produce.
pub const RAW_MAX: RawSample = (1 << 23) - 1;
/// Setup time between data-ready and the first clock edge.
pub const PRE_READ_DELAY: Duration = Duration::from_micros(2);

/// Extra clock pulses after the data bits; selects channel and gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum GainPulses {
    /// Channel A, gain 128.
    #[default]
    A128 = 1,
    /// Channel B, gain 32.
    B32 = 2,
    /// Channel A, gain 64.
    A64 = 3,
}

impl GainPulses {
    pub fn from_count(count: u8) -> Option<Self> {
        match count {
            1 => Some(Self::A128),
            2 => Some(Self::B32),
            3 => Some(Self::A64),
            _ => None,
        }
    }

    #[inline]
    pub fn count(self) -> u8 {
        self as u8
    }

    pub fn gain(self) -> u8 {
        match self {
            Self::A128 => 128,
            Self::B32 => 32,
            Self::A64 => 64,
        }
    }
}

/// Sign-extend a 24-bit two's-complement field into an `i32`.
#[inline]
pub fn sign_extend_24(raw: u32) -> RawSample {
    let mut value = raw & 0x00FF_FFFF;
    if value & 0x0080_0000 != 0 {
        value |= 0xFF00_0000;
    }
    value as RawSample
}

pub struct Hx711<D, C> {
    data: D,
    clock: C,
    pulse_width: Duration,
    gain: GainPulses,
    last_raw: Option<RawSample>,
    skipped: u64,
}

impl<D: DataLine, C: ClockLine> Hx711<D, C> {
    pub fn new(data: D, mut clock: C, pulse_width: Duration, gain: GainPulses) -> Result<Self> {
        clock.set_low()?; // clock idles low
        Ok(Self {
            data,
            clock,
            pulse_width,
            gain,
            last_raw: None,
            skipped: 0,
        })
    }

    /// DT low means a conversion is waiting to be shifted out.
    pub fn is_ready(&mut self) -> Result<bool> {
        Ok(!self.data.is_high()?)
    }

    pub fn gain(&self) -> GainPulses {
        self.gain
    }

    /// Most recent decoded value, polarity-corrected.
    pub fn last_raw(&self) -> Option<RawSample> {
        self.last_raw
    }

    /// Cycles skipped because DT was not low when serviced.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Decode one conversion in response to a data-ready edge.
    ///
    /// Cycles cannot overlap: the decoder is borrowed exclusively for the
    /// whole shift. If DT is no longer low (stale or spurious edge) the
    /// cycle is skipped without touching SCK and `Ok(None)` is returned.
    pub fn on_data_ready(&mut self) -> Result<Option<RawSample>> {
        if !self.is_ready()? {
            self.skipped = self.skipped.saturating_add(1);
            trace!(skipped = self.skipped, "hx711 edge without data-ready, skipping");
            return Ok(None);
        }

        spin_delay(PRE_READ_DELAY);

        let mut value: u32 = 0;
        for _ in 0..DATA_BITS {
            self.clock.set_high()?;
            spin_delay(self.pulse_width);
            value = (value << 1) | u32::from(self.data.is_high()?);
            self.clock.set_low()?;
            spin_delay(self.pulse_width);
        }

        for _ in 0..self.gain.count() {
            self.pulse_clock()?;
        }

        // Device polarity: a heavier load reads as a smaller code.
        let raw = -sign_extend_24(value);
        self.last_raw = Some(raw);
        trace!(bits = format_args!("{value:#08x}"), raw, "hx711 raw read");
        Ok(Some(raw))
    }

    fn pulse_clock(&mut self) -> Result<()> {
        self.clock.set_high()?;
        spin_delay(self.pulse_width);
        self.clock.set_low()?;
        spin_delay(self.pulse_width);
        Ok(())
    }
}

impl<D: DataLine, C: ClockLine> FrontEnd for Hx711<D, C> {
    fn name(&self) -> &'static str {
        "hx711"
    }

    fn service(&mut self, timeout: Duration) -> std::result::Result<Option<RawSample>, BoxError> {
        if !self.data.wait_falling_edge(timeout)? {
            return Ok(None);
        }
        Ok(self.on_data_ready()?)
    }
}

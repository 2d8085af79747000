//! NAU7802 24-bit I2C ADC.
//!
//! Configuration is done with read-modify-write cycles on 8-bit registers.
//! Conversions are not interrupt driven here: the producer thread calls
//! [`Nau7802::poll_once`] on a fixed interval and reads the three output
//! registers whenever the cycle-ready bit is set.
use std::time::Duration;

use loadcell_traits::{BoxError, Clock, FrontEnd, MonotonicClock, RawSample, RegisterBus};
use tracing::{debug, info, trace};

use crate::error::{HwError, Result};
use crate::util::{retry_until, wait_until};

/// Default 7-bit bus address.
pub const NAU7802_ADDR: u16 = 0x2A;

// Register map
pub const PU_CTRL: u8 = 0x00;
pub const CTRL1: u8 = 0x01;
pub const CTRL2: u8 = 0x02;
pub const ADCO_B2: u8 = 0x12;
pub const ADCO_B1: u8 = 0x13;
pub const ADCO_B0: u8 = 0x14;
pub const ADC: u8 = 0x15;
pub const PGA_PWR: u8 = 0x1C;
pub const DEVICE_REV: u8 = 0x1F;

// PU_CTRL bits
pub const PU_CTRL_RR: u8 = 0;
pub const PU_CTRL_PUD: u8 = 1;
pub const PU_CTRL_PUA: u8 = 2;
pub const PU_CTRL_PUR: u8 = 3;
pub const PU_CTRL_CS: u8 = 4;
pub const PU_CTRL_CR: u8 = 5;
pub const PU_CTRL_AVDDS: u8 = 7;

// CTRL1 fields
pub const CTRL1_GAIN_MASK: u8 = 0b0000_0111;
pub const CTRL1_VLDO_MASK: u8 = 0b0011_1000;
pub const CTRL1_VLDO_SHIFT: u8 = 3;
pub const CTRL1_CRP: u8 = 7;

// CTRL2 fields
pub const CTRL2_CALS: u8 = 2;
pub const CTRL2_CAL_ERROR: u8 = 3;
pub const CTRL2_CRS_MASK: u8 = 0b0111_0000;
pub const CTRL2_CRS_SHIFT: u8 = 4;
pub const CTRL2_CHS: u8 = 7;

// PGA_PWR bits
pub const PGA_PWR_PGA_CAP_EN: u8 = 7;

/// ADC register value that turns off the chopper clock (REG_CHPS = 0b11).
pub const ADC_CHOPPER_OFF: u8 = 0x30;

/// Largest code accepted by the 3-bit configuration fields.
const MAX_FIELD_CODE: u8 = 0b111;

/// PGA gain, encoded in CTRL1[2:0].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Gain {
    X1 = 0,
    X2 = 1,
    X4 = 2,
    X8 = 3,
    X16 = 4,
    X32 = 5,
    X64 = 6,
    X128 = 7,
}

impl Gain {
    pub fn from_factor(factor: u16) -> Option<Self> {
        Some(match factor {
            1 => Self::X1,
            2 => Self::X2,
            4 => Self::X4,
            8 => Self::X8,
            16 => Self::X16,
            32 => Self::X32,
            64 => Self::X64,
            128 => Self::X128,
            _ => return None,
        })
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Conversion rate, encoded in CTRL2[6:4].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SampleRate {
    Sps10 = 0b000,
    Sps20 = 0b001,
    Sps40 = 0b010,
    Sps80 = 0b011,
    Sps320 = 0b111,
}

impl SampleRate {
    pub fn from_sps(sps: u16) -> Option<Self> {
        Some(match sps {
            10 => Self::Sps10,
            20 => Self::Sps20,
            40 => Self::Sps40,
            80 => Self::Sps80,
            320 => Self::Sps320,
            _ => return None,
        })
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Internal LDO output voltage, encoded in CTRL1[5:3].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Ldo {
    V2_4 = 0b111,
    V2_7 = 0b110,
    V3_0 = 0b101,
    V3_3 = 0b100,
    V3_6 = 0b011,
    V3_9 = 0b010,
    V4_2 = 0b001,
    V4_5 = 0b000,
}

impl Ldo {
    pub fn from_millivolts(mv: u16) -> Option<Self> {
        Some(match mv {
            2400 => Self::V2_4,
            2700 => Self::V2_7,
            3000 => Self::V3_0,
            3300 => Self::V3_3,
            3600 => Self::V3_6,
            3900 => Self::V3_9,
            4200 => Self::V4_2,
            4500 => Self::V4_5,
            _ => return None,
        })
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    One,
    Two,
}

/// Analog front end self-calibration state, read from CTRL2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfeStatus {
    InProgress,
    Success,
    Failure,
}

/// Bring-up parameters. Codes above `0b111` are clamped when written.
#[derive(Debug, Clone)]
pub struct Nau7802Settings {
    pub ldo_code: u8,
    pub gain_code: u8,
    pub sample_rate_code: u8,
    /// AFE self-calibration takes ~344 ms on the bench.
    pub afe_timeout: Duration,
    pub power_up_retries: u32,
    pub power_up_poll: Duration,
}

impl Default for Nau7802Settings {
    fn default() -> Self {
        Self {
            ldo_code: Ldo::V3_3.code(),
            gain_code: Gain::X64.code(),
            sample_rate_code: SampleRate::Sps20.code(),
            afe_timeout: Duration::from_millis(1000),
            power_up_retries: 100,
            power_up_poll: Duration::from_millis(1),
        }
    }
}

/// Assemble the three output registers into a sign-extended sample.
///
/// The 24-bit value is shifted to the top of an `i32` so its sign bit lands
/// on bit 31, then arithmetic-shifted back down.
#[inline]
pub fn assemble_24(msb: u8, mid: u8, lsb: u8) -> RawSample {
    let raw = (u32::from(msb) << 16) | (u32::from(mid) << 8) | u32::from(lsb);
    ((raw << 8) as i32) >> 8
}

pub struct Nau7802<B, K = MonotonicClock> {
    bus: B,
    clock: K,
    settings: Nau7802Settings,
}

impl<B: RegisterBus> Nau7802<B, MonotonicClock> {
    pub fn new(bus: B, settings: Nau7802Settings) -> Self {
        Self::with_clock(bus, settings, MonotonicClock::new())
    }
}

impl<B: RegisterBus, K: Clock> Nau7802<B, K> {
    pub fn with_clock(bus: B, settings: Nau7802Settings, clock: K) -> Self {
        Self {
            bus,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &Nau7802Settings {
        &self.settings
    }

    /// Run the full bring-up sequence. Stops at the first failing step.
    pub fn configure(&mut self) -> Result<()> {
        let s = self.settings.clone();
        self.reset()?;
        self.power_up()?;
        self.set_ldo(s.ldo_code)?;
        self.set_gain(s.gain_code)?;
        self.set_sample_rate(s.sample_rate_code)?;
        self.set_register(ADC, ADC_CHOPPER_OFF)?;
        self.set_bit(PGA_PWR, PGA_PWR_PGA_CAP_EN)?;
        self.calibrate_afe()?;
        info!(
            ldo = s.ldo_code,
            gain = s.gain_code,
            rate = s.sample_rate_code,
            "nau7802 configured"
        );
        Ok(())
    }

    /// Reset all registers to power-on defaults.
    pub fn reset(&mut self) -> Result<()> {
        self.set_bit(PU_CTRL, PU_CTRL_RR)?;
        self.clock.sleep(Duration::from_millis(1));
        self.clear_bit(PU_CTRL, PU_CTRL_RR)
    }

    /// Power the digital and analog sections and wait for the ready bit.
    pub fn power_up(&mut self) -> Result<()> {
        self.set_bit(PU_CTRL, PU_CTRL_PUD)?;
        self.set_bit(PU_CTRL, PU_CTRL_PUA)?;

        let retries = self.settings.power_up_retries;
        let bus = &mut self.bus;
        let up = retry_until(&self.clock, retries, self.settings.power_up_poll, || {
            read_bit(bus, PU_CTRL, PU_CTRL_PUR)
        })?;
        if !up {
            return Err(HwError::PowerUpTimeout { retries });
        }
        debug!("nau7802 powered up");
        Ok(())
    }

    /// Low-power mode (~200 nA).
    pub fn power_down(&mut self) -> Result<()> {
        self.clear_bit(PU_CTRL, PU_CTRL_PUD)?;
        self.clear_bit(PU_CTRL, PU_CTRL_PUA)
    }

    /// Select the LDO voltage and switch AVDD to the internal LDO.
    pub fn set_ldo(&mut self, code: u8) -> Result<()> {
        self.update_field(CTRL1, CTRL1_VLDO_MASK, CTRL1_VLDO_SHIFT, code)?;
        self.set_bit(PU_CTRL, PU_CTRL_AVDDS)
    }

    pub fn set_gain(&mut self, code: u8) -> Result<()> {
        self.update_field(CTRL1, CTRL1_GAIN_MASK, 0, code)
    }

    pub fn set_sample_rate(&mut self, code: u8) -> Result<()> {
        self.update_field(CTRL2, CTRL2_CRS_MASK, CTRL2_CRS_SHIFT, code)
    }

    pub fn set_channel(&mut self, channel: Channel) -> Result<()> {
        match channel {
            Channel::One => self.clear_bit(CTRL2, CTRL2_CHS),
            Channel::Two => self.set_bit(CTRL2, CTRL2_CHS),
        }
    }

    /// DRDY pin high while a conversion is ready (power-on default).
    pub fn set_int_polarity_high(&mut self) -> Result<()> {
        self.clear_bit(CTRL1, CTRL1_CRP)
    }

    pub fn set_int_polarity_low(&mut self) -> Result<()> {
        self.set_bit(CTRL1, CTRL1_CRP)
    }

    /// Low nibble of DEVICE_REV; always `0x0F` on genuine parts.
    pub fn revision_code(&mut self) -> Result<u8> {
        Ok(self.get_register(DEVICE_REV)? & 0x0F)
    }

    pub fn begin_afe_calibration(&mut self) -> Result<()> {
        self.set_bit(CTRL2, CTRL2_CALS)
    }

    pub fn afe_status(&mut self) -> Result<AfeStatus> {
        afe_status(&mut self.bus)
    }

    /// Poll the AFE status until it leaves `InProgress` or `timeout` passes.
    pub fn wait_for_afe_calibration(&mut self, timeout: Duration) -> Result<()> {
        let bus = &mut self.bus;
        let mut last = AfeStatus::InProgress;
        let finished = wait_until(&self.clock, timeout, Duration::from_millis(1), || {
            last = afe_status(bus)?;
            Ok(last != AfeStatus::InProgress)
        })?;
        if !finished {
            return Err(HwError::AfeCalibrationTimeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            });
        }
        match last {
            AfeStatus::Success => Ok(()),
            _ => Err(HwError::AfeCalibrationFailed),
        }
    }

    /// Recalibrate the analog front end. Needed after any change of gain,
    /// sample rate or channel.
    pub fn calibrate_afe(&mut self) -> Result<()> {
        self.begin_afe_calibration()?;
        self.wait_for_afe_calibration(self.settings.afe_timeout)
    }

    /// Cycle-ready bit: a conversion is waiting in the output registers.
    pub fn available(&mut self) -> Result<bool> {
        self.get_bit(PU_CTRL, PU_CTRL_CR)
    }

    /// Read the output registers. Assumes `available()` was checked.
    pub fn read_conversion(&mut self) -> Result<RawSample> {
        let msb = self.get_register(ADCO_B2)?;
        let mid = self.get_register(ADCO_B1)?;
        let lsb = self.get_register(ADCO_B0)?;
        Ok(assemble_24(msb, mid, lsb))
    }

    /// One timer tick: read a conversion if one is ready.
    pub fn poll_once(&mut self) -> Result<Option<RawSample>> {
        if !self.available()? {
            return Ok(None);
        }
        let raw = self.read_conversion()?;
        trace!(raw, "nau7802 conversion");
        Ok(Some(raw))
    }

    /// `register = (register & !mask) | (value << shift)`, with `value`
    /// clamped to the 3-bit field range.
    pub fn update_field(&mut self, register: u8, mask: u8, shift: u8, value: u8) -> Result<()> {
        let value = value.min(MAX_FIELD_CODE);
        let current = self.get_register(register)?;
        let next = (current & !mask) | ((value << shift) & mask);
        self.set_register(register, next)
    }

    pub fn set_bit(&mut self, register: u8, bit: u8) -> Result<()> {
        let value = self.get_register(register)? | (1 << bit);
        self.set_register(register, value)
    }

    pub fn clear_bit(&mut self, register: u8, bit: u8) -> Result<()> {
        let value = self.get_register(register)? & !(1 << bit);
        self.set_register(register, value)
    }

    pub fn get_bit(&mut self, register: u8, bit: u8) -> Result<bool> {
        read_bit(&mut self.bus, register, bit)
    }

    pub fn get_register(&mut self, register: u8) -> Result<u8> {
        Ok(self.bus.read_register(register)?)
    }

    pub fn set_register(&mut self, register: u8, value: u8) -> Result<()> {
        Ok(self.bus.write_register(register, value)?)
    }
}

fn read_bit<B: RegisterBus>(bus: &mut B, register: u8, bit: u8) -> Result<bool> {
    Ok(bus.read_register(register)? & (1 << bit) != 0)
}

fn afe_status<B: RegisterBus>(bus: &mut B) -> Result<AfeStatus> {
    if read_bit(bus, CTRL2, CTRL2_CALS)? {
        return Ok(AfeStatus::InProgress);
    }
    if read_bit(bus, CTRL2, CTRL2_CAL_ERROR)? {
        return Ok(AfeStatus::Failure);
    }
    Ok(AfeStatus::Success)
}

impl<B: RegisterBus, K: Clock> FrontEnd for Nau7802<B, K> {
    fn name(&self) -> &'static str {
        "nau7802"
    }

    fn setup(&mut self) -> std::result::Result<(), BoxError> {
        Ok(self.configure()?)
    }

    fn service(&mut self, _timeout: Duration) -> std::result::Result<Option<RawSample>, BoxError> {
        Ok(self.poll_once()?)
    }
}

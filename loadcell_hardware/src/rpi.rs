//! Raspberry Pi bindings for the decoder traits (GPIO and I2C via `rppal`).
use std::time::Duration;

use loadcell_traits::{BoxError, ClockLine, DataLine, RegisterBus};
use rppal::gpio::{Gpio, InputPin, Level, OutputPin, Trigger};
use rppal::i2c::I2c;
use tracing::info;

use crate::error::{HwError, Result};
use crate::hx711::{GainPulses, Hx711};
use crate::nau7802::{Nau7802, Nau7802Settings};

pub struct RpiDataLine {
    pin: InputPin,
}

impl RpiDataLine {
    pub fn new(mut pin: InputPin) -> Result<Self> {
        pin.set_interrupt(Trigger::FallingEdge)
            .map_err(|e| HwError::Gpio(e.to_string()))?;
        Ok(Self { pin })
    }
}

impl DataLine for RpiDataLine {
    fn is_high(&mut self) -> std::result::Result<bool, BoxError> {
        Ok(self.pin.is_high())
    }

    fn wait_falling_edge(&mut self, timeout: Duration) -> std::result::Result<bool, BoxError> {
        // A low level already latched counts as ready; no edge would follow.
        if self.pin.is_low() {
            return Ok(true);
        }
        let level = self
            .pin
            .poll_interrupt(true, Some(timeout))
            .map_err(|e| HwError::Gpio(e.to_string()))?;
        Ok(matches!(level, Some(Level::Low)))
    }
}

pub struct RpiClockLine {
    pin: OutputPin,
}

impl RpiClockLine {
    pub fn new(pin: OutputPin) -> Self {
        Self { pin }
    }
}

impl ClockLine for RpiClockLine {
    fn set_high(&mut self) -> std::result::Result<(), BoxError> {
        self.pin.set_high();
        Ok(())
    }

    fn set_low(&mut self) -> std::result::Result<(), BoxError> {
        self.pin.set_low();
        Ok(())
    }
}

pub struct RpiI2c {
    bus: I2c,
}

impl RpiI2c {
    pub fn open(address: u16) -> Result<Self> {
        let mut bus = I2c::new().map_err(|e| HwError::I2c(e.to_string()))?;
        bus.set_slave_address(address)
            .map_err(|e| HwError::I2c(e.to_string()))?;
        Ok(Self { bus })
    }
}

impl RegisterBus for RpiI2c {
    fn read_register(&mut self, register: u8) -> std::result::Result<u8, BoxError> {
        Ok(self
            .bus
            .smbus_read_byte(register)
            .map_err(|e| HwError::I2c(e.to_string()))?)
    }

    fn write_register(&mut self, register: u8, value: u8) -> std::result::Result<(), BoxError> {
        Ok(self
            .bus
            .smbus_write_byte(register, value)
            .map_err(|e| HwError::I2c(e.to_string()))?)
    }
}

pub type RpiHx711 = Hx711<RpiDataLine, RpiClockLine>;
pub type RpiNau7802 = Nau7802<RpiI2c>;

/// Claim the DT/SCK pins (BCM numbering) and build an HX711 decoder.
pub fn open_hx711(
    data_pin: u8,
    clock_pin: u8,
    pulse_width: Duration,
    gain: GainPulses,
) -> Result<RpiHx711> {
    let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
    let dt = gpio
        .get(data_pin)
        .map_err(|e| HwError::Gpio(e.to_string()))?
        .into_input();
    let sck = gpio
        .get(clock_pin)
        .map_err(|e| HwError::Gpio(e.to_string()))?
        .into_output();
    info!(data_pin, clock_pin, gain = gain.gain(), "hx711 pins claimed");
    Hx711::new(RpiDataLine::new(dt)?, RpiClockLine::new(sck), pulse_width, gain)
}

/// Open the primary I2C bus for a NAU7802 at `address`. Bring-up happens
/// later through `FrontEnd::setup`.
pub fn open_nau7802(address: u16, settings: Nau7802Settings) -> Result<RpiNau7802> {
    let bus = RpiI2c::open(address)?;
    info!(address = format_args!("{address:#04x}"), "nau7802 bus opened");
    Ok(Nau7802::new(bus, settings))
}

use std::sync::{Arc, Mutex};
use std::time::Duration;

use loadcell_hardware::error::HwError;
use loadcell_hardware::nau7802::*;
use loadcell_traits::clock::test_clock::TestClock;
use loadcell_traits::{BoxError, FrontEnd, RegisterBus};

/// Register file that mimics the device side effects the driver relies on.
#[derive(Default)]
struct DeviceState {
    regs: [u8; 32],
    writes: Vec<(u8, u8)>,
    never_powers_up: bool,
    calibration_stuck: bool,
    calibration_error: bool,
}

#[derive(Clone, Default)]
struct FakeBus(Arc<Mutex<DeviceState>>);

impl FakeBus {
    fn reg(&self, r: u8) -> u8 {
        self.0.lock().unwrap().regs[r as usize]
    }

    fn set_reg(&self, r: u8, v: u8) {
        self.0.lock().unwrap().regs[r as usize] = v;
    }

    fn with(f: impl FnOnce(&mut DeviceState)) -> Self {
        let bus = Self::default();
        f(&mut bus.0.lock().unwrap());
        bus
    }
}

impl RegisterBus for FakeBus {
    fn read_register(&mut self, register: u8) -> Result<u8, BoxError> {
        let mut s = self.0.lock().unwrap();
        let value = s.regs[register as usize];
        // Calibration completes after being observed once.
        if register == CTRL2 && value & (1 << CTRL2_CALS) != 0 && !s.calibration_stuck {
            let mut done = value & !(1 << CTRL2_CALS);
            if s.calibration_error {
                done |= 1 << CTRL2_CAL_ERROR;
            }
            s.regs[register as usize] = done;
        }
        Ok(value)
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), BoxError> {
        let mut s = self.0.lock().unwrap();
        s.writes.push((register, value));
        let mut value = value;
        if register == PU_CTRL {
            let powered = value & (1 << PU_CTRL_PUD) != 0 && value & (1 << PU_CTRL_PUA) != 0;
            if powered && !s.never_powers_up {
                value |= 1 << PU_CTRL_PUR;
            } else if !powered {
                value &= !(1 << PU_CTRL_PUR);
            }
        }
        s.regs[register as usize] = value;
        Ok(())
    }
}

fn driver(bus: FakeBus) -> (Nau7802<FakeBus, TestClock>, TestClock) {
    let clock = TestClock::new();
    let dev = Nau7802::with_clock(bus, Nau7802Settings::default(), clock.clone());
    (dev, clock)
}

#[test]
fn configure_programs_default_registers() {
    let bus = FakeBus::default();
    let (mut dev, _clock) = driver(bus.clone());

    dev.configure().expect("setup succeeds");

    let ctrl1 = bus.reg(CTRL1);
    assert_eq!(ctrl1 & CTRL1_GAIN_MASK, Gain::X64.code());
    assert_eq!((ctrl1 & CTRL1_VLDO_MASK) >> CTRL1_VLDO_SHIFT, Ldo::V3_3.code());
    let ctrl2 = bus.reg(CTRL2);
    assert_eq!((ctrl2 & CTRL2_CRS_MASK) >> CTRL2_CRS_SHIFT, SampleRate::Sps20.code());
    assert_eq!(ctrl2 & (1 << CTRL2_CALS), 0, "calibration finished");
    assert_eq!(bus.reg(ADC), ADC_CHOPPER_OFF);
    assert_ne!(bus.reg(PGA_PWR) & (1 << PGA_PWR_PGA_CAP_EN), 0);

    let pu = bus.reg(PU_CTRL);
    assert_eq!(pu & (1 << PU_CTRL_RR), 0, "reset released");
    assert_ne!(pu & (1 << PU_CTRL_AVDDS), 0, "internal LDO selected");
}

#[test]
fn reset_pulses_rr_before_power_up() {
    let bus = FakeBus::default();
    let (mut dev, clock) = driver(bus.clone());
    dev.reset().unwrap();

    let writes = bus.0.lock().unwrap().writes.clone();
    assert_eq!(writes, vec![(PU_CTRL, 0x01), (PU_CTRL, 0x00)]);
    assert_eq!(clock.elapsed(), Duration::from_millis(1));
}

#[test]
fn power_down_clears_both_supplies_and_keeps_ldo_select() {
    let bus = FakeBus::default();
    let (mut dev, _clock) = driver(bus.clone());
    dev.configure().unwrap();
    assert_ne!(bus.reg(PU_CTRL) & (1 << PU_CTRL_PUR), 0, "powered after configure");
    bus.0.lock().unwrap().writes.clear();

    dev.power_down().unwrap();

    let pu = bus.reg(PU_CTRL);
    assert_eq!(pu & (1 << PU_CTRL_PUD), 0);
    assert_eq!(pu & (1 << PU_CTRL_PUA), 0);
    assert_eq!(pu & (1 << PU_CTRL_PUR), 0, "device reports not ready");
    assert_ne!(pu & (1 << PU_CTRL_AVDDS), 0, "LDO selection survives");
    let writes = bus.0.lock().unwrap().writes.clone();
    assert_eq!(writes.len(), 2);
    assert!(writes.iter().all(|&(reg, _)| reg == PU_CTRL));

    // The chip comes back with its settings intact.
    dev.power_up().unwrap();
    assert_ne!(bus.reg(PU_CTRL) & (1 << PU_CTRL_PUR), 0);
}

#[test]
fn power_up_gives_up_after_retry_budget() {
    let bus = FakeBus::with(|s| s.never_powers_up = true);
    let (mut dev, clock) = driver(bus);

    match dev.configure() {
        Err(HwError::PowerUpTimeout { retries }) => assert_eq!(retries, 100),
        other => panic!("expected power-up timeout, got {other:?}"),
    }
    // 1 ms reset hold plus 100 poll intervals.
    assert_eq!(clock.elapsed(), Duration::from_millis(101));
}

#[test]
fn stuck_afe_calibration_times_out() {
    let bus = FakeBus::with(|s| s.calibration_stuck = true);
    let (mut dev, clock) = driver(bus);

    match dev.configure() {
        Err(HwError::AfeCalibrationTimeout { timeout_ms }) => assert_eq!(timeout_ms, 1000),
        other => panic!("expected AFE timeout, got {other:?}"),
    }
    assert!(clock.elapsed() > Duration::from_millis(1000));
}

#[test]
fn afe_error_bit_fails_setup() {
    let bus = FakeBus::with(|s| s.calibration_error = true);
    let (mut dev, _clock) = driver(bus);
    assert!(matches!(dev.configure(), Err(HwError::AfeCalibrationFailed)));
}

#[test]
fn afe_status_reports_each_state() {
    let bus = FakeBus::with(|s| s.calibration_stuck = true);
    let (mut dev, _clock) = driver(bus.clone());

    bus.set_reg(CTRL2, 1 << CTRL2_CALS);
    assert_eq!(dev.afe_status().unwrap(), AfeStatus::InProgress);
    bus.set_reg(CTRL2, 1 << CTRL2_CAL_ERROR);
    assert_eq!(dev.afe_status().unwrap(), AfeStatus::Failure);
    bus.set_reg(CTRL2, 0);
    assert_eq!(dev.afe_status().unwrap(), AfeStatus::Success);
}

#[test]
fn field_writes_preserve_neighbouring_bits_and_clamp() {
    let bus = FakeBus::default();
    let (mut dev, _clock) = driver(bus.clone());

    bus.set_reg(CTRL2, 0b1000_0011);
    dev.set_sample_rate(9).unwrap();
    assert_eq!(bus.reg(CTRL2), 0b1111_0011);

    bus.set_reg(CTRL1, 0b1100_0000);
    dev.set_gain(Gain::X128.code()).unwrap();
    assert_eq!(bus.reg(CTRL1), 0b1100_0111);
    dev.set_gain(Gain::X1.code()).unwrap();
    assert_eq!(bus.reg(CTRL1), 0b1100_0000);
}

#[test]
fn channel_and_polarity_bits() {
    let bus = FakeBus::default();
    let (mut dev, _clock) = driver(bus.clone());

    dev.set_channel(Channel::Two).unwrap();
    assert_ne!(bus.reg(CTRL2) & (1 << CTRL2_CHS), 0);
    dev.set_channel(Channel::One).unwrap();
    assert_eq!(bus.reg(CTRL2) & (1 << CTRL2_CHS), 0);

    dev.set_int_polarity_low().unwrap();
    assert_ne!(bus.reg(CTRL1) & (1 << CTRL1_CRP), 0);
    dev.set_int_polarity_high().unwrap();
    assert_eq!(bus.reg(CTRL1) & (1 << CTRL1_CRP), 0);
}

#[test]
fn revision_code_masks_low_nibble() {
    let bus = FakeBus::default();
    bus.set_reg(DEVICE_REV, 0xAF);
    let (mut dev, _clock) = driver(bus);
    assert_eq!(dev.revision_code().unwrap(), 0x0F);
}

#[test]
fn poll_once_reads_only_when_cycle_ready() {
    let bus = FakeBus::default();
    let (mut dev, _clock) = driver(bus.clone());

    bus.set_reg(ADCO_B2, 0x80);
    bus.set_reg(ADCO_B1, 0x00);
    bus.set_reg(ADCO_B0, 0x01);
    assert_eq!(dev.poll_once().unwrap(), None);

    bus.set_reg(PU_CTRL, 1 << PU_CTRL_CR);
    assert_eq!(dev.poll_once().unwrap(), Some(-8_388_607));
}

#[test]
fn front_end_setup_and_service() {
    let bus = FakeBus::default();
    let (mut dev, _clock) = driver(bus.clone());

    FrontEnd::setup(&mut dev).unwrap();
    assert_eq!(dev.name(), "nau7802");

    bus.set_reg(ADCO_B2, 0x00);
    bus.set_reg(ADCO_B1, 0x00);
    bus.set_reg(ADCO_B0, 0x10);
    bus.set_reg(PU_CTRL, bus.reg(PU_CTRL) | (1 << PU_CTRL_CR));
    assert_eq!(dev.service(Duration::ZERO).unwrap(), Some(16));
}

#[test]
fn front_end_setup_failure_keeps_hw_error() {
    let bus = FakeBus::with(|s| s.never_powers_up = true);
    let (mut dev, _clock) = driver(bus);

    let err = FrontEnd::setup(&mut dev).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HwError>(),
        Some(HwError::PowerUpTimeout { .. })
    ));
}

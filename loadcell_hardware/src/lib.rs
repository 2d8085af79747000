//! ADC front-end decoders for load cells.
//!
//! [`hx711`] bit-bangs the two-wire serial protocol, [`nau7802`] drives the
//! I2C register interface. Both implement [`loadcell_traits::FrontEnd`] and
//! are generic over their line/bus seams; [`rpi`] supplies the Raspberry Pi
//! implementations when built with the `hardware` feature, and [`replay`]
//! plays back previously captured codes.
pub mod error;
pub mod hx711;
pub mod nau7802;
pub mod replay;
pub mod util;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod rpi;

pub use error::HwError;
pub use hx711::{GainPulses, Hx711};
pub use nau7802::{Nau7802, Nau7802Settings};
pub use replay::Replay;

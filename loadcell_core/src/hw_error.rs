//! Maps `Box<dyn Error>` from trait boundaries to typed `ScaleError`.
//!
//! With the `hardware-errors` feature the concrete `HwError` is downcast for
//! a precise mapping; otherwise (or for foreign errors) the message decides.

use crate::error::ScaleError;

pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> ScaleError {
    #[cfg(feature = "hardware-errors")]
    {
        use loadcell_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => ScaleError::Timeout,
                HwError::PowerUpTimeout { .. }
                | HwError::AfeCalibrationTimeout { .. }
                | HwError::AfeCalibrationFailed => ScaleError::Setup {
                    frontend: "nau7802",
                    reason: hw.to_string(),
                },
                other => ScaleError::Hardware(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        ScaleError::Timeout
    } else {
        ScaleError::Hardware(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_timeout_by_message() {
        let e = std::io::Error::other("read timeout on bus");
        assert_eq!(map_hw_error(&e), ScaleError::Timeout);
    }

    #[test]
    fn foreign_error_is_hardware() {
        let e = std::io::Error::other("nack");
        assert_eq!(map_hw_error(&e), ScaleError::Hardware("nack".into()));
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn typed_hw_errors() {
        use loadcell_hardware::error::HwError;
        assert_eq!(map_hw_error(&HwError::Timeout), ScaleError::Timeout);
        assert!(matches!(
            map_hw_error(&HwError::AfeCalibrationFailed),
            ScaleError::Setup { .. }
        ));
        assert_eq!(
            map_hw_error(&HwError::I2c("nack".into())),
            ScaleError::Hardware("i2c error: nack".into())
        );
    }
}

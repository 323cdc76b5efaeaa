use num_traits::PrimInt;
use strum_macros::{AsRefStr, EnumIter, FromRepr, VariantNames};

/// A trait to provide value and bit value methods for the bit enum.
pub trait BitEnum<T: PrimInt> {
    /// Get the value.
    ///
    /// # Returns
    /// Value.
    fn value(&self) -> T;

    /// Get the bit value.
    ///
    /// # Returns
    /// Bit value. If the value is not defined, it returns 0.
    fn bit_value(&self) -> T {
        match self.value().to_usize() {
            Some(value) => T::one() << value,
            None => T::zero(),
        }
    }
}

impl BitEnum<u64> for ErrorCode {
    fn value(&self) -> u64 {
        *self as u64
    }
}

impl BitEnum<u8> for BreakLevel {
    fn value(&self) -> u8 {
        *self as u8
    }
}

/// Command status.
#[derive(Debug, VariantNames, AsRefStr)]
pub enum CommandStatus {
    Success,
    Fail,
    Ack,
    NoAck,
}

/// Control channel of the rig.
#[derive(FromRepr, Debug, PartialEq, Clone, Copy, Hash, Eq, EnumIter, AsRefStr)]
#[repr(u8)]
pub enum ControlChannelId {
    #[strum(serialize = "extrusion_motor")]
    ExtrusionMotor = 1,
    #[strum(serialize = "spool_motor")]
    SpoolMotor = 2,
    #[strum(serialize = "heater")]
    Heater = 3,
    #[strum(serialize = "fan")]
    Fan = 4,
}

/// Control mode of a single channel.
#[derive(FromRepr, Debug, PartialEq, Clone, Copy)]
#[repr(u8)]
pub enum ChannelMode {
    Disabled = 1,
    OpenLoop = 2,
    ClosedLoop = 3,
}

/// Break level of the safety interlock. The bit positions match the bits
/// reported by the rig's safety sensor chain.
#[derive(Debug, PartialEq, Clone, Copy, Hash, Eq, EnumIter, FromRepr)]
#[repr(u8)]
pub enum BreakLevel {
    Level1 = 0,
    Level2 = 1,
    Level3 = 2,
}

/// Error code. If the name begins from the `Warn`, it is a warning. If the
/// name begins from the `Fault`, it is a fault.
#[derive(Debug, Clone, Copy, PartialEq, EnumIter, AsRefStr)]
pub enum ErrorCode {
    WarnMeasurementStale,
    WarnPidSaturation,
    WarnFallbackCoefficient,
    FaultDeviceWrite,
    FaultInterlockLevel1,
    FaultInterlockLevel2,
    FaultInterlockLevel3,
}

impl ErrorCode {
    /// The error code is a fault or not.
    ///
    /// # Returns
    /// True if the error code is a fault. Otherwise, false (a warning).
    pub fn is_fault(&self) -> bool {
        self.as_ref().starts_with("Fault")
    }

    /// Get the error code of the interlock break level.
    ///
    /// # Arguments
    /// * `level` - Break level.
    ///
    /// # Returns
    /// Error code.
    pub fn from_break_level(level: BreakLevel) -> Self {
        match level {
            BreakLevel::Level1 => ErrorCode::FaultInterlockLevel1,
            BreakLevel::Level2 => ErrorCode::FaultInterlockLevel2,
            BreakLevel::Level3 => ErrorCode::FaultInterlockLevel3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use strum::IntoEnumIterator;

    use crate::constants::{NUM_BREAK_LEVEL, NUM_CONTROL_CHANNEL};

    #[test]
    fn test_command_status() {
        assert_eq!(CommandStatus::Success.as_ref().to_lowercase(), "success");
        assert_eq!(CommandStatus::Fail.as_ref().to_lowercase(), "fail");
        assert_eq!(CommandStatus::Ack.as_ref().to_lowercase(), "ack");
        assert_eq!(CommandStatus::NoAck.as_ref().to_lowercase(), "noack");
    }

    #[test]
    fn test_control_channel_id() {
        // Get the enum from the repr.
        assert_eq!(
            ControlChannelId::from_repr(1).unwrap(),
            ControlChannelId::ExtrusionMotor
        );
        assert_eq!(
            ControlChannelId::from_repr(4).unwrap(),
            ControlChannelId::Fan
        );
        assert!(ControlChannelId::from_repr(5).is_none());

        // Get the enum value.
        assert_eq!(ControlChannelId::SpoolMotor as u8, 2);

        assert_eq!(ControlChannelId::iter().count(), NUM_CONTROL_CHANNEL);
    }

    #[test]
    fn test_control_channel_id_key() {
        assert_eq!(ControlChannelId::ExtrusionMotor.as_ref(), "extrusion_motor");
        assert_eq!(ControlChannelId::SpoolMotor.as_ref(), "spool_motor");
        assert_eq!(ControlChannelId::Heater.as_ref(), "heater");
        assert_eq!(ControlChannelId::Fan.as_ref(), "fan");
    }

    #[test]
    fn test_channel_mode() {
        assert_eq!(ChannelMode::from_repr(1).unwrap(), ChannelMode::Disabled);
        assert_eq!(ChannelMode::from_repr(3).unwrap(), ChannelMode::ClosedLoop);
        assert!(ChannelMode::from_repr(0).is_none());
    }

    #[test]
    fn test_break_level_bit_value() {
        assert_eq!(BreakLevel::Level1.bit_value(), 1);
        assert_eq!(BreakLevel::Level2.bit_value(), 2);
        assert_eq!(BreakLevel::Level3.bit_value(), 4);

        assert_eq!(BreakLevel::iter().count(), NUM_BREAK_LEVEL);
    }

    #[test]
    fn test_error_code_bit_value() {
        assert_eq!(ErrorCode::WarnMeasurementStale.bit_value(), 1);
        assert_eq!(ErrorCode::WarnPidSaturation.bit_value(), 2);
        assert_eq!(ErrorCode::FaultInterlockLevel3.bit_value(), 1 << 6);
    }

    #[test]
    fn test_error_code_is_fault() {
        assert!(!ErrorCode::WarnMeasurementStale.is_fault());
        assert!(!ErrorCode::WarnFallbackCoefficient.is_fault());
        assert!(ErrorCode::FaultDeviceWrite.is_fault());
        assert!(ErrorCode::FaultInterlockLevel1.is_fault());
    }

    #[test]
    fn test_error_code_from_break_level() {
        assert_eq!(
            ErrorCode::from_break_level(BreakLevel::Level1),
            ErrorCode::FaultInterlockLevel1
        );
        assert_eq!(
            ErrorCode::from_break_level(BreakLevel::Level3),
            ErrorCode::FaultInterlockLevel3
        );
    }
}

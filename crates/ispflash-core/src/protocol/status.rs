//! Busy/idle status reported by the device after erase and program commands.

use std::fmt;

/// Two busy flags polled after an asynchronous erase or program.
///
/// The device is idle only when both flags are clear.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceStatus {
    pub busy_flag_0: bool,
    pub busy_flag_1: bool,
}

impl DeviceStatus {
    pub const IDLE: Self = Self {
        busy_flag_0: false,
        busy_flag_1: false,
    };

    pub const BUSY: Self = Self {
        busy_flag_0: true,
        busy_flag_1: true,
    };

    /// Decode the two status bytes returned by the status command.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [b0, b1, ..] => Some(Self {
                busy_flag_0: *b0 != 0,
                busy_flag_1: *b1 != 0,
            }),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.busy_flag_0 && !self.busy_flag_1
    }
}

impl fmt::Debug for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DeviceStatus({}{})",
            self.busy_flag_0 as u8, self.busy_flag_1 as u8
        )
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_idle() {
            write!(f, "idle")
        } else {
            write!(
                f,
                "busy (flag0={}, flag1={})",
                self.busy_flag_0 as u8, self.busy_flag_1 as u8
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_requires_both_flags_clear() {
        assert!(DeviceStatus::from_bytes(&[0, 0]).unwrap().is_idle());
        assert!(!DeviceStatus::from_bytes(&[1, 0]).unwrap().is_idle());
        assert!(!DeviceStatus::from_bytes(&[0, 0x80]).unwrap().is_idle());
    }

    #[test]
    fn test_short_status_rejected() {
        assert!(DeviceStatus::from_bytes(&[0]).is_none());
        assert!(DeviceStatus::from_bytes(&[]).is_none());
    }
}

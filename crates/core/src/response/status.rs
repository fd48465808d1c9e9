//! Status words (SW1 SW2)

use std::fmt;

/// Status word closing every APDU response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord {
    /// First status byte
    pub sw1: u8,
    /// Second status byte
    pub sw2: u8,
}

impl StatusWord {
    /// Normal processing (90 00)
    pub const SUCCESS: Self = Self::new(0x90, 0x00);

    /// Logical channel not supported or not open (68 81)
    pub const CHANNEL_NOT_SUPPORTED: Self = Self::new(0x68, 0x81);

    /// Function not supported, also sent when no further channel is free (6A 81)
    pub const FUNCTION_NOT_SUPPORTED: Self = Self::new(0x6A, 0x81);

    /// Application not found (6A 82)
    pub const NOT_FOUND: Self = Self::new(0x6A, 0x82);

    /// Create a status word from its two bytes
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    /// Exactly 90 00
    pub const fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    /// SW1 in the 9X group
    ///
    /// MANAGE CHANNEL open is accepted on any 9X status, which includes the
    /// 91 XX "proactive command pending" an eUICC may answer with.
    pub const fn is_normal_group(&self) -> bool {
        self.sw1 & 0xF0 == 0x90
    }

    /// SW1 of 90 or 61, the outcomes that count as a successful SELECT
    pub const fn is_select_accepted(&self) -> bool {
        matches!(self.sw1, 0x90 | 0x61)
    }

    /// Short human-readable meaning, for logs
    pub const fn description(&self) -> &'static str {
        match (self.sw1, self.sw2) {
            (0x90, 0x00) => "Success",
            (0x91, _) => "Success, proactive command pending",
            (0x61, _) => "Response bytes available",
            (0x62 | 0x63, _) => "Warning",
            (0x67, 0x00) => "Wrong length",
            (0x68, 0x81) => "Logical channel not supported",
            (0x69, 0x85) => "Conditions of use not satisfied",
            (0x6A, 0x81) => "Function not supported",
            (0x6A, 0x82) => "Application not found",
            (0x6A, 0x86) => "Incorrect P1-P2",
            (0x6C, _) => "Wrong Le",
            (0x6D, 0x00) => "Instruction not supported",
            (0x6E, 0x00) => "Class not supported",
            _ => "Unknown status",
        }
    }
}

impl From<(u8, u8)> for StatusWord {
    fn from((sw1, sw2): (u8, u8)) -> Self {
        Self::new(sw1, sw2)
    }
}

impl From<StatusWord> for u16 {
    fn from(status: StatusWord) -> Self {
        Self::from_be_bytes([status.sw1, status.sw2])
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} {:02X}", self.sw1, self.sw2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups() {
        assert!(StatusWord::SUCCESS.is_normal_group());
        assert!(StatusWord::new(0x91, 0x10).is_normal_group());
        assert!(!StatusWord::new(0x61, 0x10).is_normal_group());

        assert!(StatusWord::new(0x90, 0x01).is_select_accepted());
        assert!(StatusWord::new(0x61, 0x1C).is_select_accepted());
        assert!(!StatusWord::NOT_FOUND.is_select_accepted());
        assert!(!StatusWord::new(0x91, 0x00).is_select_accepted());
    }

    #[test]
    fn test_display_and_conversions() {
        assert_eq!(StatusWord::NOT_FOUND.to_string(), "6A 82");
        assert_eq!(u16::from(StatusWord::from((0x90, 0x00))), 0x9000);
        assert_eq!(StatusWord::NOT_FOUND.description(), "Application not found");
        assert_eq!(StatusWord::FUNCTION_NOT_SUPPORTED.description(), "Function not supported");
        assert_eq!(
            StatusWord::CHANNEL_NOT_SUPPORTED.description(),
            "Logical channel not supported"
        );
    }
}

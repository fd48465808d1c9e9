//! Configuration options for the T=0 transport

use std::time::Duration;

use derive_more::Display;

/// Parity setting of the serial line
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    /// No parity bit
    #[display("none")]
    None,
    /// Even parity, as ISO/IEC 7816-3 requires
    #[display("even")]
    Even,
    /// Odd parity
    #[display("odd")]
    Odd,
}

/// UART parameters a [`Link`](crate::Link) implementation should apply
///
/// The engine never touches the peripheral itself; these values travel with
/// the configuration so the host driver and the protocol timing stay in one
/// place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialSettings {
    /// Baud rate (9600 at the default Fi/Di and a 3.57 MHz clock)
    pub baud_rate: u32,
    /// Data bits per character
    pub data_bits: u8,
    /// Parity
    pub parity: Parity,
    /// Stop bits (2 gives the card its guard time)
    pub stop_bits: u8,
    /// Hardware flow control
    pub flow_control: bool,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: 8,
            parity: Parity::Even,
            stop_bits: 2,
            flow_control: false,
        }
    }
}

/// Configuration options for the T=0 transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct T0Config {
    /// How long the echo of a transmitted block may take
    pub echo_timeout: Duration,

    /// Wait for each procedure byte after the header
    pub procedure_timeout: Duration,

    /// Wait for SW2, and for any unsolicited byte after it, on the early-status path
    pub status_timeout: Duration,

    /// Wait for the first response byte (card compute time)
    pub response_first_timeout: Duration,

    /// Wait for each following response byte; expiry means the card went idle
    pub response_next_timeout: Duration,

    /// Wait for the ATR lead byte after reset
    pub atr_lead_timeout: Duration,

    /// Wait for each further ATR byte
    pub atr_byte_timeout: Duration,

    /// Pause before draining what the card sends after the parsed ATR
    pub atr_settle_delay: Duration,

    /// Time contacts stay deactivated during a cold reset
    pub deactivation_delay: Duration,

    /// Time between VCC on and RST release
    pub activation_delay: Duration,

    /// NULL procedure bytes tolerated per command
    pub null_budget: u32,

    /// Upper bound on response bytes collected for one command
    pub max_response_len: usize,

    /// Cold reset + ATR rounds attempted by connect
    pub connect_attempts: u8,

    /// Serial line parameters for the host driver
    pub serial: SerialSettings,
}

impl Default for T0Config {
    fn default() -> Self {
        Self {
            echo_timeout: Duration::from_millis(500),
            procedure_timeout: Duration::from_millis(3000),
            status_timeout: Duration::from_millis(500),
            response_first_timeout: Duration::from_millis(5000),
            response_next_timeout: Duration::from_millis(300),
            atr_lead_timeout: Duration::from_millis(1000),
            atr_byte_timeout: Duration::from_millis(500),
            atr_settle_delay: Duration::from_millis(500),
            deactivation_delay: Duration::from_millis(100),
            activation_delay: Duration::from_millis(10),
            null_budget: 1024,
            // 65536 data bytes plus the status word
            max_response_len: 65538,
            connect_attempts: 1,
            serial: SerialSettings::default(),
        }
    }
}

impl T0Config {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// A configuration without any delay, for simulated links that answer instantly
    pub fn immediate() -> Self {
        Self {
            echo_timeout: Duration::ZERO,
            procedure_timeout: Duration::ZERO,
            status_timeout: Duration::ZERO,
            response_first_timeout: Duration::ZERO,
            response_next_timeout: Duration::ZERO,
            atr_lead_timeout: Duration::ZERO,
            atr_byte_timeout: Duration::ZERO,
            atr_settle_delay: Duration::ZERO,
            deactivation_delay: Duration::ZERO,
            activation_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Set the echo timeout
    pub const fn with_echo_timeout(mut self, timeout: Duration) -> Self {
        self.echo_timeout = timeout;
        self
    }

    /// Set the procedure byte timeout
    pub const fn with_procedure_timeout(mut self, timeout: Duration) -> Self {
        self.procedure_timeout = timeout;
        self
    }

    /// Set the timeout for SW2 after an early SW1
    pub const fn with_status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }

    /// Set the response timeouts for the first and each following byte
    pub const fn with_response_timeouts(mut self, first: Duration, next: Duration) -> Self {
        self.response_first_timeout = first;
        self.response_next_timeout = next;
        self
    }

    /// Set the NULL procedure byte budget
    pub const fn with_null_budget(mut self, budget: u32) -> Self {
        self.null_budget = budget;
        self
    }

    /// Set the response size cap
    pub const fn with_max_response_len(mut self, len: usize) -> Self {
        self.max_response_len = len;
        self
    }

    /// Set how many reset rounds connect may use
    pub const fn with_connect_attempts(mut self, attempts: u8) -> Self {
        self.connect_attempts = attempts;
        self
    }

    /// Set the serial line parameters
    pub const fn with_serial(mut self, serial: SerialSettings) -> Self {
        self.serial = serial;
        self
    }
}

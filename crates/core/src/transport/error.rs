//! Error types specific to card transport

use derive_more::Display;
use thiserror::Error;

/// Stage of the Answer-To-Reset sequence where a byte failed to arrive
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum AtrStage {
    /// Waiting for T0 after the lead byte(s)
    #[display("T0")]
    T0,
    /// Waiting for an interface byte announced by T0
    #[display("interface bytes")]
    InterfaceBytes,
    /// Waiting for one of the K historical bytes
    #[display("historical bytes")]
    HistoricalBytes,
}

/// Why the echo of a transmitted block did not check out
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EchoFault {
    /// The link accepted fewer bytes than requested
    #[error("link accepted {written} of {expected} bytes")]
    ShortWrite {
        /// Bytes handed to the link
        expected: usize,
        /// Bytes the link reported as written
        written: usize,
    },

    /// Fewer echo bytes arrived than were sent before the echo timeout
    #[error("echo timed out after {received} of {expected} bytes")]
    Short {
        /// Bytes sent
        expected: usize,
        /// Echo bytes received
        received: usize,
    },

    /// An echo byte differs from the transmitted one
    #[error("echo mismatch at offset {offset}: sent {sent:#04X}, read back {received:#04X}")]
    Mismatch {
        /// Offset of the first differing byte
        offset: usize,
        /// Byte that was sent
        sent: u8,
        /// Byte that was read back
        received: u8,
    },
}

/// Transport error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The echo of a transmitted block was short, late or wrong
    #[error("Link echo error: {0}")]
    LinkEcho(#[from] EchoFault),

    /// The card never acknowledged a command header
    #[error("No procedure byte received for INS {ins:#04X}")]
    NoAck {
        /// Instruction byte of the unacknowledged command
        ins: u8,
    },

    /// The card kept requesting more time past the configured budget
    #[error("Card sent {nulls} NULL procedure bytes without completing")]
    WaitBudgetExhausted {
        /// NULL bytes received before giving up
        nulls: u32,
    },

    /// SW1 arrived on the procedure-byte path but SW2 did not
    #[error("SW1 {sw1:#04X} received without SW2")]
    MissingStatus {
        /// First status byte
        sw1: u8,
    },

    /// The card sent a byte after the status word that no accounting predicts
    #[error("Unexpected byte {extra:#04X} after status {sw1:02X} {sw2:02X}")]
    ProtocolDesync {
        /// First status byte
        sw1: u8,
        /// Second status byte
        sw2: u8,
        /// The unsolicited byte
        extra: u8,
    },

    /// Fewer response bytes arrived than the command predicts
    #[error("Short response: expected {expected} bytes, received {received}")]
    ShortResponse {
        /// Predicted byte count
        expected: usize,
        /// Bytes actually received
        received: usize,
    },

    /// No card answered the reset
    #[error("No card present (first byte: {lead:02X?})")]
    CardAbsent {
        /// The first byte seen, if any arrived
        lead: Option<u8>,
    },

    /// The ATR stopped mid-sequence
    #[error("ATR truncated while reading {stage}")]
    AtrTruncated {
        /// Where the sequence stopped
        stage: AtrStage,
    },

    /// Operation requires a connected card
    #[error("Transport is not connected")]
    NotConnected,

    /// The physical link failed
    #[error("Link error: {0}")]
    Link(String),
}

impl TransportError {
    /// Create a link failure error
    pub fn link<S: Into<String>>(message: S) -> Self {
        Self::Link(message.into())
    }

    /// Whether the link must be considered desynchronized after this error
    ///
    /// An echo fault only spoils the command being sent. Every other failure
    /// happens after the card has started processing a command, and the only
    /// way back to a known state is a reset.
    pub const fn requires_reconnect(&self) -> bool {
        !matches!(
            self,
            Self::LinkEcho(_)
                | Self::NotConnected
                | Self::CardAbsent { .. }
                | Self::AtrTruncated { .. }
        )
    }
}

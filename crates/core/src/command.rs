//! APDU command parsing and response-length derivation
//!
//! T=0 has no length framing of its own: the reader must know, from the
//! command bytes alone, how many response bytes the card is going to send.
//! [`Command::case`] classifies a raw command into one of the ISO/IEC 7816-3
//! cases and [`Command::expected_response`] turns that into a byte count.

use bytes::{BufMut, Bytes, BytesMut};
use derive_more::Display;

use crate::{Error, Result};

/// Length of the T=0 command header (CLA INS P1 P2 P3)
pub const HEADER_LEN: usize = 5;

/// TERMINAL CAPABILITIES, sent once after every reset
pub const TERMINAL_CAPABILITIES: [u8; 15] = [
    0x80, 0xAA, 0x00, 0x00, 0x0A, 0xA9, 0x08, 0x81, 0x00, 0x82, 0x01, 0x01, 0x83, 0x01, 0x07,
];

/// MANAGE CHANNEL open on the basic channel, expecting one channel byte
pub const MANAGE_CHANNEL_OPEN: [u8; 5] = [0x00, 0x70, 0x00, 0x00, 0x01];

/// MANAGE CHANNEL close template; the channel goes into the CLA low bits
pub const MANAGE_CHANNEL_CLOSE: [u8; 5] = [0x00, 0x70, 0x80, 0xFF, 0x00];

/// SELECT by AID template; P3 is replaced by the AID length
pub const SELECT_BY_AID: [u8; 5] = [0x00, 0xA4, 0x04, 0x00, 0xFF];

/// Highest logical channel number addressable through the first interindustry CLA
pub const MAX_CHANNEL: u8 = 3;

/// How many bytes the card will send back for a command
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum ResponseLength {
    /// Exactly this many bytes, status word included
    #[display("{_0} bytes")]
    Exact(usize),
    /// Unknown; accept whatever arrives until the link goes idle
    #[display("until idle")]
    UntilIdle,
}

impl ResponseLength {
    /// Length implied by an Le value, where Le = 0 means "as much as available"
    pub const fn from_le(le: usize) -> Self {
        if le == 0 {
            Self::UntilIdle
        } else {
            Self::Exact(le + 2)
        }
    }

    /// The exact byte count, if one is known
    pub const fn exact(&self) -> Option<usize> {
        match self {
            Self::Exact(n) => Some(*n),
            Self::UntilIdle => None,
        }
    }
}

/// ISO/IEC 7816-3 command case, as seen on a T=0 link
///
/// Case 1 travels as a 5-byte header with P3 = 00 and is therefore
/// indistinguishable from [`CommandCase::Case2Short`] with Le = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCase {
    /// Header with a one-byte Le in P3
    Case2Short {
        /// Expected data length
        le: usize,
    },
    /// Header, one-byte Lc and data
    Case3Short,
    /// Header, one-byte Lc, data and a one-byte Le
    Case4Short {
        /// Expected data length
        le: usize,
    },
    /// Header with P3 = 00 and a two-byte Le
    Case2Extended {
        /// Expected data length
        le: usize,
    },
    /// Header with P3 = 00, two-byte Lc and data
    Case3Extended,
    /// Header with P3 = 00, two-byte Lc, data and a two-byte Le
    Case4Extended {
        /// Expected data length
        le: usize,
    },
    /// The declared Lc does not fit the command body
    Inconsistent,
}

impl CommandCase {
    /// Response length this case predicts
    pub const fn expected_response(&self) -> ResponseLength {
        match *self {
            Self::Case2Short { le }
            | Self::Case4Short { le }
            | Self::Case2Extended { le }
            | Self::Case4Extended { le } => ResponseLength::from_le(le),
            Self::Case3Short | Self::Case3Extended => ResponseLength::Exact(2),
            Self::Inconsistent => ResponseLength::UntilIdle,
        }
    }
}

/// A raw APDU command, validated to carry at least a T=0 header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command<'a> {
    raw: &'a [u8],
}

impl<'a> Command<'a> {
    /// Wrap raw command bytes
    pub fn parse(raw: &'a [u8]) -> Result<Self> {
        if raw.len() < HEADER_LEN {
            return Err(Error::InvalidCommandLength(raw.len()));
        }
        Ok(Self { raw })
    }

    /// Command class byte
    pub const fn class(&self) -> u8 {
        self.raw[0]
    }

    /// Instruction byte
    pub const fn instruction(&self) -> u8 {
        self.raw[1]
    }

    /// First parameter
    pub const fn p1(&self) -> u8 {
        self.raw[2]
    }

    /// Second parameter
    pub const fn p2(&self) -> u8 {
        self.raw[3]
    }

    /// The fifth header byte (Lc, Le or the extended-length marker)
    pub const fn p3(&self) -> u8 {
        self.raw[4]
    }

    /// The 5-byte header sent before the first procedure byte
    pub fn header(&self) -> &'a [u8] {
        &self.raw[..HEADER_LEN]
    }

    /// Everything after the header
    pub fn body(&self) -> &'a [u8] {
        &self.raw[HEADER_LEN..]
    }

    /// The full command
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.raw
    }

    /// Classify the command
    ///
    /// The Lc consistency check runs first, then the no-Le boundary check,
    /// and only then is the trailing Le read.
    pub fn case(&self) -> CommandCase {
        let raw = self.raw;
        let tx_len = raw.len();
        let p3 = usize::from(self.p3());

        if tx_len == HEADER_LEN {
            return CommandCase::Case2Short { le: p3 };
        }

        // body covers P3 onwards
        let body = tx_len - 4;

        if p3 != 0 {
            let lc = p3;
            if lc + 1 != body && lc + 2 != body {
                CommandCase::Inconsistent
            } else if tx_len == HEADER_LEN + lc {
                CommandCase::Case3Short
            } else {
                CommandCase::Case4Short {
                    le: usize::from(raw[tx_len - 1]),
                }
            }
        } else {
            match tx_len {
                6 => CommandCase::Inconsistent,
                7 => CommandCase::Case2Extended {
                    le: be16(raw, 5),
                },
                _ => {
                    let lc = be16(raw, 5);
                    if lc + 3 != body && lc + 5 != body {
                        CommandCase::Inconsistent
                    } else if tx_len == 7 + lc {
                        CommandCase::Case3Extended
                    } else {
                        CommandCase::Case4Extended {
                            le: be16(raw, tx_len - 2),
                        }
                    }
                }
            }
        }
    }

    /// How many bytes the card will answer with
    pub fn expected_response(&self) -> ResponseLength {
        self.case().expected_response()
    }
}

fn be16(raw: &[u8], offset: usize) -> usize {
    usize::from(u16::from_be_bytes([raw[offset], raw[offset + 1]]))
}

/// Encode a logical channel number into a CLA byte
pub const fn with_channel(cla: u8, channel: u8) -> u8 {
    (cla & 0xF0) | channel
}

/// Build SELECT by AID for a logical channel
pub fn select_by_aid(channel: u8, aid: &[u8]) -> Result<Bytes> {
    if aid.is_empty() {
        return Err(Error::InvalidCommandData("AID must not be empty"));
    }
    let Ok(lc) = u8::try_from(aid.len()) else {
        return Err(Error::InvalidCommandData("AID longer than 255 bytes"));
    };

    let mut buffer = BytesMut::with_capacity(HEADER_LEN + aid.len());
    buffer.put_slice(&SELECT_BY_AID);
    buffer[0] = with_channel(buffer[0], channel);
    buffer[4] = lc;
    buffer.put_slice(aid);
    Ok(buffer.freeze())
}

/// Build MANAGE CHANNEL close for a logical channel
pub const fn close_channel(channel: u8) -> [u8; 5] {
    let mut command = MANAGE_CHANNEL_CLOSE;
    command[0] = with_channel(command[0], channel);
    command
}

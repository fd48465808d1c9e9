//! Answer-To-Reset discovery
//!
//! Only as much of the ATR is parsed as is needed to know where it ends:
//! the lead byte(s), T0, one byte per interface-byte presence bit in T0 and
//! the K historical bytes. Interface byte values are not interpreted and
//! TD chaining is not followed, so a card announcing further interface
//! groups through TD1 leaves those bytes to the final drain.

use std::fmt;

use bytes::{Bytes, BytesMut};
use euicc_apdu_core::transport::{AtrStage, TransportError};
use tracing::debug;

use crate::config::T0Config;
use crate::link::{HalfDuplex, Link, pause};

/// TS byte for the direct convention
pub const LEAD_BYTE: u8 = 0x3B;

/// A parsed Answer-To-Reset
#[derive(Clone, PartialEq, Eq)]
pub struct Atr {
    lead_count: usize,
    t0: u8,
    interface_bytes: Bytes,
    historical_bytes: Bytes,
    trailing: Bytes,
}

impl Atr {
    /// How many lead bytes preceded T0
    pub const fn lead_count(&self) -> usize {
        self.lead_count
    }

    /// The format byte T0
    pub const fn t0(&self) -> u8 {
        self.t0
    }

    /// Number of historical bytes announced by T0
    pub const fn historical_count(&self) -> usize {
        (self.t0 & 0x0F) as usize
    }

    /// Interface bytes consumed, one per presence bit in T0
    pub const fn interface_bytes(&self) -> &Bytes {
        &self.interface_bytes
    }

    /// Historical bytes
    pub const fn historical_bytes(&self) -> &Bytes {
        &self.historical_bytes
    }

    /// Whatever the card sent after the parsed part, drained and discarded
    pub const fn trailing(&self) -> &Bytes {
        &self.trailing
    }

    /// The ATR bytes as received, lead bytes included
    pub fn to_bytes(&self) -> Bytes {
        let mut bytes = BytesMut::with_capacity(
            self.lead_count
                + 1
                + self.interface_bytes.len()
                + self.historical_bytes.len()
                + self.trailing.len(),
        );
        bytes.resize(self.lead_count, LEAD_BYTE);
        bytes.extend_from_slice(&[self.t0]);
        bytes.extend_from_slice(&self.interface_bytes);
        bytes.extend_from_slice(&self.historical_bytes);
        bytes.extend_from_slice(&self.trailing);
        bytes.freeze()
    }
}

impl fmt::Debug for Atr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atr")
            .field("lead_count", &self.lead_count)
            .field("t0", &format_args!("{:#04X}", self.t0))
            .field("interface_bytes", &hex::encode_upper(&self.interface_bytes))
            .field("historical_bytes", &hex::encode_upper(&self.historical_bytes))
            .field("trailing", &hex::encode_upper(&self.trailing))
            .finish()
    }
}

/// Read the ATR a card sends after its RST line is released
pub fn read_atr<L: Link>(
    port: &mut HalfDuplex<L>,
    config: &T0Config,
) -> Result<Atr, TransportError> {
    // AwaitLead
    match port.read_byte(config.atr_lead_timeout)? {
        Some(LEAD_BYTE) => {}
        lead => {
            let pending = port.buffered_len().unwrap_or(0);
            debug!(?lead, pending, "No ATR lead byte");
            return Err(TransportError::CardAbsent { lead });
        }
    }

    // AwaitT0, skipping repeated lead bytes
    let mut lead_count = 1;
    let t0 = loop {
        match next(port, config, AtrStage::T0)? {
            LEAD_BYTE => lead_count += 1,
            byte => break byte,
        }
    };
    debug!(t0 = format_args!("{t0:#04X}"), lead_count, "ATR format byte");

    // AwaitInterfaceBytes
    let mut interface_bytes = BytesMut::with_capacity(4);
    for group in 0..4 {
        if t0 & (0x10 << group) != 0 {
            let byte = next(port, config, AtrStage::InterfaceBytes)?;
            debug!(group, byte = format_args!("{byte:#04X}"), "ATR interface byte");
            interface_bytes.extend_from_slice(&[byte]);
        }
    }

    // AwaitHistorical
    let k = usize::from(t0 & 0x0F);
    let mut historical_bytes = BytesMut::with_capacity(k);
    for _ in 0..k {
        let byte = next(port, config, AtrStage::HistoricalBytes)?;
        historical_bytes.extend_from_slice(&[byte]);
    }

    // Drain
    pause(config.atr_settle_delay);
    let trailing = port.drain(config.atr_byte_timeout)?;
    if !trailing.is_empty() {
        debug!(trailing = %hex::encode_upper(&trailing), "Discarding bytes after ATR");
    }

    let atr = Atr {
        lead_count,
        t0,
        interface_bytes: interface_bytes.freeze(),
        historical_bytes: historical_bytes.freeze(),
        trailing,
    };
    debug!(?atr, "Card present");
    Ok(atr)
}

fn next<L: Link>(
    port: &mut HalfDuplex<L>,
    config: &T0Config,
    stage: AtrStage,
) -> Result<u8, TransportError> {
    port.read_byte(config.atr_byte_timeout)?
        .ok_or(TransportError::AtrTruncated { stage })
}

//! Half-duplex serial link with echo cancellation
//!
//! The card I/O line is shared by both directions, so every byte the reader
//! sends comes straight back on its own receiver. [`HalfDuplex`] reads that
//! echo back after each write and checks it, so that only bytes produced by
//! the card reach the protocol layers above.

use std::fmt;
use std::thread;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use euicc_apdu_core::transport::{EchoFault, TransportError};
use tracing::{debug, trace};

use crate::config::T0Config;
use crate::error::LinkError;

/// Byte-level access to the card: the I/O line plus the VCC and RST contacts
///
/// Implemented by the host's UART/GPIO driver. Every read carries an explicit
/// timeout; running out of time is reported as a short count, while `Err` is
/// reserved for a broken link.
pub trait Link: Send + fmt::Debug {
    /// Write bytes to the I/O line, returning how many were accepted
    fn write(&mut self, bytes: &[u8]) -> Result<usize, LinkError>;

    /// Read until `buf` is full or `timeout` elapses, returning the byte count
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, LinkError>;

    /// Number of received bytes waiting to be read
    fn buffered_len(&mut self) -> Result<usize, LinkError>;

    /// Discard all buffered input
    fn flush(&mut self) -> Result<(), LinkError>;

    /// Switch the card supply (VCC)
    fn set_power(&mut self, on: bool) -> Result<(), LinkError>;

    /// Drive RST: `true` releases the card from reset, `false` holds it
    fn set_reset(&mut self, released: bool) -> Result<(), LinkError>;
}

/// A [`Link`] wrapper that verifies the echo of everything it sends
#[derive(Debug)]
pub struct HalfDuplex<L: Link> {
    link: L,
    echo_timeout: Duration,
}

impl<L: Link> HalfDuplex<L> {
    /// Wrap a link
    pub const fn new(link: L, echo_timeout: Duration) -> Self {
        Self { link, echo_timeout }
    }

    /// Get a reference to the underlying link
    pub const fn link(&self) -> &L {
        &self.link
    }

    /// Get a mutable reference to the underlying link
    pub const fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Take ownership of the link and return it
    pub fn into_inner(self) -> L {
        self.link
    }

    /// Send bytes and consume their echo
    ///
    /// The echo must arrive in full within the echo timeout and match
    /// byte for byte.
    pub fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if bytes.is_empty() {
            return Ok(());
        }
        trace!(tx = %hex::encode_upper(bytes), "Sending");

        let written = self.link.write(bytes)?;
        if written != bytes.len() {
            return Err(EchoFault::ShortWrite {
                expected: bytes.len(),
                written,
            }
            .into());
        }

        let mut echo = vec![0u8; bytes.len()];
        let received = self.link.read(&mut echo, self.echo_timeout)?;
        if received != bytes.len() {
            let pending = self.link.buffered_len().unwrap_or(0);
            debug!(expected = bytes.len(), received, pending, "Echo incomplete");
            return Err(EchoFault::Short {
                expected: bytes.len(),
                received,
            }
            .into());
        }

        if let Some(offset) = bytes.iter().zip(&echo).position(|(tx, rx)| tx != rx) {
            debug!(
                tx = %hex::encode_upper(bytes),
                rx = %hex::encode_upper(&echo),
                "Echo mismatch"
            );
            return Err(EchoFault::Mismatch {
                offset,
                sent: bytes[offset],
                received: echo[offset],
            }
            .into());
        }

        Ok(())
    }

    /// Read one byte, or `None` if nothing arrives in time
    pub fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, TransportError> {
        let mut byte = [0u8; 1];
        match self.link.read(&mut byte, timeout)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Number of received bytes waiting to be read
    pub fn buffered_len(&mut self) -> Result<usize, TransportError> {
        Ok(self.link.buffered_len()?)
    }

    /// Read and return the bytes already buffered when called
    ///
    /// Bytes arriving during the drain stay buffered.
    pub fn drain(&mut self, timeout: Duration) -> Result<Bytes, TransportError> {
        let pending = self.link.buffered_len()?;
        let mut drained = BytesMut::zeroed(pending);
        let mut filled = 0;
        while filled < pending {
            let received = self.link.read(&mut drained[filled..], timeout)?;
            if received == 0 {
                break;
            }
            filled += received;
        }
        drained.truncate(filled);
        Ok(drained.freeze())
    }

    /// Discard all buffered input
    pub fn flush(&mut self) -> Result<(), TransportError> {
        Ok(self.link.flush()?)
    }

    /// Cold reset: deactivate, power up, clear the receiver and release RST
    pub fn cold_reset(&mut self, config: &T0Config) -> Result<(), TransportError> {
        debug!("Cold reset");
        self.deactivate()?;
        pause(config.deactivation_delay);

        self.link.set_power(true)?;
        pause(config.activation_delay);

        self.link.flush()?;
        self.link.set_reset(true)?;
        Ok(())
    }

    /// Hold the card in reset and remove its supply
    pub fn deactivate(&mut self) -> Result<(), TransportError> {
        self.link.set_reset(false)?;
        self.link.set_power(false)?;
        Ok(())
    }
}

/// Sleep, skipping the syscall for zero delays
pub(crate) fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

#[cfg(test)]
pub(crate) use mock::ScriptedLink;

#[cfg(test)]
mod mock {
    use std::collections::VecDeque;

    use super::*;

    /// Link double that echoes writes and releases one scripted reply per write
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedLink {
        /// Bytes waiting to be read
        pub(crate) rx: VecDeque<u8>,
        /// Replies released after each write, in order
        pub(crate) replies: VecDeque<Vec<u8>>,
        /// Every write, as issued
        pub(crate) writes: Vec<Vec<u8>>,
        /// Bytes queued when RST is released
        pub(crate) atr: Vec<u8>,
        /// Corrupt the echo byte at this offset of the next write
        pub(crate) corrupt_echo_at: Option<usize>,
        /// Drop the echo entirely
        pub(crate) mute_echo: bool,
        /// Last VCC state
        pub(crate) powered: bool,
        /// Last RST state
        pub(crate) released: bool,
        /// Timeout of every read, in order
        pub(crate) reads: Vec<Duration>,
        /// A byte that keeps arriving after every read
        pub(crate) noise: Option<u8>,
    }

    impl ScriptedLink {
        /// A link whose card answers each write with the given replies
        pub(crate) fn with_replies<I, R>(replies: I) -> Self
        where
            I: IntoIterator<Item = R>,
            R: AsRef<[u8]>,
        {
            Self {
                replies: replies.into_iter().map(|r| r.as_ref().to_vec()).collect(),
                ..Self::default()
            }
        }

        /// A link whose card answers a reset with the given ATR
        pub(crate) fn with_atr(atr: &[u8]) -> Self {
            Self {
                atr: atr.to_vec(),
                ..Self::default()
            }
        }
    }

    impl Link for ScriptedLink {
        fn write(&mut self, bytes: &[u8]) -> Result<usize, LinkError> {
            self.writes.push(bytes.to_vec());
            if !self.mute_echo {
                let mut echo = bytes.to_vec();
                if let Some(offset) = self.corrupt_echo_at.take() {
                    echo[offset] ^= 0xFF;
                }
                self.rx.extend(echo);
            }
            if let Some(reply) = self.replies.pop_front() {
                self.rx.extend(reply);
            }
            Ok(bytes.len())
        }

        fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, LinkError> {
            self.reads.push(timeout);
            let mut count = 0;
            while count < buf.len() {
                match self.rx.pop_front() {
                    Some(byte) => {
                        buf[count] = byte;
                        count += 1;
                    }
                    None => break,
                }
            }
            self.rx.extend(self.noise);
            Ok(count)
        }

        fn buffered_len(&mut self) -> Result<usize, LinkError> {
            Ok(self.rx.len())
        }

        fn flush(&mut self) -> Result<(), LinkError> {
            self.rx.clear();
            Ok(())
        }

        fn set_power(&mut self, on: bool) -> Result<(), LinkError> {
            self.powered = on;
            Ok(())
        }

        fn set_reset(&mut self, released: bool) -> Result<(), LinkError> {
            if released && !self.released {
                self.rx.extend(self.atr.iter().copied());
            }
            self.released = released;
            Ok(())
        }
    }
}

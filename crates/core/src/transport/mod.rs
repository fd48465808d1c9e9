//! Transport traits for APDU communication with cards
//!
//! A transport owns the physical connection to a card and moves raw APDU
//! bytes across it. It knows nothing about logical channels or the meaning
//! of the payload.

pub mod error;

use std::fmt;

use bytes::Bytes;
pub use error::{AtrStage, EchoFault, TransportError};
use tracing::{debug, trace};

/// Trait for basic card transports
pub trait CardTransport: Send + fmt::Debug {
    /// Error type returned by the transport
    type Error: Into<crate::Error> + fmt::Debug;

    /// Bring the card into a state where APDUs can be exchanged
    fn connect(&mut self) -> Result<(), Self::Error>;

    /// Release the physical connection
    fn disconnect(&mut self);

    /// Send raw APDU bytes to card and return response bytes
    ///
    /// The returned bytes include the trailing status word.
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, Self::Error> {
        trace!(command = ?hex::encode(command), "Transmitting raw command");
        let result = self.do_transmit_raw(command);
        match &result {
            Ok(response) => {
                trace!(response = ?hex::encode(response), "Received raw response");
            }
            Err(e) => {
                debug!(error = ?e, "Transport error during transmission");
            }
        }
        result
    }

    /// Internal implementation of transmit_raw
    /// This is the method that concrete implementations should override
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, Self::Error>;

    /// Check if the transport is connected to a card
    fn is_connected(&self) -> bool;
}

#[cfg(test)]
pub(crate) use mock::MockTransport;

//! Error types for the physical link

use std::io;

use euicc_apdu_core::TransportError;

/// Failure of the physical link beneath the T=0 engine
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// I/O error from the serial driver
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The peripheral is gone or was never initialized
    #[error("Link disconnected")]
    Disconnected,

    /// Other driver error
    #[error("{0}")]
    Other(String),
}

impl From<LinkError> for TransportError {
    fn from(error: LinkError) -> Self {
        Self::link(error.to_string())
    }
}

impl From<LinkError> for euicc_apdu_core::Error {
    fn from(error: LinkError) -> Self {
        Self::Transport(error.into())
    }
}

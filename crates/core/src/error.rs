//! Core error type for all APDU operations
//!
//! Transport failures, malformed commands and card-side refusals of logical
//! channel operations all surface through [`Error`], so a caller can match on
//! one type to decide between retrying a command and reconnecting.

use bytes::Bytes;

use crate::response::status::StatusWord;
use crate::transport::TransportError;

/// Core error type that encompasses all possible errors in the crate
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// Transport level failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    //
    // Command related errors
    //
    /// Invalid command length
    #[error("Invalid command length: {0}")]
    InvalidCommandLength(usize),

    /// Invalid command data
    #[error("Invalid command data: {0}")]
    InvalidCommandData(&'static str),

    //
    // Response related errors
    //
    /// Parse error when processing response
    #[error("Parse error: {0}")]
    ParseError(&'static str),

    //
    // Logical channel related errors
    //
    /// The card refused or garbled MANAGE CHANNEL open
    #[error("Failed to open logical channel: {reason} (response: {})", hex::encode_upper(.response))]
    ChannelOpen {
        /// What was wrong with the response
        reason: &'static str,
        /// The raw response
        response: Bytes,
    },

    /// The card rejected SELECT within a freshly opened channel
    #[error("SELECT failed on channel {channel} (status: {})", .status.map_or_else(|| "missing".to_string(), |s| s.to_string()))]
    SelectFailed {
        /// Channel the SELECT was issued on
        channel: u8,
        /// Status word of the response, if one was present
        status: Option<StatusWord>,
    },

    /// A logical channel is already held
    #[error("Logical channel {0} is already open")]
    ChannelBusy(u8),

    //
    // General errors
    //
    /// Context error with message and source error
    #[error("{context}: {source}")]
    Context {
        /// Contextual message
        context: String,
        /// Source error
        source: Box<Self>,
    },
}

impl Error {
    /// Create a new error with context information
    pub fn with_context<S: Into<String>>(self, context: S) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a new parse error
    pub const fn parse(message: &'static str) -> Self {
        Self::ParseError(message)
    }

    /// The transport error at the root of this error, if any
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Context { source, .. } => source.transport_error(),
            _ => None,
        }
    }
}

/// Result type for APDU operations
pub type Result<T> = core::result::Result<T, Error>;

/// Extension trait for Result with APDU Errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context<S: Into<String>>(self, context: S) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for core::result::Result<T, E> {
    fn context<S: Into<String>>(self, context: S) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}

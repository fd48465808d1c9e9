//! Core traits and types for eUICC APDU (Application Protocol Data Unit) exchange
//!
//! This crate holds everything about talking to an eUICC that does not depend
//! on how bytes reach the card.
//!
//! ## Overview
//!
//! - [`Command`] classifies raw commands into ISO/IEC 7816-3 cases and derives
//!   how many response bytes to expect
//! - [`Response`] and [`StatusWord`] split and interpret what came back
//! - [`CardTransport`] is implemented by concrete links (for example T=0 over
//!   a serial line)
//! - [`Card`] sits on top of a transport and manages logical channels
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

// Main modules
pub mod card;
pub mod command;
pub mod response;
pub mod transport;

// Core error types
mod error;
pub use error::{Error, Result, ResultExt};

// Re-exports for common types
pub use card::Card;
pub use command::{Command, CommandCase, ResponseLength};
pub use response::Response;
pub use response::status::StatusWord;
pub use transport::{CardTransport, TransportError};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Bytes, BytesMut, Card, Command, CommandCase, Error, Response, ResponseLength, Result,
        ResultExt, StatusWord,
        transport::{AtrStage, CardTransport, EchoFault, TransportError},
    };
}

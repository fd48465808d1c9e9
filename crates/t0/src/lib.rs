//! ISO/IEC 7816-3 T=0 transport for eUICC APDU exchange
//!
//! This crate drives a card over a half-duplex serial line where every byte
//! sent is echoed back on the receiver. It performs the cold reset and ATR
//! discovery, runs the T=0 procedure-byte protocol for each command and
//! derives the response length from the command itself.
//!
//! The physical peripheral is abstracted by the [`Link`] trait; the host
//! supplies an implementation for its UART and the VCC/RST contacts, using the
//! parameters in [`SerialSettings`].
//!
//! ```no_run
//! use euicc_apdu_core::Card;
//! use euicc_apdu_transport_t0::{Link, T0Config, T0Transport};
//!
//! fn run<L: Link>(link: L) -> euicc_apdu_core::Result<()> {
//!     let mut card = Card::new(T0Transport::new(link, T0Config::default()));
//!     card.connect()?;
//!
//!     let channel = card.open_channel(&[0xA0, 0x00, 0x00, 0x05, 0x59, 0x10, 0x10])?;
//!     let _response = card.transmit(&[0x80 | channel, 0xE2, 0x91, 0x00, 0x03, 0xBF, 0x2D, 0x00])?;
//!     card.close_channel(channel);
//!
//!     card.disconnect();
//!     Ok(())
//! }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod atr;
mod config;
mod error;
pub mod framing;
pub mod link;
mod transport;

pub use atr::{Atr, read_atr};
pub use config::{Parity, SerialSettings, T0Config};
pub use error::LinkError;
pub use framing::exchange;
pub use link::{HalfDuplex, Link};
pub use transport::T0Transport;

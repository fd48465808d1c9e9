//! APDU responses
//!
//! The transport hands back raw bytes: zero or more data bytes followed by
//! SW1 SW2. [`Response`] is the split view of those bytes.

pub mod status;

use bytes::Bytes;
use tracing::trace;

use crate::{Error, Result};
use status::StatusWord;

/// A response split into payload and status word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    payload: Bytes,
    status: StatusWord,
}

impl Response {
    /// Split raw response bytes
    pub fn from_bytes(data: &Bytes) -> Result<Self> {
        let (payload, status) = split_status(data)?;
        trace!(%status, payload_len = payload.len(), "Parsed response");
        Ok(Self { payload, status })
    }

    /// Data bytes before the status word
    pub const fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// The status word
    pub const fn status(&self) -> StatusWord {
        self.status
    }

    /// Whether the status word is 90 00
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Split raw bytes into payload and the trailing status word
///
/// The payload shares the input buffer.
pub fn split_status(data: &Bytes) -> Result<(Bytes, StatusWord)> {
    let Some(split) = data.len().checked_sub(2) else {
        return Err(Error::parse("response shorter than a status word"));
    };
    let status = StatusWord::new(data[split], data[split + 1]);
    Ok((data.slice(..split), status))
}

impl TryFrom<Bytes> for Response {
    type Error = Error;

    fn try_from(data: Bytes) -> Result<Self> {
        Self::from_bytes(&data)
    }
}

impl TryFrom<&[u8]> for Response {
    type Error = Error;

    fn try_from(data: &[u8]) -> Result<Self> {
        Self::from_bytes(&Bytes::copy_from_slice(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split() {
        let data = Bytes::from_static(&[0x01, 0x90, 0x00]);
        let response = Response::from_bytes(&data).unwrap();
        assert_eq!(response.payload().as_ref(), &[0x01]);
        assert!(response.is_success());

        let response = Response::try_from(&[0x6A, 0x82][..]).unwrap();
        assert!(response.payload().is_empty());
        assert_eq!(response.status(), StatusWord::NOT_FOUND);
    }

    #[test]
    fn test_too_short() {
        assert_eq!(
            Response::try_from(&[0x90][..]),
            Err(Error::ParseError("response shorter than a status word"))
        );
        assert!(split_status(&Bytes::new()).is_err());
    }
}

//! Card facade with logical channel management
//!
//! [`Card`] is what the eUICC management layer talks to. It forwards raw
//! APDUs to the transport and keeps track of the one non-basic logical
//! channel this stack holds at a time.

use std::fmt;

use bytes::Bytes;
use tracing::{debug, instrument, warn};

use crate::command::{self, MANAGE_CHANNEL_OPEN, MAX_CHANNEL};
use crate::error::{Error, Result};
use crate::response::{split_status, status::StatusWord};
use crate::transport::CardTransport;

/// A connected card: raw exchange plus logical channel state
pub struct Card<T>
where
    T: CardTransport,
{
    /// The transport used for communication
    transport: T,
    /// The non-basic channel currently open, if any
    channel: Option<u8>,
}

impl<T> fmt::Debug for Card<T>
where
    T: CardTransport,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Card")
            .field("transport", &self.transport)
            .field("channel", &self.channel)
            .finish()
    }
}

impl<T> Card<T>
where
    T: CardTransport,
{
    /// Wrap a transport
    pub const fn new(transport: T) -> Self {
        Self {
            transport,
            channel: None,
        }
    }

    /// Get a reference to the underlying transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the underlying transport
    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Take ownership of the transport and return it
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// The logical channel currently open, if any
    pub const fn channel(&self) -> Option<u8> {
        self.channel
    }

    /// Connect the transport
    pub fn connect(&mut self) -> Result<()> {
        self.channel = None;
        self.transport.connect().map_err(Into::into)
    }

    /// Disconnect the transport, dropping any channel state
    pub fn disconnect(&mut self) {
        if let Some(channel) = self.channel.take() {
            debug!(channel, "Dropping logical channel on disconnect");
        }
        self.transport.disconnect();
    }

    /// Exchange one raw APDU
    pub fn transmit(&mut self, command: &[u8]) -> Result<Bytes> {
        self.transport.transmit_raw(command).map_err(Into::into)
    }

    /// Open a logical channel and select an application in it
    #[instrument(level = "debug", skip(self, aid), fields(aid = %hex::encode_upper(aid)))]
    pub fn open_channel(&mut self, aid: &[u8]) -> Result<u8> {
        if let Some(channel) = self.channel {
            return Err(Error::ChannelBusy(channel));
        }
        // AID is validated before any channel is opened
        let select = command::select_by_aid(0, aid)?;

        let response = self.transmit(&MANAGE_CHANNEL_OPEN)?;
        let channel = parse_open_response(response)?;
        debug!(channel, "Logical channel opened");

        let mut select = select.to_vec();
        select[0] = command::with_channel(select[0], channel);

        let status = match self.transmit(&select) {
            Ok(response) => split_status(&response).ok().map(|(_, status)| status),
            Err(e) => {
                self.close_unused(channel);
                return Err(e);
            }
        };

        match status {
            Some(status) if status.is_select_accepted() => {
                debug!(channel, %status, "Application selected");
                // the basic channel is never tracked as held
                if channel != 0 {
                    self.channel = Some(channel);
                }
                Ok(channel)
            }
            status => {
                debug!(
                    channel,
                    status = status.as_ref().map(StatusWord::description),
                    "SELECT rejected"
                );
                self.close_unused(channel);
                Err(Error::SelectFailed { channel, status })
            }
        }
    }

    /// Close a logical channel
    ///
    /// Closing is best effort: failures are logged and otherwise ignored.
    /// Channel 0 is the basic channel and is never closed.
    pub fn close_channel(&mut self, channel: u8) {
        if channel == 0 {
            return;
        }
        debug!(channel, "Closing logical channel");
        if let Err(e) = self.transmit(&command::close_channel(channel)) {
            warn!(channel, error = %e, "Failed to close logical channel");
        }
        if self.channel == Some(channel) {
            self.channel = None;
        }
    }

    fn close_unused(&mut self, channel: u8) {
        if channel == 0 {
            return;
        }
        if let Err(e) = self.transmit(&command::close_channel(channel)) {
            warn!(channel, error = %e, "Failed to release unused logical channel");
        }
    }
}

/// Extract the channel number from a MANAGE CHANNEL open response
fn parse_open_response(response: Bytes) -> Result<u8> {
    if response.len() != 3 {
        return Err(Error::ChannelOpen {
            reason: "unexpected response length",
            response,
        });
    }
    if !StatusWord::new(response[1], response[2]).is_normal_group() {
        return Err(Error::ChannelOpen {
            reason: "status outside the 9X group",
            response,
        });
    }
    let channel = response[0];
    if channel > MAX_CHANNEL {
        return Err(Error::ChannelOpen {
            reason: "channel number out of range",
            response,
        });
    }
    Ok(channel)
}

//! [`CardTransport`] over a T=0 half-duplex link

use std::fmt;

use euicc_apdu_core::command::TERMINAL_CAPABILITIES;
use euicc_apdu_core::prelude::*;
use tracing::{debug, instrument, warn};

use crate::atr::{Atr, read_atr};
use crate::config::T0Config;
use crate::framing::exchange;
use crate::link::{HalfDuplex, Link};

/// Transport implementation speaking T=0 to a card on a [`Link`]
pub struct T0Transport<L: Link> {
    /// Echo-verified port
    port: HalfDuplex<L>,
    /// Configuration
    config: T0Config,
    /// ATR of the current session; present while connected
    atr: Option<Atr>,
}

impl<L: Link> fmt::Debug for T0Transport<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("T0Transport")
            .field("link", self.port.link())
            .field("connected", &self.atr.is_some())
            .field("atr", &self.atr)
            .field("config", &self.config)
            .finish()
    }
}

impl<L: Link> T0Transport<L> {
    /// Create a transport on a link; the card stays inactive until [`connect`](Self::connect)
    pub fn new(link: L, config: T0Config) -> Self {
        let port = HalfDuplex::new(link, config.echo_timeout);
        Self {
            port,
            config,
            atr: None,
        }
    }

    /// The ATR received at the last successful connect
    pub const fn atr(&self) -> Option<&Atr> {
        self.atr.as_ref()
    }

    /// Get the configuration
    pub const fn config(&self) -> &T0Config {
        &self.config
    }

    /// Get a reference to the underlying link
    pub const fn link(&self) -> &L {
        self.port.link()
    }

    /// Get a mutable reference to the underlying link
    pub const fn link_mut(&mut self) -> &mut L {
        self.port.link_mut()
    }

    fn reset(&mut self) -> Result<Atr> {
        self.port.cold_reset(&self.config)?;
        Ok(read_atr(&mut self.port, &self.config)?)
    }

    fn deactivate(&mut self) {
        if let Err(e) = self.port.deactivate() {
            warn!(error = %e, "Failed to deactivate card contacts");
        }
    }
}

impl<L: Link> CardTransport for T0Transport<L> {
    type Error = Error;

    #[instrument(level = "debug", skip(self))]
    fn connect(&mut self) -> Result<()> {
        self.atr = None;

        let attempts = self.config.connect_attempts.max(1);
        let mut attempt = 1;
        let atr = loop {
            match self.reset() {
                Ok(atr) => break atr,
                Err(e) if attempt < attempts => {
                    warn!(attempt, error = %e, "Reset attempt failed");
                    attempt += 1;
                }
                Err(e) => {
                    self.deactivate();
                    return Err(e);
                }
            }
        };

        if let Err(e) = exchange(&mut self.port, &self.config, &TERMINAL_CAPABILITIES)
            .context("Terminal capabilities failed")
        {
            self.deactivate();
            return Err(e);
        }

        debug!(historical = %hex::encode_upper(atr.historical_bytes()), "Connected");
        self.atr = Some(atr);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.atr.take().is_some() {
            debug!("Disconnecting");
        }
        self.deactivate();
    }

    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes> {
        if self.atr.is_none() {
            return Err(TransportError::NotConnected.into());
        }
        exchange(&mut self.port, &self.config, command)
    }

    fn is_connected(&self) -> bool {
        self.atr.is_some()
    }
}

impl<L: Link> Drop for T0Transport<L> {
    fn drop(&mut self) {
        if self.atr.take().is_some() {
            let _ = self.port.deactivate();
        }
    }
}

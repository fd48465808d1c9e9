//! T=0 command/response exchange
//!
//! One call to [`exchange`] runs a complete T=0 transaction: header, procedure
//! byte polling, optional data phase and response accumulation. The number of
//! response bytes to wait for comes from
//! [`Command::expected_response`](euicc_apdu_core::Command::expected_response).

use bytes::{BufMut, Bytes, BytesMut};
use euicc_apdu_core::{Command, ResponseLength, StatusWord, TransportError};
use tracing::{debug, instrument, trace, warn};

use crate::config::T0Config;
use crate::link::{HalfDuplex, Link};

/// NULL procedure byte: the card asks for more time
pub const NULL: u8 = 0x60;

/// Send one command and collect the card's response, status word included
///
/// Commands shorter than a header are rejected before anything is written.
#[instrument(level = "debug", skip_all, fields(ins))]
pub fn exchange<L: Link>(
    port: &mut HalfDuplex<L>,
    config: &T0Config,
    command: &[u8],
) -> euicc_apdu_core::Result<Bytes> {
    let command = Command::parse(command)?;
    let ins = command.instruction();
    tracing::Span::current().record("ins", ins);

    port.send(command.header())?;

    if let Some(status) = await_procedure(port, config, ins)? {
        return Ok(status);
    }

    port.send(command.body())?;

    let expected = command.expected_response();
    debug!(%expected, "Awaiting response");
    let response = receive(port, config, expected)?;

    match port.buffered_len() {
        Ok(0) => {}
        Ok(pending) => warn!(pending, "Bytes left in receive buffer after response"),
        Err(e) => debug!(error = %e, "Could not check receive buffer"),
    }

    Ok(response)
}

/// Poll procedure bytes until the card acknowledges the header
///
/// Returns the status word when the card answers early instead.
fn await_procedure<L: Link>(
    port: &mut HalfDuplex<L>,
    config: &T0Config,
    ins: u8,
) -> Result<Option<Bytes>, TransportError> {
    let mut nulls: u32 = 0;
    loop {
        let Some(byte) = port.read_byte(config.procedure_timeout)? else {
            debug!(nulls, "No procedure byte");
            return Err(TransportError::NoAck { ins });
        };

        if byte == ins {
            debug!(nulls, "INS acknowledged");
            return Ok(None);
        }

        if byte == NULL {
            nulls = nulls.saturating_add(1);
            if nulls > config.null_budget {
                return Err(TransportError::WaitBudgetExhausted { nulls });
            }
            trace!(nulls, "NULL procedure byte");
            continue;
        }

        return early_status(port, config, byte).map(Some);
    }
}

fn early_status<L: Link>(
    port: &mut HalfDuplex<L>,
    config: &T0Config,
    sw1: u8,
) -> Result<Bytes, TransportError> {
    let sw2 = port
        .read_byte(config.status_timeout)?
        .ok_or(TransportError::MissingStatus { sw1 })?;

    if let Some(extra) = port.read_byte(config.status_timeout)? {
        return Err(TransportError::ProtocolDesync { sw1, sw2, extra });
    }

    debug!(status = %StatusWord::new(sw1, sw2), "Early status");
    Ok(Bytes::copy_from_slice(&[sw1, sw2]))
}

/// Accumulate response bytes until the expected count, the size cap or an idle link
fn receive<L: Link>(
    port: &mut HalfDuplex<L>,
    config: &T0Config,
    expected: ResponseLength,
) -> Result<Bytes, TransportError> {
    let limit = expected
        .exact()
        .unwrap_or(config.max_response_len)
        .min(config.max_response_len);
    // stray NULLs only precede a bare status word
    let skip_nulls = expected == ResponseLength::Exact(2);

    let mut response = BytesMut::with_capacity(limit.min(258));
    let mut timeout = config.response_first_timeout;
    let mut nulls: u32 = 0;

    while response.len() < limit {
        let Some(byte) = port.read_byte(timeout)? else {
            break;
        };

        if skip_nulls && byte == NULL {
            nulls = nulls.saturating_add(1);
            if nulls > config.null_budget {
                return Err(TransportError::WaitBudgetExhausted { nulls });
            }
            trace!(nulls, "Skipping NULL byte before status");
            continue;
        }

        response.put_u8(byte);
        timeout = config.response_next_timeout;
    }

    match expected {
        ResponseLength::Exact(expected) if response.len() != expected => {
            return Err(TransportError::ShortResponse {
                expected,
                received: response.len(),
            });
        }
        _ => {}
    }

    debug!(received = response.len(), "Response complete");
    Ok(response.freeze())
}

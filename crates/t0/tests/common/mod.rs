//! Common test utilities: a simulated eUICC speaking T=0

use std::collections::VecDeque;
use std::time::Duration;

use euicc_apdu_core::StatusWord;
use euicc_apdu_transport_t0::{Link, LinkError, T0Config, T0Transport};

/// ISD-R application identifier
pub const ISD_R_AID: &[u8] = &[
    0xA0, 0x00, 0x00, 0x05, 0x59, 0x10, 0x10, 0xFF, 0xFF, 0xFF, 0xFF, 0x89, 0x00, 0x00, 0x01, 0x00,
];

/// ATR of the simulated card: T0 = 31 (TA1, one historical byte)
pub const SIM_ATR: &[u8] = &[0x3B, 0x31, 0x96, 0x80];

/// Install a test-writer subscriber so failing tests show the engine's logs
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

/// A T=0 transport on a fresh simulated card, without delays
pub fn sim_transport() -> T0Transport<SimCard> {
    init_tracing();
    T0Transport::new(SimCard::new(), T0Config::immediate())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    /// Waiting for a command header
    Header,
    /// Header acknowledged, waiting for the data phase
    Data([u8; 5]),
}

/// Simulated card behind a half-duplex line
///
/// Every write is echoed first. The card then answers headers with
/// procedure bytes and data phases with the response, the way a T=0 card
/// does. Instructions:
///
/// - `70` MANAGE CHANNEL (open with P1 = 00, close with P1 = 80)
/// - `A4` SELECT by AID against [`ISD_R_AID`]
/// - `AA` TERMINAL CAPABILITIES
/// - `B0` outgoing data: returns P3 bytes (256 for P3 = 00)
/// - `E2` incoming data with optional short Le, or extended fields when P3 = 00
/// - anything else: `6D 00`
#[derive(Debug)]
pub struct SimCard {
    rx: VecDeque<u8>,
    phase: Phase,
    powered: bool,
    released: bool,
    open_channels: [bool; 4],
    /// Number of cold resets seen
    pub resets: usize,
    /// ATR sent on reset; empty for an absent card
    pub atr: Vec<u8>,
    /// NULL bytes sent before each INS acknowledgement
    pub nulls: usize,
    /// Corrupt the echo of the next write at this offset
    pub corrupt_echo_at: Option<usize>,
    /// Send one unsolicited byte after the next early status word
    pub chatter_after_status: bool,
    /// Byte count of the last response sent, status word included
    pub last_response_len: Option<usize>,
    /// Timeout of every read, in order
    pub reads: Vec<Duration>,
}

impl SimCard {
    /// A cooperating card with [`SIM_ATR`]
    pub fn new() -> Self {
        Self {
            rx: VecDeque::new(),
            phase: Phase::Header,
            powered: false,
            released: false,
            open_channels: [true, false, false, false],
            resets: 0,
            atr: SIM_ATR.to_vec(),
            nulls: 0,
            corrupt_echo_at: None,
            chatter_after_status: false,
            last_response_len: None,
            reads: Vec::new(),
        }
    }

    /// No card in the slot
    pub fn absent() -> Self {
        Self {
            atr: Vec::new(),
            ..Self::new()
        }
    }

    /// Whether a logical channel is open on the card
    pub fn is_open(&self, channel: u8) -> bool {
        self.open_channels
            .get(usize::from(channel))
            .copied()
            .unwrap_or(false)
    }

    /// Whether VCC is applied
    pub const fn powered(&self) -> bool {
        self.powered
    }

    fn active(&self) -> bool {
        self.powered && self.released
    }

    fn status(&mut self, status: StatusWord) {
        self.rx.extend([status.sw1, status.sw2]);
        if std::mem::take(&mut self.chatter_after_status) {
            self.rx.push_back(0xFF);
        }
        self.last_response_len = Some(2);
    }

    fn ack(&mut self, ins: u8) {
        self.rx.extend(std::iter::repeat_n(0x60, self.nulls));
        self.rx.push_back(ins);
    }

    fn respond(&mut self, data: &[u8]) {
        self.rx.extend(data.iter().copied());
        self.rx.extend([StatusWord::SUCCESS.sw1, StatusWord::SUCCESS.sw2]);
        self.last_response_len = Some(data.len() + 2);
    }

    fn on_header(&mut self, header: [u8; 5]) {
        let [cla, ins, p1, _p2, p3] = header;
        match ins {
            0x70 if p1 == 0x00 => match (1..4).find(|&ch| !self.open_channels[ch]) {
                Some(ch) => {
                    self.ack(ins);
                    self.open_channels[ch] = true;
                    self.respond(&[ch as u8]);
                }
                // refused before the ack, as a bare status word
                None => self.status(StatusWord::FUNCTION_NOT_SUPPORTED),
            },
            0x70 if p1 == 0x80 => {
                let channel = usize::from(cla & 0x03);
                if channel == 0 || !self.open_channels[channel] {
                    self.status(StatusWord::CHANNEL_NOT_SUPPORTED);
                } else {
                    self.open_channels[channel] = false;
                    self.status(StatusWord::SUCCESS);
                }
            }
            0xB0 => {
                self.ack(ins);
                let len = if p3 == 0 { 256 } else { usize::from(p3) };
                let data: Vec<u8> = (0..len).map(|i| i as u8).collect();
                self.respond(&data);
            }
            0xA4 | 0xAA | 0xE2 => {
                self.ack(ins);
                self.phase = Phase::Data(header);
            }
            _ => self.status(StatusWord::new(0x6D, 0x00)),
        }
    }

    fn on_data(&mut self, header: [u8; 5], body: &[u8]) {
        let [cla, ins, _p1, _p2, p3] = header;
        let lc = usize::from(p3);
        match ins {
            0xA4 => {
                let channel = usize::from(cla & 0x03);
                if !self.open_channels[channel] {
                    self.status(StatusWord::CHANNEL_NOT_SUPPORTED);
                } else if body.get(..lc) == Some(ISD_R_AID) {
                    self.status(StatusWord::SUCCESS);
                } else {
                    self.status(StatusWord::NOT_FOUND);
                }
            }
            0xAA => self.status(StatusWord::SUCCESS),
            0xE2 if lc == 0 && body.len() < 2 => self.status(StatusWord::new(0x67, 0x00)),
            0xE2 if lc == 0 => {
                // extended: Lc/Le fields travel in the data phase
                let field = |at: usize| usize::from(u16::from_be_bytes([body[at], body[at + 1]]));
                let le = if body.len() == 2 {
                    field(0)
                } else {
                    let ext_lc = field(0);
                    if body.len() == 2 + ext_lc + 2 {
                        field(2 + ext_lc)
                    } else {
                        0
                    }
                };
                self.respond(&vec![0xEE; le]);
            }
            0xE2 => {
                let le = if body.len() == lc + 1 {
                    usize::from(body[lc])
                } else {
                    0
                };
                self.respond(&vec![0xEE; le]);
            }
            _ => self.status(StatusWord::new(0x6D, 0x00)),
        }
    }
}

impl Default for SimCard {
    fn default() -> Self {
        Self::new()
    }
}

impl Link for SimCard {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, LinkError> {
        let mut echo = bytes.to_vec();
        if let Some(offset) = self.corrupt_echo_at.take() {
            echo[offset] ^= 0x01;
        }
        self.rx.extend(echo);

        if !self.active() {
            return Ok(bytes.len());
        }

        match std::mem::replace(&mut self.phase, Phase::Header) {
            Phase::Header => match <[u8; 5]>::try_from(bytes) {
                Ok(header) => self.on_header(header),
                Err(_) => self.status(StatusWord::new(0x67, 0x00)),
            },
            Phase::Data(header) => self.on_data(header, bytes),
        }
        Ok(bytes.len())
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, LinkError> {
        self.reads.push(timeout);
        let count = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..count)) {
            *slot = byte;
        }
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
        if !on {
            self.open_channels = [true, false, false, false];
            self.phase = Phase::Header;
        }
        self.powered = on;
        Ok(())
    }

    fn set_reset(&mut self, released: bool) -> Result<(), LinkError> {
        if released && !self.released && self.powered {
            self.resets += 1;
            self.rx.extend(self.atr.iter().copied());
        }
        self.released = released;
        Ok(())
    }
}

// C9: RSP Transport. Packet framing (escape + checksum + ack) on top of a
// byte stream, plus a single-client TCP accept loop. The framer survives
// arbitrary read-boundary splits: bytes are fed one at a time and it tracks
// where it is in the current packet.
//
// Asymmetry, faithfully kept from the original: inbound escaping is generic
// (any `0x7D`-escaped byte is XORed with `0x20` on decode), but outbound
// escaping only substitutes `*` with the two-byte sequence `* 0x0A` to dodge
// RLE interpretation (`GDBProtocol.cpp: putpacket`). This crate does not
// "fix" that into a symmetric escape scheme - a real GDB client's own
// decoder handles it, and changing it would desync checksum expectations
// against a spec that names this exact substitution.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};

use crate::error::{Error, ErrorKind, Result};
use crate::log::Log;

const ESCAPE: u8 = 0x7d;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    InPacket,
    Escaped,
    Checksum(u8), // number of checksum hex digits seen so far
}

// One fully decoded inbound packet: the unescaped payload and, if the
// payload began with `XX:`, the two-character sequence number to echo back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub payload: Vec<u8>,
    pub seq: Option<String>,
}

pub enum FeedEvent {
    None,
    // Peer acked the last outbound packet.
    Ack,
    // Peer naked; caller should retransmit the last outbound packet.
    Nak,
    Packet(Packet),
    // Checksum mismatch; caller should reply `-` unless in NoAckMode.
    BadChecksum,
}

pub struct Framer {
    state: State,
    buf: Vec<u8>,
    checksum_digits: [u8; 2],
    // Sum of the literal transmitted bytes between `$` and `#`, including
    // escape bytes themselves - not the decoded payload. This matches the
    // protocol convention that the checksum covers what was actually put on
    // the wire.
    raw_sum: u8,
    pub no_ack: bool,
    last_outbound: Vec<u8>,
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

impl Framer {
    pub fn new() -> Framer {
        Framer { state: State::Idle, buf: Vec::new(), checksum_digits: [0; 2], raw_sum: 0, no_ack: false, last_outbound: Vec::new() }
    }

    pub fn feed(&mut self, byte: u8) -> FeedEvent {
        match self.state {
            State::Idle => match byte {
                b'+' => FeedEvent::Ack,
                b'-' => FeedEvent::Nak,
                b'$' => {
                    self.buf.clear();
                    self.raw_sum = 0;
                    self.state = State::InPacket;
                    FeedEvent::None
                }
                _ => FeedEvent::None, // stray byte between packets, ignored
            },
            State::InPacket => match byte {
                ESCAPE => {
                    self.raw_sum = self.raw_sum.wrapping_add(byte);
                    self.state = State::Escaped;
                    FeedEvent::None
                }
                b'#' => {
                    self.state = State::Checksum(0);
                    FeedEvent::None
                }
                _ => {
                    self.raw_sum = self.raw_sum.wrapping_add(byte);
                    self.buf.push(byte);
                    FeedEvent::None
                }
            },
            State::Escaped => {
                self.raw_sum = self.raw_sum.wrapping_add(byte);
                self.buf.push(byte ^ 0x20);
                self.state = State::InPacket;
                FeedEvent::None
            }
            State::Checksum(0) => {
                self.checksum_digits[0] = byte;
                self.state = State::Checksum(1);
                FeedEvent::None
            }
            State::Checksum(_) => {
                self.checksum_digits[1] = byte;
                self.state = State::Idle;
                self.finish_packet()
            }
        }
    }

    fn finish_packet(&mut self) -> FeedEvent {
        let expected = match (hex_val(self.checksum_digits[0]), hex_val(self.checksum_digits[1])) {
            (Some(hi), Some(lo)) => (hi << 4) | lo,
            _ => return FeedEvent::BadChecksum,
        };
        if self.raw_sum != expected {
            return FeedEvent::BadChecksum;
        }
        let payload = std::mem::take(&mut self.buf);
        let seq = if payload.len() >= 3 && payload[2] == b':' && payload[0].is_ascii_hexdigit() && payload[1].is_ascii_hexdigit() {
            Some(String::from_utf8_lossy(&payload[0..2]).into_owned())
        } else {
            None
        };
        let payload = if seq.is_some() { payload[3..].to_vec() } else { payload };
        FeedEvent::Packet(Packet { payload, seq })
    }

    // Builds the full `$<payload>#<cc>` wire representation. `*` bytes are
    // substituted with `* 0x0A`, per the original's (narrower) outbound
    // escaping; the checksum is computed over the transmitted bytes.
    pub fn encode(&mut self, payload: &[u8]) -> Vec<u8> {
        let mut body = Vec::with_capacity(payload.len());
        for &b in payload {
            if b == b'*' {
                body.push(b'*');
                body.push(0x0a);
            } else {
                body.push(b);
            }
        }
        let checksum = body.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        let mut out = Vec::with_capacity(body.len() + 4);
        out.push(b'$');
        out.extend_from_slice(&body);
        out.push(b'#');
        out.extend(format!("{:02x}", checksum).into_bytes());
        self.last_outbound = out.clone();
        out
    }

    pub fn last_outbound(&self) -> &[u8] {
        &self.last_outbound
    }
}

impl Default for Framer {
    fn default() -> Framer { Framer::new() }
}

// Accepts connections one at a time on `listener`, invoking `handle` with
// each accepted stream. Returns when `handle` returns, or when the listening
// socket itself errors (vs. a transient per-connection error, which just
// re-accepts). Mirrors the original's "socket errors during shutdown are
// normal termination" rule: an `Err` from `accept` after the listener was
// closed by another thread ends the loop without propagating.
pub fn accept_loop(listener: &TcpListener, log: &mut Log, mut handle: impl FnMut(TcpStream) -> Result<()>) -> Result<()> {
    loop {
        match listener.accept() {
            Ok((stream, _addr)) => {
                crate::log!(log, "rsp: client connected");
                if let Err(e) = handle(stream) {
                    crate::log_warn!(log, "rsp: session ended: {}", e);
                }
            }
            Err(e) => {
                crate::log_warn!(log, "rsp: accept failed: {}", e);
                return Err(Error::from(e));
            }
        }
    }
}

pub fn bind(port: u16) -> Result<TcpListener> {
    TcpListener::bind(("0.0.0.0", port)).map_err(|e| Error::new(ErrorKind::Io, format!("bind failed: {}", e)))
}

// Reads available bytes from `stream` into `framer`, returning decoded
// events in arrival order. A zero-length read means the peer disconnected.
pub fn pump(stream: &mut TcpStream, framer: &mut Framer) -> Result<Vec<FeedEvent>> {
    let mut chunk = [0u8; 4096];
    let n = stream.read(&mut chunk)?;
    if n == 0 {
        return Err(Error::new(ErrorKind::Io, "peer disconnected"));
    }
    Ok(chunk[..n].iter().map(|&b| framer.feed(b)).collect())
}

pub fn send_raw(stream: &mut TcpStream, bytes: &[u8]) -> Result<()> {
    stream.write_all(bytes)?;
    Ok(())
}

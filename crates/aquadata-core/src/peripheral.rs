// ── Peripheral session ──
//
// Peer bookkeeping and newline framing for the short-range link. Inbound
// bytes accumulate in a bounded buffer; complete lines are drained lazily
// through `Frames`.

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

use crate::error::CoreError;

/// Receive buffer cap used when none is configured.
pub const DEFAULT_RECEIVE_CAP: usize = 512;

/// Connected-peer count and the receive buffer for the peripheral link.
#[derive(Debug)]
pub struct PeripheralSession {
    peer_count: usize,
    receive_buffer: BytesMut,
    cap: usize,
    overflows: u64,
}

impl Default for PeripheralSession {
    fn default() -> Self {
        Self::new(DEFAULT_RECEIVE_CAP)
    }
}

impl PeripheralSession {
    pub fn new(cap: usize) -> Self {
        Self {
            peer_count: 0,
            receive_buffer: BytesMut::with_capacity(cap),
            cap,
            overflows: 0,
        }
    }

    pub fn peer_count(&self) -> usize {
        self.peer_count
    }

    pub fn has_peers(&self) -> bool {
        self.peer_count > 0
    }

    pub fn buffered(&self) -> &[u8] {
        &self.receive_buffer
    }

    /// How many times unterminated input has been thrown away.
    pub fn overflows(&self) -> u64 {
        self.overflows
    }

    pub fn peer_connected(&mut self) {
        self.peer_count += 1;
    }

    /// When the last peer leaves, its partial input goes with it.
    pub fn peer_disconnected(&mut self) {
        self.peer_count = self.peer_count.saturating_sub(1);
        if self.peer_count == 0 {
            self.receive_buffer.clear();
        }
    }

    /// Adopt the driver's peer count after a failed write or on a new cycle.
    pub fn resync_peers(&mut self, count: usize) {
        if count != self.peer_count {
            debug!(was = self.peer_count, now = count, "peripheral peer count resynced");
        }
        self.peer_count = count;
    }

    /// Forget every peer after a write failure. The next cycle resyncs
    /// from the driver.
    pub fn mark_lost(&mut self) {
        self.peer_count = 0;
        self.receive_buffer.clear();
    }

    /// Append inbound bytes and return an iterator over completed messages.
    ///
    /// Drain the iterator fully: the overflow check runs once no newline is
    /// left in the buffer.
    pub fn feed(&mut self, data: &[u8]) -> Frames<'_> {
        self.receive_buffer.extend_from_slice(data);
        Frames { session: self }
    }

    /// Frame an outbound message: the text followed by exactly one newline.
    pub fn frame(message: &str) -> Bytes {
        let mut out = BytesMut::with_capacity(message.len() + 1);
        out.extend_from_slice(message.trim_end_matches('\n').as_bytes());
        out.extend_from_slice(b"\n");
        out.freeze()
    }
}

/// Lazy sequence of newline-delimited messages extracted from the receive
/// buffer. Each message is trimmed; blank lines are skipped.
pub struct Frames<'a> {
    session: &'a mut PeripheralSession,
}

impl Iterator for Frames<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let buffer = &mut self.session.receive_buffer;
            let Some(pos) = buffer.iter().position(|b| *b == b'\n') else {
                if buffer.len() > self.session.cap {
                    let overflow = CoreError::BufferOverflow {
                        len: buffer.len(),
                        cap: self.session.cap,
                    };
                    warn!(
                        error = %overflow,
                        kind = ?overflow.kind(),
                        "clearing peripheral receive buffer"
                    );
                    buffer.clear();
                    self.session.overflows += 1;
                }
                return None;
            };

            let line = buffer.split_to(pos + 1);
            let text = String::from_utf8_lossy(&line);
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_owned());
            }
        }
    }
}

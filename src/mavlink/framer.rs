//! # Streaming Packet Framer
//!
//! Turns an arbitrary byte stream into a sequence of complete MAVLink
//! packets, tolerating partial reads and leading garbage.
//!
//! The framer is purely length-driven: it locates a start marker, reads the
//! declared payload length and waits until the whole frame is buffered. It
//! never validates checksums: forwarded traffic stays verbatim, corrupt
//! frames included. A truncated frame is not an error, just an incomplete
//! one; the unconsumed bytes are retained until the next read.

use bytes::{Buf, BytesMut};
use tracing::{trace, warn};

use super::protocol::{MavVersion, Packet, PacketHeader};

/// Streaming framer over an internal reassembly buffer.
///
/// Feed serial reads with [`Framer::push`]; complete packets come back in
/// input order, already carrying their derived header fields.
#[derive(Debug, Default)]
pub struct Framer {
    buf: BytesMut,
    /// Noise bytes skipped while hunting for a start marker
    noise_bytes: u64,
    /// Whether the signed-frame warning has been emitted yet
    signed_warned: bool,
}

impl Framer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of the byte stream, returning every packet it completes.
    ///
    /// # Arguments
    ///
    /// * `chunk` - Bytes as read from the serial link, any length, split anywhere
    ///
    /// # Returns
    ///
    /// * `Vec<Packet>` - Zero or more complete packets, in stream order
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Packet> {
        self.buf.extend_from_slice(chunk);

        let mut packets = Vec::new();
        loop {
            self.skip_noise();

            let Some(header) = PacketHeader::parse(&self.buf) else {
                // Marker present but header incomplete (or buffer empty):
                // wait for more bytes.
                break;
            };

            let packet_len = header.packet_len();
            if self.buf.len() < packet_len {
                break;
            }

            if header.is_signed() && !self.signed_warned {
                self.signed_warned = true;
                warn!(
                    "MAVLink 2 signed frame seen; signatures are unsupported \
                     and the stream may be mis-framed"
                );
            }

            let bytes = self.buf.split_to(packet_len).freeze();
            packets.push(Packet { header, bytes });
        }

        packets
    }

    /// Drop bytes ahead of the first start marker in the buffer.
    ///
    /// When no marker exists the whole buffer is noise; it is discarded so a
    /// dead or mis-baudrated link cannot grow the buffer without bound.
    fn skip_noise(&mut self) {
        if self.buf.is_empty() || MavVersion::from_marker(self.buf[0]).is_some() {
            return;
        }

        let skip = self.buf.iter()
            .position(|&b| MavVersion::from_marker(b).is_some())
            .unwrap_or(self.buf.len());

        self.noise_bytes += skip as u64;
        trace!(skipped = skip, "skipped noise ahead of start marker");
        self.buf.advance(skip);
    }

    /// Bytes buffered but not yet emitted as a packet
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Total noise bytes discarded since startup
    pub fn noise_bytes(&self) -> u64 {
        self.noise_bytes
    }
}

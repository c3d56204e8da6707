//! # Adaptive Aggregation Engine
//!
//! Owns the outbound pending buffer and decides, per forwarded packet,
//! whether the accumulated bytes go out as one UDP datagram now or keep
//! accumulating. Batching several small telemetry packets into one datagram
//! costs latency but saves a lossy radio link a lot of per-datagram
//! overhead.
//!
//! The policy is a single integer (see [`AggregatePolicy::from_raw`]), with
//! one override: ATTITUDE arrives at a high rate and ground stations expect
//! it promptly, so once a few packets have accumulated an ATTITUDE packet
//! always flushes the batch regardless of the configured threshold.

use bytes::{Bytes, BytesMut};
use tracing::warn;

use crate::mavlink::protocol::{Packet, MSG_ID_ATTITUDE};

/// Pending buffer capacity in bytes; a flush is forced before any append
/// would cross it
pub const PENDING_CAPACITY: usize = 2048;

/// Accumulated packets after which an ATTITUDE packet forces a flush
const ATTITUDE_FLUSH_MIN_PACKETS: u32 = 3;

/// Highest meaningful policy value; larger configured values clamp here
pub const MAX_AGGREGATE: u32 = 2000;

/// How the bridge batches forwarded packets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatePolicy {
    /// Forward every serial read unmodified; framing and decoding disabled
    RawPassThrough,
    /// Flush once this many complete packets have accumulated
    PacketCount(u32),
    /// Flush once the pending buffer holds at least this many bytes
    ByteThreshold(usize),
}

impl AggregatePolicy {
    /// Map the configured integer onto a policy.
    ///
    /// `0` is raw pass-through, `1..=49` packet-count batching, `50..=2000`
    /// byte batching; anything above 2000 is clamped to 2000.
    pub fn from_raw(value: u32) -> Self {
        match value.min(MAX_AGGREGATE) {
            0 => Self::RawPassThrough,
            n @ 1..=49 => Self::PacketCount(n),
            n => Self::ByteThreshold(n as usize),
        }
    }

    /// Whether this policy parses the stream at all
    pub fn parses_stream(&self) -> bool {
        !matches!(self, Self::RawPassThrough)
    }
}

/// Why a flush happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// Packet-count threshold reached
    PacketCount,
    /// Byte threshold reached
    ByteThreshold,
    /// ATTITUDE packet arrived with enough accumulated packets
    AttitudeOverride,
    /// Append would have exceeded the buffer capacity
    Overflow,
}

/// One outbound datagram: the drained pending bytes plus accounting
#[derive(Debug)]
pub struct Flush {
    pub bytes: Bytes,
    pub packets: u32,
    pub reason: FlushReason,
}

/// Owner of the pending buffer and the flush decision state.
///
/// Exactly one instance exists per bridge; all mutation happens on the
/// reactor thread between readiness events.
#[derive(Debug)]
pub struct Aggregator {
    policy: AggregatePolicy,
    pending: BytesMut,
    packet_count: u32,
    flushes: u64,
    overflows: u64,
}

impl Aggregator {
    /// Create an aggregator for the given policy
    pub fn new(policy: AggregatePolicy) -> Self {
        Self {
            policy,
            pending: BytesMut::with_capacity(PENDING_CAPACITY),
            packet_count: 0,
            flushes: 0,
            overflows: 0,
        }
    }

    /// Append one forwarded packet and evaluate the flush policy.
    ///
    /// Returns zero, one or two flushes the caller must transmit in order:
    /// an overflow pre-flush when the packet would not fit, then the
    /// policy-driven flush if a threshold was reached after the append.
    ///
    /// The pending buffer never holds a partial packet and never exceeds
    /// [`PENDING_CAPACITY`] at any observable point.
    pub fn on_packet(&mut self, packet: &Packet) -> Vec<Flush> {
        let mut flushes = Vec::new();

        if self.pending.len() + packet.len() > PENDING_CAPACITY {
            self.overflows += 1;
            warn!(
                pending = self.pending.len(),
                incoming = packet.len(),
                "pending buffer would overflow, force-flushing"
            );
            if self.pending.is_empty() {
                // A packet bigger than the whole buffer: forward it
                // unbatched rather than drop telemetry.
                flushes.push(Flush {
                    bytes: packet.bytes.clone(),
                    packets: 1,
                    reason: FlushReason::Overflow,
                });
                return flushes;
            }
            flushes.push(self.flush(FlushReason::Overflow));
        }

        self.pending.extend_from_slice(&packet.bytes);
        self.packet_count += 1;

        if let Some(reason) = self.policy_reason(packet) {
            flushes.push(self.flush(reason));
        }

        flushes
    }

    /// Threshold evaluation after a packet has been appended
    fn policy_reason(&self, packet: &Packet) -> Option<FlushReason> {
        if self.packet_count >= ATTITUDE_FLUSH_MIN_PACKETS
            && packet.header.message_id() == MSG_ID_ATTITUDE
        {
            return Some(FlushReason::AttitudeOverride);
        }

        match self.policy {
            AggregatePolicy::RawPassThrough => None,
            AggregatePolicy::PacketCount(n) if self.packet_count >= n => {
                Some(FlushReason::PacketCount)
            }
            AggregatePolicy::ByteThreshold(n) if self.pending.len() >= n => {
                Some(FlushReason::ByteThreshold)
            }
            _ => None,
        }
    }

    /// Drain the pending buffer and reset the counters.
    pub fn flush(&mut self, reason: FlushReason) -> Flush {
        let packets = self.packet_count;
        self.packet_count = 0;
        self.flushes += 1;

        Flush {
            bytes: self.pending.split().freeze(),
            packets,
            reason,
        }
    }

    /// Append synthetic telemetry after a flush.
    ///
    /// The injected bytes count as one packet already pending so the next
    /// flush decision accounts for them.
    pub fn append_injected(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        debug_assert!(self.pending.len() + bytes.len() <= PENDING_CAPACITY);
        self.pending.extend_from_slice(bytes);
        self.packet_count += 1;
    }

    /// Bytes currently pending
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Packets currently pending (injected content counts as one)
    pub fn packet_count(&self) -> u32 {
        self.packet_count
    }

    /// Total flushes since startup
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    /// Total forced overflow flushes since startup
    pub fn overflows(&self) -> u64 {
        self.overflows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mavlink::protocol::{Packet, PacketHeader, MAVLINK_STX_V1};
    use bytes::Bytes;

    fn packet(msg_id: u8, payload_len: u8) -> Packet {
        let mut frame = vec![MAVLINK_STX_V1, payload_len, 0, 1, 1, msg_id];
        frame.extend(std::iter::repeat(0x5A).take(payload_len as usize));
        frame.extend_from_slice(&[0, 0]);
        Packet {
            header: PacketHeader::parse(&frame).unwrap(),
            bytes: Bytes::from(frame),
        }
    }

    #[test]
    fn test_policy_mapping() {
        assert_eq!(AggregatePolicy::from_raw(0), AggregatePolicy::RawPassThrough);
        assert_eq!(AggregatePolicy::from_raw(1), AggregatePolicy::PacketCount(1));
        assert_eq!(AggregatePolicy::from_raw(49), AggregatePolicy::PacketCount(49));
        assert_eq!(AggregatePolicy::from_raw(50), AggregatePolicy::ByteThreshold(50));
        assert_eq!(AggregatePolicy::from_raw(2000), AggregatePolicy::ByteThreshold(2000));
        // Values above 2000 clamp
        assert_eq!(AggregatePolicy::from_raw(5000), AggregatePolicy::ByteThreshold(2000));
    }

    #[test]
    fn test_count_threshold_flushes_exact_batch() {
        let mut agg = Aggregator::new(AggregatePolicy::from_raw(5));
        let pkt = packet(0, 9);

        let mut expected = Vec::new();
        for i in 0..4 {
            expected.extend_from_slice(&pkt.bytes);
            assert!(agg.on_packet(&pkt).is_empty(), "flushed early at {}", i);
        }
        expected.extend_from_slice(&pkt.bytes);

        let flushes = agg.on_packet(&pkt);
        assert_eq!(flushes.len(), 1);
        let flush = &flushes[0];
        assert_eq!(flush.reason, FlushReason::PacketCount);
        assert_eq!(flush.packets, 5);
        // The datagram carries those 5 packets' bytes and no more
        assert_eq!(flush.bytes.as_ref(), expected.as_slice());
        assert_eq!(agg.pending_len(), 0);
        assert_eq!(agg.packet_count(), 0);
    }

    #[test]
    fn test_byte_threshold() {
        let mut agg = Aggregator::new(AggregatePolicy::from_raw(100));
        // 6 + 40 + 2 = 48 bytes per packet
        let pkt = packet(0, 40);

        assert!(agg.on_packet(&pkt).is_empty());
        assert_eq!(agg.pending_len(), 48);

        assert!(agg.on_packet(&pkt).is_empty());
        assert_eq!(agg.pending_len(), 96);

        let flushes = agg.on_packet(&pkt);
        assert_eq!(flushes.len(), 1);
        assert_eq!(flushes[0].reason, FlushReason::ByteThreshold);
        assert_eq!(flushes[0].bytes.len(), 144);
    }

    #[test]
    fn test_attitude_override() {
        let mut agg = Aggregator::new(AggregatePolicy::from_raw(2000));
        let heartbeat = packet(0, 9);
        let attitude = packet(30, 28);

        // Two packets accumulated: attitude as the third triggers
        assert!(agg.on_packet(&heartbeat).is_empty());
        assert!(agg.on_packet(&heartbeat).is_empty());

        let flushes = agg.on_packet(&attitude);
        assert_eq!(flushes.len(), 1);
        assert_eq!(flushes[0].reason, FlushReason::AttitudeOverride);
        assert_eq!(flushes[0].packets, 3);
    }

    #[test]
    fn test_attitude_below_min_packets_accumulates() {
        let mut agg = Aggregator::new(AggregatePolicy::from_raw(2000));
        let attitude = packet(30, 28);

        assert!(agg.on_packet(&attitude).is_empty());
        assert!(agg.on_packet(&attitude).is_empty());
        // Third attitude reaches the 3-packet floor
        assert_eq!(agg.on_packet(&attitude).len(), 1);
    }

    #[test]
    fn test_overflow_guard_never_exceeds_capacity() {
        let mut agg = Aggregator::new(AggregatePolicy::from_raw(2000));
        // 255-byte payload: 263 bytes per packet
        let pkt = packet(0, 255);

        for _ in 0..50 {
            let flushes = agg.on_packet(&pkt);
            assert!(agg.pending_len() <= PENDING_CAPACITY);
            for flush in &flushes {
                assert!(flush.bytes.len() <= PENDING_CAPACITY);
            }
        }
        assert!(agg.overflows() > 0);
    }

    #[test]
    fn test_overflow_preserves_all_bytes_in_order() {
        let mut agg = Aggregator::new(AggregatePolicy::from_raw(2000));
        let pkt = packet(0, 255);

        let mut sent = Vec::new();
        for _ in 0..16 {
            for flush in agg.on_packet(&pkt) {
                sent.extend_from_slice(&flush.bytes);
            }
        }
        sent.extend_from_slice(&agg.flush(FlushReason::PacketCount).bytes);

        let mut expected = Vec::new();
        for _ in 0..16 {
            expected.extend_from_slice(&pkt.bytes);
        }
        assert_eq!(sent, expected);
    }

    #[test]
    fn test_injected_bytes_count_as_one_packet() {
        let mut agg = Aggregator::new(AggregatePolicy::from_raw(2));
        let pkt = packet(0, 9);

        assert!(agg.on_packet(&pkt).is_empty());
        assert_eq!(agg.on_packet(&pkt).len(), 1);

        // Injector tops up the empty buffer; next flush needs only one more
        agg.append_injected(&[0xFD, 0x01, 0, 0, 0, 1, 250, 253, 0, 0, 4, 0, 0]);
        assert_eq!(agg.packet_count(), 1);

        let flushes = agg.on_packet(&pkt);
        assert_eq!(flushes.len(), 1);
        assert_eq!(flushes[0].packets, 2);
    }

    #[test]
    fn test_empty_injection_is_ignored() {
        let mut agg = Aggregator::new(AggregatePolicy::from_raw(2));
        agg.append_injected(&[]);
        assert_eq!(agg.packet_count(), 0);
        assert_eq!(agg.pending_len(), 0);
    }

    #[test]
    fn test_flush_reports_stats() {
        let mut agg = Aggregator::new(AggregatePolicy::from_raw(1));
        let pkt = packet(0, 9);

        for _ in 0..3 {
            assert_eq!(agg.on_packet(&pkt).len(), 1);
        }
        assert_eq!(agg.flushes(), 3);
    }
}

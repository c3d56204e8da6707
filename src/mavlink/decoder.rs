//! # Message Field Decoding
//!
//! Payload decoding for the handful of message types the bridge inspects:
//! the three RC channel reports, HEARTBEAT for flight controller identity,
//! and the bridge's own STATUSTEXT / RAW_IMU packets (used to read back
//! injected telemetry in tests).
//!
//! MAVLink 2 truncates trailing zero payload bytes, so every read past the
//! end of the payload decodes as zero rather than an error.

use super::protocol::{Packet, MAX_CHANNELS, MAX_STATUSTEXT_LEN};
use super::protocol::{MSG_ID_RC_CHANNELS, MSG_ID_RC_CHANNELS_OVERRIDE, MSG_ID_RC_CHANNELS_RAW};

/// One vehicle's RC channel values at one point in time.
///
/// Replaced wholesale each time a decoded RC message arrives; index 0 is
/// channel 1. Channels the message did not carry read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSet {
    values: [u16; MAX_CHANNELS],
    count: u8,
}

impl ChannelSet {
    /// Channel value by 1-based channel number, zero when absent
    pub fn channel(&self, number: u8) -> u16 {
        if number == 0 || usize::from(number) > MAX_CHANNELS {
            return 0;
        }
        self.values[usize::from(number) - 1]
    }

    /// Number of channels the source message carries
    pub fn count(&self) -> u8 {
        self.count
    }

    /// All channel slots, index 0 = channel 1
    pub fn values(&self) -> &[u16; MAX_CHANNELS] {
        &self.values
    }
}

/// Little-endian u16 at `offset`, zero when truncated away
fn u16_at(payload: &[u8], offset: usize) -> u16 {
    let lo = payload.get(offset).copied().unwrap_or(0);
    let hi = payload.get(offset + 1).copied().unwrap_or(0);
    u16::from_le_bytes([lo, hi])
}

/// Decode a channel set from any of the RC channel report messages.
///
/// Returns `None` for other message ids. Wire layouts (fields size-sorted
/// per MAVLink serialization, extensions appended last):
/// - RC_CHANNELS (#65): `time_boot_ms` then 18 channels from offset 4
/// - RC_CHANNELS_RAW (#35): `time_boot_ms` then 8 channels from offset 4
/// - RC_CHANNELS_OVERRIDE (#70): 8 channels from offset 0, target ids,
///   then channels 9-18 as extensions from offset 18
pub fn decode_rc_channels(packet: &Packet) -> Option<ChannelSet> {
    let payload = packet.payload();

    let (base, stride_count) = match packet.header.message_id() {
        MSG_ID_RC_CHANNELS => (4, 18),
        MSG_ID_RC_CHANNELS_RAW => (4, 8),
        MSG_ID_RC_CHANNELS_OVERRIDE => (0, 8),
        _ => return None,
    };

    let mut values = [0u16; MAX_CHANNELS];
    for (i, slot) in values.iter_mut().take(stride_count).enumerate() {
        *slot = u16_at(payload, base + 2 * i);
    }

    let mut count = stride_count as u8;
    if packet.header.message_id() == MSG_ID_RC_CHANNELS_OVERRIDE && payload.len() > 18 {
        // Extension channels 9-18 follow the two target id bytes
        for (i, slot) in values.iter_mut().skip(8).enumerate() {
            *slot = u16_at(payload, 18 + 2 * i);
        }
        count = MAX_CHANNELS as u8;
    }

    Some(ChannelSet { values, count })
}

/// Flight controller family, from the HEARTBEAT `autopilot` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Autopilot {
    Generic,
    ArduPilot,
    Px4,
    Other(u8),
}

impl Autopilot {
    /// Operator-facing label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Generic => "Generic/INAV",
            Self::ArduPilot => "ArduPilot",
            Self::Px4 => "PX4",
            Self::Other(_) => "other",
        }
    }
}

/// Decode the autopilot family from a HEARTBEAT payload.
///
/// Layout: `custom_mode` u32, then type, autopilot, base_mode,
/// system_status, mavlink_version.
pub fn decode_heartbeat_autopilot(payload: &[u8]) -> Autopilot {
    match payload.get(5).copied().unwrap_or(0) {
        0 => Autopilot::Generic,
        3 => Autopilot::ArduPilot,
        12 => Autopilot::Px4,
        other => Autopilot::Other(other),
    }
}

/// Decode a STATUSTEXT payload into severity and text.
///
/// The text field is a fixed 50-byte block, NUL-padded on the wire and
/// possibly zero-truncated in v2 frames.
pub fn decode_statustext(payload: &[u8]) -> (u8, String) {
    let severity = payload.first().copied().unwrap_or(0);
    let text: Vec<u8> = payload.iter()
        .skip(1)
        .take(MAX_STATUSTEXT_LEN)
        .copied()
        .take_while(|&b| b != 0)
        .collect();
    (severity, String::from_utf8_lossy(&text).into_owned())
}

/// Decode the temperature extension (centi-degrees) from a RAW_IMU payload.
///
/// Layout: `time_usec` u64, nine i16 axis fields, then extensions `id` u8
/// and `temperature` i16 at offset 27.
pub fn decode_raw_imu_temperature(payload: &[u8]) -> i16 {
    u16_at(payload, 27) as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mavlink::protocol::{Packet, PacketHeader, MAVLINK_STX_V1};
    use bytes::Bytes;

    fn rc_packet(msg_id: u8, payload: Vec<u8>) -> Packet {
        let mut frame = vec![MAVLINK_STX_V1, payload.len() as u8, 0, 1, 1, msg_id];
        frame.extend_from_slice(&payload);
        frame.extend_from_slice(&[0, 0]);
        Packet {
            header: PacketHeader::parse(&frame).unwrap(),
            bytes: Bytes::from(frame),
        }
    }

    fn rc_channels_payload(values: &[u16]) -> Vec<u8> {
        let mut payload = vec![0u8; 4];
        for v in values {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        payload
    }

    #[test]
    fn test_decode_rc_channels() {
        let mut values = [0u16; 18];
        values[0] = 1500;
        values[4] = 1984;
        values[17] = 987;

        let packet = rc_packet(65, {
            let mut p = rc_channels_payload(&values);
            p.push(18); // chancount
            p.push(254); // rssi
            p
        });

        let set = decode_rc_channels(&packet).unwrap();
        assert_eq!(set.count(), 18);
        assert_eq!(set.channel(1), 1500);
        assert_eq!(set.channel(5), 1984);
        assert_eq!(set.channel(18), 987);
        assert_eq!(set.channel(2), 0);
    }

    #[test]
    fn test_decode_rc_channels_raw_has_eight() {
        let packet = rc_packet(35, {
            let mut p = rc_channels_payload(&[1000, 1100, 1200, 1300, 1400, 1500, 1600, 1700]);
            p.push(0); // port
            p.push(254); // rssi
            p
        });

        let set = decode_rc_channels(&packet).unwrap();
        assert_eq!(set.count(), 8);
        assert_eq!(set.channel(1), 1000);
        assert_eq!(set.channel(8), 1700);
        assert_eq!(set.channel(9), 0);
    }

    #[test]
    fn test_decode_rc_channels_override_extensions() {
        // Channels 1-8 first, then target ids, then extension channels 9-18
        let mut payload = Vec::new();
        for v in [1000u16, 1001, 1002, 1003, 1004, 1005, 1006, 1007] {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        payload.extend_from_slice(&[1, 1]);
        for v in [2000u16, 2001, 2002, 2003, 2004, 2005, 2006, 2007, 2008, 2009] {
            payload.extend_from_slice(&v.to_le_bytes());
        }

        let set = decode_rc_channels(&rc_packet(70, payload)).unwrap();
        assert_eq!(set.count(), 18);
        assert_eq!(set.channel(1), 1000);
        assert_eq!(set.channel(8), 1007);
        assert_eq!(set.channel(9), 2000);
        assert_eq!(set.channel(18), 2009);
    }

    #[test]
    fn test_decode_rc_channels_override_without_extensions() {
        let mut payload = Vec::new();
        for v in [1000u16, 1001, 1002, 1003, 1004, 1005, 1006, 1007] {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        payload.extend_from_slice(&[1, 1]);

        let set = decode_rc_channels(&rc_packet(70, payload)).unwrap();
        assert_eq!(set.count(), 8);
        assert_eq!(set.channel(9), 0);
    }

    #[test]
    fn test_decode_truncated_v2_payload_reads_zero() {
        // A v2-truncated RC_CHANNELS payload ending mid-channel-list
        let packet = rc_packet(65, rc_channels_payload(&[1500, 1501]));
        let set = decode_rc_channels(&packet).unwrap();
        assert_eq!(set.channel(1), 1500);
        assert_eq!(set.channel(2), 1501);
        assert_eq!(set.channel(3), 0);
        assert_eq!(set.channel(18), 0);
    }

    #[test]
    fn test_non_rc_message_is_none() {
        let packet = rc_packet(0, vec![0; 9]);
        assert!(decode_rc_channels(&packet).is_none());
    }

    #[test]
    fn test_channel_out_of_range_reads_zero() {
        let packet = rc_packet(65, rc_channels_payload(&[1500]));
        let set = decode_rc_channels(&packet).unwrap();
        assert_eq!(set.channel(0), 0);
        assert_eq!(set.channel(19), 0);
    }

    #[test]
    fn test_decode_heartbeat_autopilot() {
        let mut payload = vec![0u8; 9];

        payload[5] = 0;
        assert_eq!(decode_heartbeat_autopilot(&payload), Autopilot::Generic);
        assert_eq!(decode_heartbeat_autopilot(&payload).label(), "Generic/INAV");

        payload[5] = 3;
        assert_eq!(decode_heartbeat_autopilot(&payload), Autopilot::ArduPilot);

        payload[5] = 12;
        assert_eq!(decode_heartbeat_autopilot(&payload), Autopilot::Px4);

        payload[5] = 8;
        assert_eq!(decode_heartbeat_autopilot(&payload), Autopilot::Other(8));
        assert_eq!(decode_heartbeat_autopilot(&payload).label(), "other");
    }

    #[test]
    fn test_decode_statustext() {
        let mut payload = vec![4u8];
        payload.extend_from_slice(b"12 video pckts dropped!");
        payload.resize(51, 0);

        let (severity, text) = decode_statustext(&payload);
        assert_eq!(severity, 4);
        assert_eq!(text, "12 video pckts dropped!");
    }

    #[test]
    fn test_decode_statustext_truncated() {
        // v2 zero-truncation can cut the NUL padding entirely
        let mut payload = vec![4u8];
        payload.extend_from_slice(b"hi");

        let (severity, text) = decode_statustext(&payload);
        assert_eq!(severity, 4);
        assert_eq!(text, "hi");
    }

    #[test]
    fn test_decode_raw_imu_temperature() {
        let mut payload = vec![0u8; 29];
        payload[27..29].copy_from_slice(&4250i16.to_le_bytes());
        assert_eq!(decode_raw_imu_temperature(&payload), 4250);

        let mut negative = vec![0u8; 29];
        negative[27..29].copy_from_slice(&(-1500i16).to_le_bytes());
        assert_eq!(decode_raw_imu_temperature(&negative), -1500);
    }
}

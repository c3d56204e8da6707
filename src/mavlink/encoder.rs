//! # Synthetic Packet Encoder
//!
//! Packs the bridge's own telemetry (status text, temperature) as
//! standards-conformant MAVLink 2 packets: little-endian fields, trailing
//! zero bytes of the payload truncated, CRC_EXTRA folded into the checksum.
//!
//! Injected packets carry a synthetic identity: the system id observed on
//! the flight controller stream (1 until detected) and the system-control
//! component id, so ground stations attribute them to the vehicle.

use super::crc::crc_calculate;
use super::protocol::{
    COMP_ID_SYSTEM_CONTROL, CRC_EXTRA_RAW_IMU, CRC_EXTRA_STATUSTEXT, MAVLINK_STX_V2,
    MAX_STATUSTEXT_LEN, MSG_ID_RAW_IMU, MSG_ID_STATUSTEXT,
};

/// STATUSTEXT severity used for operator and link-health messages
/// (MAV_SEVERITY_WARNING)
pub const SEVERITY_WARNING: u8 = 4;

/// Packs outbound MAVLink 2 packets with a running sequence number.
#[derive(Debug)]
pub struct MavEncoder {
    system_id: u8,
    component_id: u8,
    sequence: u8,
}

impl Default for MavEncoder {
    fn default() -> Self {
        Self::new(1)
    }
}

impl MavEncoder {
    /// Create an encoder for the given source system id
    pub fn new(system_id: u8) -> Self {
        Self {
            system_id,
            component_id: COMP_ID_SYSTEM_CONTROL,
            sequence: 0,
        }
    }

    /// Adopt the system id observed on the flight controller stream
    pub fn set_system_id(&mut self, system_id: u8) {
        self.system_id = system_id;
    }

    /// Current source system id
    pub fn system_id(&self) -> u8 {
        self.system_id
    }

    /// Pack a STATUSTEXT packet.
    ///
    /// # Arguments
    ///
    /// * `severity` - MAV_SEVERITY value
    /// * `text` - Message text; truncated beyond 50 bytes
    ///
    /// # Returns
    ///
    /// * `Vec<u8>` - Complete frame ready for the pending buffer
    pub fn statustext(&mut self, severity: u8, text: &str) -> Vec<u8> {
        let mut payload = vec![0u8; 1 + MAX_STATUSTEXT_LEN];
        payload[0] = severity;

        let bytes = text.as_bytes();
        let len = bytes.len().min(MAX_STATUSTEXT_LEN);
        payload[1..1 + len].copy_from_slice(&bytes[..len]);

        self.pack(MSG_ID_STATUSTEXT, &payload, CRC_EXTRA_STATUSTEXT)
    }

    /// Pack a RAW_IMU packet carrying only the temperature extension.
    ///
    /// All axis fields are zero; `temperature` is in centi-degrees Celsius
    /// at the tail of the payload.
    pub fn raw_imu_temperature(&mut self, time_usec: u64, temperature: i16) -> Vec<u8> {
        // time_usec u64 + 9 axis i16 + id extension u8 + temperature i16
        let mut payload = vec![0u8; 29];
        payload[0..8].copy_from_slice(&time_usec.to_le_bytes());
        payload[27..29].copy_from_slice(&temperature.to_le_bytes());

        self.pack(MSG_ID_RAW_IMU, &payload, CRC_EXTRA_RAW_IMU)
    }

    /// Assemble a MAVLink 2 frame around a full-size payload.
    fn pack(&mut self, msg_id: u32, payload: &[u8], crc_extra: u8) -> Vec<u8> {
        // MAVLink 2 payload truncation: drop trailing zeros, keep at least one byte
        let mut payload_len = payload.len();
        while payload_len > 1 && payload[payload_len - 1] == 0 {
            payload_len -= 1;
        }

        let mut frame = Vec::with_capacity(10 + payload_len + 2);
        frame.push(MAVLINK_STX_V2);
        frame.push(payload_len as u8);
        frame.push(0); // incompat_flags: unsigned only
        frame.push(0); // compat_flags
        frame.push(self.sequence);
        frame.push(self.system_id);
        frame.push(self.component_id);
        frame.push(msg_id as u8);
        frame.push((msg_id >> 8) as u8);
        frame.push((msg_id >> 16) as u8);
        frame.extend_from_slice(&payload[..payload_len]);

        let crc = crc_calculate(&frame[1..], crc_extra);
        frame.extend_from_slice(&crc.to_le_bytes());

        self.sequence = self.sequence.wrapping_add(1);
        frame
    }
}

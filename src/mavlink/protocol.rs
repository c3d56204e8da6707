//! # MAVLink Protocol Constants and Types
//!
//! Core wire-format definitions for MAVLink v1/v2 transport framing.

use bytes::Bytes;

/// MAVLink 1 start marker (protocol version 1)
pub const MAVLINK_STX_V1: u8 = 0xFE;

/// MAVLink 2 start marker (protocol version 2)
pub const MAVLINK_STX_V2: u8 = 0xFD;

/// MAVLink 1 header length (stx + len + seq + sysid + compid + msgid)
pub const HEADER_LEN_V1: usize = 6;

/// MAVLink 2 header length (stx + len + incompat + compat + seq + sysid + compid + msgid[3])
pub const HEADER_LEN_V2: usize = 10;

/// Trailing checksum length, both versions
pub const CHECKSUM_LEN: usize = 2;

/// MAVLink 2 incompat flag marking a signed frame (13 extra trailing bytes).
///
/// Signed frames are not supported: the signature bytes are not accounted
/// for in the packet length and such streams will be mis-framed. The bridge
/// warns when it sees the flag instead of guessing at a policy.
pub const INCOMPAT_FLAG_SIGNED: u8 = 0x01;

/// HEARTBEAT message id
pub const MSG_ID_HEARTBEAT: u32 = 0;

/// RAW_IMU message id (carries the temperature extension field)
pub const MSG_ID_RAW_IMU: u32 = 27;

/// ATTITUDE message id (high-frequency; forces aggregation flushes)
pub const MSG_ID_ATTITUDE: u32 = 30;

/// RC_CHANNELS_RAW message id (#35), used by INAV / ExpressLRS / Crossfire
pub const MSG_ID_RC_CHANNELS_RAW: u32 = 35;

/// RC_CHANNELS message id (#65), used by ArduPilot
pub const MSG_ID_RC_CHANNELS: u32 = 65;

/// RC_CHANNELS_OVERRIDE message id (#70)
pub const MSG_ID_RC_CHANNELS_OVERRIDE: u32 = 70;

/// STATUSTEXT message id
pub const MSG_ID_STATUSTEXT: u32 = 253;

/// CRC_EXTRA seed for STATUSTEXT
pub const CRC_EXTRA_STATUSTEXT: u8 = 83;

/// CRC_EXTRA seed for RAW_IMU
pub const CRC_EXTRA_RAW_IMU: u8 = 144;

/// Maximum RC channels carried by one channel set
pub const MAX_CHANNELS: usize = 18;

/// Maximum STATUSTEXT text length (excluding terminator)
pub const MAX_STATUSTEXT_LEN: usize = 50;

/// MAV_COMP_ID_SYSTEM_CONTROL, the component id used for injected packets
pub const COMP_ID_SYSTEM_CONTROL: u8 = 250;

/// MAVLink protocol version, detected from the start marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MavVersion {
    V1,
    V2,
}

impl MavVersion {
    /// Detect the protocol version from a start marker byte
    pub fn from_marker(byte: u8) -> Option<Self> {
        match byte {
            MAVLINK_STX_V1 => Some(Self::V1),
            MAVLINK_STX_V2 => Some(Self::V2),
            _ => None,
        }
    }

    /// Header length for this version
    pub fn header_len(self) -> usize {
        match self {
            Self::V1 => HEADER_LEN_V1,
            Self::V2 => HEADER_LEN_V2,
        }
    }
}

impl std::fmt::Display for MavVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V1 => write!(f, "1.0"),
            Self::V2 => write!(f, "2.0"),
        }
    }
}

/// Decoded transport header, tagged by protocol version.
///
/// Field positions differ between MAVLink 1 and 2; keeping one variant per
/// version with named fields means no positional offset arithmetic leaks
/// into the rest of the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketHeader {
    V1 {
        payload_len: u8,
        sequence: u8,
        system_id: u8,
        component_id: u8,
        message_id: u8,
    },
    V2 {
        payload_len: u8,
        incompat_flags: u8,
        compat_flags: u8,
        sequence: u8,
        system_id: u8,
        component_id: u8,
        message_id: u32,
    },
}

impl PacketHeader {
    /// Decode a header from the start of `bytes`.
    ///
    /// Returns `None` when `bytes` does not begin with a start marker or is
    /// shorter than the version's header.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let version = MavVersion::from_marker(*bytes.first()?)?;
        if bytes.len() < version.header_len() {
            return None;
        }

        match version {
            MavVersion::V1 => Some(Self::V1 {
                payload_len: bytes[1],
                sequence: bytes[2],
                system_id: bytes[3],
                component_id: bytes[4],
                message_id: bytes[5],
            }),
            MavVersion::V2 => Some(Self::V2 {
                payload_len: bytes[1],
                incompat_flags: bytes[2],
                compat_flags: bytes[3],
                sequence: bytes[4],
                system_id: bytes[5],
                component_id: bytes[6],
                // 24-bit little-endian message id
                message_id: u32::from(bytes[7])
                    | u32::from(bytes[8]) << 8
                    | u32::from(bytes[9]) << 16,
            }),
        }
    }

    /// Protocol version this header was decoded as
    pub fn version(&self) -> MavVersion {
        match self {
            Self::V1 { .. } => MavVersion::V1,
            Self::V2 { .. } => MavVersion::V2,
        }
    }

    /// Declared payload length
    pub fn payload_len(&self) -> u8 {
        match *self {
            Self::V1 { payload_len, .. } | Self::V2 { payload_len, .. } => payload_len,
        }
    }

    /// Packet sequence number
    pub fn sequence(&self) -> u8 {
        match *self {
            Self::V1 { sequence, .. } | Self::V2 { sequence, .. } => sequence,
        }
    }

    /// Sending system id
    pub fn system_id(&self) -> u8 {
        match *self {
            Self::V1 { system_id, .. } | Self::V2 { system_id, .. } => system_id,
        }
    }

    /// Sending component id
    pub fn component_id(&self) -> u8 {
        match *self {
            Self::V1 { component_id, .. } | Self::V2 { component_id, .. } => component_id,
        }
    }

    /// Message id (8-bit in v1, 24-bit in v2)
    pub fn message_id(&self) -> u32 {
        match *self {
            Self::V1 { message_id, .. } => u32::from(message_id),
            Self::V2 { message_id, .. } => message_id,
        }
    }

    /// Whether the v2 signed-frame incompat flag is set (never set for v1)
    pub fn is_signed(&self) -> bool {
        match *self {
            Self::V1 { .. } => false,
            Self::V2 { incompat_flags, .. } => incompat_flags & INCOMPAT_FLAG_SIGNED != 0,
        }
    }

    /// Total on-wire packet length: header + payload + checksum
    pub fn packet_len(&self) -> usize {
        self.version().header_len() + self.payload_len() as usize + CHECKSUM_LEN
    }
}

/// One complete MAVLink packet as it appeared on the wire.
///
/// `bytes` holds the verbatim frame (header through checksum); `header`
/// carries the fields derived when the frame completed. The checksum is not
/// verified: forwarded traffic is opaque to the bridge.
#[derive(Debug, Clone)]
pub struct Packet {
    pub header: PacketHeader,
    pub bytes: Bytes,
}

impl Packet {
    /// Payload bytes (between header and checksum)
    pub fn payload(&self) -> &[u8] {
        let start = self.header.version().header_len();
        let end = self.bytes.len() - CHECKSUM_LEN;
        &self.bytes[start..end]
    }

    /// Total on-wire length
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when the packet carries no bytes (never for parsed packets)
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

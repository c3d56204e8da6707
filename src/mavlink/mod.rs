//! # MAVLink Wire Protocol Module
//!
//! Transport-level handling of the MAVLink byte stream.
//!
//! This module handles:
//! - Splitting an arbitrary byte stream into complete v1/v2 packets
//! - Header field extraction (sequence, sender ids, message id)
//! - Field decoding for the handful of message types the bridge inspects
//! - Packing synthetic v2 packets (status text, raw IMU temperature)
//! - CRC-16/MCRF4XX checksum calculation
//!
//! Forwarded traffic is treated as opaque framed bytes: checksums are only
//! computed for packets this bridge itself produces.

pub mod protocol;
pub mod crc;
pub mod framer;
pub mod decoder;
pub mod encoder;

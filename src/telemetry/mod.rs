//! # Telemetry Injection Module
//!
//! Synthetic telemetry riding inside the outbound batches.
//!
//! This module handles:
//! - Operator text messages dropped into an inbox file by other processes
//! - Dropped-packet reports parsed from the radio stack's log file
//! - Board temperature from a sysfs node or a memory-mapped register
//! - Packing all of the above as MAVLink packets appended after each flush

pub mod inbox;
pub mod link_health;
pub mod temperature;
pub mod injector;

//! # MAV Bridge Library
//!
//! Air-side MAVLink telemetry bridge for remote vehicles.
//!
//! This library relays a binary MAVLink byte stream between a flight
//! controller UART and a ground station UDP peer, batching packets for a
//! lossy radio link, turning settled RC channel values into external
//! commands, and injecting synthetic telemetry into the outbound stream.

pub mod config;
pub mod error;
pub mod mavlink;
pub mod aggregator;
pub mod debounce;
pub mod telemetry;
pub mod serial;
pub mod bridge;

//! # Serial Link Module
//!
//! Opens the flight controller UART: raw byte stream, 8 data bits, no
//! parity, one stop bit, no flow control, at one of the enumerated baud
//! rates the radio firmware supports.

use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::info;

use crate::error::{BridgeError, Result};

/// Baud rates the bridge accepts; anything else is a configuration error
pub const SUPPORTED_BAUD_RATES: &[u32] = &[
    9600, 19200, 38400, 57600, 115200, 230400, 460800, 500000, 921600, 1_500_000,
];

/// Whether `baud_rate` is one of the supported rates
pub fn baud_rate_supported(baud_rate: u32) -> bool {
    SUPPORTED_BAUD_RATES.contains(&baud_rate)
}

/// Open the flight controller UART.
///
/// # Arguments
///
/// * `path` - Device path (e.g. `/dev/ttyAMA0`)
/// * `baud_rate` - One of [`SUPPORTED_BAUD_RATES`]
///
/// # Errors
///
/// Returns an error for an unsupported baud rate or if the port cannot be
/// opened.
pub fn open(path: &str, baud_rate: u32) -> Result<SerialStream> {
    if !baud_rate_supported(baud_rate) {
        return Err(BridgeError::Serial(format!(
            "unsupported baud rate {}",
            baud_rate
        )));
    }

    let port = tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| BridgeError::Serial(format!("failed to open {}: {}", path, e)))?;

    info!(path, baud_rate, "serial link open");
    Ok(port)
}

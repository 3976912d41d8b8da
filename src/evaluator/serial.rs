//! Production serial port.

use std::path::Path;

use log::info;
use serial2_tokio::SerialPort;

use crate::error::Result;

/// Open the serial device handed to the evaluator
pub fn open_serial(path: &Path, baud_rate: u32) -> Result<SerialPort> {
    let port = SerialPort::open(path, baud_rate)?;
    info!("Opened serial port {} at {} baud", path.display(), baud_rate);
    Ok(port)
}

//! Serial link to the concentrator MCU
use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;

use log::{debug, error};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::error::Result;

pub const BAUD_RATE: u32 = 115_200;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// The MCU may still be emitting a previous answer right after the port opens
const SETTLE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSettings {
    /// Silence tolerated between two bytes of a frame once it has started
    pub read_timeout: Duration,
    /// How long the MCU may take before the first byte of an answer
    pub ack_timeout: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }
}

/// Byte stream the MCU protocol runs on
pub trait Transport: Read + Write + Sized {
    fn open(path: &str, settings: &LinkSettings) -> Result<Self>;
}

/// USB CDC-ACM or UART link, 115200 baud 8N1 without flow control
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialTransport {
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Transport for SerialTransport {
    fn open(path: &str, settings: &LinkSettings) -> Result<Self> {
        let port = serialport::new(path, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(settings.read_timeout)
            .open()
            .map_err(|e| {
                error!("failed to open serial port {}: {}", path, e);
                e
            })?;

        thread::sleep(SETTLE_DELAY);
        port.clear(ClearBuffer::All)?;
        debug!("serial port {} opened at {} baud", path, BAUD_RATE);

        Ok(Self {
            port,
            path: path.to_string(),
        })
    }
}

impl Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        debug!("closing serial port {}", self.path);
    }
}

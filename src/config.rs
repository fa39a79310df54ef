//! JSON configuration of a concentrator
//!
//! ```json
//! {
//!     "board": { "tty_path": "/dev/ttyACM0" },
//!     "rx_channels": [
//!         { "enable": true, "freq_hz": 2403000000, "bandwidth": 800, "datarate": 12 }
//!     ],
//!     "tx": { "enable": true }
//! }
//! ```
//!
//! Bandwidths are written in kHz.
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hal::types::{RxChannelConfig, TxChannelConfig, RX_CHANNEL_NB_MAX};
use crate::transport::LinkSettings;

fn default_force_radio_1() -> bool {
    true
}

fn default_read_timeout_ms() -> u64 {
    100
}

fn default_ack_timeout_ms() -> u64 {
    10_000
}

fn default_tx_poll_interval_ms() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    /// serial device of the MCU, e.g. `/dev/ttyACM0`
    pub tty_path: String,
    /// radio 1 is configured first and must be enabled
    #[serde(default = "default_force_radio_1")]
    pub force_radio_1: bool,
    #[serde(default)]
    pub verify_correlation_id: bool,
    /// silence tolerated inside a frame
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// wait for the first byte of an acknowledgement
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
    #[serde(default = "default_tx_poll_interval_ms")]
    pub tx_poll_interval_ms: u64,
}

impl BoardConfig {
    pub fn new(tty_path: &str) -> Self {
        Self {
            tty_path: tty_path.to_string(),
            ..Default::default()
        }
    }

    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            ack_timeout: Duration::from_millis(self.ack_timeout_ms),
        }
    }

    pub fn tx_poll_interval(&self) -> Duration {
        Duration::from_millis(self.tx_poll_interval_ms)
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            tty_path: String::new(),
            force_radio_1: default_force_radio_1(),
            verify_correlation_id: false,
            read_timeout_ms: default_read_timeout_ms(),
            ack_timeout_ms: default_ack_timeout_ms(),
            tx_poll_interval_ms: default_tx_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentratorConfig {
    pub board: BoardConfig,
    /// indexed by radio, at most three
    #[serde(default)]
    pub rx_channels: Vec<RxChannelConfig>,
    #[serde(default)]
    pub tx: TxChannelConfig,
}

impl ConcentratorConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        content.parse()
    }
}

impl FromStr for ConcentratorConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: ConcentratorConfig = serde_json::from_str(s)?;
        if config.rx_channels.len() > RX_CHANNEL_NB_MAX {
            return Err(Error::InvalidChannel {
                index: (config.rx_channels.len() - 1) as u8,
                available: RX_CHANNEL_NB_MAX as u8,
            });
        }
        Ok(config)
    }
}

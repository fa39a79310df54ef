//! Concentrator session
//!
//! A [`Concentrator`] is configured while stopped, then [`Concentrator::start`] opens the link,
//! checks the MCU firmware and configures the RX radios. Packets are fetched with
//! [`Concentrator::receive`] and sent with [`Concentrator::send`].
//!
//! ```no_run
//! use loragw_serial::config::BoardConfig;
//! use loragw_serial::hal::Concentrator;
//!
//! let mut concentrator: Concentrator = Concentrator::new();
//! concentrator.configure_board(BoardConfig::new("/dev/ttyACM0")).unwrap();
//! concentrator.start().unwrap();
//! for pkt in concentrator.receive(8).unwrap() {
//!     println!("{:?}", pkt);
//! }
//! concentrator.stop().unwrap();
//! ```
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::config::{BoardConfig, ConcentratorConfig};
use crate::error::{Error, Result};
use crate::mcu::command::{ResetKind, TxStatus};
use crate::mcu::Mcu;
use crate::transport::{SerialTransport, Transport};

pub mod airtime;
pub mod types;

use types::{
    CodingRate, CrcStatus, Modulation, RxChannelConfig, RxPacket, StatusCode, StatusSelect,
    TxChannelConfig, TxPacket, RX_CHANNEL_NB_MAX,
};

/// Firmware the host protocol is written against
pub const MCU_VERSION_STRING: &str = "01.00.01";

pub fn version_info() -> &'static str {
    concat!("Version: ", env!("CARGO_PKG_VERSION"), ";")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Started,
}

pub struct Concentrator<T: Transport = SerialTransport> {
    board: BoardConfig,
    rx_channels: [RxChannelConfig; RX_CHANNEL_NB_MAX],
    tx_channel: TxChannelConfig,
    /// open link, only present while started
    mcu: Option<Mcu<T>>,
}

impl<T: Transport> Default for Concentrator<T> {
    fn default() -> Self {
        Self {
            board: BoardConfig::default(),
            rx_channels: [RxChannelConfig::default(); RX_CHANNEL_NB_MAX],
            tx_channel: TxChannelConfig::default(),
            mcu: None,
        }
    }
}

impl<T: Transport> Concentrator<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: ConcentratorConfig) -> Result<Self> {
        let mut concentrator = Self::new();
        concentrator.apply_config(config)?;
        Ok(concentrator)
    }

    pub fn state(&self) -> SessionState {
        if self.mcu.is_some() {
            SessionState::Started
        } else {
            SessionState::Stopped
        }
    }

    pub fn is_started(&self) -> bool {
        self.mcu.is_some()
    }

    fn ensure_stopped(&self) -> Result<()> {
        if self.is_started() {
            error!("concentrator is running, stop it before changing the configuration");
            return Err(Error::AlreadyStarted);
        }
        Ok(())
    }

    fn mcu(&mut self) -> Result<&mut Mcu<T>> {
        self.mcu.as_mut().ok_or(Error::NotStarted)
    }

    pub fn configure_board(&mut self, conf: BoardConfig) -> Result<()> {
        self.ensure_stopped()?;
        debug!("board configured on {}", conf.tty_path);
        self.board = conf;
        Ok(())
    }

    pub fn configure_rx_channel(&mut self, index: u8, conf: RxChannelConfig) -> Result<()> {
        self.ensure_stopped()?;
        let slot = self
            .rx_channels
            .get_mut(index as usize)
            .ok_or(Error::InvalidChannel {
                index,
                available: RX_CHANNEL_NB_MAX as u8,
            })?;
        *slot = conf;
        if conf.enable {
            debug!(
                "RX channel {} enabled: {} Hz, {} kHz, SF{}",
                index,
                conf.freq_hz,
                conf.bandwidth.khz(),
                conf.datarate as u8
            );
        } else {
            debug!("RX channel {} disabled", index);
        }
        Ok(())
    }

    pub fn configure_tx_channel(&mut self, conf: TxChannelConfig) -> Result<()> {
        self.ensure_stopped()?;
        self.tx_channel = conf;
        Ok(())
    }

    /// Applies every section of `config`, channels not listed are left untouched
    pub fn apply_config(&mut self, config: ConcentratorConfig) -> Result<()> {
        self.configure_board(config.board)?;
        for (index, conf) in config.rx_channels.into_iter().enumerate() {
            self.configure_rx_channel(index as u8, conf)?;
        }
        self.configure_tx_channel(config.tx)
    }

    pub fn rx_channel(&self, index: u8) -> Option<&RxChannelConfig> {
        self.rx_channels.get(index as usize)
    }

    pub fn tx_channel(&self) -> &TxChannelConfig {
        &self.tx_channel
    }

    /// Opens the configured serial device and brings the concentrator up
    pub fn start(&mut self) -> Result<()> {
        self.ensure_stopped()?;
        if self.board.tty_path.is_empty() {
            return Err(Error::BoardNotConfigured);
        }
        let link = T::open(&self.board.tty_path, &self.board.link_settings())?;
        self.start_with(link)
    }

    /// Brings the concentrator up on an already open link
    ///
    /// On failure the link is dropped and the session stays stopped.
    pub fn start_with(&mut self, link: T) -> Result<()> {
        self.ensure_stopped()?;
        let mut mcu = Mcu::new(link)
            .with_correlation_check(self.board.verify_correlation_id)
            .with_ack_timeout(self.board.link_settings().ack_timeout);

        let info = mcu.ping()?;
        if info.firmware_version() != MCU_VERSION_STRING {
            error!(
                "MCU version mismatch (expected: {}, got: {})",
                MCU_VERSION_STRING,
                info.firmware_version()
            );
            return Err(Error::FirmwareMismatch {
                expected: MCU_VERSION_STRING.to_string(),
                actual: info.firmware_version().to_string(),
            });
        }
        info!("concentrator MCU version: {}", info.version);
        debug!("concentrator EUI: 0x{:016X}", info.eui());

        mcu.reset_all(false)?;
        mcu.get_status()?;

        let nb_radio_rx = (info.nb_radio_rx as usize).min(RX_CHANNEL_NB_MAX);
        for i in 0..nb_radio_rx {
            let index = if self.board.force_radio_1 {
                (i + 1) % RX_CHANNEL_NB_MAX
            } else {
                i
            };
            let conf = self.rx_channels[index];
            if !conf.enable {
                continue;
            }
            if self.board.force_radio_1 && !self.rx_channels[1].enable {
                error!("channel 1 cannot be disabled (radio #1 needs to be configured)");
                return Err(Error::Radio1Disabled);
            }
            info!(
                "configuring radio {}: {} Hz, {} kHz, SF{}",
                index,
                conf.freq_hz,
                conf.bandwidth.khz(),
                conf.datarate as u8
            );
            mcu.config_rx(index as u8, &conf)?;
        }

        self.mcu = Some(mcu);
        info!("concentrator started");
        Ok(())
    }

    /// Resets the radios and closes the link, stopping twice is not an error
    pub fn stop(&mut self) -> Result<()> {
        let mut mcu = match self.mcu.take() {
            Some(mcu) => mcu,
            None => {
                debug!("concentrator already stopped");
                return Ok(());
            }
        };
        if let Err(e) = mcu.reset(ResetKind::RxAll) {
            warn!("failed to reset RX radios: {}", e);
        }
        if let Err(e) = mcu.reset(ResetKind::Tx) {
            warn!("failed to reset TX radio: {}", e);
        }
        drop(mcu);
        info!("concentrator stopped");
        Ok(())
    }

    /// Fetches at most `max_pkt` packets and completes their metadata from the RX channels
    pub fn receive(&mut self, max_pkt: usize) -> Result<Vec<RxPacket>> {
        let mcu = self.mcu()?;
        let mut pkts = mcu.receive(max_pkt)?;

        let status = mcu.get_status()?;
        for (radio, counters) in status.rx_crc.iter().enumerate() {
            debug!(
                "radio {}: {} CRC OK, {} CRC errors",
                radio, counters.crc_ok, counters.crc_err
            );
        }

        for pkt in pkts.iter_mut() {
            let channel = match self.rx_channels.get(pkt.channel as usize) {
                Some(channel) => channel,
                None => {
                    warn!("packet received on unknown channel {}", pkt.channel);
                    continue;
                }
            };
            pkt.freq_hz = channel.freq_hz;
            pkt.bandwidth = Some(channel.bandwidth);
            pkt.datarate = Some(channel.datarate);
            pkt.status = CrcStatus::CrcOk;
            pkt.modulation = Modulation::LoRa;
            pkt.coderate = Some(CodingRate::Li4_8);
            pkt.rssi += channel.rssi_offset;
        }
        Ok(pkts)
    }

    /// Loads `pkt` in the TX radio, it is sent according to its TX mode
    pub fn send(&mut self, pkt: &TxPacket) -> Result<()> {
        let mcu = self.mcu()?;
        debug!(
            "sending {} bytes on {} Hz, SF{}, {} kHz, {} dBm",
            pkt.size(),
            pkt.freq_hz,
            pkt.datarate as u8,
            pkt.bandwidth.khz(),
            pkt.rf_power
        );
        mcu.prepare_tx(pkt)
    }

    /// Sends `pkt` and waits until the radio reports the end of the transmission
    pub fn send_blocking(&mut self, pkt: &TxPacket, max_wait: Duration) -> Result<TxStatus> {
        let poll_interval = self.board.tx_poll_interval();
        self.send(pkt)?;
        self.mcu()?.wait_tx_done(poll_interval, max_wait)
    }

    pub fn status(&mut self, select: StatusSelect) -> Result<StatusCode> {
        match select {
            StatusSelect::Tx => {
                let mcu = match self.mcu.as_mut() {
                    Some(mcu) => mcu,
                    None => return Ok(StatusCode::TxOff),
                };
                Ok(match mcu.get_tx_status()? {
                    TxStatus::Idle | TxStatus::Done => StatusCode::TxFree,
                    TxStatus::Loaded => StatusCode::TxScheduled,
                    TxStatus::OnAir => StatusCode::TxEmitting,
                    TxStatus::Unknown(code) => {
                        warn!("unknown TX status 0x{:02X}", code);
                        StatusCode::TxStatusUnknown
                    }
                    _ => StatusCode::TxStatusUnknown,
                })
            }
            StatusSelect::Rx => Ok(if self.is_started() {
                StatusCode::RxOn
            } else {
                StatusCode::RxOff
            }),
        }
    }

    /// Cancels a scheduled or ongoing transmission
    pub fn abort_tx(&mut self) -> Result<()> {
        self.mcu()?.reset(ResetKind::Tx)
    }

    pub fn reset(&mut self, include_mcu: bool) -> Result<()> {
        self.mcu()?.reset_all(include_mcu)
    }

    /// Counter value latched on the last PPS edge
    pub fn get_trigcnt(&mut self) -> Result<u32> {
        Ok(self.mcu()?.get_status()?.pps_time_us)
    }

    /// Current value of the concentrator counter
    pub fn get_instcnt(&mut self) -> Result<u32> {
        Ok(self.mcu()?.get_status()?.precise_time_us)
    }

    pub fn get_temperature(&mut self) -> Result<f32> {
        Ok(self.mcu()?.get_status()?.temperature)
    }

    /// Reads the EUI, through a short lived link when the concentrator is stopped
    pub fn get_eui(&mut self) -> Result<u64> {
        if let Some(mcu) = self.mcu.as_mut() {
            return Ok(mcu.ping()?.eui());
        }
        if self.board.tty_path.is_empty() {
            return Err(Error::BoardNotConfigured);
        }
        let mut mcu = Mcu::<T>::open(&self.board.tty_path, &self.board.link_settings())?
            .with_correlation_check(self.board.verify_correlation_id);
        Ok(mcu.ping()?.eui())
    }

    pub fn read_register(&mut self, radio: u8, addr: u16) -> Result<u8> {
        self.mcu()?.read_register(radio, addr)
    }

    pub fn write_register(&mut self, radio: u8, addr: u16, value: u8) -> Result<()> {
        self.mcu()?.write_register(radio, addr, value)
    }

    pub fn set_rssi_temperature_coefficient(&mut self, radio: u8, coefficient: f32) -> Result<()> {
        self.mcu()?.set_rssi_temperature_coefficient(radio, coefficient)
    }

    /// Reboots the MCU into its bootloader and stops the session
    pub fn enter_bootloader(&mut self) -> Result<()> {
        let res = self.mcu()?.enter_bootloader();
        self.mcu = None;
        res
    }
}

//! Radio vocabulary shared by the HAL and the MCU protocol
//!
//! Enum discriminants are the values the concentrator expects on the wire unless a dedicated
//! conversion (e.g. [`CodingRate::wire_code`]) says otherwise.
use core::convert::TryFrom;

use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Maximum number of RX channels supported
pub const RX_CHANNEL_NB_MAX: usize = 3;
/// Maximum number of TX channels supported
pub const TX_CHANNEL_NB_MAX: usize = 1;

pub const STD_LORA_PREAMBLE: u16 = 8;
pub const MIN_LORA_PREAMBLE: u16 = 8;

/// dBm
pub const TX_POWER_MIN: i8 = -18;
/// dBm
pub const TX_POWER_MAX: i8 = 13;
/// dBm
pub const TX_POWER_DEFAULT: i8 = 10;

pub const LORA_SYNC_WORD_PUBLIC: u8 = 0x21;
pub const LORA_SYNC_WORD_PRIVATE: u8 = 0x12;

/// Payload length travels as a single byte in both directions
pub const MAX_PAYLOAD_LENGTH: usize = 255;
pub type PayloadVec = Vec<u8, MAX_PAYLOAD_LENGTH>;

/// Event on which a TX is triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TxMode {
    Timestamped = 0,
    Immediate = 1,
    OnGps = 2,
    CwOn = 3,
    CwOff = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
#[repr(u8)]
pub enum Bandwidth {
    Khz200 = 8,
    Khz400 = 10,
    Khz800 = 12,
    Khz1600 = 13,
}

impl Bandwidth {
    pub fn from_wire(code: u8) -> Result<Self, Error> {
        match code {
            8 => Ok(Bandwidth::Khz200),
            10 => Ok(Bandwidth::Khz400),
            12 => Ok(Bandwidth::Khz800),
            13 => Ok(Bandwidth::Khz1600),
            _ => Err(Error::InvalidBandwidth(code as u16)),
        }
    }

    pub fn from_khz(khz: u16) -> Result<Self, Error> {
        match khz {
            200 => Ok(Bandwidth::Khz200),
            400 => Ok(Bandwidth::Khz400),
            800 => Ok(Bandwidth::Khz800),
            1600 => Ok(Bandwidth::Khz1600),
            _ => Err(Error::InvalidBandwidth(khz)),
        }
    }

    /// Nominal bandwidth
    pub fn khz(self) -> u16 {
        match self {
            Bandwidth::Khz200 => 200,
            Bandwidth::Khz400 => 400,
            Bandwidth::Khz800 => 800,
            Bandwidth::Khz1600 => 1600,
        }
    }
}

impl TryFrom<u16> for Bandwidth {
    type Error = Error;

    fn try_from(khz: u16) -> Result<Self, Self::Error> {
        Bandwidth::from_khz(khz)
    }
}

impl From<Bandwidth> for u16 {
    fn from(bw: Bandwidth) -> u16 {
        bw.khz()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum SpreadingFactor {
    Sf5 = 5,
    Sf6 = 6,
    Sf7 = 7,
    Sf8 = 8,
    Sf9 = 9,
    Sf10 = 10,
    Sf11 = 11,
    Sf12 = 12,
}

impl TryFrom<u8> for SpreadingFactor {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            5 => Ok(SpreadingFactor::Sf5),
            6 => Ok(SpreadingFactor::Sf6),
            7 => Ok(SpreadingFactor::Sf7),
            8 => Ok(SpreadingFactor::Sf8),
            9 => Ok(SpreadingFactor::Sf9),
            10 => Ok(SpreadingFactor::Sf10),
            11 => Ok(SpreadingFactor::Sf11),
            12 => Ok(SpreadingFactor::Sf12),
            _ => Err(Error::InvalidSpreadingFactor(value)),
        }
    }
}

impl From<SpreadingFactor> for u8 {
    fn from(sf: SpreadingFactor) -> u8 {
        sf as u8
    }
}

/// LoRa coding rates, `Li*` variants use long interleaving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CodingRate {
    Cr4_5 = 0x01,
    Cr4_6 = 0x02,
    Cr4_7 = 0x03,
    Cr4_8 = 0x04,
    Li4_5 = 0x05,
    Li4_6 = 0x06,
    Li4_8 = 0x07,
}

impl CodingRate {
    /// Code used by the PREPARE_TX request
    pub fn wire_code(self) -> u8 {
        match self {
            CodingRate::Cr4_5 => 0,
            CodingRate::Cr4_6 => 1,
            CodingRate::Cr4_7 => 2,
            CodingRate::Cr4_8 => 3,
            CodingRate::Li4_5 => 4,
            CodingRate::Li4_6 => 5,
            CodingRate::Li4_8 => 6,
        }
    }

    pub fn from_wire_code(code: u8) -> Result<Self, Error> {
        match code {
            0 => Ok(CodingRate::Cr4_5),
            1 => Ok(CodingRate::Cr4_6),
            2 => Ok(CodingRate::Cr4_7),
            3 => Ok(CodingRate::Cr4_8),
            4 => Ok(CodingRate::Li4_5),
            5 => Ok(CodingRate::Li4_6),
            6 => Ok(CodingRate::Li4_8),
            _ => Err(Error::InvalidCodingRate(code)),
        }
    }

    pub fn is_long_interleaving(self) -> bool {
        self as u8 > CodingRate::Cr4_8 as u8
    }
}

impl TryFrom<u8> for CodingRate {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(CodingRate::Cr4_5),
            0x02 => Ok(CodingRate::Cr4_6),
            0x03 => Ok(CodingRate::Cr4_7),
            0x04 => Ok(CodingRate::Cr4_8),
            0x05 => Ok(CodingRate::Li4_5),
            0x06 => Ok(CodingRate::Li4_6),
            0x07 => Ok(CodingRate::Li4_8),
            _ => Err(Error::InvalidCodingRate(value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modulation {
    LoRa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CrcStatus {
    Undefined = 0x00,
    NoCrc = 0x01,
    CrcBad = 0x11,
    CrcOk = 0x10,
}

/// Part of the concentrator queried by [`crate::hal::Concentrator::status`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSelect {
    Tx,
    Rx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    TxStatusUnknown,
    /// TX modem disabled, it will ignore commands
    TxOff,
    /// TX modem is free, ready to receive a command
    TxFree,
    /// TX modem is loaded, ready to send the packet after an event and/or delay
    TxScheduled,
    TxEmitting,
    RxStatusUnknown,
    RxOff,
    RxOn,
    /// RX is suspended while a TX is ongoing
    RxSuspended,
}

fn default_sync_word() -> u8 {
    LORA_SYNC_WORD_PUBLIC
}

/// Configuration of one receive radio
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RxChannelConfig {
    #[serde(default)]
    pub enable: bool,
    pub freq_hz: u32,
    pub bandwidth: Bandwidth,
    pub datarate: SpreadingFactor,
    /// dB added to the RSSI reported by the radio
    #[serde(default)]
    pub rssi_offset: f32,
    #[serde(default = "default_sync_word")]
    pub sync_word: u8,
}

impl Default for RxChannelConfig {
    fn default() -> Self {
        Self {
            enable: false,
            freq_hz: 0,
            bandwidth: Bandwidth::Khz800,
            datarate: SpreadingFactor::Sf12,
            rssi_offset: 0.0,
            sync_word: LORA_SYNC_WORD_PUBLIC,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxChannelConfig {
    #[serde(default)]
    pub enable: bool,
}

/// Packet to send and its modulation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct TxPacket {
    /// center frequency of TX
    pub freq_hz: u32,
    pub tx_mode: TxMode,
    /// timestamp or delay in microseconds for TX trigger
    pub count_us: u32,
    /// dBm
    pub rf_power: i8,
    pub bandwidth: Bandwidth,
    pub datarate: SpreadingFactor,
    pub coderate: CodingRate,
    /// invert signal polarity, for orthogonal downlinks
    pub invert_pol: bool,
    pub preamble: u16,
    pub no_crc: bool,
    /// implicit header mode
    pub no_header: bool,
    pub sync_word: u8,
    pub payload: PayloadVec,
}

impl TxPacket {
    pub fn set_payload(&mut self, data: &[u8]) -> Result<(), Error> {
        self.payload =
            PayloadVec::from_slice(data).map_err(|_| Error::PayloadTooLong(data.len()))?;
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

impl Default for TxPacket {
    fn default() -> Self {
        Self {
            freq_hz: 0,
            tx_mode: TxMode::Immediate,
            count_us: 0,
            rf_power: TX_POWER_DEFAULT,
            bandwidth: Bandwidth::Khz800,
            datarate: SpreadingFactor::Sf12,
            coderate: CodingRate::Li4_8,
            invert_pol: false,
            preamble: STD_LORA_PREAMBLE,
            no_crc: false,
            no_header: false,
            sync_word: LORA_SYNC_WORD_PUBLIC,
            payload: PayloadVec::new(),
        }
    }
}

/// Packet fetched from the concentrator
///
/// `channel`, `count_us`, `foff_hz`, `snr`, `rssi` and `payload` come from the radio. The rest is
/// filled by [`crate::hal::Concentrator::receive`] from the RX channel the packet arrived on.
#[derive(Debug, Clone, PartialEq)]
pub struct RxPacket {
    pub freq_hz: u32,
    pub channel: u8,
    pub status: CrcStatus,
    /// internal concentrator counter, 1 microsecond resolution, wraps at 32 bits
    pub count_us: u32,
    pub foff_hz: i32,
    pub modulation: Modulation,
    pub bandwidth: Option<Bandwidth>,
    pub datarate: Option<SpreadingFactor>,
    pub coderate: Option<CodingRate>,
    /// dB
    pub rssi: f32,
    /// dB
    pub snr: f32,
    pub payload: PayloadVec,
}

impl RxPacket {
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

impl Default for RxPacket {
    fn default() -> Self {
        Self {
            freq_hz: 0,
            channel: 0,
            status: CrcStatus::Undefined,
            count_us: 0,
            foff_hz: 0,
            modulation: Modulation::LoRa,
            bandwidth: None,
            datarate: None,
            coderate: None,
            rssi: 0.0,
            snr: 0.0,
            payload: PayloadVec::new(),
        }
    }
}

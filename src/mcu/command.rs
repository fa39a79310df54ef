//! Command catalog of the concentrator MCU
//!
//! Requests are built with [`Request`] and encoded into a payload, acknowledgements and events
//! are decoded from an [`AckFrame`]. All multi-byte integers are big-endian.
use core::convert::TryFrom;
use core::fmt;

use super::codec::{AckFrame, RequestPayloadVec, WRITE_SIZE_MAX};
use crate::error::{Error, Result};
use crate::hal::types::{PayloadVec, RxPacket, TxPacket, RX_CHANNEL_NB_MAX};

pub const CONFIG_RX_SIZE: usize = 11;
pub const PREPARE_TX_HEADER_SIZE: usize = 21;
pub const RESET_SIZE: usize = 1;
pub const READ_REGS_SIZE: usize = 3;
pub const WRITE_REGS_SIZE: usize = 4;
pub const SET_COEF_TEMP_RSSI_SIZE: usize = 5;

pub const PING_ACK_SIZE: usize = 23;
pub const STATUS_ACK_HEADER_SIZE: usize = 15;
pub const STATUS_ACK_RADIO_SIZE: usize = 4;
pub const RX_MSG_ACK_SIZE: usize = 5;
pub const MSG_RECEIVED_HEADER_SIZE: usize = 12;

/// Length of the version field of the PING acknowledgement, NUL padded
pub const VERSION_FIELD_SIZE: usize = 9;

/// Single byte acknowledgement status meaning success
pub const STATUS_OK: u8 = 0x00;

/// Tags of the frames sent by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestId {
    Ping = 0x00,
    ConfigRx = 0x01,
    PrepareTx = 0x02,
    GetStatus = 0x03,
    Bootloader = 0x04,
    GetRxMsg = 0x05,
    GetTxStatus = 0x06,
    Reset = 0x07,
    SetCoefTempRssi = 0x08,
    ReadRegs = 0x09,
    WriteRegs = 0x0A,
}

impl RequestId {
    pub fn ack(self) -> AckId {
        match self {
            RequestId::Ping => AckId::Ping,
            RequestId::ConfigRx => AckId::ConfigRx,
            RequestId::PrepareTx => AckId::PrepareTx,
            RequestId::GetStatus => AckId::GetStatus,
            RequestId::Bootloader => AckId::Bootloader,
            RequestId::GetRxMsg => AckId::GetRxMsg,
            RequestId::GetTxStatus => AckId::TxStatus,
            RequestId::Reset => AckId::Reset,
            RequestId::SetCoefTempRssi => AckId::SetCoefTempRssi,
            RequestId::ReadRegs => AckId::ReadRegs,
            RequestId::WriteRegs => AckId::WriteRegs,
        }
    }
}

impl TryFrom<u8> for RequestId {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(RequestId::Ping),
            0x01 => Ok(RequestId::ConfigRx),
            0x02 => Ok(RequestId::PrepareTx),
            0x03 => Ok(RequestId::GetStatus),
            0x04 => Ok(RequestId::Bootloader),
            0x05 => Ok(RequestId::GetRxMsg),
            0x06 => Ok(RequestId::GetTxStatus),
            0x07 => Ok(RequestId::Reset),
            0x08 => Ok(RequestId::SetCoefTempRssi),
            0x09 => Ok(RequestId::ReadRegs),
            0x0A => Ok(RequestId::WriteRegs),
            _ => Err(Error::UnknownCode {
                what: "request",
                code: value,
            }),
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            RequestId::Ping => "ORDER_ID__REQ_PING",
            RequestId::ConfigRx => "ORDER_ID__REQ_CONFIG_RX",
            RequestId::PrepareTx => "ORDER_ID__REQ_PREPARE_TX",
            RequestId::GetStatus => "ORDER_ID__REQ_GET_STATUS",
            RequestId::Bootloader => "ORDER_ID__REQ_BOOTLOADER_MODE",
            RequestId::GetRxMsg => "ORDER_ID__REQ_GET_RX_MSG",
            RequestId::GetTxStatus => "ORDER_ID__REQ_GET_TX_STATUS",
            RequestId::Reset => "ORDER_ID__REQ_RESET",
            RequestId::SetCoefTempRssi => "ORDER_ID__REQ_SET_COEF_TEMP_RSSI",
            RequestId::ReadRegs => "ORDER_ID__REQ_READ_REGS",
            RequestId::WriteRegs => "ORDER_ID__REQ_WRITE_REGS",
        };
        f.write_str(name)
    }
}

/// Tags of the frames sent by the MCU, acknowledgements are the request tag with bit 6 set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AckId {
    Ping = 0x40,
    ConfigRx = 0x41,
    PrepareTx = 0x42,
    GetStatus = 0x43,
    Bootloader = 0x44,
    GetRxMsg = 0x45,
    TxStatus = 0x46,
    Reset = 0x47,
    SetCoefTempRssi = 0x48,
    ReadRegs = 0x49,
    WriteRegs = 0x4A,
    /// Unsolicited event, one per received packet after a GET_RX_MSG acknowledgement
    MsgReceived = 0x50,
}

impl AckId {
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for AckId {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x40 => Ok(AckId::Ping),
            0x41 => Ok(AckId::ConfigRx),
            0x42 => Ok(AckId::PrepareTx),
            0x43 => Ok(AckId::GetStatus),
            0x44 => Ok(AckId::Bootloader),
            0x45 => Ok(AckId::GetRxMsg),
            0x46 => Ok(AckId::TxStatus),
            0x47 => Ok(AckId::Reset),
            0x48 => Ok(AckId::SetCoefTempRssi),
            0x49 => Ok(AckId::ReadRegs),
            0x4A => Ok(AckId::WriteRegs),
            0x50 => Ok(AckId::MsgReceived),
            _ => Err(Error::UnknownCode {
                what: "acknowledgement",
                code: value,
            }),
        }
    }
}

impl fmt::Display for AckId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            AckId::Ping => "ORDER_ID__ACK_PING",
            AckId::ConfigRx => "ORDER_ID__ACK_CONFIG_RX",
            AckId::PrepareTx => "ORDER_ID__ACK_PREPARE_TX",
            AckId::GetStatus => "ORDER_ID__ACK_GET_STATUS",
            AckId::Bootloader => "ORDER_ID__ACK_BOOTLOADER_MODE",
            AckId::GetRxMsg => "ORDER_ID__ACK_GET_RX_MSG",
            AckId::TxStatus => "ORDER_ID__ACK_GET_TX_STATUS",
            AckId::Reset => "ORDER_ID__ACK_RESET",
            AckId::SetCoefTempRssi => "ORDER_ID__ACK_SET_COEF_TEMP_RSSI",
            AckId::ReadRegs => "ORDER_ID__ACK_READ_REGS",
            AckId::WriteRegs => "ORDER_ID__ACK_WRITE_REGS",
            AckId::MsgReceived => "ORDER_ID__EVT_MSG_RECEIVED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    /// one RX radio, 0 to 2
    Rx(u8),
    RxAll,
    Tx,
    Mcu,
}

impl ResetKind {
    pub fn code(&self) -> Result<u8> {
        match *self {
            ResetKind::Rx(radio) if (radio as usize) < RX_CHANNEL_NB_MAX => Ok(radio),
            ResetKind::Rx(radio) => Err(Error::InvalidChannel {
                index: radio,
                available: RX_CHANNEL_NB_MAX as u8,
            }),
            ResetKind::RxAll => Ok(0x03),
            ResetKind::Tx => Ok(0x04),
            ResetKind::Mcu => Ok(0x05),
        }
    }
}

impl TryFrom<u8> for ResetKind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00..=0x02 => Ok(ResetKind::Rx(value)),
            0x03 => Ok(ResetKind::RxAll),
            0x04 => Ok(ResetKind::Tx),
            0x05 => Ok(ResetKind::Mcu),
            _ => Err(Error::UnknownCode {
                what: "reset type",
                code: value,
            }),
        }
    }
}

/// State of the message loaded in the TX radio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Idle,
    Loaded,
    OnAir,
    Done,
    ErrParam,
    ErrFailToSend,
    ErrTimeout,
    /// newer firmware may report states this host does not know
    Unknown(u8),
}

impl TxStatus {
    pub fn code(self) -> u8 {
        match self {
            TxStatus::Idle => 0x00,
            TxStatus::Loaded => 0x01,
            TxStatus::OnAir => 0x02,
            TxStatus::Done => 0x03,
            TxStatus::ErrParam => 0x04,
            TxStatus::ErrFailToSend => 0x05,
            TxStatus::ErrTimeout => 0x06,
            TxStatus::Unknown(code) => code,
        }
    }

    pub fn is_error(self) -> bool {
        matches!(
            self,
            TxStatus::ErrParam | TxStatus::ErrFailToSend | TxStatus::ErrTimeout
        )
    }

    /// Nothing more will happen until the next PREPARE_TX
    pub fn is_terminal(self) -> bool {
        matches!(self, TxStatus::Idle | TxStatus::Done) || self.is_error()
    }
}

impl From<u8> for TxStatus {
    fn from(value: u8) -> Self {
        match value {
            0x00 => TxStatus::Idle,
            0x01 => TxStatus::Loaded,
            0x02 => TxStatus::OnAir,
            0x03 => TxStatus::Done,
            0x04 => TxStatus::ErrParam,
            0x05 => TxStatus::ErrFailToSend,
            0x06 => TxStatus::ErrTimeout,
            other => TxStatus::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigRxStatus {
    Done,
    BadParameter,
    RadioUnavailable,
    Unknown(u8),
}

impl From<u8> for ConfigRxStatus {
    fn from(value: u8) -> Self {
        match value {
            0x00 => ConfigRxStatus::Done,
            0x01 => ConfigRxStatus::BadParameter,
            0x02 => ConfigRxStatus::RadioUnavailable,
            other => ConfigRxStatus::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareTxStatus {
    Ok,
    BadParameter,
    /// a packet is already loaded or being sent
    Collision,
    RadioUnavailable,
    Unknown(u8),
}

impl From<u8> for PrepareTxStatus {
    fn from(value: u8) -> Self {
        match value {
            0x00 => PrepareTxStatus::Ok,
            0x01 => PrepareTxStatus::BadParameter,
            0x02 => PrepareTxStatus::Collision,
            0x03 => PrepareTxStatus::RadioUnavailable,
            other => PrepareTxStatus::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PpsStatus {
    NotCaptured,
    Captured,
    Unknown(u8),
}

impl From<u8> for PpsStatus {
    fn from(value: u8) -> Self {
        match value {
            0x00 => PpsStatus::NotCaptured,
            0x01 => PpsStatus::Captured,
            other => PpsStatus::Unknown(other),
        }
    }
}

/// CONFIG_RX parameters, bandwidth and spreading factor are wire codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigRx {
    pub radio: u8,
    pub freq_hz: u32,
    pub datarate: u8,
    pub bandwidth: u8,
    pub preamble: u16,
    pub iq_inverted: bool,
    pub sync_word: u8,
}

/// PREPARE_TX parameters, every field holds its wire value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareTx {
    pub tx_mode: u8,
    pub count_us: u32,
    pub freq_hz: u32,
    pub rf_power: i8,
    pub datarate: u8,
    pub bandwidth: u8,
    pub invert_pol: bool,
    pub coderate: u8,
    pub no_header: bool,
    pub use_crc: bool,
    pub ramp: u8,
    pub preamble: u16,
    pub sync_word: u8,
    pub payload: PayloadVec,
}

/// 20 us PA ramp
pub const RADIO_RAMP_20_US: u8 = 0xE0;

impl From<&TxPacket> for PrepareTx {
    fn from(pkt: &TxPacket) -> Self {
        Self {
            tx_mode: pkt.tx_mode as u8,
            count_us: pkt.count_us,
            freq_hz: pkt.freq_hz,
            rf_power: pkt.rf_power,
            datarate: pkt.datarate as u8,
            bandwidth: pkt.bandwidth as u8,
            invert_pol: pkt.invert_pol,
            coderate: pkt.coderate.wire_code(),
            no_header: pkt.no_header,
            use_crc: !pkt.no_crc,
            ramp: RADIO_RAMP_20_US,
            preamble: pkt.preamble,
            sync_word: pkt.sync_word,
            payload: pkt.payload.clone(),
        }
    }
}

/// Possible requests sent to the MCU
#[derive(PartialEq)]
pub enum Request {
    Ping,
    ConfigRx(ConfigRx),
    PrepareTx(PrepareTx),
    GetStatus,
    /// Reboots the MCU in its bootloader, no acknowledgement payload
    Bootloader,
    GetRxMsg,
    GetTxStatus,
    Reset(ResetKind),
    SetCoefTempRssi { radio: u8, coefficient: f32 },
    ReadRegister { radio: u8, addr: u16 },
    WriteRegister { radio: u8, addr: u16, value: u8 },
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Request::Ping => write!(f, "Ping"),
            Request::ConfigRx(conf) => write!(f, "ConfigRx({:?})", conf),
            Request::PrepareTx(tx) => write!(
                f,
                "PrepareTx {{ mode: {}, count_us: {}, freq_hz: {}, power: {}, sf: {}, bw: 0x{:02x}, cr: {}, payload: {:02x?} }}",
                tx.tx_mode, tx.count_us, tx.freq_hz, tx.rf_power, tx.datarate, tx.bandwidth, tx.coderate, tx.payload
            ),
            Request::GetStatus => write!(f, "GetStatus"),
            Request::Bootloader => write!(f, "Bootloader"),
            Request::GetRxMsg => write!(f, "GetRxMsg"),
            Request::GetTxStatus => write!(f, "GetTxStatus"),
            Request::Reset(kind) => write!(f, "Reset({:?})", kind),
            Request::SetCoefTempRssi { radio, coefficient } => write!(
                f,
                "SetCoefTempRssi {{ radio: {}, coefficient: {} }}",
                radio, coefficient
            ),
            Request::ReadRegister { radio, addr } => {
                write!(f, "ReadRegister {{ radio: {}, addr: 0x{:04x} }}", radio, addr)
            }
            Request::WriteRegister { radio, addr, value } => write!(
                f,
                "WriteRegister {{ radio: {}, addr: 0x{:04x}, value: 0x{:02x} }}",
                radio, addr, value
            ),
        }
    }
}

fn push_all(buf: &mut RequestPayloadVec, data: &[u8]) -> Result<()> {
    buf.extend_from_slice(data).map_err(|_| Error::RequestTooLarge {
        len: buf.len() + data.len(),
        capacity: WRITE_SIZE_MAX,
    })
}

fn check_len(request: RequestId, payload: &[u8], needed: usize) -> Result<()> {
    if payload.len() < needed {
        return Err(Error::MalformedRequest {
            request,
            len: payload.len(),
            needed,
        });
    }
    Ok(())
}

fn be_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([buf[at], buf[at + 1]])
}

fn be_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

impl Request {
    pub fn id(&self) -> RequestId {
        match self {
            Request::Ping => RequestId::Ping,
            Request::ConfigRx(_) => RequestId::ConfigRx,
            Request::PrepareTx(_) => RequestId::PrepareTx,
            Request::GetStatus => RequestId::GetStatus,
            Request::Bootloader => RequestId::Bootloader,
            Request::GetRxMsg => RequestId::GetRxMsg,
            Request::GetTxStatus => RequestId::GetTxStatus,
            Request::Reset(_) => RequestId::Reset,
            Request::SetCoefTempRssi { .. } => RequestId::SetCoefTempRssi,
            Request::ReadRegister { .. } => RequestId::ReadRegs,
            Request::WriteRegister { .. } => RequestId::WriteRegs,
        }
    }

    pub fn expected_ack(&self) -> AckId {
        self.id().ack()
    }

    /// Writes the payload of the request into `buf`, previous content is discarded
    pub fn encode_into(&self, buf: &mut RequestPayloadVec) -> Result<()> {
        buf.clear();
        match self {
            Request::Ping
            | Request::GetStatus
            | Request::Bootloader
            | Request::GetRxMsg
            | Request::GetTxStatus => Ok(()),
            Request::ConfigRx(conf) => {
                push_all(buf, &[conf.radio])?;
                push_all(buf, &conf.freq_hz.to_be_bytes())?;
                push_all(buf, &[conf.datarate, conf.bandwidth])?;
                push_all(buf, &conf.preamble.to_be_bytes())?;
                push_all(buf, &[conf.iq_inverted as u8, conf.sync_word])
            }
            Request::PrepareTx(tx) => {
                push_all(buf, &[tx.tx_mode])?;
                push_all(buf, &tx.count_us.to_be_bytes())?;
                push_all(buf, &tx.freq_hz.to_be_bytes())?;
                push_all(
                    buf,
                    &[
                        tx.rf_power as u8,
                        tx.datarate,
                        tx.bandwidth,
                        tx.invert_pol as u8,
                        tx.coderate,
                        tx.no_header as u8,
                        tx.use_crc as u8,
                        tx.ramp,
                    ],
                )?;
                push_all(buf, &tx.preamble.to_be_bytes())?;
                push_all(buf, &[tx.sync_word, tx.payload.len() as u8])?;
                push_all(buf, &tx.payload)
            }
            Request::Reset(kind) => push_all(buf, &[kind.code()?]),
            Request::SetCoefTempRssi { radio, coefficient } => {
                push_all(buf, &[*radio])?;
                push_all(buf, &coefficient.to_bits().to_be_bytes())
            }
            Request::ReadRegister { radio, addr } => {
                push_all(buf, &[*radio])?;
                push_all(buf, &addr.to_be_bytes())
            }
            Request::WriteRegister { radio, addr, value } => {
                push_all(buf, &[*radio])?;
                push_all(buf, &addr.to_be_bytes())?;
                push_all(buf, &[*value])
            }
        }
    }

    /// Parses a request payload, this is what the MCU does with the frames the host sends
    pub fn decode(id: RequestId, payload: &[u8]) -> Result<Request> {
        match id {
            RequestId::Ping => Ok(Request::Ping),
            RequestId::GetStatus => Ok(Request::GetStatus),
            RequestId::Bootloader => Ok(Request::Bootloader),
            RequestId::GetRxMsg => Ok(Request::GetRxMsg),
            RequestId::GetTxStatus => Ok(Request::GetTxStatus),
            RequestId::ConfigRx => {
                check_len(id, payload, CONFIG_RX_SIZE)?;
                Ok(Request::ConfigRx(ConfigRx {
                    radio: payload[0],
                    freq_hz: be_u32(payload, 1),
                    datarate: payload[5],
                    bandwidth: payload[6],
                    preamble: be_u16(payload, 7),
                    iq_inverted: payload[9] != 0,
                    sync_word: payload[10],
                }))
            }
            RequestId::PrepareTx => {
                check_len(id, payload, PREPARE_TX_HEADER_SIZE)?;
                let size = payload[20] as usize;
                check_len(id, payload, PREPARE_TX_HEADER_SIZE + size)?;
                let mut data = PayloadVec::new();
                data.extend_from_slice(
                    &payload[PREPARE_TX_HEADER_SIZE..PREPARE_TX_HEADER_SIZE + size],
                )
                .map_err(|_| Error::PayloadTooLong(size))?;
                Ok(Request::PrepareTx(PrepareTx {
                    tx_mode: payload[0],
                    count_us: be_u32(payload, 1),
                    freq_hz: be_u32(payload, 5),
                    rf_power: payload[9] as i8,
                    datarate: payload[10],
                    bandwidth: payload[11],
                    invert_pol: payload[12] != 0,
                    coderate: payload[13],
                    no_header: payload[14] != 0,
                    use_crc: payload[15] != 0,
                    ramp: payload[16],
                    preamble: be_u16(payload, 17),
                    sync_word: payload[19],
                    payload: data,
                }))
            }
            RequestId::Reset => {
                check_len(id, payload, RESET_SIZE)?;
                Ok(Request::Reset(ResetKind::try_from(payload[0])?))
            }
            RequestId::SetCoefTempRssi => {
                check_len(id, payload, SET_COEF_TEMP_RSSI_SIZE)?;
                Ok(Request::SetCoefTempRssi {
                    radio: payload[0],
                    coefficient: f32::from_bits(be_u32(payload, 1)),
                })
            }
            RequestId::ReadRegs => {
                check_len(id, payload, READ_REGS_SIZE)?;
                Ok(Request::ReadRegister {
                    radio: payload[0],
                    addr: be_u16(payload, 1),
                })
            }
            RequestId::WriteRegs => {
                check_len(id, payload, WRITE_REGS_SIZE)?;
                Ok(Request::WriteRegister {
                    radio: payload[0],
                    addr: be_u16(payload, 1),
                    value: payload[3],
                })
            }
        }
    }
}

/// PING acknowledgement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub unique_id: [u32; 3],
    /// raw version field with its padding removed, the first character is a marker
    pub version: String,
    pub nb_radio_tx: u8,
    pub nb_radio_rx: u8,
}

impl DeviceInfo {
    pub fn decode(frame: &AckFrame) -> Result<Self> {
        let payload = frame.expect(AckId::Ping, PING_ACK_SIZE)?;
        let field = &payload[12..12 + VERSION_FIELD_SIZE];
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        Ok(Self {
            unique_id: [be_u32(payload, 0), be_u32(payload, 4), be_u32(payload, 8)],
            version: String::from_utf8_lossy(&field[..end]).into_owned(),
            nb_radio_tx: payload[21],
            nb_radio_rx: payload[22],
        })
    }

    /// Version string compared against the one the host expects
    pub fn firmware_version(&self) -> &str {
        self.version.get(1..).unwrap_or("")
    }

    /// 64 bits EUI built from the three words of the unique id
    pub fn eui(&self) -> u64 {
        let [id_high, id_mid, id_low] = self.unique_id;
        (u64::from(id_high.wrapping_add(id_low)) << 32) | u64::from(id_mid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxCrcCounters {
    pub crc_ok: u16,
    pub crc_err: u16,
}

/// GET_STATUS acknowledgement
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStatus {
    /// ms
    pub system_time_ms: u32,
    /// us
    pub precise_time_us: u32,
    pub pps_status: PpsStatus,
    /// counter value at the last PPS edge, us
    pub pps_time_us: u32,
    /// degrees Celsius
    pub temperature: f32,
    pub rx_crc: heapless::Vec<RxCrcCounters, RX_CHANNEL_NB_MAX>,
}

impl DeviceStatus {
    /// Counters are only present for the `nb_radio_rx` radios reported by PING
    pub fn decode(frame: &AckFrame, nb_radio_rx: u8) -> Result<Self> {
        let nb_radio = (nb_radio_rx as usize).min(RX_CHANNEL_NB_MAX);
        let payload = frame.expect(
            AckId::GetStatus,
            STATUS_ACK_HEADER_SIZE + STATUS_ACK_RADIO_SIZE * nb_radio,
        )?;
        let mut rx_crc = heapless::Vec::new();
        for i in 0..nb_radio {
            let at = STATUS_ACK_HEADER_SIZE + STATUS_ACK_RADIO_SIZE * i;
            rx_crc
                .push(RxCrcCounters {
                    crc_ok: be_u16(payload, at),
                    crc_err: be_u16(payload, at + 2),
                })
                .map_err(|_| Error::InvalidChannel {
                    index: i as u8,
                    available: RX_CHANNEL_NB_MAX as u8,
                })?;
        }
        Ok(Self {
            system_time_ms: be_u32(payload, 0),
            precise_time_us: be_u32(payload, 4),
            pps_status: PpsStatus::from(payload[8]),
            pps_time_us: be_u32(payload, 9),
            temperature: i16::from_be_bytes([payload[13], payload[14]]) as f32 / 100.0,
            rx_crc,
        })
    }
}

/// GET_RX_MSG acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxMsgSummary {
    /// number of MSG_RECEIVED events following this acknowledgement
    pub nb_msg: u8,
    pub nb_bytes: u16,
    /// more messages wait in the MCU
    pub pending: bool,
    /// messages dropped by the MCU since the last fetch
    pub lost: u8,
}

impl RxMsgSummary {
    pub fn decode(frame: &AckFrame) -> Result<Self> {
        let payload = frame.expect(AckId::GetRxMsg, RX_MSG_ACK_SIZE)?;
        Ok(Self {
            nb_msg: payload[0],
            nb_bytes: be_u16(payload, 1),
            pending: payload[3] != 0,
            lost: payload[4],
        })
    }
}

/// Decodes a MSG_RECEIVED event, modulation metadata is left to the caller
pub fn decode_rx_event(frame: &AckFrame) -> Result<RxPacket> {
    let payload = frame.expect(AckId::MsgReceived, MSG_RECEIVED_HEADER_SIZE)?;
    let size = payload[11] as usize;
    let payload = frame.expect(AckId::MsgReceived, MSG_RECEIVED_HEADER_SIZE + size)?;
    let mut data = PayloadVec::new();
    data.extend_from_slice(&payload[MSG_RECEIVED_HEADER_SIZE..MSG_RECEIVED_HEADER_SIZE + size])
        .map_err(|_| Error::PayloadTooLong(size))?;
    Ok(RxPacket {
        channel: payload[0],
        count_us: be_u32(payload, 1),
        foff_hz: be_u32(payload, 5) as i32,
        snr: payload[9] as i8 as f32,
        rssi: payload[10] as i8 as f32,
        payload: data,
        ..Default::default()
    })
}

/// Status byte of the single byte acknowledgements
pub fn decode_status(frame: &AckFrame, ack: AckId) -> Result<u8> {
    let payload = frame.expect(ack, 1)?;
    Ok(payload[0])
}

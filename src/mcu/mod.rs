//! Request/acknowledgement exchanges with the concentrator MCU
//!
//! [`Mcu`] owns the link and the scratch buffers. Every exchange is strictly sequential: one
//! request is written, then exactly one acknowledgement is read, followed by the MSG_RECEIVED
//! events announced by GET_RX_MSG.
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Rejection, Result};
use crate::hal::types::{RxChannelConfig, RxPacket, TxPacket, STD_LORA_PREAMBLE};
use crate::transport::{LinkSettings, Transport, DEFAULT_ACK_TIMEOUT};

pub mod codec;
pub mod command;

use codec::{read_ack, write_request, AckFrame, RequestPayloadVec, READ_SIZE_MAX};
use command::{
    decode_rx_event, decode_status, AckId, ConfigRx, ConfigRxStatus, DeviceInfo, DeviceStatus,
    PrepareTx, PrepareTxStatus, Request, ResetKind, RxMsgSummary, TxStatus, STATUS_OK,
};

/// Time left to the MCU to reboot its radios after a full reset
pub const RESET_SETTLE_DELAY: Duration = Duration::from_millis(500);

pub struct Mcu<T> {
    link: T,
    rng: SmallRng,
    buf_req: RequestPayloadVec,
    buf_ack: [u8; READ_SIZE_MAX],
    nb_radio_rx: u8,
    nb_radio_tx: u8,
    verify_correlation_id: bool,
    ack_timeout: Duration,
}

impl<T: Transport> Mcu<T> {
    pub fn open(path: &str, settings: &LinkSettings) -> Result<Self> {
        Ok(Self::new(T::open(path, settings)?).with_ack_timeout(settings.ack_timeout))
    }

    pub fn new(link: T) -> Self {
        Self {
            link,
            rng: SmallRng::seed_from_u64(0),
            buf_req: RequestPayloadVec::new(),
            buf_ack: [0; READ_SIZE_MAX],
            nb_radio_rx: 0,
            nb_radio_tx: 0,
            verify_correlation_id: false,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }

    pub fn with_ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.ack_timeout = ack_timeout;
        self
    }

    /// Rejects acknowledgements whose id differs from the one of the request
    pub fn with_correlation_check(mut self, enabled: bool) -> Self {
        self.verify_correlation_id = enabled;
        self
    }

    /// Radio counts reported by the last PING, 0 before
    pub fn nb_radio_rx(&self) -> u8 {
        self.nb_radio_rx
    }

    pub fn nb_radio_tx(&self) -> u8 {
        self.nb_radio_tx
    }

    fn next_correlation_id(&mut self) -> u8 {
        self.rng.gen_range(0, 255)
    }

    /// Sends `request` and reads its acknowledgement into the ack buffer
    fn exchange(&mut self, request: &Request) -> Result<AckFrame<'_>> {
        let id = self.next_correlation_id();
        request.encode_into(&mut self.buf_req)?;
        write_request(&mut self.link, id, request.id(), &self.buf_req)?;

        let len = read_ack(&mut self.link, &mut self.buf_ack, self.ack_timeout)?;
        let frame = AckFrame::parse(&self.buf_ack[..len])?;
        debug!(
            "<-- 0x{:02X} (id: 0x{:02X}, size: {})",
            frame.header.tag,
            frame.header.id,
            frame.payload.len()
        );
        if self.verify_correlation_id && frame.header.id != id {
            return Err(Error::CorrelationMismatch {
                expected: id,
                actual: frame.header.id,
            });
        }
        Ok(frame)
    }

    pub fn ping(&mut self) -> Result<DeviceInfo> {
        let frame = self.exchange(&Request::Ping)?;
        let info = DeviceInfo::decode(&frame)?;
        self.nb_radio_rx = info.nb_radio_rx;
        self.nb_radio_tx = info.nb_radio_tx;
        debug!(
            "MCU unique id: {:08X}{:08X}{:08X}, version: {}, {} TX / {} RX radios",
            info.unique_id[0],
            info.unique_id[1],
            info.unique_id[2],
            info.version,
            info.nb_radio_tx,
            info.nb_radio_rx
        );
        Ok(info)
    }

    pub fn get_status(&mut self) -> Result<DeviceStatus> {
        let nb_radio_rx = self.nb_radio_rx;
        let frame = self.exchange(&Request::GetStatus)?;
        let status = DeviceStatus::decode(&frame, nb_radio_rx)?;
        debug!(
            "MCU status: sys_time: {} ms, precise_time: {} us, pps: {:?} ({} us), temperature: {:.2} C",
            status.system_time_ms,
            status.precise_time_us,
            status.pps_status,
            status.pps_time_us,
            status.temperature
        );
        Ok(status)
    }

    pub fn get_tx_status(&mut self) -> Result<TxStatus> {
        let frame = self.exchange(&Request::GetTxStatus)?;
        let code = decode_status(&frame, AckId::TxStatus)?;
        Ok(TxStatus::from(code))
    }

    pub fn config_rx(&mut self, radio: u8, conf: &RxChannelConfig) -> Result<()> {
        if radio >= self.nb_radio_rx {
            return Err(Error::InvalidChannel {
                index: radio,
                available: self.nb_radio_rx,
            });
        }
        let request = Request::ConfigRx(ConfigRx {
            radio,
            freq_hz: conf.freq_hz,
            datarate: conf.datarate as u8,
            bandwidth: conf.bandwidth as u8,
            preamble: STD_LORA_PREAMBLE,
            iq_inverted: false,
            sync_word: conf.sync_word,
        });
        let frame = self.exchange(&request)?;
        let code = decode_status(&frame, AckId::ConfigRx)?;
        match ConfigRxStatus::from(code) {
            ConfigRxStatus::Done => Ok(()),
            status => {
                warn!("CONFIG_RX of radio {} failed: {:?}", radio, status);
                Err(Error::Rejected(Rejection::ConfigRx { radio, code }))
            }
        }
    }

    pub fn prepare_tx(&mut self, pkt: &TxPacket) -> Result<()> {
        if self.nb_radio_rx < 1 {
            return Err(Error::NoRxRadio);
        }
        let frame = self.exchange(&Request::PrepareTx(PrepareTx::from(pkt)))?;
        let code = decode_status(&frame, AckId::PrepareTx)?;
        match PrepareTxStatus::from(code) {
            PrepareTxStatus::Ok => Ok(()),
            status => {
                warn!("PREPARE_TX failed: {:?}", status);
                Err(Error::Rejected(Rejection::PrepareTx { code }))
            }
        }
    }

    /// Polls the TX status until the radio is idle again or `max_wait` elapsed
    pub fn wait_tx_done(
        &mut self,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> Result<TxStatus> {
        let start = Instant::now();
        loop {
            let status = self.get_tx_status()?;
            if status.is_error() {
                warn!("transmission failed: {:?}", status);
                return Err(Error::TxFailed(status));
            }
            if status.is_terminal() {
                return Ok(status);
            }
            if start.elapsed() >= max_wait {
                return Err(Error::TxPollTimeout(max_wait));
            }
            thread::sleep(poll_interval);
        }
    }

    /// Fetches the packets received by the MCU
    ///
    /// Every announced event is read off the link to keep the stream aligned, only the first
    /// `max_pkt` are decoded.
    pub fn receive(&mut self, max_pkt: usize) -> Result<Vec<RxPacket>> {
        let frame = self.exchange(&Request::GetRxMsg)?;
        let summary = RxMsgSummary::decode(&frame)?;
        if summary.lost > 0 {
            warn!("{} messages lost by the MCU", summary.lost);
        }
        if summary.nb_msg == 0 {
            return Ok(Vec::new());
        }
        debug!(
            "{} messages received ({} bytes)",
            summary.nb_msg, summary.nb_bytes
        );

        let mut pkts = Vec::with_capacity((summary.nb_msg as usize).min(max_pkt));
        for i in 0..summary.nb_msg as usize {
            let len = read_ack(&mut self.link, &mut self.buf_ack, self.ack_timeout)?;
            if i >= max_pkt {
                warn!("no room left for message {}, dropping it", i);
                continue;
            }
            let frame = AckFrame::parse(&self.buf_ack[..len])?;
            pkts.push(decode_rx_event(&frame)?);
        }
        if summary.pending {
            info!("more messages pending in the MCU");
        }
        Ok(pkts)
    }

    pub fn reset(&mut self, kind: ResetKind) -> Result<()> {
        let frame = self.exchange(&Request::Reset(kind))?;
        let code = decode_status(&frame, AckId::Reset)?;
        if code != STATUS_OK {
            warn!("reset {:?} failed with 0x{:02X}", kind, code);
            return Err(Error::Rejected(Rejection::Reset { kind, code }));
        }
        Ok(())
    }

    /// Resets all RX radios, then the TX radio, then optionally the MCU itself
    pub fn reset_all(&mut self, include_mcu: bool) -> Result<()> {
        self.reset(ResetKind::RxAll)?;
        self.reset(ResetKind::Tx)?;
        if include_mcu {
            self.reset(ResetKind::Mcu)?;
        }
        thread::sleep(RESET_SETTLE_DELAY);
        Ok(())
    }

    /// The MCU reboots into its bootloader, the link is unusable afterwards
    pub fn enter_bootloader(&mut self) -> Result<()> {
        let frame = self.exchange(&Request::Bootloader)?;
        frame.expect(AckId::Bootloader, 0)?;
        info!("MCU switched to bootloader mode");
        Ok(())
    }

    pub fn read_register(&mut self, radio: u8, addr: u16) -> Result<u8> {
        let frame = self.exchange(&Request::ReadRegister { radio, addr })?;
        decode_status(&frame, AckId::ReadRegs)
    }

    pub fn write_register(&mut self, radio: u8, addr: u16, value: u8) -> Result<()> {
        let frame = self.exchange(&Request::WriteRegister { radio, addr, value })?;
        frame.expect(AckId::WriteRegs, 0)?;
        Ok(())
    }

    pub fn set_rssi_temperature_coefficient(&mut self, radio: u8, coefficient: f32) -> Result<()> {
        let frame = self.exchange(&Request::SetCoefTempRssi { radio, coefficient })?;
        let code = decode_status(&frame, AckId::SetCoefTempRssi)?;
        if code != STATUS_OK {
            return Err(Error::Rejected(Rejection::SetCoefTempRssi { radio, code }));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::types::{Bandwidth, SpreadingFactor};
    use crate::mock::{self, MockTransport};
    use log::Level;
    use std::io::ErrorKind;

    fn pinged(mock: &MockTransport, nb_radio_rx: u8) -> Mcu<MockTransport> {
        mock.push(&mock::ping_ack(0, [1, 2, 3], "V01.00.01", 1, nb_radio_rx));
        let mut mcu = Mcu::new(mock.clone());
        mcu.ping().unwrap();
        mcu
    }

    #[test]
    fn test_ping_stores_radio_counts() {
        let mock = MockTransport::new();
        let mcu = pinged(&mock, 3);
        assert_eq!(mcu.nb_radio_rx(), 3);
        assert_eq!(mcu.nb_radio_tx(), 1);
        assert_eq!(mock.requests(), vec![Request::Ping]);
    }

    #[test]
    fn test_receive_bounded_then_stream_aligned() {
        let mock = MockTransport::new();
        let mut mcu = pinged(&mock, 3);
        mock.push(&mock::rx_msg_ack(0, 3, 9, false, 1));
        mock.push(&mock::rx_event(0, 10, 0, 5, -60, b"one"));
        mock.push(&mock::rx_event(1, 20, 0, 5, -61, b"two"));
        mock.push(&mock::rx_event(2, 30, 0, 5, -62, b"six"));
        mock.push(&mock::status_ack(0, 1, 2, false, 0, 2500, &[(1, 0); 3]));

        let pkts = mcu.receive(1).unwrap();
        assert_eq!(pkts.len(), 1);
        assert_eq!(&pkts[0].payload[..], b"one");

        // the dropped events were consumed, the next exchange reads its own acknowledgement
        let status = mcu.get_status().unwrap();
        assert_eq!(status.system_time_ms, 1);
        assert_eq!(mock.pending(), 0);
    }

    #[test]
    fn test_receive_all_with_loss() {
        let mock = MockTransport::new().with_chunk_size(5);
        let mut mcu = pinged(&mock, 3);
        mock.push(&mock::rx_msg_ack(0, 3, 12, false, 1));
        mock.push(&mock::rx_event(0, 10, 0, 5, -60, b"zero"));
        mock.push(&mock::rx_event(1, 20, 0, 5, -61, b"one!"));
        mock.push(&mock::rx_event(2, 30, 0, 5, -62, b"two!"));
        mock.push(&mock::status_byte_ack(0, AckId::TxStatus, 0));

        mock::capture_logs();
        let pkts = mcu.receive(8).unwrap();
        let channels: Vec<u8> = pkts.iter().map(|p| p.channel).collect();
        assert_eq!(channels, vec![0, 1, 2]);
        assert_eq!(
            mock::captured_logs(Level::Warn),
            vec!["1 messages lost by the MCU".to_string()]
        );
        assert_eq!(mcu.get_tx_status().unwrap(), TxStatus::Idle);
        assert_eq!(mock.pending(), 0);
    }

    #[test]
    fn test_receive_nothing() {
        let mock = MockTransport::new();
        let mut mcu = pinged(&mock, 2);
        mock.push(&mock::rx_msg_ack(0, 0, 0, false, 0));
        assert!(mcu.receive(8).unwrap().is_empty());
    }

    #[test]
    fn test_config_rx_checks_radio_index() {
        let mock = MockTransport::new();
        let mut mcu = pinged(&mock, 2);
        let conf = RxChannelConfig {
            enable: true,
            freq_hz: 2_403_000_000,
            bandwidth: Bandwidth::Khz800,
            datarate: SpreadingFactor::Sf12,
            ..Default::default()
        };
        assert!(matches!(
            mcu.config_rx(2, &conf),
            Err(Error::InvalidChannel {
                index: 2,
                available: 2
            })
        ));

        mock.push(&mock::status_byte_ack(0, AckId::ConfigRx, 0x01));
        assert!(matches!(
            mcu.config_rx(1, &conf),
            Err(Error::Rejected(Rejection::ConfigRx { radio: 1, code: 1 }))
        ));
        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        match &requests[1] {
            Request::ConfigRx(c) => {
                assert_eq!(c.radio, 1);
                assert_eq!(c.freq_hz, 2_403_000_000);
                assert_eq!(c.preamble, STD_LORA_PREAMBLE);
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_prepare_tx_needs_rx_radio() {
        let mock = MockTransport::new();
        let mut mcu = Mcu::new(mock.clone());
        assert!(matches!(
            mcu.prepare_tx(&TxPacket::default()),
            Err(Error::NoRxRadio)
        ));
        assert!(mock.written().is_empty());
    }

    #[test]
    fn test_prepare_tx_collision() {
        let mock = MockTransport::new();
        let mut mcu = pinged(&mock, 1);
        mock.push(&mock::status_byte_ack(0, AckId::PrepareTx, 0x02));
        let err = mcu.prepare_tx(&TxPacket::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Rejected(Rejection::PrepareTx { code: 2 })
        ));
        assert!(!err.desynchronizes_link());
    }

    #[test]
    fn test_wait_tx_done() {
        let mock = MockTransport::new();
        let mut mcu = pinged(&mock, 1);
        mock.push(&mock::status_byte_ack(0, AckId::TxStatus, TxStatus::Loaded.code()));
        mock.push(&mock::status_byte_ack(0, AckId::TxStatus, TxStatus::OnAir.code()));
        mock.push(&mock::status_byte_ack(0, AckId::TxStatus, TxStatus::Done.code()));
        let status = mcu
            .wait_tx_done(Duration::from_millis(1), Duration::from_secs(5))
            .unwrap();
        assert_eq!(status, TxStatus::Done);

        mock.push(&mock::status_byte_ack(0, AckId::TxStatus, TxStatus::ErrTimeout.code()));
        assert!(matches!(
            mcu.wait_tx_done(Duration::from_millis(1), Duration::from_secs(5)),
            Err(Error::TxFailed(TxStatus::ErrTimeout))
        ));

        mock.push(&mock::status_byte_ack(0, AckId::TxStatus, TxStatus::OnAir.code()));
        assert!(matches!(
            mcu.wait_tx_done(Duration::from_millis(1), Duration::from_millis(0)),
            Err(Error::TxPollTimeout(_))
        ));
    }

    #[test]
    fn test_wait_tx_done_polls_through_unknown_status() {
        let mock = MockTransport::new();
        let mut mcu = pinged(&mock, 1);
        mock.push(&mock::status_byte_ack(0, AckId::TxStatus, 0x07));
        mock.push(&mock::status_byte_ack(0, AckId::TxStatus, TxStatus::Done.code()));
        let status = mcu
            .wait_tx_done(Duration::from_millis(1), Duration::from_secs(5))
            .unwrap();
        assert_eq!(status, TxStatus::Done);
        assert_eq!(mock.requests().len(), 3);
    }

    #[test]
    fn test_reset_all_order() {
        let mock = MockTransport::new();
        let mut mcu = Mcu::new(mock.clone());
        mock.push(&mock::status_byte_ack(0, AckId::Reset, 0));
        mock.push(&mock::status_byte_ack(0, AckId::Reset, 0));
        mock.push(&mock::status_byte_ack(0, AckId::Reset, 0));
        mcu.reset_all(true).unwrap();
        assert_eq!(
            mock.requests(),
            vec![
                Request::Reset(ResetKind::RxAll),
                Request::Reset(ResetKind::Tx),
                Request::Reset(ResetKind::Mcu)
            ]
        );
    }

    #[test]
    fn test_slow_answer_is_awaited() {
        let mock = MockTransport::new();
        let mut mcu = Mcu::new(mock.clone()).with_ack_timeout(Duration::from_secs(1));
        for _ in 0..5 {
            mock.fail_next_read(ErrorKind::TimedOut);
        }
        mock.push(&mock::status_byte_ack(0, AckId::Reset, 0));
        mcu.reset(ResetKind::Mcu).unwrap();
        assert_eq!(mock.pending(), 0);
    }

    #[test]
    fn test_reset_rejected() {
        let mock = MockTransport::new();
        let mut mcu = Mcu::new(mock.clone());
        mock.push(&mock::status_byte_ack(0, AckId::Reset, 1));
        assert!(matches!(
            mcu.reset(ResetKind::Tx),
            Err(Error::Rejected(Rejection::Reset {
                kind: ResetKind::Tx,
                code: 1
            }))
        ));
    }

    #[test]
    fn test_unexpected_ack_tag() {
        let mock = MockTransport::new();
        let mut mcu = Mcu::new(mock.clone());
        mock.push(&mock::status_byte_ack(0, AckId::Reset, 0));
        let err = mcu.get_tx_status().unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedAck {
                expected: AckId::TxStatus,
                actual: 0x47
            }
        ));
        assert!(err.desynchronizes_link());
    }

    #[test]
    fn test_correlation_check() {
        let expected = Mcu::new(MockTransport::new()).next_correlation_id();

        let mock = MockTransport::new();
        let mut mcu = Mcu::new(mock.clone()).with_correlation_check(true);
        mock.push(&mock::status_byte_ack(expected, AckId::TxStatus, 0));
        assert_eq!(mcu.get_tx_status().unwrap(), TxStatus::Idle);
        assert_eq!(mock.frames()[0].0.id, expected);

        let mock = MockTransport::new();
        let mut mcu = Mcu::new(mock.clone()).with_correlation_check(true);
        mock.push(&mock::status_byte_ack(
            expected.wrapping_add(1),
            AckId::TxStatus,
            0,
        ));
        assert!(matches!(
            mcu.get_tx_status(),
            Err(Error::CorrelationMismatch { .. })
        ));
    }

    #[test]
    fn test_correlation_ids_are_deterministic() {
        let mut a = Mcu::new(MockTransport::new());
        let mut b = Mcu::new(MockTransport::new());
        for _ in 0..16 {
            let id = a.next_correlation_id();
            assert_eq!(id, b.next_correlation_id());
            assert!(id < 255);
        }
    }

    #[test]
    fn test_registers() {
        let mock = MockTransport::new();
        let mut mcu = Mcu::new(mock.clone());
        mock.push(&mock::status_byte_ack(0, AckId::ReadRegs, 0x5a));
        mock.push(&mock::ack(0, AckId::WriteRegs, &[]));
        assert_eq!(mcu.read_register(0, 0x0889).unwrap(), 0x5a);
        mcu.write_register(0, 0x0889, 0xa5).unwrap();
        assert_eq!(
            mock.requests(),
            vec![
                Request::ReadRegister {
                    radio: 0,
                    addr: 0x0889
                },
                Request::WriteRegister {
                    radio: 0,
                    addr: 0x0889,
                    value: 0xa5
                }
            ]
        );
    }

    #[test]
    fn test_set_coefficient_and_bootloader() {
        let mock = MockTransport::new();
        let mut mcu = Mcu::new(mock.clone());
        mock.push(&mock::status_byte_ack(0, AckId::SetCoefTempRssi, 0));
        mock.push(&mock::status_byte_ack(0, AckId::SetCoefTempRssi, 3));
        mock.push(&mock::ack(0, AckId::Bootloader, &[]));
        mcu.set_rssi_temperature_coefficient(0, 0.5).unwrap();
        assert!(matches!(
            mcu.set_rssi_temperature_coefficient(1, 0.5),
            Err(Error::Rejected(Rejection::SetCoefTempRssi { radio: 1, code: 3 }))
        ));
        mcu.enter_bootloader().unwrap();
    }
}

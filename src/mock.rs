//! Scripted MCU link for tests
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::convert::TryFrom;
use std::io::{self, ErrorKind, Read, Write};
use std::rc::Rc;
use std::sync::Once;

use log::{Level, LevelFilter, Metadata, Record};

use crate::error::{Error, Result};
use crate::mcu::codec::{FrameHeader, HEADER_SIZE};
use crate::mcu::command::{AckId, Request, RequestId, VERSION_FIELD_SIZE};
use crate::transport::{LinkSettings, Transport};

#[derive(Default)]
struct MockState {
    rx: VecDeque<u8>,
    written: Vec<u8>,
    /// bytes handed out so far
    consumed: usize,
    /// read errors keyed by the stream position they fire at
    failures: Vec<(usize, ErrorKind)>,
    opened: usize,
}

/// Clones share the same scripted input and captured output
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Rc<RefCell<MockState>>,
    /// largest read served at once, 0 serves everything available
    chunk_size: usize,
}

thread_local! {
    static REGISTRY: RefCell<HashMap<String, MockTransport>> = RefCell::new(HashMap::new());
    static CAPTURED: RefCell<Vec<(Level, String)>> = RefCell::new(Vec::new());
}

/// Records log output per thread so parallel tests do not see each other
struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        CAPTURED.with(|c| {
            c.borrow_mut()
                .push((record.level(), format!("{}", record.args())))
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static LOGGER_INIT: Once = Once::new();

/// Starts recording the log output of the current thread from scratch
pub fn capture_logs() {
    LOGGER_INIT.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });
    CAPTURED.with(|c| c.borrow_mut().clear());
}

/// Messages logged at exactly `level` since [`capture_logs`]
pub fn captured_logs(level: Level) -> Vec<String> {
    CAPTURED.with(|c| {
        c.borrow()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, msg)| msg.clone())
            .collect()
    })
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Makes this link the one returned by [`Transport::open`] for `path`
    pub fn register(&self, path: &str) {
        REGISTRY.with(|r| r.borrow_mut().insert(path.to_string(), self.clone()));
    }

    pub fn push(&self, bytes: &[u8]) {
        self.state.borrow_mut().rx.extend(bytes.iter().copied());
    }

    /// Bytes scripted but not read yet
    pub fn pending(&self) -> usize {
        self.state.borrow().rx.len()
    }

    pub fn fail_next_read(&self, kind: ErrorKind) {
        let mut state = self.state.borrow_mut();
        let at = state.consumed;
        state.failures.push((at, kind));
    }

    /// Fails the read following the bytes scripted so far
    pub fn fail_read_after_pending(&self, kind: ErrorKind) {
        let mut state = self.state.borrow_mut();
        let at = state.consumed + state.rx.len();
        state.failures.push((at, kind));
    }

    pub fn opened(&self) -> usize {
        self.state.borrow().opened
    }

    pub fn written(&self) -> Vec<u8> {
        self.state.borrow().written.clone()
    }

    /// Splits everything written so far into frames, panics on a partial frame
    pub fn frames(&self) -> Vec<(FrameHeader, Vec<u8>)> {
        let written = self.written();
        let mut frames = Vec::new();
        let mut at = 0;
        while at < written.len() {
            let header = FrameHeader::from_bytes(&[
                written[at],
                written[at + 1],
                written[at + 2],
                written[at + 3],
            ]);
            let end = at + header.frame_len();
            assert!(end <= written.len(), "partial frame written");
            frames.push((header, written[at + HEADER_SIZE..end].to_vec()));
            at = end;
        }
        frames
    }

    /// Decodes every request written so far
    pub fn requests(&self) -> Vec<Request> {
        self.frames()
            .into_iter()
            .map(|(header, payload)| {
                let id = RequestId::try_from(header.tag).unwrap();
                Request::decode(id, &payload).unwrap()
            })
            .collect()
    }
}

impl Read for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        let consumed = state.consumed;
        if let Some(i) = state.failures.iter().position(|(at, _)| *at <= consumed) {
            let (_, kind) = state.failures.remove(i);
            return Err(io::Error::new(kind, "scripted failure"));
        }
        let mut n = buf.len().min(state.rx.len());
        if self.chunk_size > 0 {
            n = n.min(self.chunk_size);
        }
        if let Some(next) = state.failures.iter().map(|(at, _)| *at).min() {
            n = n.min(next - consumed);
        }
        for b in buf.iter_mut().take(n) {
            // n is bounded by the queue length
            *b = state.rx.pop_front().unwrap_or_default();
        }
        state.consumed += n;
        Ok(n)
    }
}

impl Write for MockTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.state.borrow_mut().written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MockTransport {
    fn open(path: &str, _settings: &LinkSettings) -> Result<Self> {
        let mock = REGISTRY.with(|r| r.borrow().get(path).cloned());
        match mock {
            Some(mock) => {
                mock.state.borrow_mut().opened += 1;
                Ok(mock)
            }
            None => Err(Error::Io(io::Error::new(
                ErrorKind::NotFound,
                format!("no mock registered for {}", path),
            ))),
        }
    }
}

pub fn frame(id: u8, tag: u8, payload: &[u8]) -> Vec<u8> {
    let header = FrameHeader {
        id,
        size: payload.len() as u16,
        tag,
    };
    let mut out = header.to_bytes().to_vec();
    out.extend_from_slice(payload);
    out
}

pub fn ack(id: u8, tag: AckId, payload: &[u8]) -> Vec<u8> {
    frame(id, tag.code(), payload)
}

pub fn ping_ack(id: u8, uid: [u32; 3], version: &str, nb_radio_tx: u8, nb_radio_rx: u8) -> Vec<u8> {
    let mut payload = Vec::new();
    for word in uid.iter() {
        payload.extend_from_slice(&word.to_be_bytes());
    }
    let mut field = [0u8; VERSION_FIELD_SIZE];
    for (dst, src) in field.iter_mut().zip(version.bytes()) {
        *dst = src;
    }
    payload.extend_from_slice(&field);
    payload.push(nb_radio_tx);
    payload.push(nb_radio_rx);
    ack(id, AckId::Ping, &payload)
}

pub fn status_ack(
    id: u8,
    system_time_ms: u32,
    precise_time_us: u32,
    pps_captured: bool,
    pps_time_us: u32,
    temperature_centi: i16,
    radios: &[(u16, u16)],
) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&system_time_ms.to_be_bytes());
    payload.extend_from_slice(&precise_time_us.to_be_bytes());
    payload.push(pps_captured as u8);
    payload.extend_from_slice(&pps_time_us.to_be_bytes());
    payload.extend_from_slice(&temperature_centi.to_be_bytes());
    for (crc_ok, crc_err) in radios {
        payload.extend_from_slice(&crc_ok.to_be_bytes());
        payload.extend_from_slice(&crc_err.to_be_bytes());
    }
    ack(id, AckId::GetStatus, &payload)
}

pub fn status_byte_ack(id: u8, tag: AckId, status: u8) -> Vec<u8> {
    ack(id, tag, &[status])
}

pub fn rx_msg_ack(id: u8, nb_msg: u8, nb_bytes: u16, pending: bool, lost: u8) -> Vec<u8> {
    let mut payload = vec![nb_msg];
    payload.extend_from_slice(&nb_bytes.to_be_bytes());
    payload.push(pending as u8);
    payload.push(lost);
    ack(id, AckId::GetRxMsg, &payload)
}

pub fn rx_event(radio: u8, count_us: u32, foff_hz: i32, snr: i8, rssi: i8, data: &[u8]) -> Vec<u8> {
    let mut payload = vec![radio];
    payload.extend_from_slice(&count_us.to_be_bytes());
    payload.extend_from_slice(&foff_hz.to_be_bytes());
    payload.push(snr as u8);
    payload.push(rssi as u8);
    payload.push(data.len() as u8);
    payload.extend_from_slice(data);
    ack(0, AckId::MsgReceived, &payload)
}

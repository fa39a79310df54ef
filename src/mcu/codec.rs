//! Framing of the MCU serial protocol
//!
//! Every request, acknowledgement and event shares the same frame layout:
//!
//! | field   | length | description                                          |
//! |---------|--------|------------------------------------------------------|
//! | id      | 1      | correlation id picked by the host for each request   |
//! | size    | 2      | payload length, big-endian                           |
//! | type    | 1      | request, acknowledgement or event tag                |
//! | payload | size   | command specific                                     |
//!
//! There is no delimiter and no checksum, a frame boundary is only known by honouring `size`.
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use heapless::Vec;
use log::{debug, trace, warn};

use super::command::{AckId, RequestId};
use crate::error::{Error, Result};

pub const HEADER_SIZE: usize = 4;
/// Largest request payload the host sends
pub const WRITE_SIZE_MAX: usize = 280;
/// Largest frame the host accepts, header included
pub const READ_SIZE_MAX: usize = 500;

pub type RequestPayloadVec = Vec<u8, WRITE_SIZE_MAX>;
pub type RequestFrameVec = Vec<u8, { HEADER_SIZE + WRITE_SIZE_MAX }>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub id: u8,
    pub size: u16,
    pub tag: u8,
}

impl FrameHeader {
    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Self {
        Self {
            id: buf[0],
            size: u16::from_be_bytes([buf[1], buf[2]]),
            tag: buf[3],
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let size = self.size.to_be_bytes();
        [self.id, size[0], size[1], self.tag]
    }

    /// Header plus payload
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.size as usize
    }
}

/// Builds a complete request frame
pub fn encode_request(id: u8, cmd: RequestId, payload: &[u8]) -> Result<RequestFrameVec> {
    if payload.len() > WRITE_SIZE_MAX {
        return Err(Error::RequestTooLarge {
            len: payload.len(),
            capacity: WRITE_SIZE_MAX,
        });
    }
    let header = FrameHeader {
        id,
        size: payload.len() as u16,
        tag: cmd as u8,
    };
    let too_large = |_| Error::RequestTooLarge {
        len: payload.len(),
        capacity: WRITE_SIZE_MAX,
    };
    let mut frame = RequestFrameVec::new();
    frame
        .extend_from_slice(&header.to_bytes())
        .map_err(too_large)?;
    frame.extend_from_slice(payload).map_err(too_large)?;
    Ok(frame)
}

/// Sends one request frame with a single write
pub fn write_request<W: Write>(
    link: &mut W,
    id: u8,
    cmd: RequestId,
    payload: &[u8],
) -> Result<()> {
    let frame = encode_request(id, cmd, payload)?;
    debug!(
        "--> {} (id: 0x{:02X}, size: {})",
        cmd,
        id,
        frame.len() - HEADER_SIZE
    );
    trace!("--> {}", base16::encode_lower(&frame[..]));
    link.write_all(&frame)?;
    link.flush()?;
    Ok(())
}

/// Reads exactly one frame into `buf` and returns its total length
///
/// The MCU has `ack_timeout` to start answering, the read timeout of the link then bounds the
/// silence between two bytes of the frame. The payload is not consumed from the link when the
/// declared size does not fit `buf`.
pub fn read_ack<R: Read>(link: &mut R, buf: &mut [u8], ack_timeout: Duration) -> Result<usize> {
    if buf.len() < HEADER_SIZE {
        return Err(Error::AckTooLarge {
            declared: HEADER_SIZE,
            capacity: buf.len(),
        });
    }
    wait_first_byte(link, &mut buf[..1], ack_timeout)?;
    read_exact(link, &mut buf[1..HEADER_SIZE])?;
    let header = FrameHeader::from_bytes(&[buf[0], buf[1], buf[2], buf[3]]);
    let total = header.frame_len();
    if total > buf.len() {
        warn!(
            "acknowledgement of {} bytes does not fit the {} bytes buffer",
            total,
            buf.len()
        );
        return Err(Error::AckTooLarge {
            declared: total,
            capacity: buf.len(),
        });
    }
    read_exact(link, &mut buf[HEADER_SIZE..total])?;
    trace!("<-- {}", base16::encode_lower(&buf[..total]));
    Ok(total)
}

fn wait_first_byte<R: Read>(link: &mut R, buf: &mut [u8], ack_timeout: Duration) -> Result<()> {
    let start = Instant::now();
    loop {
        match link.read(buf) {
            Ok(0) => return Err(Error::Disconnected),
            Ok(_) => return Ok(()),
            Err(e) if e.kind() == ErrorKind::TimedOut && start.elapsed() < ack_timeout => {
                trace!("still waiting for an answer after {:?}", start.elapsed());
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {
                warn!("read interrupted while waiting for an answer");
                return Err(Error::Interrupted);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Serial reads may return fewer bytes than requested, keep reading until `buf` is full
fn read_exact<R: Read>(link: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut nb_read = 0;
    while nb_read < buf.len() {
        match link.read(&mut buf[nb_read..]) {
            Ok(0) => return Err(Error::Disconnected),
            Ok(n) => nb_read += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {
                warn!("read interrupted after {} of {} bytes", nb_read, buf.len());
                return Err(Error::Interrupted);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// View on a frame read by [`read_ack`]
#[derive(Debug, Clone, Copy)]
pub struct AckFrame<'a> {
    pub header: FrameHeader,
    pub payload: &'a [u8],
}

impl<'a> AckFrame<'a> {
    pub fn parse(frame: &'a [u8]) -> Result<Self> {
        if frame.len() < HEADER_SIZE {
            return Err(Error::AckTooLarge {
                declared: HEADER_SIZE,
                capacity: frame.len(),
            });
        }
        let header = FrameHeader::from_bytes(&[frame[0], frame[1], frame[2], frame[3]]);
        let payload = frame
            .get(HEADER_SIZE..header.frame_len())
            .ok_or(Error::AckTooLarge {
                declared: header.frame_len(),
                capacity: frame.len(),
            })?;
        Ok(Self { header, payload })
    }

    /// Checks the type tag and the minimum payload length of the layout of `ack`
    pub fn expect(&self, ack: AckId, needed: usize) -> Result<&'a [u8]> {
        if self.header.tag != ack.code() {
            return Err(Error::UnexpectedAck {
                expected: ack,
                actual: self.header.tag,
            });
        }
        if self.payload.len() < needed {
            return Err(Error::MalformedAck {
                ack,
                len: self.payload.len(),
                needed,
            });
        }
        Ok(self.payload)
    }
}

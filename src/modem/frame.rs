use atat::nom::FindSubstring;
use embedded_hal_async::delay::DelayNs;
use log::{debug, warn};

use super::{Engine, Transport};
use crate::config::Config;

pub const SOCK_IN_BUF_SIZE: usize = 256;
const FRAME_RX_BUF_SIZE: usize = SOCK_IN_BUF_SIZE + 64;
/// Header the modem puts in front of socket data once `AT+CIPHEAD=1` is set
pub const IPD_HEADER: &str = "+IPD,";
const MAX_LENGTH_DIGITS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("no socket data")]
    NoData,
    #[error("socket data without frame header")]
    NoHeader,
    #[error("frame ended before its declared length")]
    Incomplete,
    #[error("frame length field is malformed")]
    Malformed,
    #[error("frame is larger than the payload buffer")]
    Oversized,
}

enum Header {
    /// The `:` after the length has not arrived yet
    Partial,
    Complete { declared: usize, body: usize },
}

/// Reassembles one length-prefixed inbound frame per [`FrameReader::poll`].
pub struct FrameReader {
    marker: &'static str,
    grace_ms: u32,
    retry_cap: u8,
    rx: [u8; FRAME_RX_BUF_SIZE],
    rx_len: usize,
    payload: [u8; SOCK_IN_BUF_SIZE],
    payload_len: usize,
}

impl FrameReader {
    pub fn new(config: &Config) -> Self {
        Self::with_marker(IPD_HEADER, config)
    }

    pub fn with_marker(marker: &'static str, config: &Config) -> Self {
        Self {
            marker,
            grace_ms: config.frame_grace.as_millis() as u32,
            retry_cap: config.frame_retry_cap,
            rx: [0; FRAME_RX_BUF_SIZE],
            rx_len: 0,
            payload: [0; SOCK_IN_BUF_SIZE],
            payload_len: 0,
        }
    }

    /// Payload of the last successful poll
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.payload_len]
    }

    /// Returns the payload length of the frame now available in [`FrameReader::payload`].
    ///
    /// Returns [`FrameError::NoData`] without waiting if nothing has been received.
    /// Bytes following a complete frame are kept for the next poll.
    pub async fn poll<T, D>(&mut self, engine: &mut Engine<T, D>) -> Result<usize, FrameError>
    where
        T: Transport,
        D: DelayNs,
    {
        self.payload_len = 0;
        if self.fill(engine) == 0 && self.rx_len == 0 {
            return Err(FrameError::NoData);
        }
        let result = self.assemble(engine).await;
        if result.is_err() {
            self.rx_len = 0;
        }
        result
    }

    async fn assemble<T, D>(&mut self, engine: &mut Engine<T, D>) -> Result<usize, FrameError>
    where
        T: Transport,
        D: DelayNs,
    {
        engine.pause_ms(self.grace_ms).await;
        self.fill(engine);

        let Some(start) = (&self.rx[..self.rx_len]).find_substring(self.marker) else {
            debug!("Dropping {} bytes without frame header", self.rx_len);
            return Err(FrameError::NoHeader);
        };
        let length_at = start + self.marker.len();

        let mut attempts = 0;
        loop {
            if let Header::Complete { declared, body } = self.header(length_at)? {
                if self.rx_len - body >= declared {
                    self.payload[..declared].copy_from_slice(&self.rx[body..body + declared]);
                    self.payload_len = declared;
                    self.keep_tail(body + declared);
                    return Ok(declared);
                }
            }
            if attempts >= self.retry_cap || self.rx_len == self.rx.len() {
                warn!("Frame incomplete after {} retries", attempts);
                return Err(FrameError::Incomplete);
            }
            attempts += 1;
            engine.pause_ms(1).await;
            self.fill(engine);
        }
    }

    /// Move what follows the frame at `end` to the front, minus line breaks
    fn keep_tail(&mut self, end: usize) {
        let start = self.rx[end..self.rx_len]
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .map_or(self.rx_len, |i| end + i);
        self.rx.copy_within(start..self.rx_len, 0);
        self.rx_len -= start;
        if self.rx_len > 0 {
            debug!("Keeping {} bytes after frame", self.rx_len);
        }
    }

    fn fill<T, D>(&mut self, engine: &mut Engine<T, D>) -> usize
    where
        T: Transport,
        D: DelayNs,
    {
        let n = engine.drain(&mut self.rx[self.rx_len..]);
        self.rx_len += n;
        n
    }

    fn header(&self, length_at: usize) -> Result<Header, FrameError> {
        let field = &self.rx[length_at..self.rx_len];
        let Some(colon) = field.iter().position(|&b| b == b':') else {
            if field.len() <= MAX_LENGTH_DIGITS && field.iter().all(u8::is_ascii_digit) {
                return Ok(Header::Partial);
            }
            return Err(FrameError::Malformed);
        };
        let digits = &field[..colon];
        if digits.is_empty()
            || digits.len() > MAX_LENGTH_DIGITS
            || !digits.iter().all(u8::is_ascii_digit)
        {
            return Err(FrameError::Malformed);
        }
        let declared = digits
            .iter()
            .fold(0usize, |acc, &d| acc * 10 + (d - b'0') as usize);
        if declared > SOCK_IN_BUF_SIZE {
            return Err(FrameError::Oversized);
        }
        Ok(Header::Complete {
            declared,
            body: length_at + colon + 1,
        })
    }
}

use atat::nom::FindSubstring;
use embedded_hal_async::delay::DelayNs;
use log::{debug, warn};

use super::Transport;
use crate::at::Expect;

pub const AT_RX_BUF_SIZE: usize = 512;
pub const AT_TX_BUF_SIZE: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("no response from modem")]
    NoData,
    #[error("response did not contain the expected marker")]
    NoMatch,
    #[error("response overflowed the receive buffer")]
    Overflow,
    #[error("command does not fit the transmit buffer")]
    CommandTooLong,
    #[error("failed to write to modem")]
    Transport,
    #[error("failed to parse response")]
    Parse,
    #[error("response was not accepted")]
    Rejected,
    #[error("failed to drive power pin")]
    Pin,
}

/// Raw request: send `text`, succeed if `expect` shows up before `timeout_ms` of silence
#[derive(Debug, Clone, Copy)]
pub struct CommandRequest<'a> {
    pub text: &'a [u8],
    pub expect: &'a str,
    pub timeout_ms: u32,
}

enum Outgoing<'a> {
    Scratch(usize),
    Borrowed(&'a [u8]),
}

/// Command/response engine over a [`Transport`].
///
/// A response is considered complete once the link has been quiet for the
/// command's timeout, then it is searched once for the expected marker.
/// Every call therefore takes at least its timeout.
pub struct Engine<T, D> {
    transport: T,
    delay: D,
    rx: [u8; AT_RX_BUF_SIZE],
    rx_len: usize,
    tx: [u8; AT_TX_BUF_SIZE],
    /// Bytes that followed a payload acknowledgement, handed out first by [`Engine::drain`]
    unread: heapless::Vec<u8, AT_RX_BUF_SIZE>,
}

impl<T, D> Engine<T, D>
where
    T: Transport,
    D: DelayNs,
{
    pub fn new(transport: T, delay: D) -> Self {
        Self {
            transport,
            delay,
            rx: [0; AT_RX_BUF_SIZE],
            rx_len: 0,
            tx: [0; AT_TX_BUF_SIZE],
            unread: heapless::Vec::new(),
        }
    }

    /// Bytes received by the last call, valid until the next one
    pub fn response(&self) -> &[u8] {
        &self.rx[..self.rx_len]
    }

    pub async fn send(&mut self, request: &CommandRequest<'_>) -> Result<(), Error> {
        self.exchange(
            Outgoing::Borrowed(request.text),
            request.expect,
            request.timeout_ms,
        )
        .await
    }

    /// Up to `attempts` sends, stopping at the first success
    pub async fn retry(&mut self, request: &CommandRequest<'_>, attempts: u8) -> Result<(), Error> {
        let mut result = Err(Error::NoData);
        for _ in 0..attempts {
            result = self.send(request).await;
            if result.is_ok() {
                break;
            }
        }
        result
    }

    pub async fn command<Cmd: Expect>(&mut self, cmd: &Cmd) -> Result<Cmd::Response, Error> {
        if Cmd::MAX_LEN > AT_TX_BUF_SIZE {
            return Err(Error::CommandTooLong);
        }
        let len = cmd.write(&mut self.tx);
        self.exchange(Outgoing::Scratch(len), Cmd::EXPECT, Cmd::MAX_TIMEOUT_MS)
            .await?;
        cmd.parse(Ok(self.response())).map_err(|e| {
            warn!("Failed to parse modem response: {:?}", e);
            Error::Parse
        })
    }

    pub async fn command_retry<Cmd: Expect>(
        &mut self,
        cmd: &Cmd,
        attempts: u8,
    ) -> Result<Cmd::Response, Error> {
        self.command_retry_until(cmd, attempts, |_| true).await
    }

    /// Like [`Engine::command_retry`], an attempt only counts as successful if
    /// `accept` approves the parsed response
    pub async fn command_retry_until<Cmd, F>(
        &mut self,
        cmd: &Cmd,
        attempts: u8,
        accept: F,
    ) -> Result<Cmd::Response, Error>
    where
        Cmd: Expect,
        F: Fn(&Cmd::Response) -> bool,
    {
        let mut result = Err(Error::NoData);
        for _ in 0..attempts {
            result = match self.command(cmd).await {
                Ok(resp) if accept(&resp) => return Ok(resp),
                Ok(_) => Err(Error::Rejected),
                Err(e) => Err(e),
            };
        }
        result
    }

    /// Write `payload` followed by `terminator` in one go.
    ///
    /// Whatever the peer sent after `expect` within the idle window is kept
    /// and returned by the next [`Engine::drain`].
    pub async fn send_payload(
        &mut self,
        payload: &[u8],
        terminator: u8,
        expect: &str,
        timeout_ms: u32,
    ) -> Result<(), Error> {
        if payload.len() >= AT_TX_BUF_SIZE {
            return Err(Error::CommandTooLong);
        }
        self.tx[..payload.len()].copy_from_slice(payload);
        self.tx[payload.len()] = terminator;
        self.exchange(Outgoing::Scratch(payload.len() + 1), expect, timeout_ms)
            .await?;
        self.keep_after(expect);
        Ok(())
    }

    /// Non-blocking read: bytes kept from the last payload exchange first, then the transport
    pub(crate) fn drain(&mut self, buf: &mut [u8]) -> usize {
        let kept = self.unread.len().min(buf.len());
        buf[..kept].copy_from_slice(&self.unread[..kept]);
        self.unread.rotate_left(kept);
        self.unread.truncate(self.unread.len() - kept);
        kept + self.transport.read_available(&mut buf[kept..])
    }

    fn keep_after(&mut self, marker: &str) {
        let response = &self.rx[..self.rx_len];
        let Some(at) = response.find_substring(marker) else {
            return;
        };
        let tail = &response[at + marker.len()..];
        let Some(start) = tail.iter().position(|b| !b.is_ascii_whitespace()) else {
            return;
        };
        let tail = &tail[start..];
        let room = self.unread.capacity() - self.unread.len();
        if tail.len() > room {
            warn!("Dropping {} bytes received after {}", tail.len() - room, marker);
        }
        self.unread
            .extend_from_slice(&tail[..tail.len().min(room)])
            .ok();
        debug!("Kept {} bytes received after {}", tail.len().min(room), marker);
    }

    pub(crate) async fn pause_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms).await;
    }

    async fn exchange(
        &mut self,
        text: Outgoing<'_>,
        expect: &str,
        timeout_ms: u32,
    ) -> Result<(), Error> {
        self.rx_len = 0;
        let bytes = match text {
            Outgoing::Scratch(len) => &self.tx[..len],
            Outgoing::Borrowed(bytes) => bytes,
        };
        debug!("send: {}", printable(bytes));
        self.transport.write_all(bytes).await.map_err(|e| {
            warn!("Modem write failed: {:?}", e);
            Error::Transport
        })?;

        self.wait_idle(timeout_ms).await?;
        debug!("recv: {}", printable(self.response()));

        if self.rx_len == 0 {
            return Err(Error::NoData);
        }
        match self.response().find_substring(expect) {
            Some(_) => Ok(()),
            None => Err(Error::NoMatch),
        }
    }

    async fn wait_idle(&mut self, timeout_ms: u32) -> Result<(), Error> {
        let mut idle = 0;
        while idle < timeout_ms {
            let n = if self.rx_len < AT_RX_BUF_SIZE {
                self.transport.read_available(&mut self.rx[self.rx_len..])
            } else {
                let mut probe = [0u8; 1];
                if self.transport.read_available(&mut probe) > 0 {
                    warn!("Modem response exceeded {} bytes", AT_RX_BUF_SIZE);
                    return Err(Error::Overflow);
                }
                0
            };
            if n > 0 {
                self.rx_len += n;
                idle = 0;
            } else {
                idle += 1;
            }
            self.delay.delay_ms(1).await;
        }
        Ok(())
    }
}

fn printable(bytes: &[u8]) -> &str {
    core::str::from_utf8(bytes)
        .map(str::trim)
        .unwrap_or("<binary>")
}

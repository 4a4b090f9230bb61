use super::{general::query_cmd, plain_cmd, EmptyResponse, Expect};
use atat::{nom::FindSubstring, AtatCmd};

pub mod responses;
use responses::*;

pub const APN_MAX_LEN: usize = 32;
pub const HOST_MAX_LEN: usize = 64;

/// Ctrl-Z, terminates the payload after `AT+CIPSEND`
pub const SEND_TERMINATOR: u8 = 0x1A;
pub const SEND_OK: &str = "SEND OK";
pub const SEND_TIMEOUT_MS: u32 = 3000;

fn empty_parse(resp: Result<&[u8], atat::InternalError>) -> Result<EmptyResponse, atat::Error> {
    match resp {
        Ok(_) => Ok(EmptyResponse),
        Err(_) => Err(atat::Error::Parse),
    }
}

/// Prefix inbound socket data with `+IPD,<len>:`
#[derive(Clone, Debug)]
pub struct SetIpHead {
    pub enable: bool,
}
impl AtatCmd for SetIpHead {
    type Response = EmptyResponse;

    const MAX_LEN: usize = 13;

    fn write(&self, mut buf: &mut [u8]) -> usize {
        use embedded_io::Write;
        let buf_len = buf.len();
        write!(buf, "AT+CIPHEAD={}\r", self.enable as u8).ok();
        buf_len - buf.len()
    }

    fn parse(
        &self,
        resp: Result<&[u8], atat::InternalError>,
    ) -> Result<Self::Response, atat::Error> {
        empty_parse(resp)
    }
}
impl Expect for SetIpHead {}

#[derive(Clone, Debug)]
pub struct SetApn {
    pub apn: heapless::String<APN_MAX_LEN>,
}
impl AtatCmd for SetApn {
    type Response = EmptyResponse;

    const MAX_LEN: usize = 11 + APN_MAX_LEN;

    fn write(&self, mut buf: &mut [u8]) -> usize {
        use embedded_io::Write;
        let buf_len = buf.len();
        write!(buf, "AT+CSTT=\"{}\"\r", self.apn).ok();
        buf_len - buf.len()
    }

    fn parse(
        &self,
        resp: Result<&[u8], atat::InternalError>,
    ) -> Result<Self::Response, atat::Error> {
        empty_parse(resp)
    }
}
impl Expect for SetApn {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}
impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }
}

/// Open the single client socket, answered with `OK` and later `CONNECT OK`
#[derive(Clone, Debug)]
pub struct StartConnection {
    pub protocol: Protocol,
    pub host: heapless::String<HOST_MAX_LEN>,
    pub port: u16,
}
impl AtatCmd for StartConnection {
    type Response = EmptyResponse;

    const MAX_LEN: usize = 28 + HOST_MAX_LEN;
    const MAX_TIMEOUT_MS: u32 = 10_000;

    fn write(&self, mut buf: &mut [u8]) -> usize {
        use embedded_io::Write;
        let buf_len = buf.len();
        write!(
            buf,
            "AT+CIPSTART=\"{}\",\"{}\",{}\r",
            self.protocol.as_str(),
            self.host,
            self.port
        )
        .ok();
        buf_len - buf.len()
    }

    fn parse(
        &self,
        resp: Result<&[u8], atat::InternalError>,
    ) -> Result<Self::Response, atat::Error> {
        let resp = resp.map_err(|_| atat::Error::Parse)?;
        match resp.find_substring(IpStatus::ConnectOk.as_str()) {
            Some(_) => Ok(EmptyResponse),
            None => Err(atat::Error::Parse),
        }
    }
}
impl Expect for StartConnection {}

plain_cmd!(ActivatePdp, "AT+CIICR\r", "OK", 3000);
plain_cmd!(
    /// Wait for the `>` prompt before writing the payload
    PrepareSend,
    "AT+CIPSEND\r",
    ">",
    1000
);
plain_cmd!(CloseConnection, "AT+CIPCLOSE\r", "CLOSE OK", 1000);
plain_cmd!(
    /// Deactivate the PDP context and drop any socket
    ShutIp,
    "AT+CIPSHUT\r",
    "SHUT OK",
    3000
);

query_cmd!(GetCipStatus, "AT+CIPSTATUS\r", CipStatus);
query_cmd!(GetSendLimit, "AT+CIPSEND?\r", SendLimit);

/// `AT+CIFSR` answers with the bare address and no final `OK`
#[derive(Clone, Debug)]
pub struct GetLocalAddress;
impl AtatCmd for GetLocalAddress {
    type Response = LocalAddress;

    const MAX_LEN: usize = 9;

    fn write(&self, buf: &mut [u8]) -> usize {
        let text = b"AT+CIFSR\r";
        buf[..text.len()].copy_from_slice(text);
        text.len()
    }

    fn parse(
        &self,
        resp: Result<&[u8], atat::InternalError>,
    ) -> Result<Self::Response, atat::Error> {
        resp.map_err(|_| atat::Error::Parse)
            .and_then(LocalAddress::from_response)
    }
}
impl Expect for GetLocalAddress {
    const EXPECT: &'static str = "\r";
}

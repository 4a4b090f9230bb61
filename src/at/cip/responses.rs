use core::net::Ipv4Addr;
use core::str::FromStr;

use atat::{nom::FindSubstring, AtatResp};

use crate::at::field_after;

/// Connection state reported by `AT+CIPSTATUS`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IpStatus {
    Initial,
    Start,
    Config,
    GprsAct,
    Status,
    Processing,
    PdpDeact,
    TcpConnecting,
    UdpConnecting,
    ServerListening,
    ConnectOk,
    TcpClosing,
    UdpClosing,
    TcpClosed,
    UdpClosed,
}

impl IpStatus {
    /// Match order for [`IpStatus::find`]
    pub const ALL: [IpStatus; 15] = [
        IpStatus::Initial,
        IpStatus::Start,
        IpStatus::Config,
        IpStatus::GprsAct,
        IpStatus::Status,
        IpStatus::Processing,
        IpStatus::PdpDeact,
        IpStatus::TcpConnecting,
        IpStatus::UdpConnecting,
        IpStatus::ServerListening,
        IpStatus::ConnectOk,
        IpStatus::TcpClosing,
        IpStatus::UdpClosing,
        IpStatus::TcpClosed,
        IpStatus::UdpClosed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IpStatus::Initial => "IP INITIAL",
            IpStatus::Start => "IP START",
            IpStatus::Config => "IP CONFIG",
            IpStatus::GprsAct => "IP GPRSACT",
            IpStatus::Status => "IP STATUS",
            IpStatus::Processing => "IP PROCESSING",
            IpStatus::PdpDeact => "PDP DEACT",
            IpStatus::TcpConnecting => "TCP CONNECTING",
            IpStatus::UdpConnecting => "UDP CONNECTING",
            IpStatus::ServerListening => "SERVER LISTENING",
            IpStatus::ConnectOk => "CONNECT OK",
            IpStatus::TcpClosing => "TCP CLOSING",
            IpStatus::UdpClosing => "UDP CLOSING",
            IpStatus::TcpClosed => "TCP CLOSED",
            IpStatus::UdpClosed => "UDP CLOSED",
        }
    }

    /// First status in [`IpStatus::ALL`] whose text occurs anywhere in `resp`
    pub fn find(resp: &[u8]) -> Option<IpStatus> {
        Self::ALL
            .into_iter()
            .find(|status| resp.find_substring(status.as_str()).is_some())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CipStatus {
    pub status: IpStatus,
}
impl AtatResp for CipStatus {}

impl CipStatus {
    // OK\r\n\r\nSTATE: IP INITIAL
    pub fn from_response(resp: &[u8]) -> Result<Self, atat::Error> {
        resp.find_substring("STATE:").ok_or(atat::Error::Parse)?;
        let status = IpStatus::find(resp).ok_or(atat::Error::Parse)?;
        Ok(Self { status })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SendLimit {
    pub size: u16,
}
impl AtatResp for SendLimit {}

impl SendLimit {
    // +CIPSEND: 1352
    pub fn from_response(resp: &[u8]) -> Result<Self, atat::Error> {
        let field = field_after(resp, "+CIPSEND: ").ok_or(atat::Error::Parse)?;
        Ok(Self {
            size: field.parse().map_err(|_| atat::Error::Parse)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LocalAddress(pub Ipv4Addr);
impl AtatResp for LocalAddress {}

impl LocalAddress {
    // \r\n10.71.155.118\r\n
    pub fn from_response(resp: &[u8]) -> Result<Self, atat::Error> {
        let text = core::str::from_utf8(resp).map_err(|_| atat::Error::Parse)?;
        text.split(['\r', '\n'])
            .map(str::trim)
            .find_map(|line| Ipv4Addr::from_str(line).ok())
            .map(Self)
            .ok_or(atat::Error::Parse)
    }
}

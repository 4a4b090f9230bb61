use core::net::Ipv4Addr;
use core::str::FromStr;

use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use log::{error, info, warn};

use super::{Modem, Transport};
use crate::at::{cip, general};

/// Where modem setup stopped.
///
/// [`SetupError::code`] gives a stable number for field diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    #[error("modem did not power on")]
    PowerOn,
    #[error("SIM card not ready")]
    SimNotReady,
    #[error("signal quality below threshold")]
    SignalPoor,
    #[error("not attached to packet service")]
    NotAttached,
    #[error("failed to shut stale IP session")]
    ShutFailed,
    #[error("failed to set APN")]
    ApnFailed,
    #[error("failed to activate PDP context")]
    ActivatePdpFailed,
    #[error("failed to get local address")]
    AddressFailed,
    #[error("failed to connect to server")]
    ConnectFailed,
    #[error("failed to send to server")]
    SendFailed,
    #[error("failed to disable command echo")]
    EchoFailed,
    #[error("failed to enable IP data header")]
    IpHeadFailed,
}

impl SetupError {
    pub const fn code(&self) -> i32 {
        match self {
            SetupError::PowerOn => -1,
            SetupError::SimNotReady => -2,
            SetupError::SignalPoor => -3,
            SetupError::NotAttached => -4,
            SetupError::ShutFailed => -5,
            SetupError::ApnFailed => -6,
            SetupError::ActivatePdpFailed => -7,
            SetupError::AddressFailed => -8,
            SetupError::ConnectFailed => -9,
            SetupError::SendFailed => -10,
            SetupError::EchoFailed => -11,
            SetupError::IpHeadFailed => -12,
        }
    }
}

impl<T, D, P> Modem<T, D, P>
where
    T: Transport,
    D: DelayNs,
    P: OutputPin,
{
    /// Run every setup stage in order and return the address assigned by the network.
    ///
    /// A failed stage is not retried from the start, the caller decides whether
    /// to run the whole sequence again.
    pub async fn bring_up(&mut self) -> Result<Ipv4Addr, SetupError> {
        let budget = self.config.retry_budget;

        self.power_on().await.map_err(|e| {
            error!("Modem power on failed: {}", e);
            SetupError::PowerOn
        })?;
        self.engine
            .pause_ms(self.config.power_on_settle.as_millis() as u32)
            .await;
        info!("Modem powered on");

        self.engine
            .command_retry(&general::SetEcho { enable: false }, budget)
            .await
            .map_err(|_| SetupError::EchoFailed)?;
        self.engine
            .command_retry(&cip::SetIpHead { enable: true }, budget)
            .await
            .map_err(|_| SetupError::IpHeadFailed)?;

        self.engine
            .command_retry(&general::GetPinStatus, budget)
            .await
            .map_err(|_| SetupError::SimNotReady)?;
        info!("SIM card ready");

        let floor = self.config.signal_floor;
        let signal = self
            .engine
            .command_retry(&general::GetSignalQuality, budget)
            .await
            .map_err(|_| SetupError::SignalPoor)?;
        if !signal.is_known() || signal.rssi < floor {
            warn!("Signal quality {} is below {}", signal.rssi, floor);
            return Err(SetupError::SignalPoor);
        }
        info!("Signal quality: {}", signal.rssi);

        self.engine
            .command_retry_until(&general::GetAttachStatus, budget, |s| s.attached)
            .await
            .map_err(|_| SetupError::NotAttached)?;
        info!("Attached to packet service");

        self.engine
            .command(&cip::ShutIp)
            .await
            .map_err(|_| SetupError::ShutFailed)?;

        let apn = heapless::String::from_str(self.config.apn).map_err(|_| SetupError::ApnFailed)?;
        self.engine
            .command_retry(&cip::SetApn { apn }, budget)
            .await
            .map_err(|_| SetupError::ApnFailed)?;

        self.engine
            .command_retry(&cip::ActivatePdp, budget)
            .await
            .map_err(|_| SetupError::ActivatePdpFailed)?;

        let address = self
            .engine
            .command_retry(&cip::GetLocalAddress, budget)
            .await
            .map_err(|_| SetupError::AddressFailed)?;
        info!("IP: {}", address.0);
        Ok(address.0)
    }

    /// Open the TCP socket to the configured server
    pub async fn open_socket(&mut self) -> Result<(), SetupError> {
        let host = self.config.server_host;
        let port = self.config.server_port;
        self.connect(cip::Protocol::Tcp, host, port)
            .await
            .map_err(|e| {
                error!("Failed to connect to {}:{}: {}", host, port, e);
                SetupError::ConnectFailed
            })
    }
}

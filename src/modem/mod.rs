use core::str::FromStr;

use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use log::{info, warn};

use crate::at::{
    self,
    cip::{self, responses::IpStatus, Protocol},
    general::{self, responses::*},
};
use crate::config::Config;

mod bringup;
mod engine;
mod frame;
mod interface;

pub use bringup::SetupError;
pub use engine::{CommandRequest, Engine, Error, AT_RX_BUF_SIZE, AT_TX_BUF_SIZE};
pub use frame::{FrameError, FrameReader, IPD_HEADER, SOCK_IN_BUF_SIZE};
pub use interface::{ByteQueue, QueueTransport, Transport, RX_QUEUE_SIZE};

/// Air202 / SIM800 style modem: command engine plus the power control pin
pub struct Modem<T, D, P> {
    engine: Engine<T, D>,
    power: P,
    config: Config,
}

impl<T, D, P> Modem<T, D, P>
where
    T: Transport,
    D: DelayNs,
    P: OutputPin,
{
    pub fn new(transport: T, delay: D, power: P, config: Config) -> Self {
        Self {
            engine: Engine::new(transport, delay),
            power,
            config,
        }
    }

    pub fn engine(&mut self) -> &mut Engine<T, D> {
        &mut self.engine
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn is_alive(&mut self) -> bool {
        self.engine.command(&at::AT).await.is_ok()
    }

    /// Bring the modem to a state where it answers `AT`.
    ///
    /// The power pin is held low while polling and released afterwards.
    pub async fn power_on(&mut self) -> Result<(), Error> {
        if self.is_alive().await {
            return Ok(());
        }
        info!("Powering on modem...");
        self.power.set_low().map_err(|_| Error::Pin)?;
        self.engine
            .pause_ms(self.config.power_key_hold.as_millis() as u32)
            .await;
        let result = self
            .engine
            .command_retry(&at::AT, self.config.retry_budget)
            .await;
        self.power.set_high().map_err(|_| Error::Pin)?;
        result.map(|_| ())
    }

    pub async fn power_off(&mut self) -> Result<(), Error> {
        self.engine.command(&general::PowerDown).await?;
        Ok(())
    }

    pub async fn registration_status(&mut self) -> Result<RegistrationStatus, Error> {
        self.engine.command(&general::GetRegistrationStatus).await
    }

    pub async fn ip_status(&mut self) -> Result<IpStatus, Error> {
        let status = self.engine.command(&cip::GetCipStatus).await?;
        Ok(status.status)
    }

    pub async fn connect(&mut self, protocol: Protocol, host: &str, port: u16) -> Result<(), Error> {
        let host = heapless::String::from_str(host).map_err(|_| Error::CommandTooLong)?;
        self.engine
            .command(&cip::StartConnection {
                protocol,
                host,
                port,
            })
            .await?;
        info!("Connected to {}:{}", protocol.as_str(), port);
        Ok(())
    }

    /// Send `data` over the open socket
    pub async fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        self.engine.command(&cip::PrepareSend).await?;
        self.engine
            .send_payload(
                data,
                cip::SEND_TERMINATOR,
                cip::SEND_OK,
                cip::SEND_TIMEOUT_MS,
            )
            .await
            .inspect_err(|e| warn!("Socket send failed: {}", e))
    }

    pub async fn send_limit(&mut self) -> Result<u16, Error> {
        let limit = self.engine.command(&cip::GetSendLimit).await?;
        Ok(limit.size)
    }

    pub async fn close(&mut self) -> Result<(), Error> {
        self.engine.command(&cip::CloseConnection).await?;
        Ok(())
    }
}

//! Periodic authorization heartbeat.
//!
//! Every heartbeat sends `{"apiId":<id>,"UID":"<uid>"}` over the open socket and
//! waits for a `{"apiId":<id>,"respCode":100}` answer. Whichever comes first,
//! the answer or the timeout, decides the outcome of that cycle.

use alloc::vec::Vec;

use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::modem::{Modem, SetupError, Transport};

pub const RESP_CODE_SUCCESS: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthStatus {
    #[default]
    Fail,
    Authorizing,
    Success,
}

#[derive(Debug, Serialize)]
pub struct AuthRequest<'a> {
    #[serde(rename = "apiId")]
    pub api_id: u32,
    #[serde(rename = "UID")]
    pub uid: &'a str,
}

impl AuthRequest<'_> {
    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthResponse {
    #[serde(rename = "apiId")]
    pub api_id: i64,
    #[serde(rename = "respCode")]
    pub resp_code: i64,
}

impl AuthResponse {
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    status: AuthStatus,
    pending: bool,
    first_attempt: bool,
    elapsed_seconds: u32,
    api_id: u32,
    timeout_s: u32,
}

impl AuthSession {
    pub fn new(api_id: u32, timeout_s: u32) -> Self {
        Self {
            status: AuthStatus::Fail,
            pending: false,
            first_attempt: true,
            elapsed_seconds: 0,
            api_id,
            timeout_s,
        }
    }

    pub fn status(&self) -> AuthStatus {
        self.status
    }

    /// A request is out and neither answered nor timed out
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// No heartbeat has succeeded yet
    pub fn first_attempt(&self) -> bool {
        self.first_attempt
    }

    pub fn elapsed_seconds(&self) -> u32 {
        self.elapsed_seconds
    }

    pub fn request<'a>(&self, uid: &'a str) -> AuthRequest<'a> {
        AuthRequest {
            api_id: self.api_id,
            uid,
        }
    }

    pub fn on_heartbeat_due(&mut self) {
        self.status = AuthStatus::Authorizing;
        self.pending = true;
        self.elapsed_seconds = 0;
    }

    pub fn on_send_failed(&mut self) {
        self.status = AuthStatus::Fail;
        self.pending = false;
    }

    pub fn on_second(&mut self) {
        if self.status != AuthStatus::Authorizing {
            return;
        }
        self.elapsed_seconds += 1;
        if self.elapsed_seconds > self.timeout_s {
            warn!("Authorization timed out after {}s", self.elapsed_seconds);
            self.status = AuthStatus::Fail;
            self.pending = false;
        }
    }

    pub fn on_response(&mut self, response: &AuthResponse) {
        let accepted = response.api_id == i64::from(self.api_id)
            && response.resp_code == RESP_CODE_SUCCESS
            && self.status == AuthStatus::Authorizing
            && self.elapsed_seconds <= self.timeout_s;
        if accepted {
            info!("Authorized after {}s", self.elapsed_seconds);
            self.status = AuthStatus::Success;
            self.first_attempt = false;
        } else {
            warn!(
                "Authorization rejected: apiId {} respCode {} in {:?}",
                response.api_id, response.resp_code, self.status
            );
            self.status = AuthStatus::Fail;
        }
        self.pending = false;
    }

    /// Resolve the heartbeat with an inbound frame; anything undecodable counts as failure
    pub fn on_frame(&mut self, payload: &[u8]) {
        match AuthResponse::decode(payload) {
            Ok(response) => self.on_response(&response),
            Err(e) => {
                warn!("Undecodable authorization response: {}", e);
                self.status = AuthStatus::Fail;
                self.pending = false;
            }
        }
    }

    /// Start a heartbeat cycle: mark the session authorizing and send the request
    pub async fn heartbeat<T, D, P>(
        &mut self,
        modem: &mut Modem<T, D, P>,
        uid: &str,
    ) -> Result<(), SetupError>
    where
        T: Transport,
        D: DelayNs,
        P: OutputPin,
    {
        self.on_heartbeat_due();
        let sent = match self.request(uid).to_vec() {
            Ok(body) => modem.send(&body).await.is_ok(),
            Err(e) => {
                warn!("Failed to encode authorization request: {}", e);
                false
            }
        };
        if !sent {
            self.on_send_failed();
            return Err(SetupError::SendFailed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::modem::FrameReader;
    use crate::testing::{FakeClock, FakeDelay, RecordingPin, ScriptedTransport};
    use embassy_futures::block_on;

    const SUCCESS: AuthResponse = AuthResponse {
        api_id: 1,
        resp_code: RESP_CODE_SUCCESS,
    };

    fn session() -> AuthSession {
        AuthSession::new(1, 15)
    }

    #[test]
    fn starts_failed_and_first() {
        let session = session();
        assert_eq!(session.status(), AuthStatus::Fail);
        assert!(session.first_attempt());
        assert!(!session.is_pending());
    }

    #[test]
    fn times_out_without_response() {
        let mut session = session();
        session.on_heartbeat_due();
        for _ in 0..15 {
            session.on_second();
        }
        assert_eq!(session.status(), AuthStatus::Authorizing);
        session.on_second();
        assert_eq!(session.status(), AuthStatus::Fail);
        assert!(!session.is_pending());
    }

    #[test]
    fn response_before_timeout_succeeds() {
        let mut session = session();
        session.on_heartbeat_due();
        for _ in 0..3 {
            session.on_second();
        }
        assert_eq!(session.elapsed_seconds(), 3);
        session.on_frame(br#"{"apiId": 1, "respCode": 100}"#);
        assert_eq!(session.status(), AuthStatus::Success);
        assert!(!session.first_attempt());
    }

    #[test]
    fn late_response_is_ignored() {
        let mut session = session();
        session.on_heartbeat_due();
        for _ in 0..16 {
            session.on_second();
        }
        assert_eq!(session.elapsed_seconds(), 16);
        session.on_response(&SUCCESS);
        assert_eq!(session.status(), AuthStatus::Fail);
        assert!(session.first_attempt());
    }

    #[test]
    fn seconds_only_count_while_authorizing() {
        let mut session = session();
        session.on_second();
        assert_eq!(session.elapsed_seconds(), 0);

        session.on_heartbeat_due();
        session.on_response(&SUCCESS);
        session.on_second();
        assert_eq!(session.elapsed_seconds(), 0);
        assert_eq!(session.status(), AuthStatus::Success);
    }

    #[test]
    fn wrong_code_or_api_fails() {
        let mut session = session();
        session.on_heartbeat_due();
        session.on_response(&AuthResponse {
            api_id: 1,
            resp_code: 401,
        });
        assert_eq!(session.status(), AuthStatus::Fail);

        session.on_heartbeat_due();
        session.on_response(&AuthResponse {
            api_id: 2,
            resp_code: RESP_CODE_SUCCESS,
        });
        assert_eq!(session.status(), AuthStatus::Fail);

        session.on_heartbeat_due();
        session.on_frame(b"not json");
        assert_eq!(session.status(), AuthStatus::Fail);
    }

    #[test]
    fn success_is_reentered_on_next_heartbeat() {
        let mut session = session();
        session.on_heartbeat_due();
        session.on_response(&SUCCESS);
        session.on_heartbeat_due();
        assert_eq!(session.status(), AuthStatus::Authorizing);
        assert!(!session.first_attempt());
    }

    #[test]
    fn request_encoding() {
        let session = session();
        let body = session.request("0123456789abcdef").to_vec().unwrap();
        assert_eq!(body, br#"{"apiId":1,"UID":"0123456789abcdef"}"#);
    }

    #[test]
    fn response_ignores_extra_fields() {
        let resp = AuthResponse::decode(br#"{"respCode":100,"apiId":1,"msg":"ok"}"#).unwrap();
        assert_eq!(resp, SUCCESS);
    }

    #[test]
    fn heartbeat_sends_request_over_socket() {
        let clock = FakeClock::default();
        let transport = ScriptedTransport::new(clock.clone());
        let mut modem = Modem::new(
            transport.clone(),
            FakeDelay::new(clock),
            RecordingPin::default(),
            Config::default(),
        );
        transport.reply("AT+CIPSEND\r", "\r\n> ");
        transport.reply("{\"apiId\"", "\r\nSEND OK\r\n");

        let mut session = session();
        block_on(session.heartbeat(&mut modem, "UID-1")).unwrap();
        assert_eq!(session.status(), AuthStatus::Authorizing);
        assert_eq!(
            transport.writes()[1],
            b"{\"apiId\":1,\"UID\":\"UID-1\"}\x1a".to_vec()
        );
    }

    #[test]
    fn heartbeat_send_failure_fails_session() {
        let clock = FakeClock::default();
        let transport = ScriptedTransport::new(clock.clone());
        let mut modem = Modem::new(
            transport,
            FakeDelay::new(clock),
            RecordingPin::default(),
            Config::default(),
        );

        let mut session = session();
        assert_eq!(
            block_on(session.heartbeat(&mut modem, "UID-1")),
            Err(SetupError::SendFailed)
        );
        assert_eq!(session.status(), AuthStatus::Fail);
        assert!(!session.is_pending());
    }

    #[test]
    fn reply_inside_send_window_authorizes() {
        let clock = FakeClock::default();
        let transport = ScriptedTransport::new(clock.clone());
        let mut modem = Modem::new(
            transport.clone(),
            FakeDelay::new(clock),
            RecordingPin::default(),
            Config::default(),
        );
        transport.reply("AT+CIPSEND\r", "\r\n> ");
        transport.reply("{\"apiId\"", "\r\nSEND OK\r\n");
        transport.follow_up("{\"apiId\"", "\r\n+IPD,26:{\"apiId\":1,\"respCode\":100}", 800);

        let mut session = session();
        let mut frames = FrameReader::new(modem.config());
        block_on(session.heartbeat(&mut modem, "UID-1")).unwrap();
        assert_eq!(block_on(frames.poll(modem.engine())), Ok(26));
        session.on_frame(frames.payload());
        assert_eq!(session.status(), AuthStatus::Success);
    }
}

pub mod responses;

use super::{plain_cmd, EmptyResponse, Expect};
use atat::AtatCmd;
use responses::*;

#[derive(Clone, Debug)]
pub struct SetEcho {
    pub enable: bool,
}
impl AtatCmd for SetEcho {
    type Response = EmptyResponse;

    const MAX_LEN: usize = 5;

    fn write(&self, mut buf: &mut [u8]) -> usize {
        use embedded_io::Write;
        let buf_len = buf.len();
        write!(buf, "ATE{}\r", self.enable as u8).ok();
        buf_len - buf.len()
    }

    fn parse(
        &self,
        resp: Result<&[u8], atat::InternalError>,
    ) -> Result<Self::Response, atat::Error> {
        match resp {
            Ok(_) => Ok(EmptyResponse),
            Err(_) => Err(atat::Error::Parse),
        }
    }
}
impl Expect for SetEcho {}

plain_cmd!(
    /// Succeeds only once the SIM reports `READY`
    GetPinStatus,
    "AT+CPIN?\r",
    "+CPIN: READY",
    1000
);

plain_cmd!(PowerDown, "AT+CPOWD=1\r", "NORMAL POWER DOWN", 1000);

macro_rules! query_cmd {
    ($name:ident, $text:literal, $resp:ty) => {
        #[derive(Clone, Debug)]
        pub struct $name;

        impl AtatCmd for $name {
            type Response = $resp;

            const MAX_LEN: usize = $text.len();

            fn write(&self, buf: &mut [u8]) -> usize {
                let text = $text.as_bytes();
                buf[..text.len()].copy_from_slice(text);
                text.len()
            }

            fn parse(
                &self,
                resp: Result<&[u8], atat::InternalError>,
            ) -> Result<Self::Response, atat::Error> {
                resp.map_err(|_| atat::Error::Parse)
                    .and_then(<$resp>::from_response)
            }
        }

        impl Expect for $name {}
    };
}
pub(crate) use query_cmd;

query_cmd!(GetSignalQuality, "AT+CSQ\r", SignalQuality);
query_cmd!(GetRegistrationStatus, "AT+CGREG?\r", RegistrationStatus);
query_cmd!(GetAttachStatus, "AT+CGATT?\r", AttachStatus);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_command_text() {
        let mut buf = [0u8; 8];
        let len = SetEcho { enable: false }.write(&mut buf);
        assert_eq!(&buf[..len], b"ATE0\r");
        let len = SetEcho { enable: true }.write(&mut buf);
        assert_eq!(&buf[..len], b"ATE1\r");
    }

    #[test]
    fn signal_query_parses_typed_response() {
        let resp = GetSignalQuality
            .parse(Ok(&b"\r\n+CSQ: 18,99\r\n\r\nOK\r\n"[..]))
            .unwrap();
        assert_eq!(resp, SignalQuality { rssi: 18, ber: 99 });
    }
}

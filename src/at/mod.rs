pub mod cip;
pub mod general;

use atat::{atat_derive::AtatResp, nom::FindSubstring};

#[derive(Clone, Debug, PartialEq, AtatResp)]
pub struct EmptyResponse;

/// Response text a command must produce to count as answered.
///
/// Commands are matched on the raw response, the typed [`atat::AtatCmd::parse`]
/// only runs once this marker has been seen.
pub trait Expect: atat::AtatCmd {
    const EXPECT: &'static str = "OK";
}

/// Command without parameters whose response carries no data
macro_rules! plain_cmd {
    ($(#[$meta:meta])* $name:ident, $text:literal, $expect:literal, $timeout:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug)]
        pub struct $name;

        impl atat::AtatCmd for $name {
            type Response = $crate::at::EmptyResponse;

            const MAX_LEN: usize = $text.len();
            const MAX_TIMEOUT_MS: u32 = $timeout;

            fn write(&self, buf: &mut [u8]) -> usize {
                let text = $text.as_bytes();
                buf[..text.len()].copy_from_slice(text);
                text.len()
            }

            fn parse(
                &self,
                resp: Result<&[u8], atat::InternalError>,
            ) -> Result<Self::Response, atat::Error> {
                match resp {
                    Ok(_) => Ok($crate::at::EmptyResponse),
                    Err(_) => Err(atat::Error::Parse),
                }
            }
        }

        impl $crate::at::Expect for $name {
            const EXPECT: &'static str = $expect;
        }
    };
}
pub(crate) use plain_cmd;

plain_cmd!(
    /// Liveness probe
    AT,
    "AT\r",
    "OK",
    1000
);

/// Remainder of the line starting with `prefix`, e.g. `"23,0"` for `+CSQ: ` in `+CSQ: 23,0\r\n`
pub(crate) fn field_after<'a>(resp: &'a [u8], prefix: &str) -> Option<&'a str> {
    let start = resp.find_substring(prefix)? + prefix.len();
    let rest = &resp[start..];
    let end = rest
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(rest.len());
    core::str::from_utf8(&rest[..end]).ok().map(str::trim)
}

use atat::AtatResp;

use crate::at::field_after;

#[derive(Clone, Debug, PartialEq)]
pub struct SignalQuality {
    pub rssi: u8,
    pub ber: u8,
}
impl AtatResp for SignalQuality {}

impl SignalQuality {
    // +CSQ: 23,0
    pub fn from_response(resp: &[u8]) -> Result<Self, atat::Error> {
        let field = field_after(resp, "+CSQ: ").ok_or(atat::Error::Parse)?;
        let (rssi, ber) = field.split_once(',').ok_or(atat::Error::Parse)?;
        Ok(Self {
            rssi: rssi.trim().parse().map_err(|_| atat::Error::Parse)?,
            ber: ber.trim().parse().map_err(|_| atat::Error::Parse)?,
        })
    }

    /// rssi 99 means "not known or not detectable"
    pub fn is_known(&self) -> bool {
        self.rssi != 99
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationStatus {
    NotRegistered,
    Registered,
    Searching,
    Denied,
    Unknown,
    RegisteredRoaming,
}
impl AtatResp for RegistrationStatus {}

impl RegistrationStatus {
    // +CGREG: 0,1
    pub fn from_response(resp: &[u8]) -> Result<Self, atat::Error> {
        let field = field_after(resp, "+CGREG: ").ok_or(atat::Error::Parse)?;
        let stat = field.split(',').nth(1).ok_or(atat::Error::Parse)?;
        match stat.trim() {
            "0" => Ok(Self::NotRegistered),
            "1" => Ok(Self::Registered),
            "2" => Ok(Self::Searching),
            "3" => Ok(Self::Denied),
            "4" => Ok(Self::Unknown),
            "5" => Ok(Self::RegisteredRoaming),
            _ => Err(atat::Error::Parse),
        }
    }

    pub fn is_registered(&self) -> bool {
        matches!(self, Self::Registered | Self::RegisteredRoaming)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AttachStatus {
    pub attached: bool,
}
impl AtatResp for AttachStatus {}

impl AttachStatus {
    // +CGATT: 1
    pub fn from_response(resp: &[u8]) -> Result<Self, atat::Error> {
        match field_after(resp, "+CGATT: ").ok_or(atat::Error::Parse)? {
            "1" => Ok(Self { attached: true }),
            "0" => Ok(Self { attached: false }),
            _ => Err(atat::Error::Parse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_quality_rejects_garbage() {
        assert!(SignalQuality::from_response(b"+CSQ: ,\r\nOK").is_err());
        assert!(SignalQuality::from_response(b"OK").is_err());
        assert!(!SignalQuality::from_response(b"+CSQ: 99,99\r\n")
            .unwrap()
            .is_known());
    }

    #[test]
    fn registration_status_reads_second_field() {
        let status = RegistrationStatus::from_response(b"\r\n+CGREG: 0,5\r\n\r\nOK\r\n").unwrap();
        assert_eq!(status, RegistrationStatus::RegisteredRoaming);
        assert!(status.is_registered());
        assert_eq!(
            RegistrationStatus::from_response(b"+CGREG: 0,2\r\n").unwrap(),
            RegistrationStatus::Searching
        );
    }

    #[test]
    fn attach_status() {
        assert!(AttachStatus::from_response(b"+CGATT: 1\r\n\r\nOK").unwrap().attached);
        assert!(!AttachStatus::from_response(b"+CGATT: 0\r\n\r\nOK").unwrap().attached);
        assert!(AttachStatus::from_response(b"+CGATT: x\r\n").is_err());
    }
}

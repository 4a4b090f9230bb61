use embassy_time::Duration;

const fn parse_u32(value: &str) -> u32 {
    match u32::from_str_radix(value, 10) {
        Ok(v) => v,
        Err(_) => panic!("Invalid numeric value in config.yml"),
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub apn: &'static str,
    pub server_host: &'static str,
    pub server_port: u16,
    /// Value of the `apiId` field in both directions of the heartbeat
    pub api_id: u32,
    pub auth_period_ms: u32,
    pub auth_timeout_s: u32,
    /// Minimum acceptable `+CSQ` rssi
    pub signal_floor: u8,
    /// Address of the UID record in flash
    pub uid_addr: u32,

    pub power_key_hold: Duration,
    pub power_on_settle: Duration,
    pub frame_grace: Duration,
    pub frame_retry_cap: u8,
    pub retry_budget: u8,
}

impl Config {
    /// Values exported by `build.rs` from `config.yml`
    pub const fn from_build_env() -> Self {
        Self {
            apn: env!("APN"),
            server_host: env!("SERVER_HOST"),
            server_port: parse_u32(env!("SERVER_PORT")) as u16,
            api_id: parse_u32(env!("API_ID")),
            auth_period_ms: parse_u32(env!("AUTH_PERIOD_MS")),
            auth_timeout_s: parse_u32(env!("AUTH_TIMEOUT_S")),
            signal_floor: parse_u32(env!("SIGNAL_FLOOR")) as u8,
            uid_addr: parse_u32(env!("UID_ADDR")),
            ..Self::DEFAULT
        }
    }

    const DEFAULT: Self = Self {
        apn: "CMNET",
        server_host: "orange.55555.io",
        server_port: 31318,
        api_id: 1,
        auth_period_ms: 10_000,
        auth_timeout_s: 15,
        signal_floor: 10,
        uid_addr: 0xF000,
        power_key_hold: Duration::from_millis(2_000),
        power_on_settle: Duration::from_millis(3_000),
        frame_grace: Duration::from_millis(10),
        frame_retry_cap: 30,
        retry_budget: 5,
    };
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_env_keeps_protocol_timing() {
        let config = Config::from_build_env();
        assert!(!config.apn.is_empty());
        assert!(config.server_port > 0);
        assert_eq!(config.power_key_hold, Config::default().power_key_hold);
        assert_eq!(config.retry_budget, 5);
    }
}

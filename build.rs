use std::net::Ipv4Addr;
use std::str::FromStr;

#[derive(serde::Deserialize)]
struct Config {
    apn: String,
    server_host: String,
    server_port: usize,
    api_id: u32,
    auth_period_ms: u32,
    auth_timeout_s: u32,
    signal_floor: u8,
    uid_addr: u32,
}

impl Config {
    fn check(&self) {
        assert!(!self.apn.is_empty(), "apn is empty");
        assert!(self.apn.len() <= 32, "apn is too long");
        assert!(!self.server_host.is_empty(), "server_host is empty");
        assert!(
            !self.server_host.contains('"'),
            "server_host must not contain quotes"
        );
        if self.server_host.chars().all(|c| c.is_ascii_digit() || c == '.') {
            Ipv4Addr::from_str(&self.server_host).expect("server_host is an invalid address");
        }
        assert!(self.server_port > 0, "server_port is invalid");
        assert!(self.server_port < 65536, "server_port is invalid");
        assert!(self.auth_period_ms >= 1000, "auth_period_ms must be at least 1000");
        assert!(self.auth_timeout_s > 0, "auth_timeout_s must be positive");
        assert!(
            u64::from(self.auth_timeout_s) * 1000 <= u64::from(self.auth_period_ms) * 10,
            "auth_timeout_s is longer than ten heartbeat periods"
        );
        assert!(self.signal_floor <= 31, "signal_floor is above the CSQ range");
    }

    fn export_vars(&self) {
        println!("cargo:rustc-env=APN={}", self.apn);
        println!("cargo:rustc-env=SERVER_HOST={}", self.server_host);
        println!("cargo:rustc-env=SERVER_PORT={}", self.server_port);
        println!("cargo:rustc-env=API_ID={}", self.api_id);
        println!("cargo:rustc-env=AUTH_PERIOD_MS={}", self.auth_period_ms);
        println!("cargo:rustc-env=AUTH_TIMEOUT_S={}", self.auth_timeout_s);
        println!("cargo:rustc-env=SIGNAL_FLOOR={}", self.signal_floor);
        println!("cargo:rustc-env=UID_ADDR={}", self.uid_addr);
    }
}

fn main() {
    if std::env::var("CARGO_CFG_TARGET_ARCH").as_deref() == Ok("xtensa") {
        println!("cargo:rustc-link-arg-bins=-Tlinkall.x");
    }

    println!("cargo:rerun-if-changed=config.yml");
    let config = {
        let config_string = std::fs::read_to_string("config.yml").expect("config.yml not found");
        serde_yaml::from_str::<Config>(&config_string).expect("config.yml is not valid")
    };
    config.check();
    config.export_vars();
}

#[toml_cfg::toml_config]
pub struct Config {
    #[default("")]
    ssid: &'static str,
    #[default("")]
    password: &'static str,
    #[default("192.168.0.13")]
    broker_ip: &'static str,
    #[default(1883)]
    broker_port: u16,
    #[default("")]
    mqtt_user: &'static str,
    #[default("")]
    mqtt_pass: &'static str,
    #[default("windsensor")]
    client_id: &'static str,
    #[default("pentling/windsensor")]
    topic: &'static str,
}

pub const SOCKET_TIMEOUT: u64 = 120;
pub const BUFFER_SIZE: usize = 2048;
pub const STACK_TIMEOUT_SECS: u64 = 30;
pub const WIFI_RETRY_MS: u64 = 5000;
/// How often the session looks for bytes from the broker.
pub const RECEIVE_POLL_MS: u64 = 200;

//! Fixed configuration of the sensor node.
//!
//! Everything here is decided at build time. Deployment secrets (Wi-Fi,
//! broker credentials) live in the firmware crate's `cfg.toml`.

/// Deltas at or below this are contact bounce, not pulses.
pub const DEBOUNCE_THRESHOLD_MS: u64 = 10;
/// Velocity units per tick-per-second (1 tick/s ~ 1.8 km/h).
pub const SPEED_FACTOR: f64 = 1.8;
/// Nominal time between two analysis cycles.
pub const ANALYSIS_PERIOD_MS: u64 = 20_000;
/// An accepted delta only lowers the peak interval if it is longer than
/// the previous accepted delta divided by this.
pub const HYSTERESIS_DIVISOR: f64 = 1.8;
/// Startup value of the minimum interval, longer than any real pulse gap.
pub const MIN_INTERVAL_SENTINEL_MS: f64 = 60_000.0;
/// Shortest elapsed time a cycle is allowed to report.
pub const MIN_ELAPSED_MS: u64 = 1;
/// Timestamps held between two cycles. 20 ms pulses over 20 s need 1000.
pub const PULSE_WINDOW_CAPACITY: usize = 2048;

pub const HOUSEKEEPING_PERIOD_SECS: u64 = 60;
pub const WATCHDOG_TIMEOUT_SECS: u64 = 120;
pub const MAX_ERROR_COUNT: u32 = 100;
pub const LINK_DOWN_PENALTY: u32 = 25;
pub const RECONNECT_PENALTY: u32 = 1;
pub const RECONNECT_BACKOFF_SECS: u64 = 19;
pub const PUBLISH_ALL_SECS: u64 = 60;
pub const RESET_SETTLE_SECS: u64 = 5;
pub const LINK_DOWN_RETRY_SECS: u64 = 5;

pub const TOPIC_SIZE: usize = 70;
pub const PAYLOAD_SIZE: usize = 20;
pub const CHANNEL_SIZE: usize = 5;
/// Relays exposed on the control surface.
pub const MAX_ACTUATORS: usize = 4;

/// Constants the wind estimator needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindConfig {
    pub debounce_threshold_ms: u64,
    pub speed_factor: f64,
    pub analysis_period_ms: u64,
    pub hysteresis_divisor: f64,
}

impl Default for WindConfig {
    fn default() -> Self {
        WindConfig {
            debounce_threshold_ms: DEBOUNCE_THRESHOLD_MS,
            speed_factor: SPEED_FACTOR,
            analysis_period_ms: ANALYSIS_PERIOD_MS,
            hysteresis_divisor: HYSTERESIS_DIVISOR,
        }
    }
}

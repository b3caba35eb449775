//! Connectivity flags and the housekeeping policy.
//!
//! Both structs are shared by reference between tasks; all fields are
//! atomics so no lock is needed.
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use log::{error, info, warn};

use crate::config::{LINK_DOWN_PENALTY, MAX_ERROR_COUNT, RECONNECT_PENALTY};

#[derive(Debug, Default)]
pub struct LinkState {
    wifi: AtomicBool,
    broker: AtomicBool,
}

impl LinkState {
    pub const fn new() -> Self {
        LinkState {
            wifi: AtomicBool::new(false),
            broker: AtomicBool::new(false),
        }
    }

    pub fn set_wifi(&self, up: bool) {
        self.wifi.store(up, Ordering::Relaxed);
        if !up {
            self.broker.store(false, Ordering::Relaxed);
        }
    }

    pub fn set_broker(&self, up: bool) {
        self.broker.store(up, Ordering::Relaxed);
    }

    pub fn wifi_up(&self) -> bool {
        self.wifi.load(Ordering::Relaxed)
    }

    pub fn broker_up(&self) -> bool {
        self.wifi_up() && self.broker.load(Ordering::Relaxed)
    }
}

/// What the housekeeping task should do after one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Housekeeping {
    Healthy,
    /// Wi-Fi is down; retry soon instead of waiting a full period.
    LinkDown,
    /// Too many errors, restart the chip.
    Reset,
}

/// Error accounting behind the reset policy. Link-down rounds only count
/// once Wi-Fi has been up at least once, so a slow association at boot
/// cannot reset the chip.
#[derive(Debug, Default)]
pub struct Health {
    errors: AtomicU32,
    rounds: AtomicU32,
    link_seen: AtomicBool,
}

impl Health {
    pub const fn new() -> Self {
        Health {
            errors: AtomicU32::new(0),
            rounds: AtomicU32::new(0),
            link_seen: AtomicBool::new(false),
        }
    }

    pub fn record_link_down(&self) {
        self.errors.fetch_add(LINK_DOWN_PENALTY, Ordering::Relaxed);
    }

    pub fn record_reconnect_failure(&self) {
        self.errors.fetch_add(RECONNECT_PENALTY, Ordering::Relaxed);
    }

    pub fn error_count(&self) -> u32 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn rounds(&self) -> u32 {
        self.rounds.load(Ordering::Relaxed)
    }

    /// One housekeeping round. The caller feeds the watchdog every round
    /// regardless of the outcome.
    pub fn housekeeping(&self, wifi_up: bool) -> Housekeeping {
        let round = self.rounds.fetch_add(1, Ordering::Relaxed) + 1;
        let errors = self.error_count();
        info!("housekeeping: round {}, errors {}", round, errors);

        if errors > MAX_ERROR_COUNT {
            error!("housekeeping: error limit exceeded, resetting");
            return Housekeeping::Reset;
        }
        if wifi_up {
            self.link_seen.store(true, Ordering::Relaxed);
        } else if self.link_seen.load(Ordering::Relaxed) {
            warn!("housekeeping: wifi not connected");
            self.record_link_down();
            return Housekeeping::LinkDown;
        } else {
            info!("housekeeping: waiting for first wifi connection");
            return Housekeeping::LinkDown;
        }
        Housekeeping::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_needs_wifi() {
        let link = LinkState::new();
        link.set_broker(true);
        assert!(!link.broker_up());

        link.set_wifi(true);
        link.set_broker(true);
        assert!(link.broker_up());

        link.set_wifi(false);
        link.set_wifi(true);
        assert!(!link.broker_up());
    }

    #[test]
    fn link_down_rounds_lead_to_reset() {
        let health = Health::new();
        assert_eq!(health.housekeeping(true), Housekeeping::Healthy);

        for _ in 0..5 {
            assert_eq!(health.housekeeping(false), Housekeeping::LinkDown);
        }
        assert_eq!(health.error_count(), 125);
        assert_eq!(health.housekeeping(true), Housekeeping::Reset);
        assert_eq!(health.rounds(), 7);
    }

    #[test]
    fn slow_boot_association_is_not_penalized() {
        let health = Health::new();
        for _ in 0..10 {
            assert_eq!(health.housekeeping(false), Housekeeping::LinkDown);
        }
        assert_eq!(health.error_count(), 0);

        assert_eq!(health.housekeeping(true), Housekeeping::Healthy);
        assert_eq!(health.housekeeping(false), Housekeeping::LinkDown);
        assert_eq!(health.error_count(), LINK_DOWN_PENALTY);
    }

    #[test]
    fn reconnect_failures_count_once_each() {
        let health = Health::new();
        for _ in 0..MAX_ERROR_COUNT {
            health.record_reconnect_failure();
        }
        assert_eq!(health.housekeeping(true), Housekeeping::Healthy);
        health.record_reconnect_failure();
        assert_eq!(health.housekeeping(true), Housekeeping::Reset);
    }
}

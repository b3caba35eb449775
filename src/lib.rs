//! Wind sensor node: anemometer pulse analysis plus two MQTT-controlled
//! relays.
//!
//! The crate holds everything that does not depend on a particular chip.
//! The `firmware` crate wires it to the ESP32 peripherals and the network.
#![cfg_attr(not(test), no_std)]

pub mod capture;
pub mod config;
pub mod health;
pub mod mqtt;
pub mod relay;
pub mod wind;

pub use capture::{EdgeCapture, PulseChannel, PulseEvent, PulseWindow, WindowDrain};
pub use config::WindConfig;
pub use health::{Health, Housekeeping, LinkState};
pub use mqtt::{
    delivery_outcome, publish_reading, ChannelSink, ControlError, ControlSurface, Delivery,
    MqttChannel, MqttPacket, TelemetryError, TelemetrySink,
};
pub use relay::{Actuator, Relay, RelayError};
pub use wind::{EstimatorState, WindAnalyzer, WindReading};

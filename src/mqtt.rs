//! MQTT side of the node: packets, the relay control surface and the
//! telemetry sink the wind task publishes through.
//!
//! Topics are `<base>/<name>`. Relay actions arrive on
//! `<base>/<action>` with an integer payload; relay states go out on
//! `<base>/<state>` as `"0"` or `"1"`.
use core::fmt::{Display, Write as _};
use core::str::FromStr;

use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    channel::{Channel, Receiver, Sender},
};
use heapless::{String, Vec};
use log::{debug, error, info, warn};
use thiserror::Error;

use crate::config::{CHANNEL_SIZE, PAYLOAD_SIZE, TOPIC_SIZE};
use crate::health::LinkState;
use crate::relay::{Actuator, RelayError};
use crate::wind::WindReading;

pub type MqttChannel = Channel<CriticalSectionRawMutex, MqttPacket, CHANNEL_SIZE>;
pub type MqttSender<'a> = Sender<'a, CriticalSectionRawMutex, MqttPacket, CHANNEL_SIZE>;
pub type MqttReceiver<'a> = Receiver<'a, CriticalSectionRawMutex, MqttPacket, CHANNEL_SIZE>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("topic too long")]
    TopicTooLong,
    #[error("payload too long")]
    PayloadTooLong,
    #[error("no room for another actuator")]
    TooManyActuators,
    #[error("relay: {0}")]
    Relay(#[from] RelayError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TelemetryError {
    #[error("cannot build packet: {0}")]
    Packet(#[from] ControlError),
    #[error("outgoing queue is full")]
    QueueFull,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttPacket {
    topic: String<TOPIC_SIZE>,
    payload: String<PAYLOAD_SIZE>,
}

impl MqttPacket {
    /// Oversized topic or payload end up empty.
    pub fn new(topic: &str, payload: &str) -> Self {
        let topic_string = String::from_str(topic).unwrap_or_default();
        let payload_string = String::from_str(payload).unwrap_or_default();
        MqttPacket {
            topic: topic_string,
            payload: payload_string,
        }
    }

    /// Builds `<base>/<name>` carrying `value`.
    pub fn format(base: &str, name: &str, value: impl Display) -> Result<Self, ControlError> {
        let topic = join(base, name)?;
        let mut payload = String::<PAYLOAD_SIZE>::new();
        write!(&mut payload, "{}", value).map_err(|_| ControlError::PayloadTooLong)?;
        Ok(MqttPacket { topic, payload })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}

fn join(base: &str, name: &str) -> Result<String<TOPIC_SIZE>, ControlError> {
    let mut topic = String::<TOPIC_SIZE>::new();
    write!(&mut topic, "{}/{}", base, name).map_err(|_| ControlError::TopicTooLong)?;
    Ok(topic)
}

struct Binding<A> {
    action: String<TOPIC_SIZE>,
    state: String<TOPIC_SIZE>,
    actuator: A,
    publish_zero: bool,
}

/// Remote control of up to `N` actuators.
pub struct ControlSurface<A, const N: usize> {
    base: String<TOPIC_SIZE>,
    bindings: Vec<Binding<A>, N>,
}

impl<A: Actuator, const N: usize> ControlSurface<A, N> {
    pub fn new(base: &str) -> Result<Self, ControlError> {
        Ok(ControlSurface {
            base: String::from_str(base).map_err(|_| ControlError::TopicTooLong)?,
            bindings: Vec::new(),
        })
    }

    /// Binds `actuator` to `<base>/<action>` for commands and
    /// `<base>/<state>` for its reported state. With `publish_zero` unset
    /// an "off" state is only reported on forced publishes.
    pub fn register(
        &mut self,
        action: &str,
        state: &str,
        actuator: A,
        publish_zero: bool,
    ) -> Result<(), ControlError> {
        let binding = Binding {
            action: join(&self.base, action)?,
            state: join(&self.base, state)?,
            actuator,
            publish_zero,
        };
        info!("mqtt: action {} -> state {}", binding.action, binding.state);
        self.bindings
            .push(binding)
            .map_err(|_| ControlError::TooManyActuators)
    }

    /// Topics to (re)subscribe after each connect.
    pub fn subscriptions(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.action.as_str())
    }

    /// Dispatches an incoming message. `Ok(false)` means the topic is not
    /// one of ours.
    pub fn handle_message(&mut self, topic: &str, payload: &[u8]) -> Result<bool, ControlError> {
        let Some(binding) = self.bindings.iter_mut().find(|b| b.action.as_str() == topic) else {
            debug!("mqtt: ignoring message on {}", topic);
            return Ok(false);
        };
        info!("mqtt: action on {}", topic);
        binding.actuator.apply_payload(payload)?;
        Ok(true)
    }

    /// Current state of every actuator as packets. Zero states are
    /// dropped unless the binding publishes zeros or `force` is set.
    pub fn publish_all(&mut self, force: bool) -> Vec<MqttPacket, N> {
        let mut packets = Vec::new();
        for binding in self.bindings.iter_mut() {
            let on = match binding.actuator.get_state() {
                Ok(on) => on,
                Err(e) => {
                    error!("mqtt: cannot read {}: {}", binding.state, e);
                    continue;
                }
            };
            if !on && !(binding.publish_zero || force) {
                debug!("mqtt: discard {} = 0", binding.state);
                continue;
            }
            let packet = MqttPacket::new(&binding.state, if on { "1" } else { "0" });
            // Same capacity as `bindings`.
            packets.push(packet).ok();
        }
        packets
    }

    pub fn actuator_mut(&mut self, index: usize) -> Option<&mut A> {
        self.bindings.get_mut(index).map(|b| &mut b.actuator)
    }
}

/// Where the wind task sends its readings.
pub trait TelemetrySink {
    fn is_connected(&self) -> bool;
    fn publish(&mut self, metric: &str, value: f64) -> Result<(), TelemetryError>;
}

/// Publishes `wind` and `windpeak` if the sink is connected. Nothing is
/// kept for later: a disconnected cycle is a gap in the series.
pub fn publish_reading<S: TelemetrySink>(sink: &mut S, reading: &WindReading) -> bool {
    if !sink.is_connected() {
        debug!("telemetry: not connected, dropping wind reading");
        return false;
    }
    let mut all_sent = true;
    for (metric, value) in [("wind", reading.speed), ("windpeak", reading.peak_speed)] {
        if let Err(e) = sink.publish(metric, value) {
            warn!("telemetry: {} not published: {}", metric, e);
            all_sent = false;
        }
    }
    all_sent
}

/// MQTT v5 reason codes a publish or ping can fail with.
pub mod reason {
    /// PUBACK from a broker that accepted the message but has no subscriber.
    pub const NO_MATCHING_SUBSCRIBERS: u8 = 0x10;
    /// The client got some other packet while waiting for an ack.
    pub const IMPLEMENTATION_SPECIFIC_ERROR: u8 = 0x83;
    pub const PACKET_IDENTIFIER_NOT_FOUND: u8 = 0x92;
}

/// What a failed publish or ping means for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The broker has the message; nothing to do.
    Delivered,
    /// This one message or ack is lost, the connection is still usable.
    Dropped,
    /// Transport or broker disconnect; the session has to be rebuilt.
    Broken,
}

pub fn delivery_outcome(code: u8) -> Delivery {
    match code {
        reason::NO_MATCHING_SUBSCRIBERS => Delivery::Delivered,
        reason::IMPLEMENTATION_SPECIFIC_ERROR | reason::PACKET_IDENTIFIER_NOT_FOUND => {
            Delivery::Dropped
        }
        _ => Delivery::Broken,
    }
}

/// Telemetry sink feeding the MQTT task's outgoing queue.
pub struct ChannelSink<'a> {
    base: String<TOPIC_SIZE>,
    sender: MqttSender<'a>,
    link: &'a LinkState,
}

impl<'a> ChannelSink<'a> {
    pub fn new(base: &str, sender: MqttSender<'a>, link: &'a LinkState) -> Result<Self, ControlError> {
        Ok(ChannelSink {
            base: String::from_str(base).map_err(|_| ControlError::TopicTooLong)?,
            sender,
            link,
        })
    }
}

impl TelemetrySink for ChannelSink<'_> {
    fn is_connected(&self) -> bool {
        self.link.broker_up()
    }

    fn publish(&mut self, metric: &str, value: f64) -> Result<(), TelemetryError> {
        let packet = MqttPacket::format(&self.base, metric, format_args!("{:.3}", value))?;
        self.sender
            .try_send(packet)
            .map_err(|_| TelemetryError::QueueFull)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::tests::FakePin;
    use crate::relay::Relay;

    const BASE: &str = "pentling/windsensor";

    fn surface() -> ControlSurface<Relay<FakePin>, 2> {
        let mut surface = ControlSurface::new(BASE).unwrap();
        let down = Relay::new(FakePin::default(), false).unwrap();
        let up = Relay::new(FakePin::default(), false).unwrap();
        surface.register("r_down_enable", "r_down", down, false).unwrap();
        surface.register("r_up_enable", "r_up", up, false).unwrap();
        surface
    }

    #[test]
    fn subscriptions_are_action_topics() {
        let surface = surface();
        let topics: std::vec::Vec<&str> = surface.subscriptions().collect();
        assert_eq!(
            topics,
            ["pentling/windsensor/r_down_enable", "pentling/windsensor/r_up_enable"]
        );
    }

    #[test]
    fn action_switches_matching_relay() {
        let mut surface = surface();
        let handled = surface
            .handle_message("pentling/windsensor/r_up_enable", b"1")
            .unwrap();

        assert!(handled);
        assert!(surface.actuator_mut(1).unwrap().state().unwrap());
        assert!(!surface.actuator_mut(0).unwrap().state().unwrap());
    }

    #[test]
    fn unknown_topic_is_ignored() {
        let mut surface = surface();
        assert_eq!(surface.handle_message("pentling/windsensor/wind", b"1"), Ok(false));
    }

    #[test]
    fn bad_payload_is_reported() {
        let mut surface = surface();
        assert_eq!(
            surface.handle_message("pentling/windsensor/r_down_enable", b"yes"),
            Err(ControlError::Relay(RelayError::InvalidPayload))
        );
    }

    #[test]
    fn zero_states_only_on_force() {
        let mut surface = surface();
        surface
            .handle_message("pentling/windsensor/r_down_enable", b"1")
            .unwrap();

        let periodic = surface.publish_all(false);
        assert_eq!(periodic.len(), 1);
        assert_eq!(periodic[0].topic(), "pentling/windsensor/r_down");
        assert_eq!(periodic[0].payload(), "1");

        let forced = surface.publish_all(true);
        assert_eq!(forced.len(), 2);
        assert_eq!(forced[1].topic(), "pentling/windsensor/r_up");
        assert_eq!(forced[1].payload(), "0");
    }

    #[test]
    fn register_beyond_capacity_fails() {
        let mut surface = surface();
        let extra = Relay::new(FakePin::default(), false).unwrap();
        assert_eq!(
            surface.register("x_enable", "x", extra, true),
            Err(ControlError::TooManyActuators)
        );
    }

    #[test]
    fn packet_format_checks_sizes() {
        let packet = MqttPacket::format(BASE, "wind", 0.27).unwrap();
        assert_eq!(packet.topic(), "pentling/windsensor/wind");
        assert_eq!(packet.payload(), "0.27");

        let long = "x".repeat(TOPIC_SIZE);
        assert_eq!(
            MqttPacket::format(&long, "wind", 1),
            Err(ControlError::TopicTooLong)
        );
    }

    #[test]
    fn publish_without_subscribers_counts_as_delivered() {
        assert_eq!(
            delivery_outcome(reason::NO_MATCHING_SUBSCRIBERS),
            Delivery::Delivered
        );
    }

    #[test]
    fn stray_packet_during_ack_keeps_the_session() {
        assert_eq!(
            delivery_outcome(reason::IMPLEMENTATION_SPECIFIC_ERROR),
            Delivery::Dropped
        );
        assert_eq!(
            delivery_outcome(reason::PACKET_IDENTIFIER_NOT_FOUND),
            Delivery::Dropped
        );
    }

    #[test]
    fn transport_and_disconnect_codes_break_the_session() {
        // network error, buffer error, server shutting down, normal disconnect
        for code in [0xFF, 0xFE, 0x8B, 0x00] {
            assert_eq!(delivery_outcome(code), Delivery::Broken, "code {code:#04x}");
        }
    }
}

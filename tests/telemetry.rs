use wind_sensor::{
    publish_reading, ChannelSink, LinkState, MqttChannel, TelemetryError, TelemetrySink,
    WindReading,
};

const BASE: &str = "pentling/windsensor";

fn reading() -> WindReading {
    WindReading {
        speed: 0.27,
        peak_speed: 90.0,
        ticks: 3,
        edges: 4,
        elapsed_ms: 20_000,
        dropped: 0,
    }
}

#[derive(Default)]
struct RecordingSink {
    connected: bool,
    sent: Vec<(String, f64)>,
}

impl TelemetrySink for RecordingSink {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn publish(&mut self, metric: &str, value: f64) -> Result<(), TelemetryError> {
        self.sent.push((metric.to_string(), value));
        Ok(())
    }
}

#[test]
fn disconnected_sink_gets_nothing() {
    let mut sink = RecordingSink::default();
    assert!(!publish_reading(&mut sink, &reading()));
    assert!(sink.sent.is_empty());
}

#[test]
fn connected_sink_gets_wind_and_peak() {
    let mut sink = RecordingSink {
        connected: true,
        ..Default::default()
    };
    assert!(publish_reading(&mut sink, &reading()));
    assert_eq!(
        sink.sent,
        vec![("wind".to_string(), 0.27), ("windpeak".to_string(), 90.0)]
    );
}

#[test]
fn channel_sink_formats_topics() {
    let channel = MqttChannel::new();
    let link = LinkState::new();
    let mut sink = ChannelSink::new(BASE, channel.sender(), &link).unwrap();

    assert!(!publish_reading(&mut sink, &reading()));
    assert!(channel.try_receive().is_err());

    link.set_wifi(true);
    link.set_broker(true);
    assert!(publish_reading(&mut sink, &reading()));

    let wind = channel.try_receive().unwrap();
    assert_eq!(wind.topic(), "pentling/windsensor/wind");
    assert_eq!(wind.payload(), "0.270");
    let peak = channel.try_receive().unwrap();
    assert_eq!(peak.topic(), "pentling/windsensor/windpeak");
    assert_eq!(peak.payload(), "90.000");
}

#[test]
fn full_queue_drops_instead_of_blocking() {
    let channel = MqttChannel::new();
    let link = LinkState::new();
    link.set_wifi(true);
    link.set_broker(true);
    let mut sink = ChannelSink::new(BASE, channel.sender(), &link).unwrap();

    let mut results = Vec::new();
    for _ in 0..4 {
        results.push(publish_reading(&mut sink, &reading()));
    }
    // CHANNEL_SIZE is 5: two readings fit, the third only half.
    assert_eq!(results, [true, true, false, false]);
    assert_eq!(
        sink.publish("wind", 1.0),
        Err(TelemetryError::QueueFull)
    );
}

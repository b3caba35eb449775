use core::convert::Infallible;
use core::str::FromStr;

use embassy_futures::select::{select3, Either3};
use embassy_net::{tcp::ConnectError, tcp::TcpSocket, IpAddress, Stack};
use embassy_time::{Duration, Ticker, Timer};
use esp_hal::gpio::Output;
use esp_hal::rng::Rng;
use log::{debug, error, info, warn};
use rust_mqtt::client::{client::MqttClient, client_config::ClientConfig};
use rust_mqtt::packet::v5::publish_packet::QualityOfService;
use rust_mqtt::packet::v5::reason_codes::ReasonCode;
use thiserror::Error;
use wind_sensor::config::{MAX_ACTUATORS, PUBLISH_ALL_SECS, RECONNECT_BACKOFF_SECS};
use wind_sensor::mqtt::MqttReceiver;
use wind_sensor::{
    delivery_outcome, ControlSurface, Delivery, Health, LinkState, MqttPacket, Relay,
};

use crate::config::{BUFFER_SIZE, CONFIG, RECEIVE_POLL_MS, SOCKET_TIMEOUT};
use crate::utils::wait_for_stack;

pub type Relays = ControlSurface<Relay<Output<'static>>, MAX_ACTUATORS>;

#[derive(Debug, Error)]
enum SessionError {
    #[error("network stack not ready")]
    Stack,
    #[error("invalid broker address {0}")]
    Address(&'static str),
    #[error("tcp connect failed: {0:?}")]
    Tcp(ConnectError),
    #[error("broker replied {0:?}")]
    Mqtt(ReasonCode),
}

macro_rules! send {
    ($client:expr, $packet:expr) => {
        settle(
            "publish",
            $client
                .send_message(
                    $packet.topic(),
                    $packet.payload().as_bytes(),
                    QualityOfService::QoS1,
                    false,
                )
                .await,
        )?
    };
}

/// Keeps the session alive on failures that only cost one message.
fn settle(what: &str, result: Result<(), ReasonCode>) -> Result<(), SessionError> {
    let Err(code) = result else {
        return Ok(());
    };
    let raw = u8::from(code);
    match delivery_outcome(raw) {
        Delivery::Delivered => {
            debug!("mqtt: {what} accepted, no subscribers");
            Ok(())
        }
        Delivery::Dropped => {
            warn!("mqtt: {what} lost (reason {raw:#04x})");
            Ok(())
        }
        Delivery::Broken => Err(SessionError::Mqtt(ReasonCode::from(raw))),
    }
}

#[embassy_executor::task]
pub async fn mqtt_task(
    stack: Stack<'static>,
    outgoing: MqttReceiver<'static>,
    link: &'static LinkState,
    health: &'static Health,
    mut relays: Relays,
) {
    loop {
        let e = match session(stack, &outgoing, link, &mut relays).await {
            Ok(never) => match never {},
            Err(e) => e,
        };
        link.set_broker(false);
        health.record_reconnect_failure();
        error!("mqtt: {e}, reconnecting in {}s", RECONNECT_BACKOFF_SECS);
        Timer::after_secs(RECONNECT_BACKOFF_SECS).await;
    }
}

async fn session(
    stack: Stack<'static>,
    outgoing: &MqttReceiver<'static>,
    link: &LinkState,
    relays: &mut Relays,
) -> Result<Infallible, SessionError> {
    wait_for_stack(&stack)
        .await
        .map_err(|_| SessionError::Stack)?;
    info!("Got config: {:?}", stack.config_v4());

    let broker = (
        IpAddress::from_str(CONFIG.broker_ip).map_err(|_| SessionError::Address(CONFIG.broker_ip))?,
        CONFIG.broker_port,
    );
    debug!("Broker address: {:?}", broker);

    let mut tcp_rx = [0; BUFFER_SIZE];
    let mut tcp_tx = [0; BUFFER_SIZE];
    let mut socket = TcpSocket::new(stack, &mut tcp_rx, &mut tcp_tx);
    socket.set_timeout(Some(Duration::from_secs(SOCKET_TIMEOUT)));
    socket.connect(broker).await.map_err(SessionError::Tcp)?;

    let mut config: ClientConfig<'static, 16, Rng> = ClientConfig::new(
        rust_mqtt::client::client_config::MqttVersion::MQTTv5,
        Rng::new(),
    );
    config.add_max_subscribe_qos(QualityOfService::QoS1);
    config.add_client_id(CONFIG.client_id);
    config.add_username(CONFIG.mqtt_user);
    config.add_password(CONFIG.mqtt_pass);

    let mut mqtt_rx = [0; BUFFER_SIZE];
    let mut mqtt_tx = [0; BUFFER_SIZE];
    let mut client = MqttClient::new(
        socket,
        &mut mqtt_tx,
        BUFFER_SIZE,
        &mut mqtt_rx,
        BUFFER_SIZE,
        config,
    );

    client
        .connect_to_broker()
        .await
        .map_err(SessionError::Mqtt)?;
    for topic in relays.subscriptions() {
        client
            .subscribe_to_topic(topic)
            .await
            .map_err(SessionError::Mqtt)?;
        info!("mqtt: subscribed to {}", topic);
    }

    // Readings queued before the link dropped are stale.
    while outgoing.try_receive().is_ok() {}
    link.set_broker(true);
    info!("mqtt: connected to broker");

    let mut ticker = Ticker::every(Duration::from_secs(PUBLISH_ALL_SECS));
    loop {
        // The client is never inside the select: a read dropped halfway
        // through a packet would desync the stream.
        match select3(
            outgoing.receive(),
            ticker.next(),
            Timer::after_millis(RECEIVE_POLL_MS),
        )
        .await
        {
            Either3::First(packet) => {
                debug!("topic: {}, payload: {}", packet.topic(), packet.payload());
                send!(client, packet);
            }
            Either3::Second(()) => {
                settle("ping", client.send_ping().await)?;
                for state in relays.publish_all(false) {
                    send!(client, state);
                }
            }
            Either3::Third(()) => {}
        }

        loop {
            let packet = match client.receive_message_if_ready().await {
                Ok(Some((topic, payload))) => {
                    MqttPacket::new(topic, core::str::from_utf8(payload).unwrap_or_default())
                }
                Ok(None) => break,
                Err(code) => {
                    settle("receive", Err(code))?;
                    break;
                }
            };

            match relays.handle_message(packet.topic(), packet.payload().as_bytes()) {
                Ok(true) => {
                    for state in relays.publish_all(true) {
                        send!(client, state);
                    }
                }
                Ok(false) => {}
                Err(e) => warn!("mqtt: action on {} failed: {e}", packet.topic()),
            }
        }
    }
}

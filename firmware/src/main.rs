#![no_std]
#![no_main]

#[macro_use]
mod utils;
mod config;
mod tasks;

use embassy_executor::Spawner;
use embassy_net::StackResources;
use embassy_time::{Instant, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;
use log::{error, info};
use wind_sensor::{
    ChannelSink, ControlSurface, Health, LinkState, MqttChannel, PulseChannel, PulseWindow, Relay,
    WindAnalyzer, WindConfig,
};

use crate::config::CONFIG;
use crate::tasks::anemo_task::{edge_task, wind_task};
use crate::tasks::housekeeping_task::housekeeping_task;
use crate::tasks::mqtt_task::{mqtt_task, Relays};
use crate::tasks::wifi_task::{runner_task, wifi_task};

extern crate alloc;

esp_bootloader_esp_idf::esp_app_desc!();

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    error!("{info}");
    esp_hal::system::software_reset()
}

#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    esp_println::logger::init_logger_from_env();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(size: 72 * 1024);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);
    info!("Embassy initialized!");

    let link: &'static LinkState = mk_static!(LinkState, LinkState::new());
    let health: &'static Health = mk_static!(Health, Health::new());

    // Relays: GPIO3 (shared with UART RX) raises, GPIO0 lowers.
    let relay_up = Relay::new(
        Output::new(peripherals.GPIO3, Level::Low, OutputConfig::default()),
        false,
    )
    .expect("Fail creating up relay");
    let relay_down = Relay::new(
        Output::new(peripherals.GPIO0, Level::Low, OutputConfig::default()),
        false,
    )
    .expect("Fail creating down relay");

    let mut relays: Relays = ControlSurface::new(CONFIG.topic).expect("Invalid base topic");
    relays
        .register("r_down_enable", "r_down", relay_down, false)
        .expect("Fail registering down relay");
    relays
        .register("r_up_enable", "r_up", relay_up, false)
        .expect("Fail registering up relay");

    // Wind sensor: reed contact to ground, idle high.
    let anemo_pin = Input::new(peripherals.GPIO2, InputConfig::default().with_pull(Pull::Up));
    let pulses: &'static PulseChannel = mk_static!(PulseChannel, PulseChannel::new());
    let (capture, drain) = pulses.split();
    let scratch = mk_static!(PulseWindow, PulseWindow::new());
    let analyzer = WindAnalyzer::new(
        WindConfig::default(),
        drain,
        scratch,
        Instant::now().as_millis(),
    );

    let mqtt_channel: &'static MqttChannel = mk_static!(MqttChannel, MqttChannel::new());
    let sink = ChannelSink::new(CONFIG.topic, mqtt_channel.sender(), link)
        .expect("Invalid base topic");

    // WIFI
    let radio = mk_static!(
        esp_radio::Controller<'static>,
        esp_radio::init().expect("Failed to initialize radio")
    );
    let (controller, interfaces) = esp_radio::wifi::new(radio, peripherals.WIFI, Default::default())
        .expect("Failed to initialize WiFi controller");

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        mk_static!(StackResources<4>, StackResources::<4>::new()),
        seed,
    );

    let watchdog = TimerGroup::new(peripherals.TIMG1).wdt;

    spawner.must_spawn(edge_task(anemo_pin, capture));
    spawner.must_spawn(wind_task(analyzer, sink));
    spawner.must_spawn(wifi_task(controller, link));
    spawner.must_spawn(runner_task(runner));
    spawner.must_spawn(mqtt_task(
        stack,
        mqtt_channel.receiver(),
        link,
        health,
        relays,
    ));
    spawner.must_spawn(housekeeping_task(watchdog, link, health));

    loop {
        Timer::after_secs(3600).await;
    }
}

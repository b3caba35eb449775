//! anemo tasks
//!
//! `edge_task` timestamps every falling edge of the anemometer reed
//! contact; `wind_task` turns the collected edges into speed and peak
//! speed once per analysis period and hands them to the MQTT task.
use embassy_time::{Duration, Instant, Ticker};
use esp_hal::gpio::Input;
use log::{info, warn};
use wind_sensor::config::ANALYSIS_PERIOD_MS;
use wind_sensor::{publish_reading, ChannelSink, EdgeCapture, WindAnalyzer};

#[embassy_executor::task]
pub async fn edge_task(mut anemo_pin: Input<'static>, capture: EdgeCapture<'static>) {
    capture.enable();

    loop {
        anemo_pin.wait_for_falling_edge().await;
        capture.on_edge(Instant::now().as_millis());
    }
}

#[embassy_executor::task]
pub async fn wind_task(mut analyzer: WindAnalyzer<'static>, mut sink: ChannelSink<'static>) {
    let mut ticker = Ticker::every(Duration::from_millis(ANALYSIS_PERIOD_MS));

    loop {
        ticker.next().await;

        let reading = analyzer.run_cycle(Instant::now().as_millis());
        info!(
            "wind: {} ticks in {} ms -> speed {}, peak {}",
            reading.ticks, reading.elapsed_ms, reading.speed, reading.peak_speed
        );
        if !publish_reading(&mut sink, &reading) {
            warn!("wind: reading not published");
        }
    }
}

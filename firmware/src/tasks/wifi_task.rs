use crate::config::{CONFIG, WIFI_RETRY_MS};
use embassy_net::Runner;
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiDevice, WifiEvent};
use log::{error, info, warn};
use wind_sensor::LinkState;

#[embassy_executor::task]
pub async fn runner_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await;
}

#[embassy_executor::task]
pub async fn wifi_task(mut controller: WifiController<'static>, link: &'static LinkState) {
    // STA-only
    let client_cfg = ModeConfig::Client(
        ClientConfig::default()
            .with_ssid(CONFIG.ssid.into())
            .with_password(CONFIG.password.into()),
    );

    if let Err(e) = controller.set_config(&client_cfg) {
        error!("wifi: invalid configuration: {e:?}");
        return;
    }

    info!("Starting WiFi (STA)...");
    if let Err(e) = controller.start_async().await {
        error!("wifi: cannot start: {e:?}");
        return;
    }

    loop {
        match controller.connect_async().await {
            Ok(()) => {
                info!("STA connected");
                link.set_wifi(true);
                controller.wait_for_event(WifiEvent::StaDisconnected).await;
                link.set_wifi(false);
                warn!("STA disconnected, retrying in {}ms", WIFI_RETRY_MS);
            }
            Err(e) => {
                warn!("connect_async() failed: {e:?}. Retrying in {}ms", WIFI_RETRY_MS);
            }
        }
        embassy_time::Timer::after_millis(WIFI_RETRY_MS).await;
    }
}

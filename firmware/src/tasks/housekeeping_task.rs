//! housekeeping task
//!
//! Feeds the hardware watchdog and restarts the chip once too many
//! network errors have piled up.
use embassy_time::Timer;
use esp_hal::peripherals::TIMG1;
use esp_hal::time::Duration;
use esp_hal::timer::timg::{MwdtStage, Wdt};
use log::{error, info};
use wind_sensor::config::{
    HOUSEKEEPING_PERIOD_SECS, LINK_DOWN_RETRY_SECS, RESET_SETTLE_SECS, WATCHDOG_TIMEOUT_SECS,
};
use wind_sensor::{Health, Housekeeping, LinkState};

#[embassy_executor::task]
pub async fn housekeeping_task(
    mut watchdog: Wdt<TIMG1<'static>>,
    link: &'static LinkState,
    health: &'static Health,
) {
    watchdog.set_timeout(MwdtStage::Stage0, Duration::from_secs(WATCHDOG_TIMEOUT_SECS));
    watchdog.enable();

    loop {
        watchdog.feed();

        match health.housekeeping(link.wifi_up()) {
            Housekeeping::Reset => {
                error!("housekeeping: restarting in {}s", RESET_SETTLE_SECS);
                Timer::after_secs(RESET_SETTLE_SECS).await;
                esp_hal::system::software_reset();
            }
            Housekeeping::LinkDown => {
                Timer::after_secs(LINK_DOWN_RETRY_SECS).await;
            }
            Housekeeping::Healthy => {
                info!("{}", esp_alloc::HEAP.stats());
                Timer::after_secs(HOUSEKEEPING_PERIOD_SECS).await;
            }
        }
    }
}

pub mod anemo_task;
pub mod housekeeping_task;
pub mod mqtt_task;
pub mod wifi_task;

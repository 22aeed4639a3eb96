pub mod baro_task;
pub mod crsf_task;
pub mod dshot_task;
#[cfg(feature = "host-input")]
pub mod host_input_task;
pub mod imu_task;
pub mod telemetry_task;

use embassy_executor::task;
use embassy_stm32::i2c::I2c;
use embassy_stm32::peripherals::{DMA1_CH0, DMA1_CH7, I2C1};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_time::{Duration, Ticker};
use quad_flight_core::config::AltitudeConfig;

use crate::drivers::spl06::Spl06;

/// Barometer task: SPL06 pressure in Pa at the configured baro rate.
#[task]
pub async fn baro_task(
    mut i2c: I2c<'static, I2C1, DMA1_CH7, DMA1_CH0>,
    baro_tx: Sender<'static, CriticalSectionRawMutex, f32, 1>,
) {
    let mut baro = Spl06::new();
    if let Err(e) = baro.init(&mut i2c).await {
        // Flying without altitude hold is still possible.
        defmt::error!("baro init failed: {}", e);
        return;
    }

    let mut ticker = Ticker::every(Duration::from_hz(AltitudeConfig::DEFAULT.baro_rate_hz as u64));
    loop {
        ticker.next().await;
        match baro.read(&mut i2c) {
            Ok((pressure, _temp)) => {
                let _ = baro_tx.try_send(pressure);
            }
            Err(e) => defmt::debug!("baro read failed: {}", e),
        }
    }
}

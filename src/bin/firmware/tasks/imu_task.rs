use embassy_executor::task;
use embassy_stm32::peripherals::SPI1;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_time::{Duration, Instant, Ticker};
use quad_flight_core::config::LOOP_HZ;
use quad_flight_core::filter::Biquad3;

use crate::board::ImuSample;
use crate::drivers::ahrs::Mahony;
use crate::drivers::icm42688::{to_si, Icm42688, ImuBias};

const SAMPLE_RATE: f32 = LOOP_HZ as f32;
const GYRO_LPF_HZ: f32 = 80.0;
const ACCEL_LPF_HZ: f32 = 20.0;

/// IMU task: read, filter, fuse, publish. Runs at the control loop rate.
#[task]
pub async fn imu_task(
    mut imu: Icm42688<'static, SPI1>,
    bias: ImuBias,
    imu_tx: Sender<'static, CriticalSectionRawMutex, ImuSample, 1>,
) {
    let mut gyro_lpf = Biquad3::lowpass(GYRO_LPF_HZ, SAMPLE_RATE);
    let mut accel_lpf = Biquad3::lowpass(ACCEL_LPF_HZ, SAMPLE_RATE);
    let mut ahrs = Mahony::new(2.0, 0.005);

    let mut ticker = Ticker::every(Duration::from_hz(LOOP_HZ));
    let mut last = Instant::now();
    let mut errors: u32 = 0;

    loop {
        ticker.next().await;

        let now = Instant::now();
        let dt = ((now - last).as_micros() as f32 * 1e-6).clamp(0.0005, 0.01);
        last = now;

        let raw = match imu.read_raw() {
            Ok(raw) => raw,
            Err(e) => {
                errors = errors.wrapping_add(1);
                if errors % 1000 == 1 {
                    defmt::warn!("imu read failed: {} ({} total)", e, errors);
                }
                continue;
            }
        };

        let (accel, gyro) = to_si(raw, &bias);
        let gyro = gyro_lpf.filter(gyro);
        let accel = accel_lpf.filter(accel);
        ahrs.update(dt, gyro, accel);

        let _ = imu_tx.try_send(ImuSample { gyro, accel, euler: ahrs.euler() });
    }
}

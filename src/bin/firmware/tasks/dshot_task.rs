use core::sync::atomic::Ordering;

use embassy_executor::task;
use embassy_time::{Duration, Ticker};
use quad_flight_core::mixer::MOTORS;

use crate::drivers::dshot::{Dshot300, MOTOR_COMMANDS};

/// Streams the latest command to every ESC at 1 kHz. ESCs disarm themselves
/// when frames stop, so this runs from power-up (sending stop).
#[task]
pub async fn dshot_task(mut escs: [Dshot300; MOTORS]) {
    let mut ticker = Ticker::every(Duration::from_hz(1000));
    loop {
        ticker.next().await;
        for (esc, cmd) in escs.iter_mut().zip(MOTOR_COMMANDS.iter()) {
            esc.send_command(cmd.load(Ordering::Relaxed));
        }
    }
}

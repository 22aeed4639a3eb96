use core::fmt::Write;

use embassy_executor::task;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Receiver;
use embassy_time::{Duration, Ticker};
use embassy_usb::class::cdc_acm::Sender;

use crate::board::Telemetry;
use crate::usb::UsbDriver;

/// USB debug lines at 2 Hz while a terminal holds DTR.
#[task]
pub async fn telemetry_task(
    mut usb_tx: Sender<'static, UsbDriver>,
    telemetry_rx: Receiver<'static, CriticalSectionRawMutex, Telemetry, 1>,
) {
    let mut latest = Telemetry::default();
    let mut ticker = Ticker::every(Duration::from_hz(20));
    let mut tick: u32 = 0;

    loop {
        ticker.next().await;
        tick = tick.wrapping_add(1);

        if let Ok(t) = telemetry_rx.try_receive() {
            latest = t;
        }
        if !usb_tx.dtr() || tick % 10 != 0 {
            continue;
        }

        let a = latest.attitude;
        let mut line = heapless::String::<128>::new();
        let _ = write!(
            line,
            "[ATT] r={:.1} p={:.1} y={:.1} armed={} thr={:.2}\r\n",
            a.roll.to_degrees(),
            a.pitch.to_degrees(),
            a.yaw.to_degrees(),
            latest.armed as u8,
            latest.throttle,
        );
        let _ = usb_tx.write_packet(line.as_bytes()).await;

        let m = latest.motors;
        let mut line = heapless::String::<64>::new();
        let _ = write!(line, "[MOT] {:.2} {:.2} {:.2} {:.2}\r\n", m[0], m[1], m[2], m[3]);
        let _ = usb_tx.write_packet(line.as_bytes()).await;
    }
}

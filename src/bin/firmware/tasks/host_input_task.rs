use embassy_executor::task;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_usb::class::cdc_acm::Receiver;
use quad_flight_core::receiver::host::HostReport;

use crate::usb::UsbDriver;

/// Host-input reports arriving over USB CDC, one per packet.
#[task]
pub async fn host_input_task(
    mut usb_rx: Receiver<'static, UsbDriver>,
    report_tx: Sender<'static, CriticalSectionRawMutex, HostReport, 1>,
) {
    let mut buf = [0u8; 64];
    loop {
        usb_rx.wait_connection().await;
        defmt::info!("host input connected");
        while let Ok(n) = usb_rx.read_packet(&mut buf).await {
            match HostReport::from_le_bytes(&buf[..n]) {
                Some(report) => {
                    let _ = report_tx.try_send(report);
                }
                None => defmt::debug!("short host report: {} bytes", n),
            }
        }
        defmt::info!("host input disconnected");
    }
}

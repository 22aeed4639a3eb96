use embassy_executor::task;
use embassy_stm32::peripherals::{DMA1_CH2, UART4};
use embassy_stm32::usart::UartRx;

use crate::link::CrsfPipe;

/// CRSF pump: moves raw UART4 bytes into the pipe. Framing and validation
/// happen in the receiver, on the control loop.
#[task]
pub async fn crsf_task(mut uart_rx: UartRx<'static, UART4, DMA1_CH2>, pipe: &'static CrsfPipe) {
    let mut buf = [0u8; 64];
    loop {
        match uart_rx.read_until_idle(&mut buf).await {
            Ok(n) => {
                // A full pipe means the loop is stalled; newer bytes win later.
                let _ = pipe.try_write(&buf[..n]);
            }
            Err(_) => defmt::debug!("crsf uart error"),
        }
    }
}

use core::sync::atomic::{AtomicU16, Ordering};

use cortex_m::asm;
use embassy_stm32::gpio::{AnyPin, Level, Output, Speed};
use quad_flight_core::mixer::{dshot_command, dshot_frame, MotorOutput, MOTORS};

/// Latest DShot command per motor, written by the control loop and
/// streamed by `dshot_task`. Zero is motor stop.
pub static MOTOR_COMMANDS: [AtomicU16; MOTORS] =
    [AtomicU16::new(0), AtomicU16::new(0), AtomicU16::new(0), AtomicU16::new(0)];

/// Motor sink for the mixer: encodes into the shared command slots.
pub struct DshotMotors;

impl MotorOutput for DshotMotors {
    fn write_motors(&mut self, values: &[f32; MOTORS]) {
        for (slot, &v) in MOTOR_COMMANDS.iter().zip(values) {
            slot.store(dshot_command(v, true), Ordering::Relaxed);
        }
    }

    fn stop(&mut self) {
        for slot in &MOTOR_COMMANDS {
            slot.store(0, Ordering::Relaxed);
        }
    }
}

/// Bit-banged DShot300 on one pin. Cycle counts assume a 168 MHz core.
pub struct Dshot300 {
    pin: Output<'static, AnyPin>,
}

impl Dshot300 {
    const BIT_TOTAL_CYCLES: u32 = 560;
    const BIT1_HIGH_CYCLES: u32 = 420;
    const BIT0_HIGH_CYCLES: u32 = 210;

    pub fn new(pin: AnyPin) -> Self {
        Self { pin: Output::new(pin, Level::Low, Speed::VeryHigh) }
    }

    pub fn send_command(&mut self, command: u16) {
        let frame = dshot_frame(command, false);
        // Interrupts off: an ISR inside a bit corrupts the frame.
        critical_section::with(|_| {
            for bit in (0..16).rev() {
                let high = if (frame >> bit) & 1 != 0 {
                    Self::BIT1_HIGH_CYCLES
                } else {
                    Self::BIT0_HIGH_CYCLES
                };
                self.pin.set_high();
                asm::delay(high);
                self.pin.set_low();
                asm::delay(Self::BIT_TOTAL_CYCLES - high);
            }
        });
    }
}

use embassy_stm32::gpio::{AnyPin, Output};
use embassy_stm32::rcc::*;
use embassy_stm32::time::Hertz;
use embassy_stm32::{Config, Peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Receiver as ChannelRx, Sender as ChannelTx};
use embassy_time::Instant;
use quad_flight_core::error::{InitError, InitResult};
use quad_flight_core::mixer::{Mixer, MOTORS};
use quad_flight_core::state::Attitude;
use quad_flight_core::{Board, Receiver};

/// 168 MHz SYSCLK from the 8 MHz crystal, 48 MHz for USB.
pub fn init_peripherals() -> Peripherals {
    let mut config = Config::default();
    config.rcc.hse = Some(Hse {
        freq: Hertz(8_000_000),
        mode: HseMode::Oscillator,
    });
    config.rcc.pll_src = PllSource::HSE;
    config.rcc.pll = Some(Pll {
        prediv: PllPreDiv::DIV4,
        mul: PllMul::MUL168,
        divp: Some(PllPDiv::DIV2),
        divq: Some(PllQDiv::DIV7),
        divr: None,
    });
    config.rcc.sys = Sysclk::PLL1_P;
    config.rcc.ahb_pre = AHBPrescaler::DIV1;
    config.rcc.apb1_pre = APBPrescaler::DIV4;
    config.rcc.apb2_pre = APBPrescaler::DIV2;
    embassy_stm32::init(config)
}

/// One IMU read, already filtered and fused by `imu_task`.
#[derive(Clone, Copy, Default)]
pub struct ImuSample {
    pub gyro: [f32; 3],  // rad/s
    pub accel: [f32; 3], // g
    pub euler: [f32; 3], // rad, yaw in (-π, π]
}

/// Snapshot for the USB debug stream.
#[derive(Clone, Copy, Default)]
pub struct Telemetry {
    pub attitude: Attitude,
    pub armed: bool,
    pub throttle: f32,
    pub motors: [f32; MOTORS],
}

type Rx<T> = ChannelRx<'static, CriticalSectionRawMutex, T, 1>;
type Tx<T> = ChannelTx<'static, CriticalSectionRawMutex, T, 1>;

pub struct Stm32Board {
    imu_rx: Rx<ImuSample>,
    baro_rx: Rx<f32>,
    telemetry_tx: Tx<Telemetry>,
    led: Output<'static, AnyPin>,
    imu_ok: bool,
    euler: Option<[f32; 3]>,
    accel: Option<[f32; 3]>,
}

impl Stm32Board {
    /// `imu_ok` is the outcome of the async IMU bring-up done before the
    /// board is handed to the core.
    pub fn new(
        imu_rx: Rx<ImuSample>,
        baro_rx: Rx<f32>,
        telemetry_tx: Tx<Telemetry>,
        led: Output<'static, AnyPin>,
        imu_ok: bool,
    ) -> Self {
        Self { imu_rx, baro_rx, telemetry_tx, led, imu_ok, euler: None, accel: None }
    }
}

impl Board for Stm32Board {
    fn init(&mut self) -> InitResult {
        if !self.imu_ok {
            return Err(InitError::Board("ICM-42688 not responding"));
        }
        // Drop anything queued during calibration.
        while self.imu_rx.try_receive().is_ok() {}
        Ok(())
    }

    // One IMU sample feeds three steps: gyro here, the rest held for the
    // attitude and accelerometer steps of the same tick.
    fn get_gyro_rates(&mut self) -> Option<[f32; 3]> {
        let sample = self.imu_rx.try_receive().ok()?;
        self.euler = Some(sample.euler);
        self.accel = Some(sample.accel);
        Some(sample.gyro)
    }

    fn get_euler_angles(&mut self) -> Option<[f32; 3]> {
        self.euler.take()
    }

    fn get_accelerometer(&mut self) -> Option<[f32; 3]> {
        self.accel.take()
    }

    fn get_barometer(&mut self) -> Option<f32> {
        self.baro_rx.try_receive().ok()
    }

    fn get_microseconds(&self) -> u32 {
        Instant::now().as_micros() as u32
    }

    fn show_armed_status(&mut self, armed: bool) {
        // LED is active low.
        if armed {
            self.led.set_low();
        } else {
            self.led.set_high();
        }
    }

    fn do_serial_comms<R: Receiver, M: Mixer>(
        &mut self,
        attitude: &Attitude,
        armed: bool,
        receiver: &R,
        mixer: &M,
    ) {
        let _ = self.telemetry_tx.try_send(Telemetry {
            attitude: *attitude,
            armed,
            throttle: receiver.demands().throttle,
            motors: mixer.motor_values(),
        });
    }
}

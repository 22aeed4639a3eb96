#![no_std]
#![no_main]

mod board;
mod drivers;
mod link;
mod tasks;
mod usb;

use embassy_executor::Spawner;
use embassy_stm32::dma::NoDma;
use embassy_stm32::gpio::{Level, Output, Pin, Speed};
use embassy_stm32::i2c::I2c;
use embassy_stm32::spi::{Config as SpiConfig, Spi};
use embassy_stm32::time::Hertz;
use embassy_stm32::usart::{Config as UsartConfig, Uart};
use embassy_stm32::{bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Ticker, Timer};
use quad_flight_core::altitude::KalmanAltitude;
use quad_flight_core::config::{AltitudeConfig, ReceiverConfig, StabilizerConfig, LOOP_HZ};
use quad_flight_core::mixer::QuadXMixer;
use quad_flight_core::stabilizer::PidStabilizer;
use quad_flight_core::FlightOrchestrator;
use {defmt_rtt as _, panic_probe as _};

use crate::board::{ImuSample, Stm32Board, Telemetry};
use crate::drivers::dshot::{Dshot300, DshotMotors};
use crate::drivers::icm42688::{Icm42688, ImuBias};
use crate::link::{CrsfPipe, EmbassyClock};

// ── Inter-task plumbing ───────────────────────────────────────────────────────
//  Cap=1: the control loop always wants the latest sample.
static IMU_CHAN: Channel<CriticalSectionRawMutex, ImuSample, 1> = Channel::new();
static BARO_CHAN: Channel<CriticalSectionRawMutex, f32, 1> = Channel::new();
static TELEMETRY_CHAN: Channel<CriticalSectionRawMutex, Telemetry, 1> = Channel::new();
#[cfg(feature = "host-input")]
static HOST_CHAN: Channel<CriticalSectionRawMutex, quad_flight_core::receiver::host::HostReport, 1> =
    Channel::new();
static CRSF_PIPE: CrsfPipe = CrsfPipe::new();

const CALIBRATION_SAMPLES: usize = 100;

bind_interrupts!(struct Irqs {
    I2C1_EV => embassy_stm32::i2c::EventInterruptHandler<peripherals::I2C1>;
    I2C1_ER => embassy_stm32::i2c::ErrorInterruptHandler<peripherals::I2C1>;
    UART4   => embassy_stm32::usart::InterruptHandler<peripherals::UART4>;
});

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // 1. Clocks (168 MHz PLL)
    let p = board::init_peripherals();

    // 2. USB CDC-ACM: debug out, host-input reports in
    let (usb_dev, usb_serial) = usb::init(p.USB_OTG_FS, p.PA12, p.PA11);
    spawner.must_spawn(usb::usb_task(usb_dev));
    let (usb_tx, _usb_rx) = usb_serial.split();

    // 3. I2C1 @ 400 kHz: SPL06 baro (SCL=PB8, SDA=PB9)
    let i2c = I2c::new(
        p.I2C1,
        p.PB8,
        p.PB9,
        Irqs,
        p.DMA1_CH7,
        p.DMA1_CH0,
        Hertz(400_000),
        Default::default(),
    );

    // 4. SPI1 @ 10 MHz: ICM-42688 (SCK=PA5, MOSI=PA7, MISO=PA6, CS=PB12)
    let mut spi_config = SpiConfig::default();
    spi_config.frequency = Hertz(10_000_000);
    let spi = Spi::new(p.SPI1, p.PA5, p.PA7, p.PA6, NoDma, NoDma, spi_config);
    let cs = Output::new(p.PB12.degrade(), Level::High, Speed::VeryHigh);
    let mut imu = Icm42688::new(spi, cs);

    // 5. ESCs, streaming stop until the core arms
    let escs = [
        Dshot300::new(p.PB0.degrade()),
        Dshot300::new(p.PB1.degrade()),
        Dshot300::new(p.PA3.degrade()),
        Dshot300::new(p.PA2.degrade()),
    ];
    spawner.must_spawn(tasks::dshot_task::dshot_task(escs));

    // 6. CRSF/ELRS UART4 @ 420000 (TX=PA0, RX=PA1)
    let mut crsf_config = UsartConfig::default();
    crsf_config.baudrate = 420_000;
    let crsf_uart = match Uart::new(
        p.UART4,
        p.PA1,
        p.PA0,
        Irqs,
        p.DMA1_CH4,
        p.DMA1_CH2,
        crsf_config,
    ) {
        Ok(uart) => uart,
        Err(_) => defmt::panic!("UART4 config rejected"),
    };
    let (_crsf_tx, crsf_rx) = crsf_uart.split();

    // 7. Armed LED (PC13, active low)
    let mut led = Output::new(p.PC13.degrade(), Level::High, Speed::Low);

    // 8. IMU bring-up and bench calibration (vehicle level, at rest)
    Timer::after(Duration::from_millis(100)).await;
    let imu_ok = match imu.init().await {
        Ok(()) => true,
        Err(e) => {
            defmt::error!("imu init failed: {}", e);
            false
        }
    };
    led.set_low();
    let bias = ImuBias::measure(&mut imu, CALIBRATION_SAMPLES).await;
    led.set_high();
    defmt::info!("imu bias gyro={} accel={}", bias.gyro, bias.accel);

    // 9. Producers
    spawner.must_spawn(tasks::imu_task::imu_task(imu, bias, IMU_CHAN.sender()));
    spawner.must_spawn(tasks::baro_task::baro_task(i2c, BARO_CHAN.sender()));
    spawner.must_spawn(tasks::crsf_task::crsf_task(crsf_rx, &CRSF_PIPE));
    spawner.must_spawn(tasks::telemetry_task::telemetry_task(usb_tx, TELEMETRY_CHAN.receiver()));
    #[cfg(feature = "host-input")]
    spawner.must_spawn(tasks::host_input_task::host_input_task(_usb_rx, HOST_CHAN.sender()));

    // 10. Flight core
    #[cfg(not(feature = "host-input"))]
    let receiver = quad_flight_core::receiver::crsf::CrsfReceiver::new(
        link::PipeSource(&CRSF_PIPE),
        EmbassyClock,
        ReceiverConfig::DEFAULT,
    );
    #[cfg(feature = "host-input")]
    let receiver = quad_flight_core::receiver::host::HostInputReceiver::new(
        link::ChannelReports(HOST_CHAN.receiver()),
        EmbassyClock,
        ReceiverConfig::DEFAULT,
    );

    let board = Stm32Board::new(
        IMU_CHAN.receiver(),
        BARO_CHAN.receiver(),
        TELEMETRY_CHAN.sender(),
        led,
        imu_ok,
    );
    let mut core = match FlightOrchestrator::init(
        board,
        receiver,
        PidStabilizer::new(StabilizerConfig::DEFAULT),
        KalmanAltitude::new(AltitudeConfig::DEFAULT),
        QuadXMixer::new(DshotMotors),
    ) {
        Ok(core) => core,
        Err(e) => defmt::panic!("flight core init failed: {}", e),
    };

    // 11. Control loop
    let mut ticker = Ticker::every(Duration::from_hz(LOOP_HZ));
    loop {
        core.tick();
        ticker.next().await;
    }
}

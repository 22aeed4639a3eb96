use embassy_stm32::dma::NoDma;
use embassy_stm32::gpio::{AnyPin, Output};
use embassy_stm32::spi::{Error, Instance, Spi};
use embassy_time::{Duration, Timer};

const REG_DEVICE_CONFIG: u8 = 0x11;
const REG_ACCEL_DATA_X1: u8 = 0x1F;
const REG_PWR_MGMT0: u8 = 0x4E;
const REG_WHO_AM_I: u8 = 0x75;

const WHO_AM_I: u8 = 0x47;

/// ±16 g full scale
const ACCEL_LSB_PER_G: f32 = 2048.0;
/// ±2000 dps full scale
const GYRO_LSB_PER_DPS: f32 = 16.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum ImuError {
    Bus,
    WrongId(u8),
}

impl From<Error> for ImuError {
    fn from(_: Error) -> Self {
        ImuError::Bus
    }
}

/// One raw burst: accel then gyro, sensor LSB.
pub type RawSample = ([i16; 3], [i16; 3]);

pub struct Icm42688<'d, T: Instance> {
    spi: Spi<'d, T, NoDma, NoDma>,
    cs: Output<'d, AnyPin>,
}

impl<'d, T: Instance> Icm42688<'d, T> {
    pub fn new(spi: Spi<'d, T, NoDma, NoDma>, cs: Output<'d, AnyPin>) -> Self {
        Self { spi, cs }
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), ImuError> {
        self.cs.set_low();
        let res = self.spi.blocking_write(&[reg & 0x7F, value]);
        self.cs.set_high();
        res.map_err(ImuError::from)
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, ImuError> {
        let mut rx = [0u8; 2];
        self.cs.set_low();
        let res = self.spi.blocking_transfer(&mut rx, &[reg | 0x80, 0x00]);
        self.cs.set_high();
        res?;
        Ok(rx[1])
    }

    /// Soft reset, identity check, gyro + accel in low-noise mode.
    pub async fn init(&mut self) -> Result<(), ImuError> {
        self.write_reg(REG_DEVICE_CONFIG, 0x01)?;
        Timer::after(Duration::from_millis(10)).await;

        let id = self.read_reg(REG_WHO_AM_I)?;
        if id != WHO_AM_I {
            return Err(ImuError::WrongId(id));
        }

        self.write_reg(REG_PWR_MGMT0, 0x0F)?;
        Timer::after(Duration::from_millis(50)).await;
        Ok(())
    }

    pub fn read_raw(&mut self) -> Result<RawSample, ImuError> {
        let mut tx = [0u8; 13];
        tx[0] = REG_ACCEL_DATA_X1 | 0x80;
        let mut rx = [0u8; 13];

        self.cs.set_low();
        let res = self.spi.blocking_transfer(&mut rx, &tx);
        self.cs.set_high();
        res?;

        let word = |i: usize| i16::from_be_bytes([rx[i], rx[i + 1]]);
        Ok(([word(1), word(3), word(5)], [word(7), word(9), word(11)]))
    }
}

/// Bias-corrected raw sample to (accel in g, gyro in rad/s).
pub fn to_si(raw: RawSample, bias: &ImuBias) -> ([f32; 3], [f32; 3]) {
    let mut accel = [0.0; 3];
    let mut gyro = [0.0; 3];
    for i in 0..3 {
        accel[i] = (raw.0[i] as f32 - bias.accel[i]) / ACCEL_LSB_PER_G;
        gyro[i] = ((raw.1[i] as f32 - bias.gyro[i]) / GYRO_LSB_PER_DPS).to_radians();
    }
    (accel, gyro)
}

/// Static offsets in sensor LSB, measured on the bench at start-up.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImuBias {
    pub accel: [f32; 3],
    pub gyro: [f32; 3],
}

impl ImuBias {
    /// Average `samples` readings of a vehicle at rest, level. The z axis
    /// keeps its 1 g.
    pub async fn measure<T: Instance>(imu: &mut Icm42688<'_, T>, samples: usize) -> Self {
        let mut sum = Self::default();
        let mut n = 0usize;
        for _ in 0..samples {
            if let Ok((accel, gyro)) = imu.read_raw() {
                for j in 0..3 {
                    sum.accel[j] += accel[j] as f32;
                    sum.gyro[j] += gyro[j] as f32;
                }
                n += 1;
            }
            Timer::after(Duration::from_millis(10)).await;
        }
        if n == 0 {
            return sum;
        }
        for j in 0..3 {
            sum.accel[j] /= n as f32;
            sum.gyro[j] /= n as f32;
        }
        sum.accel[2] -= ACCEL_LSB_PER_G;
        sum
    }
}

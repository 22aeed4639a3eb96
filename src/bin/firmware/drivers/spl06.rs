use embassy_stm32::i2c::{Error, I2c, Instance, RxDma, TxDma};
use embassy_time::{Duration, Timer};

const ADDR: u8 = 0x76;

const REG_PSR_B2: u8 = 0x00;
const REG_TMP_B2: u8 = 0x03;
const REG_PRS_CFG: u8 = 0x06;
const REG_TMP_CFG: u8 = 0x07;
const REG_MEAS_CFG: u8 = 0x08;
const REG_RESET: u8 = 0x0C;
const REG_ID: u8 = 0x0D;
const REG_COEF: u8 = 0x10;

const CHIP_ID: u8 = 0x10;

/// Scale factor for 8x oversampling, pressure and temperature alike.
const SCALE_8X: f32 = 7_864_320.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum BaroError {
    Bus,
    WrongId(u8),
}

impl From<Error> for BaroError {
    fn from(_: Error) -> Self {
        BaroError::Bus
    }
}

#[derive(Default, Debug, Clone, Copy)]
struct Coeffs {
    c0: i32,
    c1: i32,
    c00: i32,
    c10: i32,
    c01: i32,
    c11: i32,
    c20: i32,
    c21: i32,
    c30: i32,
}

/// Sign-extend the low `bits` of `raw`.
fn sign_extend(raw: i32, bits: u32) -> i32 {
    let shift = 32 - bits;
    (raw << shift) >> shift
}

impl Coeffs {
    fn parse(b: &[u8; 18]) -> Self {
        let u = |i: usize| b[i] as i32;
        let be16 = |i: usize| i16::from_be_bytes([b[i], b[i + 1]]) as i32;
        Self {
            c0: sign_extend((u(0) << 4) | (u(1) >> 4), 12),
            c1: sign_extend(((u(1) & 0x0F) << 8) | u(2), 12),
            c00: sign_extend((u(3) << 12) | (u(4) << 4) | (u(5) >> 4), 20),
            c10: sign_extend(((u(5) & 0x0F) << 16) | (u(6) << 8) | u(7), 20),
            c01: be16(8),
            c11: be16(10),
            c20: be16(12),
            c21: be16(14),
            c30: be16(16),
        }
    }

    /// Compensated pressure (Pa) from scaled raw readings.
    fn pressure(&self, p: f32, t: f32) -> f32 {
        self.c00 as f32
            + p * (self.c10 as f32 + p * (self.c20 as f32 + p * self.c30 as f32))
            + t * self.c01 as f32
            + t * p * (self.c11 as f32 + p * self.c21 as f32)
    }

    fn temperature(&self, t: f32) -> f32 {
        self.c0 as f32 * 0.5 + self.c1 as f32 * t
    }
}

pub struct Spl06 {
    coeffs: Coeffs,
}

impl Spl06 {
    pub fn new() -> Self {
        Self { coeffs: Coeffs::default() }
    }

    pub async fn init<T: Instance, Tx: TxDma<T>, Rx: RxDma<T>>(
        &mut self,
        i2c: &mut I2c<'_, T, Tx, Rx>,
    ) -> Result<(), BaroError> {
        i2c.blocking_write(ADDR, &[REG_RESET, 0x09])?;
        Timer::after(Duration::from_millis(50)).await;

        let mut id = [0u8; 1];
        i2c.blocking_write_read(ADDR, &[REG_ID], &mut id)?;
        if id[0] != CHIP_ID {
            return Err(BaroError::WrongId(id[0]));
        }

        let mut coef = [0u8; 18];
        i2c.blocking_write_read(ADDR, &[REG_COEF], &mut coef)?;
        self.coeffs = Coeffs::parse(&coef);

        // 16 Hz, 8x oversampling on both; temperature from the external sensor.
        i2c.blocking_write(ADDR, &[REG_PRS_CFG, 0x43])?;
        i2c.blocking_write(ADDR, &[REG_TMP_CFG, 0x83])?;
        // Continuous pressure + temperature
        i2c.blocking_write(ADDR, &[REG_MEAS_CFG, 0x07])?;
        Timer::after(Duration::from_millis(50)).await;
        Ok(())
    }

    fn read_24<T: Instance, Tx: TxDma<T>, Rx: RxDma<T>>(
        i2c: &mut I2c<'_, T, Tx, Rx>,
        reg: u8,
    ) -> Result<f32, BaroError> {
        let mut b = [0u8; 3];
        i2c.blocking_write_read(ADDR, &[reg], &mut b)?;
        let raw = ((b[0] as i32) << 16) | ((b[1] as i32) << 8) | b[2] as i32;
        Ok(sign_extend(raw, 24) as f32)
    }

    /// Returns (pressure Pa, temperature °C).
    pub fn read<T: Instance, Tx: TxDma<T>, Rx: RxDma<T>>(
        &mut self,
        i2c: &mut I2c<'_, T, Tx, Rx>,
    ) -> Result<(f32, f32), BaroError> {
        let p = Self::read_24(i2c, REG_PSR_B2)? / SCALE_8X;
        let t = Self::read_24(i2c, REG_TMP_B2)? / SCALE_8X;
        Ok((self.coeffs.pressure(p, t), self.coeffs.temperature(t)))
    }
}

//! Vertical estimation and altitude hold.

use micromath::F32Ext;

use crate::config::{AltitudeConfig, LOOP_HZ};
use crate::error::{InitError, InitResult};
use crate::filter::Pt1Filter;
use crate::state::Demands;

pub trait AltitudeEstimator {
    fn init(&mut self) -> InitResult {
        Ok(())
    }

    /// Altitude-hold overlay on the stabilized demands.
    fn modify_demands(&mut self, demands: &mut Demands);

    /// Static pressure (Pa). `armed` tells the estimator whether it may
    /// re-zero its ground reference.
    fn update_baro(&mut self, armed: bool, pressure: f32, timestamp_us: u32);

    /// Body-frame specific force (g).
    fn update_accel(&mut self, accel_gs: &[f32; 3], timestamp_us: u32);

    /// Aux code changed.
    fn handle_aux_switch(&mut self, demands: &Demands);
}

const GRAVITY: f32 = 9.806_65;
const SEA_LEVEL_PA: f32 = 101_325.0;

/// Hypsometric approximation, metres above the standard sea-level pressure.
pub fn pressure_to_altitude(pressure_pa: f32) -> f32 {
    44_330.0 * (1.0 - (pressure_pa / SEA_LEVEL_PA).powf(1.0 / 5.255))
}

// ── Kalman filter ─────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct VerticalState {
    pub position: f32, // m above ground reference
    pub velocity: f32, // m/s, up positive
}

/// Two-state (position, velocity) filter: accelerometer drives the model,
/// barometer altitude is the measurement.
pub struct VerticalKalman {
    x: [f32; 2],
    p: [[f32; 2]; 2],
    q: [f32; 2],
    r: f32,
}

impl VerticalKalman {
    pub fn new(q_pos: f32, q_vel: f32, r: f32) -> Self {
        Self {
            x: [0.0, 0.0],
            p: [[100.0, 0.0], [0.0, 100.0]],
            q: [q_pos, q_vel],
            r,
        }
    }

    /// Propagate by `dt` seconds under vertical acceleration `accel_z` (m/s²,
    /// earth frame, gravity removed).
    pub fn predict(&mut self, dt: f32, accel_z: f32) {
        self.x[0] += self.x[1] * dt + 0.5 * accel_z * dt * dt;
        self.x[1] += accel_z * dt;

        // P = F P F' + Q with F = [[1, dt], [0, 1]]
        let [[p00, p01], [p10, p11]] = self.p;
        self.p = [
            [p00 + dt * (p10 + p01) + dt * dt * p11 + self.q[0], p01 + dt * p11],
            [p10 + dt * p11, p11 + self.q[1]],
        ];
    }

    /// Correct with a measured altitude (m).
    pub fn update(&mut self, measured: f32) {
        let s = self.p[0][0] + self.r;
        let k0 = self.p[0][0] / s;
        let k1 = self.p[1][0] / s;

        let innovation = measured - self.x[0];
        self.x[0] += k0 * innovation;
        self.x[1] += k1 * innovation;

        let [[p00, p01], _] = self.p;
        self.p[0][0] -= k0 * p00;
        self.p[0][1] -= k0 * p01;
        self.p[1][0] -= k1 * p00;
        self.p[1][1] -= k1 * p01;
    }

    pub fn state(&self) -> VerticalState {
        VerticalState { position: self.x[0], velocity: self.x[1] }
    }
}

// ── Estimator + hold ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
struct HoldTarget {
    altitude: f32,
    hover_throttle: f32,
}

pub struct KalmanAltitude {
    cfg: AltitudeConfig,
    kalman: VerticalKalman,
    baro_lpf: Pt1Filter,
    ground_alt: Option<f32>,
    last_accel_us: Option<u32>,
    hold: Option<HoldTarget>,
    vel_integral: f32,
    prev_velocity: f32,
}

impl KalmanAltitude {
    pub fn new(cfg: AltitudeConfig) -> Self {
        Self {
            cfg,
            kalman: VerticalKalman::new(cfg.q_pos, cfg.q_vel, cfg.r_baro),
            baro_lpf: Pt1Filter::new(cfg.baro_cutoff_hz, cfg.baro_rate_hz),
            ground_alt: None,
            last_accel_us: None,
            hold: None,
            vel_integral: 0.0,
            prev_velocity: 0.0,
        }
    }

    pub fn estimate(&self) -> VerticalState {
        self.kalman.state()
    }

    pub fn holding(&self) -> bool {
        self.hold.is_some()
    }

    pub fn hold_altitude(&self) -> Option<f32> {
        self.hold.map(|h| h.altitude)
    }
}

impl AltitudeEstimator for KalmanAltitude {
    fn init(&mut self) -> InitResult {
        let c = &self.cfg;
        if !(c.r_baro > 0.0 && c.baro_rate_hz > 0.0) {
            return Err(InitError::Altitude("baro noise and rate must be positive"));
        }
        if c.throttle_min >= c.throttle_max {
            return Err(InitError::Altitude("empty hold throttle range"));
        }
        Ok(())
    }

    fn modify_demands(&mut self, demands: &mut Demands) {
        let Some(hold) = self.hold else {
            return;
        };
        let dt = 1.0 / LOOP_HZ as f32;
        let est = self.kalman.state();

        let climb_sp = (self.cfg.alt_p * (hold.altitude - est.position))
            .clamp(-self.cfg.max_climb_rate, self.cfg.max_climb_rate);
        let error = climb_sp - est.velocity;

        // Throttle headroom bounds the integral.
        let i_limit = self.cfg.throttle_max - self.cfg.throttle_min;
        self.vel_integral = (self.vel_integral + error * dt).clamp(-i_limit, i_limit);
        let accel = (est.velocity - self.prev_velocity) / dt;
        self.prev_velocity = est.velocity;

        let correction =
            self.cfg.vel_p * error + self.cfg.vel_i * self.vel_integral - self.cfg.vel_d * accel;
        demands.throttle =
            (hold.hover_throttle + correction).clamp(self.cfg.throttle_min, self.cfg.throttle_max);
    }

    fn update_baro(&mut self, armed: bool, pressure: f32, _timestamp_us: u32) {
        if !(pressure > 0.0) {
            return;
        }
        let altitude = self.baro_lpf.filter(pressure_to_altitude(pressure));
        if !armed || self.ground_alt.is_none() {
            self.ground_alt = Some(altitude);
        }
        let ground = self.ground_alt.unwrap_or(altitude);
        self.kalman.update(altitude - ground);
    }

    fn update_accel(&mut self, accel_gs: &[f32; 3], timestamp_us: u32) {
        let Some(last) = self.last_accel_us.replace(timestamp_us) else {
            return;
        };
        let dt = (timestamp_us.wrapping_sub(last) as f32 * 1e-6).clamp(0.0005, 0.05);
        self.kalman.predict(dt, (accel_gs[2] - 1.0) * GRAVITY);
    }

    fn handle_aux_switch(&mut self, demands: &Demands) {
        self.vel_integral = 0.0;
        self.prev_velocity = self.kalman.state().velocity;
        self.hold = if demands.aux > 0 {
            let altitude = self.kalman.state().position;
            info!("altitude hold engaged at {} m", altitude);
            Some(HoldTarget { altitude, hover_throttle: demands.throttle })
        } else {
            info!("altitude hold released");
            None
        };
    }
}

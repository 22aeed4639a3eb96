//! Attitude stabilizer capability set and a cascaded PID implementation.

use micromath::F32Ext;

use crate::config::{StabilizerConfig, LOOP_HZ};
use crate::error::{InitError, InitResult};
use crate::state::{Attitude, Demands, AXIS_PITCH, AXIS_ROLL, AXIS_YAW};

pub trait Stabilizer {
    fn init(&mut self) -> InitResult {
        Ok(())
    }

    /// Inner loop: correct `demands` in place from the latest body rates.
    fn modify_demands(&mut self, gyro_rates: &[f32; 3], demands: &mut Demands);

    /// Outer-loop reference.
    fn update_euler_angles(&mut self, attitude: &Attitude);

    /// New pilot cyclic demands.
    fn update_demands(&mut self, demands: &Demands);

    /// Anti-windup while grounded.
    fn reset_integral(&mut self);

    /// Arming is refused when |roll| or |pitch| reaches this (rad).
    fn max_arming_angle(&self) -> f32;
}

// ── PID ───────────────────────────────────────────────────────────────────────

/// Rate PID for one axis, derivative on measurement.
pub struct RatePid {
    kp: f32,
    ki: f32,
    kd: f32,
    integral: f32,
    integral_limit: f32,
    output_limit: f32,
    prev_rate: f32,
}

impl RatePid {
    pub fn new(kp: f32, ki: f32, kd: f32, integral_limit: f32, output_limit: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            integral: 0.0,
            integral_limit: integral_limit.abs(),
            output_limit: output_limit.abs(),
            prev_rate: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn update(&mut self, dt: f32, rate_setpoint: f32, rate_measured: f32) -> f32 {
        let error = rate_setpoint - rate_measured;

        self.integral = (self.integral + error * dt).clamp(-self.integral_limit, self.integral_limit);

        let rate_delta = if dt > 0.0 { (rate_measured - self.prev_rate) / dt } else { 0.0 };
        self.prev_rate = rate_measured;

        let output = self.kp * error + self.ki * self.integral - self.kd * rate_delta;
        output.clamp(-self.output_limit, self.output_limit)
    }
}

// ── Cascaded stabilizer ───────────────────────────────────────────────────────

/// Level mode on roll/pitch (angle → rate → output), rate mode on yaw.
pub struct PidStabilizer {
    cfg: StabilizerConfig,
    dt: f32,
    axes: [RatePid; 3],
    attitude: Attitude,
    sticks: Demands,
}

impl PidStabilizer {
    pub fn new(cfg: StabilizerConfig) -> Self {
        let cyclic = || RatePid::new(cfg.rate_p, cfg.rate_i, cfg.rate_d, cfg.integral_limit, cfg.output_limit);
        Self {
            cfg,
            dt: 1.0 / LOOP_HZ as f32,
            axes: [
                cyclic(),
                cyclic(),
                RatePid::new(cfg.yaw_p, cfg.yaw_i, 0.0, cfg.integral_limit, cfg.output_limit),
            ],
            attitude: Attitude::default(),
            sticks: Demands::default(),
        }
    }

    pub fn integrals(&self) -> [f32; 3] {
        [self.axes[0].integral(), self.axes[1].integral(), self.axes[2].integral()]
    }

    fn level_rate_setpoint(&self, stick: f32, angle: f32) -> f32 {
        let target = stick.clamp(-1.0, 1.0) * self.cfg.max_angle;
        self.cfg.level_p * (target - angle)
    }
}

impl Stabilizer for PidStabilizer {
    fn init(&mut self) -> InitResult {
        let c = &self.cfg;
        if !(c.max_arming_angle > 0.0 && c.max_angle > 0.0) {
            return Err(InitError::Stabilizer("angle limits must be positive"));
        }
        if c.rate_p < 0.0 || c.rate_i < 0.0 || c.rate_d < 0.0 || c.yaw_p < 0.0 || c.yaw_i < 0.0 {
            return Err(InitError::Stabilizer("negative gain"));
        }
        Ok(())
    }

    fn modify_demands(&mut self, gyro_rates: &[f32; 3], demands: &mut Demands) {
        let roll_sp = self.level_rate_setpoint(self.sticks.roll, self.attitude.roll);
        let pitch_sp = self.level_rate_setpoint(self.sticks.pitch, self.attitude.pitch);
        let yaw_sp = self.sticks.yaw.clamp(-1.0, 1.0) * self.cfg.max_yaw_rate;

        let dt = self.dt;
        demands.roll = self.axes[AXIS_ROLL].update(dt, roll_sp, gyro_rates[AXIS_ROLL]);
        demands.pitch = self.axes[AXIS_PITCH].update(dt, pitch_sp, gyro_rates[AXIS_PITCH]);
        demands.yaw = self.axes[AXIS_YAW].update(dt, yaw_sp, gyro_rates[AXIS_YAW]);
    }

    fn update_euler_angles(&mut self, attitude: &Attitude) {
        self.attitude = *attitude;
    }

    fn update_demands(&mut self, demands: &Demands) {
        self.sticks = *demands;
    }

    fn reset_integral(&mut self) {
        self.axes.iter_mut().for_each(RatePid::reset);
    }

    fn max_arming_angle(&self) -> f32 {
        self.cfg.max_arming_angle
    }
}

//! Compile-time tuning.
//!
//! Everything here is a plain `const`; the firmware builds its collaborators
//! from these defaults and a board variant overrides only what it needs.

use crate::receiver::{ChannelMap, CHANNELS};

// ── Loop ──────────────────────────────────────────────────────────────────────

/// Control loop target rate
pub const LOOP_HZ: u64 = 1000;
/// Ticks between sample-counter reports (5 s at 1 kHz)
pub const LOOP_REPORT_INTERVAL: u32 = 5000;

// ── Receiver ──────────────────────────────────────────────────────────────────

/// How the pilot arms and disarms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArmingGesture {
    /// Aux1 switch high (with throttle down) arms, aux1 low disarms.
    Switch,
    /// Throttle down + yaw full right arms, throttle down + yaw full left disarms.
    YawStick,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReceiverConfig {
    pub trim_roll: f32,
    pub trim_pitch: f32,
    pub trim_yaw: f32,
    /// Stick travel around center treated as zero
    pub deadband: f32,
    /// 0 = linear, 1 = fully cubic
    pub cyclic_expo: f32,
    /// Raw throttle below `-1 + margin` counts as throttle down
    pub throttle_margin: f32,
    /// Raw yaw beyond this counts as "full" for the stick gesture
    pub stick_threshold: f32,
    pub arming: ArmingGesture,
    /// Rotate roll/pitch into the frame captured at arming
    pub headless: bool,
    /// Signal is lost after this long without a valid frame
    pub timeout_us: u32,
}

impl ReceiverConfig {
    pub const DEFAULT: Self = Self {
        trim_roll: 0.0,
        trim_pitch: 0.0,
        trim_yaw: 0.0,
        deadband: 0.02,
        cyclic_expo: 0.3,
        throttle_margin: 0.1,
        stick_threshold: 0.9,
        arming: ArmingGesture::Switch,
        headless: false,
        timeout_us: 250_000,
    };
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// CRSF channel order is AETR: roll, pitch, throttle, yaw, then aux.
/// Indexed by logical channel (throttle, roll, pitch, yaw, aux1, aux2).
pub const CRSF_CHANNEL_MAP: ChannelMap = [2, 0, 1, 3, 4, 5];

/// Host gamepads report left stick Y as throttle, right stick as roll/pitch.
pub const HOST_AXIS_MAP: ChannelMap = [1, 2, 3, 0, 4, 5];
/// Axes whose sign is flipped after mapping (gamepad Y axes grow downward).
pub const HOST_AXIS_INVERT: [bool; CHANNELS] = [true, false, true, false, false, false];

// ── Stabilizer ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilizerConfig {
    /// Outer loop: angle error (rad) → rate setpoint (rad/s)
    pub level_p: f32,
    /// Full stick deflection in level mode (rad)
    pub max_angle: f32,
    /// Full yaw stick deflection (rad/s)
    pub max_yaw_rate: f32,
    pub rate_p: f32,
    pub rate_i: f32,
    pub rate_d: f32,
    pub yaw_p: f32,
    pub yaw_i: f32,
    pub integral_limit: f32,
    pub output_limit: f32,
    /// Arming is refused beyond this roll/pitch (rad)
    pub max_arming_angle: f32,
}

impl StabilizerConfig {
    pub const DEFAULT: Self = Self {
        level_p: 4.0,
        max_angle: 0.6109,     // 35 deg
        max_yaw_rate: 3.4907,  // 200 deg/s
        rate_p: 0.08,
        rate_i: 0.4,
        rate_d: 0.002,
        yaw_p: 0.12,
        yaw_i: 0.3,
        integral_limit: 0.3,
        output_limit: 1.0,
        max_arming_angle: 0.4363, // 25 deg
    };
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ── Altitude ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AltitudeConfig {
    /// Process noise: position, velocity
    pub q_pos: f32,
    pub q_vel: f32,
    /// Barometer measurement noise (m²)
    pub r_baro: f32,
    /// Baro altitude PT1 cutoff (Hz) at the nominal baro rate
    pub baro_cutoff_hz: f32,
    pub baro_rate_hz: f32,
    /// Altitude error (m) → climb rate setpoint (m/s)
    pub alt_p: f32,
    /// Climb rate error (m/s) → throttle correction
    pub vel_p: f32,
    pub vel_i: f32,
    pub vel_d: f32,
    pub max_climb_rate: f32,
    /// Hold correction never takes throttle outside these bounds
    pub throttle_min: f32,
    pub throttle_max: f32,
}

impl AltitudeConfig {
    pub const DEFAULT: Self = Self {
        q_pos: 0.01,
        q_vel: 0.1,
        r_baro: 50.0,
        baro_cutoff_hz: 2.0,
        baro_rate_hz: 20.0,
        alt_p: 1.5,
        vel_p: 0.15,
        vel_i: 0.05,
        vel_d: 0.01,
        max_climb_rate: 2.0,
        throttle_min: 0.15,
        throttle_max: 0.85,
    };
}

impl Default for AltitudeConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

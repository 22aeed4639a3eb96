//! Flight data types shared between the orchestrator and its collaborators.
//!
//! All types are `Copy`: stages hand each other full-value snapshots,
//! never references into another stage's state.

use core::f32::consts::PI;

use crate::safety::SafetyStateMachine;

// ── Axes ──────────────────────────────────────────────────────────────────────

pub const AXIS_ROLL: usize = 0;
pub const AXIS_PITCH: usize = 1;
pub const AXIS_YAW: usize = 2;

/// Map a heading from (-π, π] into [0, 2π).
pub fn normalize_heading(yaw: f32) -> f32 {
    if yaw >= 0.0 {
        return yaw;
    }
    let wrapped = yaw + 2.0 * PI;
    // Tiny negative headings round up to exactly 2π in f32.
    if wrapped >= 2.0 * PI {
        0.0
    } else {
        wrapped
    }
}

// ── Data types ────────────────────────────────────────────────────────────────

/// Vehicle orientation in radians. `yaw` is always in [0, 2π).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Attitude {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

impl Attitude {
    /// Build from board Euler angles `[roll, pitch, yaw]`, normalizing yaw.
    pub fn from_euler(angles: [f32; 3]) -> Self {
        Self {
            roll: angles[AXIS_ROLL],
            pitch: angles[AXIS_PITCH],
            yaw: normalize_heading(angles[AXIS_YAW]),
        }
    }
}

/// Pilot/controller command vector consumed by the mixer.
///
/// `throttle` is in [0, 1] with 0 meaning throttle down; the cyclic axes
/// are in [-1, 1]. `aux` is a discrete mode code, 0 being neutral.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Demands {
    pub throttle: f32,
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub aux: u8,
}

/// Per-stream sample counters. Diagnostic only, wrap on overflow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SampleCounters {
    pub gyro: u32,
    pub attitude: u32,
    pub receiver: u32,
    pub accel: u32,
    pub baro: u32,
}

/// State owned by the orchestrator for the lifetime of the process.
#[derive(Clone, Copy, Debug)]
pub struct FlightState {
    pub safety: SafetyStateMachine,
    /// Last observed aux code, for change detection.
    pub aux_state: u8,
    pub attitude: Attitude,
    pub counters: SampleCounters,
}

impl FlightState {
    pub const fn new(max_arming_angle: f32) -> Self {
        Self {
            safety: SafetyStateMachine::new(max_arming_angle),
            aux_state: 0,
            attitude: Attitude { roll: 0.0, pitch: 0.0, yaw: 0.0 },
            counters: SampleCounters { gyro: 0, attitude: 0, receiver: 0, accel: 0, baro: 0 },
        }
    }

    pub fn armed(&self) -> bool {
        self.safety.armed()
    }

    pub fn failsafe(&self) -> bool {
        self.safety.failsafe()
    }

    pub fn yaw_initial(&self) -> f32 {
        self.safety.yaw_initial()
    }
}

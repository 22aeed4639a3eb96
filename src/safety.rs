//! Arming / failsafe state machine.
//!
//! `armed` and `failsafe` are private: the only way to set `armed` is
//! [`SafetyStateMachine::try_arm`], and every path that sets `failsafe` clears
//! `armed` in the same call, so `failsafe ⇒ !armed` holds at all times.
//!
//! Failsafe is sticky. Nothing here clears it; recovery takes a restart.

use micromath::F32Ext;

/// Derived view of the two safety flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArmState {
    Unarmed,
    Armed,
    /// Unarmed, forced there by signal loss
    Failsafe,
}

/// Inputs to the arming rule, sampled on one receiver frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmingRequest {
    /// Receiver reported the arming edge this frame
    pub arming_edge: bool,
    pub aux: u8,
    pub roll: f32,
    pub pitch: f32,
    /// Heading at this instant, captured as the headless reference
    pub yaw: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct SafetyStateMachine {
    armed: bool,
    failsafe: bool,
    yaw_initial: f32,
    max_arming_angle: f32,
}

impl SafetyStateMachine {
    pub const fn new(max_arming_angle: f32) -> Self {
        Self {
            armed: false,
            failsafe: false,
            yaw_initial: 0.0,
            max_arming_angle,
        }
    }

    pub fn armed(&self) -> bool {
        self.armed
    }

    pub fn failsafe(&self) -> bool {
        self.failsafe
    }

    /// Heading captured at the last arming.
    pub fn yaw_initial(&self) -> f32 {
        self.yaw_initial
    }

    pub fn max_arming_angle(&self) -> f32 {
        self.max_arming_angle
    }

    pub fn state(&self) -> ArmState {
        match (self.armed, self.failsafe) {
            (true, _) => ArmState::Armed,
            (false, true) => ArmState::Failsafe,
            (false, false) => ArmState::Unarmed,
        }
    }

    fn safe_angle(&self, angle: f32) -> bool {
        angle.abs() < self.max_arming_angle
    }

    /// The arming conjunction, independent of the current state.
    pub fn arming_permitted(&self, req: &ArmingRequest) -> bool {
        req.arming_edge
            && req.aux == 0
            && !self.failsafe
            && self.safe_angle(req.roll)
            && self.safe_angle(req.pitch)
    }

    /// UNARMED → ARMED. Returns `true` on the transition.
    pub fn try_arm(&mut self, req: &ArmingRequest) -> bool {
        if self.armed || !self.arming_permitted(req) {
            return false;
        }
        self.armed = true;
        self.yaw_initial = req.yaw;
        self.check_invariant();
        true
    }

    /// ARMED → UNARMED on the disarming edge, regardless of attitude or aux.
    pub fn try_disarm(&mut self, disarming_edge: bool) -> bool {
        if self.armed && disarming_edge {
            self.armed = false;
            return true;
        }
        false
    }

    /// ARMED → FAILSAFE on signal loss.
    ///
    /// Returns `true` on the transition; the caller must cut the motors and
    /// update the status indicator in the same cycle.
    pub fn check_failsafe(&mut self, lost_signal: bool) -> bool {
        if self.armed && lost_signal {
            self.armed = false;
            self.failsafe = true;
            self.check_invariant();
            return true;
        }
        false
    }

    /// Motors must be cut this cycle. Does not change `armed`.
    pub fn must_cut_motors(&self, throttle_down: bool) -> bool {
        self.armed && throttle_down
    }

    /// The armed-actuation gate.
    pub fn may_actuate(&self, throttle_down: bool) -> bool {
        self.armed && !self.failsafe && !throttle_down
    }

    fn check_invariant(&self) {
        debug_assert!(!(self.failsafe && self.armed), "armed while in failsafe");
    }
}

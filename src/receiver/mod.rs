//! Pilot-input capability set.
//!
//! A receiver variant only has to move frames: start its transport, say
//! whether a new frame arrived, hand over the frame as normalized channels
//! and say whether the link timed out. Turning channels into [`Demands`]
//! (trim, deadband, expo, throttle scaling, headless rotation, arming edges)
//! is shared by every variant through a composed [`DemandTracker`] and the
//! trait's default methods.

pub mod crsf;
pub mod host;

use micromath::F32Ext;

use crate::config::{ArmingGesture, ReceiverConfig};
use crate::error::InitResult;
use crate::state::Demands;

// ── Channels ──────────────────────────────────────────────────────────────────

pub const CHANNELS: usize = 6;

pub const CHANNEL_THROTTLE: usize = 0;
pub const CHANNEL_ROLL: usize = 1;
pub const CHANNEL_PITCH: usize = 2;
pub const CHANNEL_YAW: usize = 3;
pub const CHANNEL_AUX1: usize = 4;
pub const CHANNEL_AUX2: usize = 5;

/// One frame's channel values in [-1, 1], in logical channel order.
pub type RawChannels = [f32; CHANNELS];

/// Source index for each logical channel.
pub type ChannelMap = [usize; CHANNELS];

/// Monotonic microsecond time source, as seen by a receiver.
pub trait Clock {
    fn now_us(&self) -> u32;
}

// ── Contract ──────────────────────────────────────────────────────────────────

pub trait Receiver {
    /// One-time transport bring-up. The only call allowed to block.
    fn begin(&mut self) -> InitResult;

    /// Non-blocking: has a complete, valid frame arrived since the last read?
    fn got_new_frame(&mut self) -> bool;

    /// The latest frame, normalized to [-1, 1] in logical channel order.
    fn read_raw_channels(&mut self) -> RawChannels;

    /// The link has been silent for longer than the variant's timeout.
    fn lost_signal(&mut self) -> bool;

    fn tracker(&self) -> &DemandTracker;

    fn tracker_mut(&mut self) -> &mut DemandTracker;

    /// Shape a new frame into demands. `None` when no new frame arrived.
    ///
    /// `yaw_reference` is the heading relative to the one captured at arming,
    /// used for headless mode.
    fn get_demands(&mut self, yaw_reference: f32) -> Option<Demands> {
        if !self.got_new_frame() {
            self.tracker_mut().clear_edges();
            return None;
        }
        let raw = self.read_raw_channels();
        Some(self.tracker_mut().update(&raw, yaw_reference))
    }

    /// Demands from the last frame.
    fn demands(&self) -> Demands {
        self.tracker().demands()
    }

    fn throttle_is_down(&self) -> bool {
        self.tracker().throttle_is_down()
    }

    /// True only on the cycle whose frame shows the arming gesture newly
    /// appearing. Cleared by a [`get_demands`](Self::get_demands) poll that
    /// finds no new frame.
    fn arming(&self) -> bool {
        self.tracker().arming()
    }

    /// Same per-cycle rule as [`arming`](Self::arming).
    fn disarming(&self) -> bool {
        self.tracker().disarming()
    }
}

// ── Edge detection ────────────────────────────────────────────────────────────

/// Rising-edge detector over a sampled boolean level.
#[derive(Debug, Clone, Copy)]
pub struct EdgeDetector {
    previous: bool,
}

impl EdgeDetector {
    /// `initial` is the level assumed before the first sample. Starting high
    /// means a condition already true at power-up does not fire until it has
    /// been released once.
    pub const fn new(initial: bool) -> Self {
        Self { previous: initial }
    }

    /// Feed one sample; true only when the level goes from low to high.
    pub fn rising(&mut self, level: bool) -> bool {
        let edge = level && !self.previous;
        self.previous = level;
        edge
    }
}

// ── Shaping ───────────────────────────────────────────────────────────────────

/// Zero a band around center and rescale the rest back onto [-1, 1].
pub fn apply_deadband(value: f32, deadband: f32) -> f32 {
    if value.abs() <= deadband {
        return 0.0;
    }
    let span = 1.0 - deadband;
    if span <= 0.0 {
        return 0.0;
    }
    (value - deadband.copysign(value)) / span
}

/// Blend between linear and cubic response.
pub fn apply_expo(value: f32, expo: f32) -> f32 {
    let expo = expo.clamp(0.0, 1.0);
    value * (1.0 - expo) + value * value * value * expo
}

/// Trim, deadband and expo for one cyclic stick.
pub fn shape_cyclic(raw: f32, trim: f32, cfg: &ReceiverConfig) -> f32 {
    let centered = (raw + trim).clamp(-1.0, 1.0);
    apply_expo(apply_deadband(centered, cfg.deadband), cfg.cyclic_expo)
}

/// Raw throttle [-1, 1] onto [0, 1].
pub fn scale_throttle(raw: f32) -> f32 {
    ((raw.clamp(-1.0, 1.0) + 1.0) * 0.5).clamp(0.0, 1.0)
}

/// Three-position switch: low = 0, middle = 1, high = 2.
pub fn aux_code(raw: f32) -> u8 {
    if raw < -0.5 {
        0
    } else if raw < 0.5 {
        1
    } else {
        2
    }
}

/// Rotate roll/pitch demands by `-yaw_reference` so they stay in the frame
/// the vehicle had when it was armed.
pub fn rotate_headless(roll: f32, pitch: f32, yaw_reference: f32) -> (f32, f32) {
    let (s, c) = (yaw_reference.sin(), yaw_reference.cos());
    (roll * c + pitch * s, pitch * c - roll * s)
}

/// Per-variant shaping state: the last demands plus the arming/disarming
/// edge detectors. Each receiver owns one.
#[derive(Debug, Clone, Copy)]
pub struct DemandTracker {
    cfg: ReceiverConfig,
    demands: Demands,
    throttle_down: bool,
    arm_edge: EdgeDetector,
    disarm_edge: EdgeDetector,
    arming: bool,
    disarming: bool,
}

impl DemandTracker {
    pub const fn new(cfg: ReceiverConfig) -> Self {
        Self {
            cfg,
            demands: Demands { throttle: 0.0, roll: 0.0, pitch: 0.0, yaw: 0.0, aux: 0 },
            throttle_down: true,
            arm_edge: EdgeDetector::new(true),
            disarm_edge: EdgeDetector::new(false),
            arming: false,
            disarming: false,
        }
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.cfg
    }

    /// Consume one frame.
    pub fn update(&mut self, raw: &RawChannels, yaw_reference: f32) -> Demands {
        let cfg = &self.cfg;

        let throttle_raw = raw[CHANNEL_THROTTLE];
        self.throttle_down = throttle_raw < -1.0 + cfg.throttle_margin;

        let mut roll = shape_cyclic(raw[CHANNEL_ROLL], cfg.trim_roll, cfg);
        let mut pitch = shape_cyclic(raw[CHANNEL_PITCH], cfg.trim_pitch, cfg);
        let yaw = shape_cyclic(raw[CHANNEL_YAW], cfg.trim_yaw, cfg);
        if cfg.headless {
            (roll, pitch) = rotate_headless(roll, pitch, yaw_reference);
        }

        let (arm_level, disarm_level) = match cfg.arming {
            ArmingGesture::Switch => {
                let switch_on = raw[CHANNEL_AUX1] > 0.0;
                (switch_on && self.throttle_down, !switch_on)
            }
            ArmingGesture::YawStick => (
                self.throttle_down && raw[CHANNEL_YAW] > cfg.stick_threshold,
                self.throttle_down && raw[CHANNEL_YAW] < -cfg.stick_threshold,
            ),
        };
        self.arming = self.arm_edge.rising(arm_level);
        self.disarming = self.disarm_edge.rising(disarm_level);

        self.demands = Demands {
            throttle: scale_throttle(throttle_raw),
            roll,
            pitch,
            yaw,
            aux: aux_code(raw[CHANNEL_AUX2]),
        };
        self.demands
    }

    /// Drop the edge flags of the last frame. Edge detector levels are
    /// kept, so a held gesture still does not fire again.
    pub fn clear_edges(&mut self) {
        self.arming = false;
        self.disarming = false;
    }

    pub fn demands(&self) -> Demands {
        self.demands
    }

    pub fn throttle_is_down(&self) -> bool {
        self.throttle_down
    }

    pub fn arming(&self) -> bool {
        self.arming
    }

    pub fn disarming(&self) -> bool {
        self.disarming
    }
}

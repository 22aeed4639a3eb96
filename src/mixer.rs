//! Motor mixing.
//!
//! The mixer owns its motor sink. `run_armed` is reached only through the
//! orchestrator's actuation gate; `cut_motors` may be called at any time.

use crate::error::InitResult;
use crate::state::Demands;

pub const MOTORS: usize = 4;

/// Where normalized motor commands end up (ESC protocol driver, simulator).
pub trait MotorOutput {
    fn init(&mut self) -> InitResult {
        Ok(())
    }

    /// Spin motors at `values`, each in [0, 1].
    fn write_motors(&mut self, values: &[f32; MOTORS]);

    /// Stop every motor (zero command, not idle).
    fn stop(&mut self);
}

pub trait Mixer {
    fn init(&mut self) -> InitResult;

    fn run_armed(&mut self, demands: &Demands);

    fn cut_motors(&mut self);

    /// Last values sent to the motors, for telemetry.
    fn motor_values(&self) -> [f32; MOTORS];
}

// ── Quad X ────────────────────────────────────────────────────────────────────

/// `[throttle, roll, pitch, yaw]` weight per motor.
///
/// ```text
///   4   2        1: rear right   2: front right
///    \ /         3: rear left    4: front left
///    / \
///   3   1
/// ```
const QUAD_X: [[f32; 4]; MOTORS] = [
    [1.0, -1.0, 1.0, -1.0],
    [1.0, -1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0, 1.0],
    [1.0, 1.0, -1.0, -1.0],
];

/// Mix demands onto the four motors, desaturating from the top so that
/// attitude authority wins over collective when a motor would exceed 1.
pub fn mix_quad_x(demands: &Demands) -> [f32; MOTORS] {
    let input = [demands.throttle, demands.roll, demands.pitch, demands.yaw];
    let mut out = [0.0f32; MOTORS];
    for (motor, weights) in out.iter_mut().zip(QUAD_X.iter()) {
        *motor = weights.iter().zip(input.iter()).map(|(w, v)| w * v).sum();
    }

    let max = out.iter().copied().fold(f32::MIN, f32::max);
    if max > 1.0 {
        out.iter_mut().for_each(|m| *m -= max - 1.0);
    }
    out.iter_mut().for_each(|m| *m = m.clamp(0.0, 1.0));
    out
}

pub struct QuadXMixer<M> {
    output: M,
    last: [f32; MOTORS],
}

impl<M: MotorOutput> QuadXMixer<M> {
    pub fn new(output: M) -> Self {
        Self { output, last: [0.0; MOTORS] }
    }

    pub fn output(&self) -> &M {
        &self.output
    }
}

impl<M: MotorOutput> Mixer for QuadXMixer<M> {
    fn init(&mut self) -> InitResult {
        self.output.init()?;
        self.cut_motors();
        Ok(())
    }

    fn run_armed(&mut self, demands: &Demands) {
        self.last = mix_quad_x(demands);
        self.output.write_motors(&self.last);
    }

    fn cut_motors(&mut self) {
        self.last = [0.0; MOTORS];
        self.output.stop();
    }

    /// Zero after a cut.
    fn motor_values(&self) -> [f32; MOTORS] {
        self.last
    }
}

// ── DShot encoding ────────────────────────────────────────────────────────────

pub const DSHOT_THROTTLE_MIN: u16 = 48;
pub const DSHOT_THROTTLE_MAX: u16 = 2047;

/// Unit throttle onto the DShot throttle range; 0 (motor stop) when disarmed.
pub fn dshot_command(unit: f32, armed: bool) -> u16 {
    if !armed {
        return 0;
    }
    let t = unit.clamp(0.0, 1.0);
    let span = (DSHOT_THROTTLE_MAX - DSHOT_THROTTLE_MIN) as f32;
    DSHOT_THROTTLE_MIN + (t * span) as u16
}

/// 16-bit DShot frame: 11-bit command, telemetry bit, 4-bit XOR checksum.
pub fn dshot_frame(command: u16, telemetry: bool) -> u16 {
    let packet = ((command & 0x07FF) << 1) | telemetry as u16;
    let csum = (packet ^ (packet >> 4) ^ (packet >> 8)) & 0x000F;
    (packet << 4) | csum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        writes: Vec<[f32; MOTORS]>,
        stops: usize,
    }

    impl MotorOutput for Recorder {
        fn write_motors(&mut self, values: &[f32; MOTORS]) {
            self.writes.push(*values);
        }

        fn stop(&mut self) {
            self.stops += 1;
        }
    }

    #[test]
    fn collective_only_drives_all_motors_equally() {
        let out = mix_quad_x(&Demands { throttle: 0.4, ..Demands::default() });
        assert_eq!(out, [0.4; MOTORS]);
    }

    #[test]
    fn roll_right_speeds_up_left_motors() {
        let out = mix_quad_x(&Demands { throttle: 0.5, roll: 0.1, ..Demands::default() });
        assert!(out[2] > out[0]);
        assert!(out[3] > out[1]);
    }

    #[test]
    fn saturation_preserves_differential() {
        let out = mix_quad_x(&Demands { throttle: 0.95, roll: 0.2, ..Demands::default() });
        let max = out.iter().copied().fold(f32::MIN, f32::max);
        assert!((max - 1.0).abs() < 1e-6);
        assert!((out[2] - out[0] - 0.4).abs() < 1e-5);
    }

    #[test]
    fn outputs_never_leave_unit_range() {
        let out = mix_quad_x(&Demands { throttle: 0.0, roll: -1.0, pitch: 1.0, yaw: 1.0, aux: 0 });
        assert!(out.iter().all(|m| (0.0..=1.0).contains(m)));
    }

    #[test]
    fn init_stops_motors_and_cut_zeroes_state() {
        let mut mixer = QuadXMixer::new(Recorder::default());
        mixer.init().unwrap();
        assert_eq!(mixer.output().stops, 1);

        mixer.run_armed(&Demands { throttle: 0.3, ..Demands::default() });
        assert_eq!(mixer.output().writes.len(), 1);
        assert_eq!(mixer.motor_values(), [0.3; MOTORS]);

        mixer.cut_motors();
        assert_eq!(mixer.output().stops, 2);
        assert_eq!(mixer.motor_values(), [0.0; MOTORS]);
    }

    #[test]
    fn dshot_command_range() {
        assert_eq!(dshot_command(0.5, false), 0);
        assert_eq!(dshot_command(0.0, true), DSHOT_THROTTLE_MIN);
        assert_eq!(dshot_command(1.0, true), DSHOT_THROTTLE_MAX);
        assert_eq!(dshot_command(2.0, true), DSHOT_THROTTLE_MAX);
    }

    #[test]
    fn dshot_frame_checksum() {
        // Command 1046, no telemetry: packet 0x82C, checksum 0x6.
        assert_eq!(dshot_frame(1046, false), 0x82C6);
        // Telemetry bit lands in bit 4 of the frame.
        assert_eq!(dshot_frame(0, true) & 0x0010, 0x0010);
    }
}

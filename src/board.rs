//! Board capability set: sensor polling, time, status output.
//!
//! Every sensor getter is a non-blocking poll. `None` means "no new sample
//! since the last call", never an error; the board validates its samples
//! before reporting them.

use crate::error::InitResult;
use crate::mixer::Mixer;
use crate::receiver::Receiver;
use crate::state::Attitude;

pub trait Board {
    /// Hardware bring-up. Called once, before anything else.
    fn init(&mut self) -> InitResult;

    /// Body rates in rad/s, `[roll, pitch, yaw]`.
    fn get_gyro_rates(&mut self) -> Option<[f32; 3]>;

    /// Euler angles in radians, `[roll, pitch, yaw]`, yaw in (-π, π].
    fn get_euler_angles(&mut self) -> Option<[f32; 3]>;

    /// Specific force in g, body frame.
    fn get_accelerometer(&mut self) -> Option<[f32; 3]>;

    /// Static pressure in pascals.
    fn get_barometer(&mut self) -> Option<f32>;

    /// Monotonic microseconds since boot (wraps).
    fn get_microseconds(&self) -> u32;

    fn show_armed_status(&mut self, armed: bool);

    /// Telemetry hook, called on every new attitude sample.
    fn do_serial_comms<R: Receiver, M: Mixer>(
        &mut self,
        _attitude: &Attitude,
        _armed: bool,
        _receiver: &R,
        _mixer: &M,
    ) {
    }
}

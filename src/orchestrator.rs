//! The per-cycle driver.
//!
//! [`FlightOrchestrator::tick`] runs one control cycle: gyro, attitude,
//! receiver, accelerometer, barometer, always in that order. Every step polls
//! its source and is skipped when there is nothing new, so a tick never
//! waits on anything.

use crate::altitude::AltitudeEstimator;
use crate::board::Board;
use crate::config::LOOP_REPORT_INTERVAL;
use crate::error::InitError;
use crate::mixer::Mixer;
use crate::receiver::Receiver;
use crate::safety::ArmingRequest;
use crate::stabilizer::Stabilizer;
use crate::state::{Attitude, FlightState};

pub struct FlightOrchestrator<B, R, S, A, M> {
    board: B,
    receiver: R,
    stabilizer: S,
    altitude: A,
    mixer: M,
    state: FlightState,
    ticks: u32,
}

impl<B, R, S, A, M> FlightOrchestrator<B, R, S, A, M>
where
    B: Board,
    R: Receiver,
    S: Stabilizer,
    A: AltitudeEstimator,
    M: Mixer,
{
    /// Bring up every collaborator (board, receiver, stabilizer, mixer,
    /// altitude estimator, in that order) and start disarmed.
    ///
    /// The first failure is returned and nothing is constructed, so a
    /// half-initialized system can never tick.
    pub fn init(
        mut board: B,
        mut receiver: R,
        mut stabilizer: S,
        mut altitude: A,
        mut mixer: M,
    ) -> Result<Self, InitError> {
        debug!("init: board");
        board.init()?;
        debug!("init: receiver");
        receiver.begin()?;
        debug!("init: stabilizer");
        stabilizer.init()?;
        debug!("init: mixer");
        mixer.init()?;
        debug!("init: altitude estimator");
        altitude.init()?;

        let state = FlightState::new(stabilizer.max_arming_angle());
        board.show_armed_status(false);
        info!("flight core ready, max arming angle {} rad", state.safety.max_arming_angle());

        Ok(Self { board, receiver, stabilizer, altitude, mixer, state, ticks: 0 })
    }

    /// One control cycle.
    pub fn tick(&mut self) {
        self.check_gyro_rates();
        self.check_euler_angles();
        self.check_receiver();
        self.check_accelerometer();
        self.check_barometer();

        self.ticks = self.ticks.wrapping_add(1);
        if self.ticks % LOOP_REPORT_INTERVAL == 0 {
            let c = self.state.counters;
            trace!(
                "samples g={} q={} r={} a={} b={}",
                c.gyro,
                c.attitude,
                c.receiver,
                c.accel,
                c.baro
            );
        }
    }

    fn check_gyro_rates(&mut self) {
        let Some(rates) = self.board.get_gyro_rates() else {
            return;
        };
        self.state.counters.gyro = self.state.counters.gyro.wrapping_add(1);

        // Snapshot; the receiver's own copy stays untouched.
        let mut demands = self.receiver.demands();
        self.stabilizer.modify_demands(&rates, &mut demands);
        self.altitude.modify_demands(&mut demands);

        self.check_failsafe();

        if self.state.safety.may_actuate(self.receiver.throttle_is_down()) {
            self.mixer.run_armed(&demands);
        }
    }

    fn check_failsafe(&mut self) {
        if !self.state.armed() {
            return;
        }
        if self.state.safety.check_failsafe(self.receiver.lost_signal()) {
            self.mixer.cut_motors();
            self.board.show_armed_status(false);
            warn!("receiver signal lost, failsafe");
        }
    }

    fn check_euler_angles(&mut self) {
        let Some(angles) = self.board.get_euler_angles() else {
            return;
        };
        self.state.counters.attitude = self.state.counters.attitude.wrapping_add(1);

        self.state.attitude = Attitude::from_euler(angles);
        self.stabilizer.update_euler_angles(&self.state.attitude);
        self.board.do_serial_comms(
            &self.state.attitude,
            self.state.armed(),
            &self.receiver,
            &self.mixer,
        );
    }

    fn check_receiver(&mut self) {
        let yaw_reference = self.state.attitude.yaw - self.state.yaw_initial();
        let Some(demands) = self.receiver.get_demands(yaw_reference) else {
            return;
        };
        self.state.counters.receiver = self.state.counters.receiver.wrapping_add(1);

        self.stabilizer.update_demands(&demands);

        let throttle_down = self.receiver.throttle_is_down();
        if throttle_down {
            self.stabilizer.reset_integral();
        }

        if self.state.safety.try_disarm(self.receiver.disarming()) {
            // Extra cut on top of the usual receiver step; the throttle-down
            // cut below would otherwise leave the motors spinning.
            self.mixer.cut_motors();
            info!("disarmed");
        }

        // Aux is checked against the code stored from earlier frames; this
        // frame's code is only taken over after the arming decision.
        let attitude = self.state.attitude;
        let request = ArmingRequest {
            arming_edge: self.receiver.arming(),
            aux: self.state.aux_state,
            roll: attitude.roll,
            pitch: attitude.pitch,
            yaw: attitude.yaw,
        };
        if self.state.safety.try_arm(&request) {
            info!("armed, heading {} rad", attitude.yaw);
        } else if request.arming_edge && !self.state.armed() {
            warn!("arming refused, state {}", self.state.safety.state());
        }

        if demands.aux != self.state.aux_state {
            debug!("aux {} -> {}", self.state.aux_state, demands.aux);
            self.state.aux_state = demands.aux;
            self.altitude.handle_aux_switch(&demands);
        }

        if self.state.safety.must_cut_motors(throttle_down) {
            self.mixer.cut_motors();
        }

        self.board.show_armed_status(self.state.armed());
    }

    fn check_accelerometer(&mut self) {
        let Some(accel) = self.board.get_accelerometer() else {
            return;
        };
        self.state.counters.accel = self.state.counters.accel.wrapping_add(1);
        self.altitude.update_accel(&accel, self.board.get_microseconds());
    }

    fn check_barometer(&mut self) {
        let Some(pressure) = self.board.get_barometer() else {
            return;
        };
        self.state.counters.baro = self.state.counters.baro.wrapping_add(1);
        self.altitude.update_baro(self.state.armed(), pressure, self.board.get_microseconds());
    }

    // ── Read-only views ───────────────────────────────────────────────────────

    pub fn state(&self) -> &FlightState {
        &self.state
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn receiver(&self) -> &R {
        &self.receiver
    }

    pub fn stabilizer(&self) -> &S {
        &self.stabilizer
    }

    pub fn altitude(&self) -> &A {
        &self.altitude
    }

    pub fn mixer(&self) -> &M {
        &self.mixer
    }
}

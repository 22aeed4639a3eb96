//! Recording collaborators for driving the orchestrator on the host.
//!
//! Every double shares one [`World`]: tests script the inputs there (sensor
//! samples, receiver frames, signal loss) and read back what the core did.
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use quad_flight_core::altitude::AltitudeEstimator;
use quad_flight_core::board::Board;
use quad_flight_core::config::ReceiverConfig;
use quad_flight_core::error::{InitError, InitResult};
use quad_flight_core::mixer::{Mixer, MOTORS};
use quad_flight_core::receiver::{DemandTracker, RawChannels, Receiver, CHANNELS};
use quad_flight_core::stabilizer::Stabilizer;
use quad_flight_core::state::{Attitude, Demands};
use quad_flight_core::FlightOrchestrator;

pub const MAX_ARMING_ANGLE: f32 = 0.4;

/// One scripted receiver frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct Frame {
    pub demands: Demands,
    pub throttle_down: bool,
    pub arming: bool,
    pub disarming: bool,
}

impl Frame {
    pub fn idle() -> Self {
        Self { throttle_down: true, ..Self::default() }
    }

    pub fn arm() -> Self {
        Self { arming: true, ..Self::idle() }
    }

    pub fn disarm() -> Self {
        Self { disarming: true, ..Self::idle() }
    }

    /// Throttle up, cyclic centered.
    pub fn flying(throttle: f32) -> Self {
        Self {
            demands: Demands { throttle, ..Demands::default() },
            ..Self::default()
        }
    }

    pub fn with_aux(mut self, aux: u8) -> Self {
        self.demands.aux = aux;
        self
    }
}

#[derive(Debug, Default)]
pub struct World {
    /// Collaborator calls in the order they happened.
    pub log: Vec<&'static str>,

    // Scripted inputs. Sensor samples persist until cleared; a frame is
    // consumed by the first receiver poll that sees it.
    pub gyro: Option<[f32; 3]>,
    pub euler: Option<[f32; 3]>,
    pub accel: Option<[f32; 3]>,
    pub baro: Option<f32>,
    pub micros: u32,
    pub frame: Option<Frame>,
    pub lost_signal: bool,
    pub fail_init: Option<&'static str>,

    // Observations.
    pub init_order: Vec<&'static str>,
    pub armed_status: Vec<bool>,
    pub serial_comms: Vec<(Attitude, bool, [f32; MOTORS])>,
    pub yaw_references: Vec<f32>,
    pub stabilizer_rates: Vec<[f32; 3]>,
    pub stabilizer_attitudes: Vec<Attitude>,
    pub stabilizer_demands: Vec<Demands>,
    pub integral_resets: u32,
    pub aux_switches: Vec<Demands>,
    pub accel_updates: Vec<([f32; 3], u32)>,
    pub baro_updates: Vec<(bool, f32, u32)>,
    pub run_armed: Vec<Demands>,
    pub cut_motors: u32,
}

pub type Shared = Rc<RefCell<World>>;

fn init_step(world: &Shared, name: &'static str, err: fn(&'static str) -> InitError) -> InitResult {
    let mut w = world.borrow_mut();
    w.init_order.push(name);
    match w.fail_init {
        Some(failing) if failing == name => Err(err("scripted failure")),
        _ => Ok(()),
    }
}

// ── Board ─────────────────────────────────────────────────────────────────────

pub struct FakeBoard(pub Shared);

impl Board for FakeBoard {
    fn init(&mut self) -> InitResult {
        init_step(&self.0, "board", InitError::Board)
    }

    fn get_gyro_rates(&mut self) -> Option<[f32; 3]> {
        let mut w = self.0.borrow_mut();
        w.log.push("gyro");
        w.gyro
    }

    fn get_euler_angles(&mut self) -> Option<[f32; 3]> {
        let mut w = self.0.borrow_mut();
        w.log.push("euler");
        w.euler
    }

    fn get_accelerometer(&mut self) -> Option<[f32; 3]> {
        let mut w = self.0.borrow_mut();
        w.log.push("accel");
        w.accel
    }

    fn get_barometer(&mut self) -> Option<f32> {
        let mut w = self.0.borrow_mut();
        w.log.push("baro");
        w.baro
    }

    fn get_microseconds(&self) -> u32 {
        self.0.borrow().micros
    }

    fn show_armed_status(&mut self, armed: bool) {
        self.0.borrow_mut().armed_status.push(armed);
    }

    fn do_serial_comms<R: Receiver, M: Mixer>(
        &mut self,
        attitude: &Attitude,
        armed: bool,
        _receiver: &R,
        mixer: &M,
    ) {
        self.0.borrow_mut().serial_comms.push((*attitude, armed, mixer.motor_values()));
    }
}

// ── Receiver ──────────────────────────────────────────────────────────────────

/// Replays scripted frames. Overrides the shaping defaults so tests control
/// the edges directly.
pub struct ScriptedReceiver {
    world: Shared,
    current: Frame,
    tracker: DemandTracker,
}

impl ScriptedReceiver {
    pub fn new(world: Shared) -> Self {
        Self {
            world,
            current: Frame::idle(),
            tracker: DemandTracker::new(ReceiverConfig::DEFAULT),
        }
    }
}

impl Receiver for ScriptedReceiver {
    fn begin(&mut self) -> InitResult {
        init_step(&self.world, "receiver", InitError::Receiver)
    }

    fn got_new_frame(&mut self) -> bool {
        self.world.borrow().frame.is_some()
    }

    fn read_raw_channels(&mut self) -> RawChannels {
        [0.0; CHANNELS]
    }

    fn lost_signal(&mut self) -> bool {
        self.world.borrow().lost_signal
    }

    fn tracker(&self) -> &DemandTracker {
        &self.tracker
    }

    fn tracker_mut(&mut self) -> &mut DemandTracker {
        &mut self.tracker
    }

    fn get_demands(&mut self, yaw_reference: f32) -> Option<Demands> {
        let mut w = self.world.borrow_mut();
        w.log.push("receiver");
        w.yaw_references.push(yaw_reference);
        let frame = w.frame.take()?;
        self.current = frame;
        Some(frame.demands)
    }

    fn demands(&self) -> Demands {
        self.current.demands
    }

    fn throttle_is_down(&self) -> bool {
        self.current.throttle_down
    }

    fn arming(&self) -> bool {
        self.current.arming
    }

    fn disarming(&self) -> bool {
        self.current.disarming
    }
}

// ── Stabilizer ────────────────────────────────────────────────────────────────

/// Adds a fixed roll correction so tests can see the stage ran.
pub struct FakeStabilizer(pub Shared);

pub const STABILIZER_ROLL_NUDGE: f32 = 0.05;

impl Stabilizer for FakeStabilizer {
    fn init(&mut self) -> InitResult {
        init_step(&self.0, "stabilizer", InitError::Stabilizer)
    }

    fn modify_demands(&mut self, gyro_rates: &[f32; 3], demands: &mut Demands) {
        self.0.borrow_mut().stabilizer_rates.push(*gyro_rates);
        demands.roll += STABILIZER_ROLL_NUDGE;
    }

    fn update_euler_angles(&mut self, attitude: &Attitude) {
        self.0.borrow_mut().stabilizer_attitudes.push(*attitude);
    }

    fn update_demands(&mut self, demands: &Demands) {
        self.0.borrow_mut().stabilizer_demands.push(*demands);
    }

    fn reset_integral(&mut self) {
        self.0.borrow_mut().integral_resets += 1;
    }

    fn max_arming_angle(&self) -> f32 {
        MAX_ARMING_ANGLE
    }
}

// ── Altitude estimator ────────────────────────────────────────────────────────

/// Adds a fixed throttle offset while aux is non-zero.
pub struct FakeAltitude {
    world: Shared,
    hold: bool,
}

pub const HOLD_THROTTLE_BOOST: f32 = 0.1;

impl FakeAltitude {
    pub fn new(world: Shared) -> Self {
        Self { world, hold: false }
    }
}

impl AltitudeEstimator for FakeAltitude {
    fn init(&mut self) -> InitResult {
        init_step(&self.world, "altitude", InitError::Altitude)
    }

    fn modify_demands(&mut self, demands: &mut Demands) {
        if self.hold {
            demands.throttle += HOLD_THROTTLE_BOOST;
        }
    }

    fn update_baro(&mut self, armed: bool, pressure: f32, timestamp_us: u32) {
        self.world.borrow_mut().baro_updates.push((armed, pressure, timestamp_us));
    }

    fn update_accel(&mut self, accel_gs: &[f32; 3], timestamp_us: u32) {
        self.world.borrow_mut().accel_updates.push((*accel_gs, timestamp_us));
    }

    fn handle_aux_switch(&mut self, demands: &Demands) {
        self.hold = demands.aux > 0;
        self.world.borrow_mut().aux_switches.push(*demands);
    }
}

// ── Mixer ─────────────────────────────────────────────────────────────────────

pub struct FakeMixer {
    world: Shared,
    last: [f32; MOTORS],
}

impl FakeMixer {
    pub fn new(world: Shared) -> Self {
        Self { world, last: [0.0; MOTORS] }
    }
}

impl Mixer for FakeMixer {
    fn init(&mut self) -> InitResult {
        init_step(&self.world, "mixer", InitError::Mixer)
    }

    fn run_armed(&mut self, demands: &Demands) {
        self.last = [demands.throttle; MOTORS];
        let mut w = self.world.borrow_mut();
        w.log.push("run_armed");
        w.run_armed.push(*demands);
    }

    fn cut_motors(&mut self) {
        self.last = [0.0; MOTORS];
        let mut w = self.world.borrow_mut();
        w.log.push("cut_motors");
        w.cut_motors += 1;
    }

    fn motor_values(&self) -> [f32; MOTORS] {
        self.last
    }
}

// ── Harness ───────────────────────────────────────────────────────────────────

pub type Core = FlightOrchestrator<FakeBoard, ScriptedReceiver, FakeStabilizer, FakeAltitude, FakeMixer>;

pub fn try_build(world: &Shared) -> Result<Core, InitError> {
    FlightOrchestrator::init(
        FakeBoard(world.clone()),
        ScriptedReceiver::new(world.clone()),
        FakeStabilizer(world.clone()),
        FakeAltitude::new(world.clone()),
        FakeMixer::new(world.clone()),
    )
}

/// A level vehicle with gyro and attitude samples on every tick.
pub fn build() -> (Shared, Core) {
    let world = Shared::default();
    {
        let mut w = world.borrow_mut();
        w.gyro = Some([0.0; 3]);
        w.euler = Some([0.0; 3]);
    }
    let core = match try_build(&world) {
        Ok(core) => core,
        Err(e) => panic!("init failed: {}", e),
    };
    (world, core)
}

/// Queue `frame` and run one tick.
pub fn tick_with(world: &Shared, core: &mut Core, frame: Frame) {
    world.borrow_mut().frame = Some(frame);
    core.tick();
}

/// Arm a level vehicle and clear the observations made on the way.
pub fn build_armed() -> (Shared, Core) {
    let (world, mut core) = build();
    tick_with(&world, &mut core, Frame::arm());
    assert!(core.state().armed(), "level vehicle failed to arm");
    reset_observations(&world);
    (world, core)
}

pub fn reset_observations(world: &Shared) {
    let mut w = world.borrow_mut();
    w.log.clear();
    w.armed_status.clear();
    w.run_armed.clear();
    w.cut_motors = 0;
    w.integral_resets = 0;
    w.aux_switches.clear();
    w.yaw_references.clear();
    w.stabilizer_demands.clear();
}

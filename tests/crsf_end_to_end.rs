//! The orchestrator with the CRSF receiver and the reference collaborators:
//! bytes in, motor commands out.

mod common;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use common::{FakeBoard, Shared};
use quad_flight_core::altitude::KalmanAltitude;
use quad_flight_core::config::{AltitudeConfig, ReceiverConfig, StabilizerConfig};
use quad_flight_core::mixer::{Mixer, MotorOutput, QuadXMixer, MOTORS};
use quad_flight_core::receiver::crsf::{pack_rc_frame, ByteSource, CrsfReceiver};
use quad_flight_core::receiver::Clock;
use quad_flight_core::stabilizer::PidStabilizer;
use quad_flight_core::FlightOrchestrator;

const LOW: u16 = 172;
const MID: u16 = 992;
const HIGH: u16 = 1811;

#[derive(Clone, Default)]
struct Wire(Rc<RefCell<VecDeque<u8>>>);

impl Wire {
    /// Radio-order channels: roll, pitch, throttle, yaw, aux1, aux2.
    fn send(&self, throttle: u16, aux1: u16) {
        let mut ch = [MID; 16];
        ch[2] = throttle;
        ch[4] = aux1;
        ch[5] = LOW;
        self.0.borrow_mut().extend(pack_rc_frame(&ch));
    }
}

impl ByteSource for Wire {
    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        let mut q = self.0.borrow_mut();
        let n = buf.len().min(q.len());
        for (slot, b) in buf.iter_mut().zip(q.drain(..n)) {
            *slot = b;
        }
        n
    }
}

#[derive(Clone, Default)]
struct SharedClock(Rc<Cell<u32>>);

impl Clock for SharedClock {
    fn now_us(&self) -> u32 {
        self.0.get()
    }
}

#[derive(Default)]
struct Esc {
    written: Option<[f32; MOTORS]>,
    stops: u32,
}

impl MotorOutput for Esc {
    fn write_motors(&mut self, values: &[f32; MOTORS]) {
        self.written = Some(*values);
    }

    fn stop(&mut self) {
        self.written = None;
        self.stops += 1;
    }
}

#[test]
fn arm_fly_and_failsafe_over_crsf() {
    let world = Shared::default();
    {
        let mut w = world.borrow_mut();
        w.gyro = Some([0.0; 3]);
        w.euler = Some([0.0; 3]);
    }
    let wire = Wire::default();
    let clock = SharedClock::default();

    let receiver = CrsfReceiver::new(wire.clone(), clock.clone(), ReceiverConfig::DEFAULT);
    let mut core = match FlightOrchestrator::init(
        FakeBoard(world.clone()),
        receiver,
        PidStabilizer::new(StabilizerConfig::DEFAULT),
        KalmanAltitude::new(AltitudeConfig::DEFAULT),
        QuadXMixer::new(Esc::default()),
    ) {
        Ok(core) => core,
        Err(e) => panic!("{}", e),
    };
    assert_eq!(core.mixer().output().stops, 1);

    // Switch must be seen low before its rising edge counts.
    wire.send(LOW, LOW);
    core.tick();
    assert!(!core.state().armed());

    clock.0.set(10_000);
    wire.send(LOW, HIGH);
    core.tick();
    assert!(core.state().armed());

    clock.0.set(20_000);
    wire.send(1400, HIGH);
    core.tick();
    core.tick();
    // Raw 1400 is about 0.75 throttle; a level vehicle mixes it evenly.
    let motors = core.mixer().output().written.unwrap();
    assert!(motors.iter().all(|m| (m - 0.7488).abs() < 1e-3), "{:?}", motors);

    // Radio goes quiet past the timeout.
    clock.0.set(20_000 + ReceiverConfig::DEFAULT.timeout_us + 1);
    core.tick();
    assert!(core.state().failsafe());
    assert!(!core.state().armed());
    assert_eq!(core.mixer().motor_values(), [0.0; MOTORS]);
    assert!(core.mixer().output().written.is_none());
}

#[test]
fn corrupted_frames_are_ignored() {
    let world = Shared::default();
    world.borrow_mut().euler = Some([0.0; 3]);
    let wire = Wire::default();
    let clock = SharedClock::default();

    let receiver = CrsfReceiver::new(wire.clone(), clock, ReceiverConfig::DEFAULT);
    let mut core = match FlightOrchestrator::init(
        FakeBoard(world.clone()),
        receiver,
        PidStabilizer::new(StabilizerConfig::DEFAULT),
        KalmanAltitude::new(AltitudeConfig::DEFAULT),
        QuadXMixer::new(Esc::default()),
    ) {
        Ok(core) => core,
        Err(e) => panic!("{}", e),
    };

    let mut ch = [MID; 16];
    ch[2] = LOW;
    let mut frame = pack_rc_frame(&ch);
    frame[5] ^= 0x40;
    wire.0.borrow_mut().extend(frame);
    core.tick();

    assert_eq!(core.state().counters.receiver, 0);
    assert_eq!(core.receiver().parser().crc_errors(), 1);
}

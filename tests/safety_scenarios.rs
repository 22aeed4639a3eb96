//! Arming, disarming, failsafe and the actuation gate, driven through full
//! control cycles.

mod common;

use core::f32::consts::PI;

use common::{build, build_armed, tick_with, Frame, MAX_ARMING_ANGLE};
use quad_flight_core::safety::ArmState;
use quad_flight_core::Receiver;

#[test]
fn level_arming_edge_arms_and_captures_heading() {
    let (world, mut core) = build();
    world.borrow_mut().euler = Some([0.0, 0.0, -PI / 2.0]);

    tick_with(&world, &mut core, Frame::arm());

    assert!(core.state().armed());
    assert!(!core.state().failsafe());
    assert!((core.state().yaw_initial() - 3.0 * PI / 2.0).abs() < 1e-5);
    assert_eq!(world.borrow().armed_status.last(), Some(&true));
}

#[test]
fn signal_loss_while_armed_enters_failsafe_in_the_same_cycle() {
    let (world, mut core) = build_armed();
    tick_with(&world, &mut core, Frame::flying(0.5));
    // The gyro step acts on the previous frame's demands.
    core.tick();
    assert_eq!(world.borrow().run_armed.len(), 1);

    world.borrow_mut().lost_signal = true;
    core.tick();

    let w = world.borrow();
    assert!(!core.state().armed());
    assert!(core.state().failsafe());
    assert_eq!(core.state().safety.state(), ArmState::Failsafe);
    assert_eq!(w.cut_motors, 1);
    assert_eq!(w.run_armed.len(), 1, "no actuation on the failsafe cycle");
    assert_eq!(w.armed_status.last(), Some(&false));
}

#[test]
fn throttle_down_cuts_every_cycle_without_disarming() {
    let (world, mut core) = build_armed();

    for n in 1..=5 {
        tick_with(&world, &mut core, Frame::idle());
        assert_eq!(world.borrow().cut_motors, n);
        assert!(core.state().armed());
    }
    assert!(world.borrow().run_armed.is_empty());
}

#[test]
fn failsafe_is_sticky() {
    let (world, mut core) = build_armed();
    world.borrow_mut().lost_signal = true;
    core.tick();
    assert!(core.state().failsafe());

    // Link comes back and the pilot cycles the arming gesture.
    world.borrow_mut().lost_signal = false;
    for _ in 0..50 {
        tick_with(&world, &mut core, Frame::idle());
        tick_with(&world, &mut core, Frame::arm());
        tick_with(&world, &mut core, Frame::flying(0.6));
        assert!(core.state().failsafe());
        assert!(!core.state().armed());
    }
    assert_eq!(world.borrow().cut_motors, 1);
    assert!(world.borrow().run_armed.is_empty());
}

#[test]
fn signal_loss_while_disarmed_is_not_failsafe() {
    let (world, mut core) = build();
    world.borrow_mut().lost_signal = true;
    for _ in 0..10 {
        core.tick();
    }
    assert!(!core.state().failsafe());

    world.borrow_mut().lost_signal = false;
    tick_with(&world, &mut core, Frame::arm());
    assert!(core.state().armed());
}

#[test]
fn disarm_fires_on_first_edge_regardless_of_aux_and_attitude() {
    let (world, mut core) = build_armed();
    world.borrow_mut().euler = Some([1.2, -1.2, 0.3]);

    tick_with(&world, &mut core, Frame::disarm().with_aux(2));

    assert!(!core.state().armed());
    assert!(!core.state().failsafe());
    assert_eq!(world.borrow().armed_status.last(), Some(&false));
}

#[test]
fn disarm_while_flying_stops_motors() {
    let (world, mut core) = build_armed();
    tick_with(&world, &mut core, Frame::flying(0.5));
    assert_eq!(world.borrow().cut_motors, 0);

    tick_with(&world, &mut core, Frame { disarming: true, ..Frame::flying(0.5) });
    assert!(!core.state().armed());
    assert_eq!(world.borrow().cut_motors, 1);

    tick_with(&world, &mut core, Frame::flying(0.5));
    assert_eq!(world.borrow().run_armed.len(), 1);
}

#[test]
fn arming_refused_when_tilted() {
    for angles in [
        [MAX_ARMING_ANGLE, 0.0, 0.0],
        [0.0, -MAX_ARMING_ANGLE, 0.0],
        [-0.8, 0.0, 0.0],
        [0.0, 0.8, 0.0],
    ] {
        let (world, mut core) = build();
        world.borrow_mut().euler = Some(angles);
        tick_with(&world, &mut core, Frame::arm());
        assert!(!core.state().armed(), "armed at {:?}", angles);
    }

    let (world, mut core) = build();
    world.borrow_mut().euler = Some([MAX_ARMING_ANGLE - 0.01, -(MAX_ARMING_ANGLE - 0.01), 0.0]);
    tick_with(&world, &mut core, Frame::arm());
    assert!(core.state().armed());
}

#[test]
fn arming_refused_with_aux_engaged() {
    let (world, mut core) = build();
    tick_with(&world, &mut core, Frame::idle().with_aux(1));
    tick_with(&world, &mut core, Frame::arm().with_aux(1));
    assert!(!core.state().armed());
}

#[test]
fn aux_released_on_the_arming_frame_still_refuses() {
    let (world, mut core) = build();
    tick_with(&world, &mut core, Frame::idle().with_aux(1));
    tick_with(&world, &mut core, Frame::arm().with_aux(0));
    assert!(!core.state().armed());
    assert_eq!(core.state().aux_state, 0);
}

#[test]
fn aux_engaged_on_the_arming_frame_still_arms() {
    let (world, mut core) = build();
    tick_with(&world, &mut core, Frame::idle());
    tick_with(&world, &mut core, Frame::arm().with_aux(1));
    assert!(core.state().armed());
    assert_eq!(core.state().aux_state, 1);
}

#[test]
fn arming_needs_an_edge_not_a_level() {
    let (world, mut core) = build();
    world.borrow_mut().euler = Some([0.6, 0.0, 0.0]);
    tick_with(&world, &mut core, Frame::arm());
    assert!(!core.state().armed());

    // Levelled out while the gesture is still held: no new edge.
    world.borrow_mut().euler = Some([0.0; 3]);
    for _ in 0..10 {
        tick_with(&world, &mut core, Frame::idle());
    }
    assert!(!core.state().armed());
}

#[test]
fn rearming_captures_the_new_heading() {
    let (world, mut core) = build_armed();
    assert_eq!(core.state().yaw_initial(), 0.0);

    tick_with(&world, &mut core, Frame::disarm());
    world.borrow_mut().euler = Some([0.0, 0.0, 1.0]);
    tick_with(&world, &mut core, Frame::arm());

    assert!(core.state().armed());
    assert!((core.state().yaw_initial() - 1.0).abs() < 1e-6);
}

/// Tiny LCG so the sequence is reproducible without extra test crates.
struct Lcg(u32);

impl Lcg {
    fn next(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        self.0 >> 16
    }
}

#[test]
fn actuation_only_when_armed_safe_and_throttle_up() {
    let (world, mut core) = build();
    let mut rng = Lcg(0x5eed);
    let mut seen_failsafe = false;

    for _ in 0..2000 {
        let frame = match rng.next() % 6 {
            0 => Some(Frame::arm()),
            1 => Some(Frame::disarm()),
            2 => Some(Frame::idle()),
            3 | 4 => Some(Frame::flying(0.5)),
            _ => None,
        };
        // Rare, short link drops.
        let lost = rng.next() % 97 == 0;

        let armed_before = core.state().armed();
        let throttle_down_before = core.receiver().throttle_is_down();
        let runs_before = world.borrow().run_armed.len();

        {
            let mut w = world.borrow_mut();
            w.frame = frame;
            w.lost_signal = lost;
        }
        core.tick();

        let ran = world.borrow().run_armed.len() > runs_before;
        let expected = armed_before && !lost && !throttle_down_before;
        assert_eq!(ran, expected);

        let s = core.state();
        assert!(!(s.failsafe() && s.armed()));
        if seen_failsafe {
            assert!(s.failsafe());
        }
        seen_failsafe |= s.failsafe();
    }
}

#![cfg_attr(not(test), no_std)]

//! quad-flight-core - execution core of a multirotor flight controller.
//!
//! A fixed-order, poll-driven control cycle ([`FlightOrchestrator`]) fuses
//! gyro, attitude, receiver, accelerometer and barometer samples into motor
//! demands. Actuation is gated by the arming/failsafe state machine in
//! [`safety`]. Pilot input comes through the [`Receiver`] capability set,
//! implemented by a CRSF serial receiver and a USB host-input receiver.

// Must come first so the logging macros are visible in every module.
mod fmt;

pub mod altitude;
pub mod board;
pub mod config;
pub mod error;
pub mod filter;
pub mod mixer;
pub mod orchestrator;
pub mod receiver;
pub mod safety;
pub mod stabilizer;
pub mod state;

pub use altitude::AltitudeEstimator;
pub use board::Board;
pub use error::InitError;
pub use mixer::Mixer;
pub use orchestrator::FlightOrchestrator;
pub use receiver::Receiver;
pub use safety::{ArmState, SafetyStateMachine};
pub use stabilizer::Stabilizer;
pub use state::{Attitude, Demands, FlightState};

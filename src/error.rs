//! Initialization errors.
//!
//! Steady-state operation has no error path: a sensor without new data is
//! simply skipped for the cycle. The only failure the core reports is a
//! collaborator that could not be brought up, and that one is fatal.

use core::fmt;

/// Result type for collaborator initialization
pub type InitResult = Result<(), InitError>;

/// A collaborator failed its one-time initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError {
    /// Board bring-up (clocks, buses, sensors) failed
    Board(&'static str),
    /// Receiver transport could not be started
    Receiver(&'static str),
    /// Stabilizer configuration rejected
    Stabilizer(&'static str),
    /// Motor outputs could not be initialized
    Mixer(&'static str),
    /// Altitude estimator configuration rejected
    Altitude(&'static str),
}

impl InitError {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Board(r)
            | Self::Receiver(r)
            | Self::Stabilizer(r)
            | Self::Mixer(r)
            | Self::Altitude(r) => r,
        }
    }

    fn collaborator(&self) -> &'static str {
        match self {
            Self::Board(_) => "board",
            Self::Receiver(_) => "receiver",
            Self::Stabilizer(_) => "stabilizer",
            Self::Mixer(_) => "mixer",
            Self::Altitude(_) => "altitude estimator",
        }
    }
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} init failed: {}", self.collaborator(), self.reason())
    }
}

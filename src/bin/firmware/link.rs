//! Adapters between the embassy task plumbing and the core's transport
//! traits. Everything here is non-blocking.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pipe::Pipe;
use embassy_time::Instant;
use quad_flight_core::receiver::crsf::ByteSource;
use quad_flight_core::receiver::Clock;

pub type CrsfPipe = Pipe<CriticalSectionRawMutex, 128>;

/// Microseconds since boot, truncated.
#[derive(Clone, Copy)]
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now_us(&self) -> u32 {
        Instant::now().as_micros() as u32
    }
}

/// CRSF bytes pumped from UART4 by `crsf_task`.
pub struct PipeSource(pub &'static CrsfPipe);

impl ByteSource for PipeSource {
    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        self.0.try_read(buf).unwrap_or(0)
    }
}

#[cfg(feature = "host-input")]
pub use host::ChannelReports;

#[cfg(feature = "host-input")]
mod host {
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::channel::Receiver;
    use quad_flight_core::receiver::host::{HostReport, ReportSource};

    /// Host reports forwarded from USB by `host_input_task`.
    pub struct ChannelReports(pub Receiver<'static, CriticalSectionRawMutex, HostReport, 1>);

    impl ReportSource for ChannelReports {
        fn poll_report(&mut self) -> Option<HostReport> {
            self.0.try_receive().ok()
        }
    }
}

//! Host-input receiver.
//!
//! Pilot input arrives from a host computer (a gamepad or joystick read by a
//! ground-station program) as reports of signed 16-bit axes over a USB class
//! link. The transport only has to hand over complete reports; axis mapping,
//! inversion and normalization happen here.

use crate::config::{ReceiverConfig, HOST_AXIS_INVERT, HOST_AXIS_MAP};
use crate::error::InitResult;

use super::{ChannelMap, Clock, DemandTracker, RawChannels, Receiver, CHANNELS};

/// One input report: raw axes in transport order.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HostReport {
    pub axes: [i16; CHANNELS],
}

impl HostReport {
    pub const WIRE_LEN: usize = CHANNELS * 2;

    /// Axes as consecutive little-endian `i16`. `None` on a short report.
    pub fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::WIRE_LEN {
            return None;
        }
        let mut axes = [0i16; CHANNELS];
        for (axis, pair) in axes.iter_mut().zip(bytes.chunks_exact(2)) {
            *axis = i16::from_le_bytes([pair[0], pair[1]]);
        }
        Some(Self { axes })
    }
}

/// Non-blocking supplier of host reports.
pub trait ReportSource {
    fn begin(&mut self) -> InitResult {
        Ok(())
    }

    /// The newest unread report, if any.
    fn poll_report(&mut self) -> Option<HostReport>;
}

/// Signed axis onto [-1, 1]. `i16::MIN` saturates at -1.
pub fn axis_to_unit(value: i16) -> f32 {
    (value as f32 / i16::MAX as f32).clamp(-1.0, 1.0)
}

pub struct HostInputReceiver<S, C> {
    source: S,
    clock: C,
    map: ChannelMap,
    invert: [bool; CHANNELS],
    latest: HostReport,
    fresh: bool,
    last_report_us: Option<u32>,
    tracker: DemandTracker,
}

impl<S: ReportSource, C: Clock> HostInputReceiver<S, C> {
    pub fn new(source: S, clock: C, cfg: ReceiverConfig) -> Self {
        Self::with_axis_map(source, clock, cfg, HOST_AXIS_MAP, HOST_AXIS_INVERT)
    }

    pub fn with_axis_map(
        source: S,
        clock: C,
        cfg: ReceiverConfig,
        map: ChannelMap,
        invert: [bool; CHANNELS],
    ) -> Self {
        Self {
            source,
            clock,
            map,
            invert,
            latest: HostReport::default(),
            fresh: false,
            last_report_us: None,
            tracker: DemandTracker::new(cfg),
        }
    }

    fn poll(&mut self) {
        while let Some(report) = self.source.poll_report() {
            self.latest = report;
            self.fresh = true;
            self.last_report_us = Some(self.clock.now_us());
        }
    }
}

impl<S: ReportSource, C: Clock> Receiver for HostInputReceiver<S, C> {
    fn begin(&mut self) -> InitResult {
        self.source.begin()
    }

    fn got_new_frame(&mut self) -> bool {
        self.poll();
        core::mem::take(&mut self.fresh)
    }

    fn read_raw_channels(&mut self) -> RawChannels {
        let mut raw = [0.0; CHANNELS];
        for (logical, out) in raw.iter_mut().enumerate() {
            let value = self.latest.axes.get(self.map[logical]).copied().map_or(0.0, axis_to_unit);
            *out = if self.invert[logical] { -value } else { value };
        }
        raw
    }

    fn lost_signal(&mut self) -> bool {
        self.poll();
        match self.last_report_us {
            Some(t) => self.clock.now_us().wrapping_sub(t) > self.tracker.config().timeout_us,
            None => true,
        }
    }

    fn tracker(&self) -> &DemandTracker {
        &self.tracker
    }

    fn tracker_mut(&mut self) -> &mut DemandTracker {
        &mut self.tracker
    }
}

//! CRSF (Crossfire / ELRS) serial receiver.
//!
//! Frames are `[sync] [len] [type] [payload..] [crc]`, where `len` counts
//! type + payload + crc and the CRC-8 (poly 0xD5) covers type + payload.
//! Only the packed RC channels frame (0x16, 16 × 11 bit) is consumed.

use crate::config::{ReceiverConfig, CRSF_CHANNEL_MAP};
use crate::error::InitResult;

use super::{ChannelMap, Clock, DemandTracker, RawChannels, Receiver, CHANNELS};

pub const CRSF_SYNC: u8 = 0xC8;
pub const CRSF_FRAMETYPE_RC_CHANNELS_PACKED: u8 = 0x16;

const RC_PAYLOAD_LEN: usize = 22;
const MAX_FRAME_LEN: usize = 64;

/// 11-bit channel value at stick center and the half-span to full deflection.
pub const CRSF_CHANNEL_CENTER: f32 = 992.0;
pub const CRSF_CHANNEL_HALF_SPAN: f32 = 820.0;

/// Non-blocking byte transport feeding the decoder (a UART RX buffer).
pub trait ByteSource {
    fn begin(&mut self) -> InitResult {
        Ok(())
    }

    /// Copy whatever bytes are available into `buf`; 0 when none are.
    fn read_available(&mut self, buf: &mut [u8]) -> usize;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RcChannels {
    pub channels: [u16; 16], // 11-bit values (0-2047)
}

// ── Decoder ───────────────────────────────────────────────────────────────────

pub struct CrsfParser {
    buffer: heapless::Vec<u8, MAX_FRAME_LEN>,
    crc_errors: u32,
}

impl Default for CrsfParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CrsfParser {
    pub fn new() -> Self {
        Self {
            buffer: heapless::Vec::new(),
            crc_errors: 0,
        }
    }

    /// Frames dropped on CRC mismatch since start-up.
    pub fn crc_errors(&self) -> u32 {
        self.crc_errors
    }

    pub fn push_byte(&mut self, b: u8) -> Option<RcChannels> {
        if self.buffer.is_empty() {
            if b == CRSF_SYNC {
                let _ = self.buffer.push(b);
            }
            return None;
        }

        if self.buffer.len() == 1 {
            // Type + at least crc, and the whole frame must fit the buffer.
            if !(2..=(MAX_FRAME_LEN - 2) as u8).contains(&b) {
                self.buffer.clear();
                if b == CRSF_SYNC {
                    let _ = self.buffer.push(b);
                }
                return None;
            }
            let _ = self.buffer.push(b);
            return None;
        }

        let _ = self.buffer.push(b);
        let total = 2 + self.buffer[1] as usize;
        if self.buffer.len() < total {
            return None;
        }

        let frame = &self.buffer[..total];
        let body = &frame[2..total - 1];
        let result = if crc8_dvb_s2(body) != frame[total - 1] {
            self.crc_errors = self.crc_errors.wrapping_add(1);
            None
        } else if body[0] == CRSF_FRAMETYPE_RC_CHANNELS_PACKED && body.len() == 1 + RC_PAYLOAD_LEN {
            unpack_channels(&body[1..])
        } else {
            None
        };

        self.buffer.clear();
        result
    }

    /// Feed a chunk; returns the last complete RC frame in it, if any.
    pub fn push_bytes(&mut self, data: &[u8]) -> Option<RcChannels> {
        data.iter().fold(None, |last, &b| self.push_byte(b).or(last))
    }
}

pub fn crc8_dvb_s2(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |crc, &b| {
        (0..8).fold(crc ^ b, |crc, _| {
            if crc & 0x80 != 0 {
                (crc << 1) ^ 0xD5
            } else {
                crc << 1
            }
        })
    })
}

/// 16 channels × 11 bits, packed LSB first.
fn unpack_channels(payload: &[u8]) -> Option<RcChannels> {
    if payload.len() != RC_PAYLOAD_LEN {
        return None;
    }
    let mut out = RcChannels::default();
    let mut acc: u32 = 0;
    let mut bits = 0;
    let mut ch = 0;
    for &byte in payload {
        acc |= (byte as u32) << bits;
        bits += 8;
        while bits >= 11 && ch < out.channels.len() {
            out.channels[ch] = (acc & 0x07FF) as u16;
            acc >>= 11;
            bits -= 11;
            ch += 1;
        }
    }
    Some(out)
}

/// Inverse of the decoder, for link simulators and tests.
pub fn pack_rc_frame(channels: &[u16; 16]) -> [u8; 4 + RC_PAYLOAD_LEN] {
    let mut frame = [0u8; 4 + RC_PAYLOAD_LEN];
    frame[0] = CRSF_SYNC;
    frame[1] = (2 + RC_PAYLOAD_LEN) as u8;
    frame[2] = CRSF_FRAMETYPE_RC_CHANNELS_PACKED;

    let mut acc: u32 = 0;
    let mut bits = 0;
    let mut idx = 3;
    for &value in channels {
        acc |= ((value & 0x07FF) as u32) << bits;
        bits += 11;
        while bits >= 8 {
            frame[idx] = acc as u8;
            acc >>= 8;
            bits -= 8;
            idx += 1;
        }
    }
    frame[3 + RC_PAYLOAD_LEN] = crc8_dvb_s2(&frame[2..3 + RC_PAYLOAD_LEN]);
    frame
}

/// 11-bit CRSF value onto [-1, 1].
pub fn crsf_to_unit(value: u16) -> f32 {
    ((value as f32 - CRSF_CHANNEL_CENTER) / CRSF_CHANNEL_HALF_SPAN).clamp(-1.0, 1.0)
}

// ── Receiver ──────────────────────────────────────────────────────────────────

pub struct CrsfReceiver<S, C> {
    source: S,
    clock: C,
    parser: CrsfParser,
    map: ChannelMap,
    latest: RcChannels,
    fresh: bool,
    last_frame_us: Option<u32>,
    tracker: DemandTracker,
}

impl<S: ByteSource, C: Clock> CrsfReceiver<S, C> {
    pub fn new(source: S, clock: C, cfg: ReceiverConfig) -> Self {
        Self::with_channel_map(source, clock, cfg, CRSF_CHANNEL_MAP)
    }

    pub fn with_channel_map(source: S, clock: C, cfg: ReceiverConfig, map: ChannelMap) -> Self {
        Self {
            source,
            clock,
            parser: CrsfParser::new(),
            map,
            latest: RcChannels::default(),
            fresh: false,
            last_frame_us: None,
            tracker: DemandTracker::new(cfg),
        }
    }

    pub fn parser(&self) -> &CrsfParser {
        &self.parser
    }

    /// Drain the transport into the decoder.
    fn pump(&mut self) {
        let mut buf = [0u8; MAX_FRAME_LEN];
        loop {
            let n = self.source.read_available(&mut buf);
            if n == 0 {
                break;
            }
            if let Some(frame) = self.parser.push_bytes(&buf[..n]) {
                self.latest = frame;
                self.fresh = true;
                self.last_frame_us = Some(self.clock.now_us());
            }
        }
    }
}

impl<S: ByteSource, C: Clock> Receiver for CrsfReceiver<S, C> {
    fn begin(&mut self) -> InitResult {
        self.source.begin()
    }

    fn got_new_frame(&mut self) -> bool {
        self.pump();
        core::mem::take(&mut self.fresh)
    }

    fn read_raw_channels(&mut self) -> RawChannels {
        let mut raw = [0.0; CHANNELS];
        for (out, &src) in raw.iter_mut().zip(self.map.iter()) {
            *out = self.latest.channels.get(src).copied().map_or(0.0, crsf_to_unit);
        }
        raw
    }

    fn lost_signal(&mut self) -> bool {
        self.pump();
        match self.last_frame_us {
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

//! Sample smoothing for sensor streams.
//!
//! Both filters seed themselves from their first input, so a stream that
//! starts far from zero does not ramp in.

use core::f32::consts::PI;

use micromath::F32Ext;

/// First-order low pass.
#[derive(Debug, Clone, Copy)]
pub struct Pt1Filter {
    alpha: f32,
    state: Option<f32>,
}

impl Pt1Filter {
    pub fn new(cutoff_hz: f32, sample_rate_hz: f32) -> Self {
        let dt = 1.0 / sample_rate_hz;
        let rc = 1.0 / (2.0 * PI * cutoff_hz);
        Self { alpha: (dt / (rc + dt)).clamp(0.0, 1.0), state: None }
    }

    pub fn filter(&mut self, input: f32) -> f32 {
        let next = match self.state {
            Some(prev) => prev + self.alpha * (input - prev),
            None => input,
        };
        self.state = Some(next);
        next
    }

    pub fn reset(&mut self) {
        self.state = None;
    }
}

/// Second-order low pass, direct form II transposed.
#[derive(Debug, Clone, Copy)]
pub struct BiquadFilter {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
    primed: bool,
}

impl BiquadFilter {
    /// Butterworth response for `q = 1/√2`.
    pub fn lowpass(cutoff_hz: f32, sample_rate_hz: f32, q: f32) -> Self {
        let omega = 2.0 * PI * cutoff_hz / sample_rate_hz;
        let (sn, cs) = (omega.sin(), omega.cos());
        let alpha = sn / (2.0 * q);
        let a0 = 1.0 + alpha;

        Self {
            b0: (1.0 - cs) / 2.0 / a0,
            b1: (1.0 - cs) / a0,
            b2: (1.0 - cs) / 2.0 / a0,
            a1: -2.0 * cs / a0,
            a2: (1.0 - alpha) / a0,
            z1: 0.0,
            z2: 0.0,
            primed: false,
        }
    }

    pub fn filter(&mut self, input: f32) -> f32 {
        if !self.primed {
            // Delay line at DC steady state for `input`.
            self.z1 = input * (1.0 - self.b0);
            self.z2 = input * (self.b2 - self.a2);
            self.primed = true;
        }

        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }

    pub fn reset(&mut self) {
        self.primed = false;
    }
}

/// One biquad per axis.
#[derive(Debug, Clone, Copy)]
pub struct Biquad3 {
    axes: [BiquadFilter; 3],
}

impl Biquad3 {
    pub fn lowpass(cutoff_hz: f32, sample_rate_hz: f32) -> Self {
        let f = BiquadFilter::lowpass(cutoff_hz, sample_rate_hz, core::f32::consts::FRAC_1_SQRT_2);
        Self { axes: [f; 3] }
    }

    pub fn filter(&mut self, input: [f32; 3]) -> [f32; 3] {
        let mut out = [0.0; 3];
        for ((o, f), x) in out.iter_mut().zip(self.axes.iter_mut()).zip(input) {
            *o = f.filter(x);
        }
        out
    }
}

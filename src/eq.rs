//! Ten-band peaking equalizer: biquad stages and named gain presets.

use crate::engine::EngineCommand;
use crossbeam::channel::Sender;
use std::f32::consts::PI;

/// Fixed band center frequencies in Hz, low to high.
pub const BAND_FREQUENCIES: [f32; BAND_COUNT] = [
    32., 64., 125., 250., 500., 1000., 2000., 4000., 8000., 16000.,
];
pub const BAND_COUNT: usize = 10;
/// Band gain domain in dB.
pub const GAIN_MIN_DB: f32 = -12.0;
pub const GAIN_MAX_DB: f32 = 12.0;
/// Bandwidth of every stage; not user-adjustable.
pub const BAND_Q: f32 = 1.4;

/// Named presets, ten dB values each, one per band.
pub const EQ_PRESETS: [(&str, [f32; BAND_COUNT]); 19] = [
    ("Flat", [0., 0., 0., 0., 0., 0., 0., 0., 0., 0.]),
    ("Classical", [0., 0., 0., 0., 0., 0., -6., -6., -6., -8.]),
    ("Club", [0., 0., 2., 4., 4., 4., 2., 0., 0., 0.]),
    ("Dance", [8., 6., 2., 0., 0., -4., -6., -6., 0., 0.]),
    ("Bass", [6., 5., 4., 2., 0., 0., 0., 0., 0., 0.]),
    ("Full Bass", [8., 8., 8., 4., 2., -6., -8., -10., -10., -10.]),
    ("Full Treble", [-10., -10., -10., -8., -4., 4., 10., 12., 12., 12.]),
    ("Laptop", [4., 8., 2., -4., -2., 0., 4., 8., 10., 12.]),
    ("Large Hall", [8., 8., 4., 4., 0., -4., -4., -4., 0., 0.]),
    ("Live", [-4., 0., 4., 6., 6., 6., 4., 2., 2., 2.]),
    ("Party", [6., 6., 0., 0., 0., 0., 0., 0., 6., 6.]),
    ("Jazz", [4., 2., 0., 2., -2., -2., 0., 2., 4., 4.]),
    ("Pop", [-2., 4., 6., 4., -2., -2., -2., -2., -2., -2.]),
    ("Reggae", [0., 0., -2., -4., 0., 4., 4., 0., 0., 0.]),
    ("Rock", [6., 4., -6., -8., -2., 4., 8., 10., 10., 10.]),
    ("Soft", [4., 2., 0., -2., -2., 0., 2., 4., 8., 10.]),
    ("Ska", [-2., -4., -4., -2., 4., 6., 8., 10., 10., 8.]),
    ("Soft Rock", [4., 4., 2., 0., -4., -6., -4., -2., 2., 6.]),
    ("Techno", [6., 4., 0., -6., -6., -2., 6., 8., 8., 6.]),
];

/// Normalized biquad coefficients (a0 divided out).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl BiquadCoeffs {
    /// Passthrough, used as a fallback for degenerate parameters.
    pub fn identity() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    /// Peaking (bell) filter, RBJ cookbook form.
    pub fn peaking(freq: f32, q: f32, gain_db: f32, sample_rate: f32) -> Self {
        // a 0 dB bell is exactly transparent; skip the filter math
        if gain_db == 0.0 {
            return Self::identity();
        }
        let q = q.max(0.01);
        let freq = freq.clamp(1.0, sample_rate * 0.499);

        let a = 10.0_f32.powf(gain_db / 40.0);
        if !a.is_finite() || a < 1e-10 {
            return Self::identity();
        }

        let w0 = 2.0 * PI * freq / sample_rate;
        let alpha = w0.sin() / (2.0 * q);
        if !alpha.is_finite() {
            return Self::identity();
        }

        let a0 = 1.0 + alpha / a;
        Self {
            b0: (1.0 + alpha * a) / a0,
            b1: (-2.0 * w0.cos()) / a0,
            b2: (1.0 - alpha * a) / a0,
            a1: (-2.0 * w0.cos()) / a0,
            a2: (1.0 - alpha / a) / a0,
        }
    }
}

/// Direct Form I delay line for one channel of one stage.
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, c: &BiquadCoeffs, x: f32) -> f32 {
        let y = c.b0 * x + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

/// One adjustable band: peaking biquad with per-channel state and a gain
/// ramp toward the most recently requested target.
#[derive(Debug, Clone)]
pub struct FilterStage {
    freq: f32,
    coeffs: BiquadCoeffs,
    states: Vec<BiquadState>,
    gain_db: f32,
    target_db: f32,
    // dB per sample while ramping; zero once settled
    step_db: f32,
    sample_rate: f32,
}

impl FilterStage {
    pub fn new(freq: f32, sample_rate: f32) -> Self {
        Self {
            freq,
            coeffs: BiquadCoeffs::identity(),
            states: vec![BiquadState::default(); 2],
            gain_db: 0.0,
            target_db: 0.0,
            step_db: 0.0,
            sample_rate,
        }
    }

    pub fn gain_db(&self) -> f32 {
        self.gain_db
    }

    pub fn target_db(&self) -> f32 {
        self.target_db
    }

    /// Begin a linear ramp toward `db` over `ramp_secs`. A zero or negative
    /// ramp length applies the gain immediately.
    pub fn ramp_to(&mut self, db: f32, ramp_secs: f32) {
        self.target_db = db.clamp(GAIN_MIN_DB, GAIN_MAX_DB);
        let ramp_samples = ramp_secs * self.sample_rate;
        if ramp_samples <= 1.0 {
            self.gain_db = self.target_db;
            self.step_db = 0.0;
            self.refresh_coeffs();
        } else {
            self.step_db = (self.target_db - self.gain_db) / ramp_samples;
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32, channels: usize) {
        if self.sample_rate != sample_rate {
            self.sample_rate = sample_rate;
        }
        if self.states.len() != channels {
            self.states = vec![BiquadState::default(); channels];
        }
        self.refresh_coeffs();
    }

    fn refresh_coeffs(&mut self) {
        self.coeffs = BiquadCoeffs::peaking(self.freq, BAND_Q, self.gain_db, self.sample_rate);
    }

    /// Advance the ramp by one frame. Coefficients are recomputed only while
    /// the gain is actually moving.
    #[inline]
    pub fn tick(&mut self) {
        if self.step_db == 0.0 {
            return;
        }
        let next = self.gain_db + self.step_db;
        if (self.step_db > 0.0 && next >= self.target_db)
            || (self.step_db < 0.0 && next <= self.target_db)
        {
            self.gain_db = self.target_db;
            self.step_db = 0.0;
        } else {
            self.gain_db = next;
        }
        self.refresh_coeffs();
    }

    #[inline]
    pub fn process(&mut self, channel: usize, x: f32) -> f32 {
        self.states[channel].process(&self.coeffs, x)
    }

    pub fn reset_state(&mut self) {
        for s in &mut self.states {
            *s = BiquadState::default();
        }
    }
}

/// The user-visible side of the equalizer: the ten current gain values and
/// the preset table. Every change is forwarded to the engine as a per-band
/// ramp command; the visible array is replaced in one step.
pub struct EqualizerBank {
    gains: [f32; BAND_COUNT],
    cmd_tx: Sender<EngineCommand>,
}

impl EqualizerBank {
    pub fn new(cmd_tx: Sender<EngineCommand>) -> Self {
        Self {
            gains: [0.0; BAND_COUNT],
            cmd_tx,
        }
    }

    pub fn gains(&self) -> &[f32; BAND_COUNT] {
        &self.gains
    }

    pub fn preset_names() -> Vec<&'static str> {
        EQ_PRESETS.iter().map(|(name, _)| *name).collect()
    }

    /// Set one band. Out-of-range indices are a no-op.
    pub fn set_gain(&mut self, band: usize, db: f32) {
        if band >= BAND_COUNT {
            return;
        }
        let db = db.clamp(GAIN_MIN_DB, GAIN_MAX_DB);
        self.gains[band] = db;
        let _ = self.cmd_tx.send(EngineCommand::SetBandGain { band, db });
    }

    /// Apply a named preset to all ten bands. Unknown names are a no-op.
    pub fn apply_preset(&mut self, name: &str) {
        let Some((_, gains)) = EQ_PRESETS.iter().find(|(n, _)| *n == name) else {
            return;
        };
        self.gains = *gains;
        for (band, &db) in gains.iter().enumerate() {
            let _ = self.cmd_tx.send(EngineCommand::SetBandGain { band, db });
        }
    }

    /// Zero every band.
    pub fn reset(&mut self) {
        self.gains = [0.0; BAND_COUNT];
        for band in 0..BAND_COUNT {
            let _ = self.cmd_tx.send(EngineCommand::SetBandGain { band, db: 0.0 });
        }
    }

    /// Name of the preset whose values exactly match the current gains.
    pub fn matching_preset(&self) -> Option<&'static str> {
        EQ_PRESETS
            .iter()
            .find(|(_, gains)| *gains == self.gains)
            .map(|(name, _)| *name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::unbounded;

    fn sine(freq: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn zero_gain_is_identity() {
        let c = BiquadCoeffs::peaking(1000.0, BAND_Q, 0.0, 44100.0);
        assert_eq!(c, BiquadCoeffs::identity());
        // and the delay line passes samples through untouched
        let mut state = BiquadState::default();
        for &x in &[0.3f32, -0.7, 1.0] {
            assert_eq!(state.process(&c, x), x);
        }
    }

    #[test]
    fn boost_raises_center_frequency() {
        let mut stage = FilterStage::new(1000.0, 44100.0);
        stage.set_sample_rate(44100.0, 1);
        stage.ramp_to(12.0, 0.0);
        let input = sine(1000.0, 44100.0, 44100);
        let output: Vec<f32> = input.iter().map(|&x| stage.process(0, x)).collect();
        // +12 dB at the center is a factor of ~3.98 once the filter settles
        let ratio = rms(&output[22050..]) / rms(&input[22050..]);
        assert!(ratio > 3.0 && ratio < 5.0, "ratio was {ratio}");
    }

    #[test]
    fn cut_leaves_distant_band_mostly_untouched() {
        let mut stage = FilterStage::new(8000.0, 44100.0);
        stage.set_sample_rate(44100.0, 1);
        stage.ramp_to(-12.0, 0.0);
        let input = sine(100.0, 44100.0, 44100);
        let output: Vec<f32> = input.iter().map(|&x| stage.process(0, x)).collect();
        let ratio = rms(&output[22050..]) / rms(&input[22050..]);
        assert!(ratio > 0.8 && ratio < 1.2, "ratio was {ratio}");
    }

    #[test]
    fn ramp_converges_to_target() {
        let mut stage = FilterStage::new(1000.0, 44100.0);
        stage.ramp_to(6.0, 0.1);
        assert!(stage.gain_db().abs() < 0.01);
        assert_eq!(stage.target_db(), 6.0);
        // 0.1 s at 44100 Hz; run a little longer than the ramp
        for _ in 0..5000 {
            stage.tick();
        }
        assert!((stage.gain_db() - 6.0).abs() < 1e-3);
    }

    #[test]
    fn preset_readback_is_exact() {
        let (tx, _rx) = unbounded();
        let mut bank = EqualizerBank::new(tx);
        for (name, expected) in EQ_PRESETS {
            bank.apply_preset(name);
            assert_eq!(bank.gains(), &expected, "preset {name}");
            assert_eq!(bank.matching_preset(), Some(name));
        }
    }

    #[test]
    fn reset_issues_ten_zero_ramps() {
        let (tx, rx) = unbounded();
        let mut bank = EqualizerBank::new(tx);
        bank.apply_preset("Rock");
        while rx.try_recv().is_ok() {}

        bank.reset();
        assert_eq!(bank.gains(), &[0.0; BAND_COUNT]);
        let cmds: Vec<_> = rx.try_iter().collect();
        assert_eq!(cmds.len(), BAND_COUNT);
        for (band, cmd) in cmds.iter().enumerate() {
            match cmd {
                EngineCommand::SetBandGain { band: b, db } => {
                    assert_eq!(*b, band);
                    assert_eq!(*db, 0.0);
                }
                other => panic!("unexpected command {other:?}"),
            }
        }
    }

    #[test]
    fn set_gain_clamps_and_ignores_bad_index() {
        let (tx, rx) = unbounded();
        let mut bank = EqualizerBank::new(tx);
        bank.set_gain(0, 40.0);
        assert_eq!(bank.gains()[0], GAIN_MAX_DB);
        bank.set_gain(BAND_COUNT, 3.0);
        assert_eq!(rx.try_iter().count(), 1);
    }
}

//! Read side of the analysis tap: fixed-window time-domain and
//! frequency-domain snapshots of the post-filter signal, quantized to bytes
//! the way the renderer consumes them.

use crate::graph::SampleRing;
use ringbuffer::RingBuffer;
use spectrum_analyzer::windows::hann_window;
use spectrum_analyzer::{FrequencyLimit, samples_fft_to_spectrum, scaling::divide_by_N};

/// Samples per analysis window. Must be a power of two for the FFT.
pub const FFT_SIZE: usize = 2048;
/// Frequency bins exposed per snapshot, half the window.
pub const BIN_COUNT: usize = FFT_SIZE / 2;
// Magnitudes are mapped onto this dB range before quantization.
const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;
// Inter-frame smoothing factor for the frequency snapshot.
const SMOOTHING: f32 = 0.8;

pub struct Analyzer {
    tap: SampleRing,
    window: Vec<f32>,
    smoothed: Vec<f32>,
}

impl Analyzer {
    pub fn new(tap: SampleRing) -> Self {
        Self {
            tap,
            window: vec![0.0; FFT_SIZE],
            smoothed: vec![0.0; BIN_COUNT],
        }
    }

    /// Copy the latest window out of the tap. Shorter history is left-padded
    /// with silence so the window length never varies.
    fn snapshot(&mut self) {
        let tap = self.tap.lock().unwrap();
        let len = tap.len().min(FFT_SIZE);
        let skip = tap.len() - len;
        self.window[..FFT_SIZE - len].fill(0.0);
        for (dst, &s) in self.window[FFT_SIZE - len..]
            .iter_mut()
            .zip(tap.iter().skip(skip))
        {
            *dst = s;
        }
    }

    /// Time-domain amplitudes quantized to unsigned bytes, 128-centered.
    pub fn byte_time_domain(&mut self) -> Vec<u8> {
        self.snapshot();
        self.window
            .iter()
            .map(|&s| ((s.clamp(-1.0, 1.0) + 1.0) * 0.5 * 255.0) as u8)
            .collect()
    }

    /// Frequency magnitudes quantized to bytes: FFT over a Hann window,
    /// mapped onto the dB range and smoothed against the previous frame.
    pub fn byte_frequency(&mut self, sample_rate: u32) -> Vec<u8> {
        self.snapshot();
        let windowed = hann_window(&self.window);
        let spectrum = samples_fft_to_spectrum(
            &windowed,
            sample_rate.max(1),
            FrequencyLimit::All,
            Some(&divide_by_N),
        )
        .expect("power-of-two window is a valid FFT input");

        for (slot, (_, value)) in self.smoothed.iter_mut().zip(spectrum.data().iter()) {
            let db = 20.0 * value.val().max(1e-10).log10();
            let normalized = ((db - MIN_DB) / (MAX_DB - MIN_DB)).clamp(0.0, 1.0);
            *slot = SMOOTHING * *slot + (1.0 - SMOOTHING) * normalized;
        }
        self.smoothed.iter().map(|&v| (v * 255.0) as u8).collect()
    }

    /// Drop accumulated history, used when the signal source goes away.
    pub fn clear(&mut self) {
        self.tap.lock().unwrap().clear();
        self.smoothed.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{TAP_CAPACITY, sample_ring};

    fn analyzer_with(samples: &[f32]) -> Analyzer {
        let tap = sample_ring(TAP_CAPACITY);
        {
            let mut ring = tap.lock().unwrap();
            for &s in samples {
                ring.enqueue(s);
            }
        }
        Analyzer::new(tap)
    }

    #[test]
    fn silence_maps_to_the_byte_center() {
        let mut analyzer = analyzer_with(&vec![0.0; FFT_SIZE]);
        let bytes = analyzer.byte_time_domain();
        assert_eq!(bytes.len(), FFT_SIZE);
        assert!(bytes.iter().all(|&b| (126..=129).contains(&b)));
    }

    #[test]
    fn full_scale_maps_to_the_byte_extremes() {
        let samples: Vec<f32> = (0..FFT_SIZE)
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let mut analyzer = analyzer_with(&samples);
        let bytes = analyzer.byte_time_domain();
        assert!(bytes.contains(&255));
        assert!(bytes.contains(&0));
    }

    #[test]
    fn sine_peaks_in_the_right_bin() {
        let sample_rate = 44100u32;
        let samples: Vec<f32> = (0..FFT_SIZE)
            .map(|i| {
                (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / sample_rate as f32).sin() * 0.8
            })
            .collect();
        let mut analyzer = analyzer_with(&samples);
        let bytes = analyzer.byte_frequency(sample_rate);

        let peak_bin = bytes
            .iter()
            .enumerate()
            .max_by_key(|&(_, &v)| v)
            .map(|(i, _)| i)
            .unwrap();
        let bin_hz = sample_rate as f32 / FFT_SIZE as f32;
        let peak_freq = peak_bin as f32 * bin_hz;
        assert!(
            (peak_freq - 1000.0).abs() < 3.0 * bin_hz,
            "peak at {peak_freq} Hz"
        );
    }

    #[test]
    fn smoothing_carries_energy_across_frames() {
        let samples: Vec<f32> = (0..FFT_SIZE)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin())
            .collect();
        let mut analyzer = analyzer_with(&samples);
        let first = analyzer.byte_frequency(44100);
        // replace the signal with silence; the previous frame must linger
        analyzer.tap.lock().unwrap().clear();
        let second = analyzer.byte_frequency(44100);
        let peak = *first.iter().max().unwrap() as f32;
        let lingering = *second.iter().max().unwrap() as f32;
        assert!(lingering > peak * 0.5);

        analyzer.clear();
        let cleared = analyzer.byte_frequency(44100);
        assert!(*cleared.iter().max().unwrap() < 64);
    }
}

//! The processing chain: source -> ten filter stages -> analysis tap ->
//! output gain. The chain is built once per engine lifetime and shared with
//! whichever source is currently attached; sources themselves are one-shot
//! (rodio sinks consume them), so seek and re-attach always wrap the same
//! chain in a fresh [`GraphSource`].

use crate::decode::DecodedBuffer;
use crate::engine::AppEvent;
use crate::eq::{BAND_FREQUENCIES, FilterStage};
use crossbeam::channel::Sender;
use ringbuffer::{AllocRingBuffer, RingBuffer};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Parameter changes ramp toward their target over this long.
pub const RAMP_SECONDS: f32 = 0.1;
/// Samples retained by the analysis tap, enough for one FFT window plus
/// slack against the render loop falling behind.
pub const TAP_CAPACITY: usize = 4096;
/// Interleaved samples processed per chain lock.
const BLOCK_SAMPLES: usize = 256;

/// Shared sample ring, the hand-off point between the audio domain and the
/// render loop (analysis tap) or the capture callback (live input).
pub type SampleRing = Arc<Mutex<AllocRingBuffer<f32>>>;

pub fn sample_ring(capacity: usize) -> SampleRing {
    Arc::new(Mutex::new(AllocRingBuffer::new(capacity)))
}

/// Linear ramp toward a target output gain.
#[derive(Debug, Clone, Copy)]
struct GainRamp {
    current: f32,
    target: f32,
    step: f32,
}

impl GainRamp {
    fn new(value: f32) -> Self {
        Self {
            current: value,
            target: value,
            step: 0.0,
        }
    }

    fn ramp_to(&mut self, target: f32, ramp_samples: f32) {
        self.target = target.clamp(0.0, 1.0);
        if ramp_samples <= 1.0 {
            self.current = self.target;
            self.step = 0.0;
        } else {
            self.step = (self.target - self.current) / ramp_samples;
        }
    }

    #[inline]
    fn tick(&mut self) -> f32 {
        if self.step != 0.0 {
            let next = self.current + self.step;
            if (self.step > 0.0 && next >= self.target)
                || (self.step < 0.0 && next <= self.target)
            {
                self.current = self.target;
                self.step = 0.0;
            } else {
                self.current = next;
            }
        }
        self.current
    }
}

/// Ten peaking stages in series, the analysis tap, and the output gain.
pub struct FilterChain {
    stages: Vec<FilterStage>,
    output_gain: GainRamp,
    tap: SampleRing,
    sample_rate: f32,
    channels: usize,
}

impl FilterChain {
    pub fn new(tap: SampleRing, initial_gain: f32) -> Self {
        let sample_rate = 44100.0;
        let stages = BAND_FREQUENCIES
            .iter()
            .map(|&freq| FilterStage::new(freq, sample_rate))
            .collect();
        let mut chain = Self {
            stages,
            output_gain: GainRamp::new(initial_gain.clamp(0.0, 1.0)),
            tap,
            sample_rate,
            channels: 2,
        };
        chain.configure(44100, 2);
        chain
    }

    /// Adopt the attached source's format. Stage coefficients are recomputed
    /// for the new rate; gain targets and ramp positions survive.
    pub fn configure(&mut self, sample_rate: u32, channels: u16) {
        self.sample_rate = sample_rate as f32;
        self.channels = channels.max(1) as usize;
        for stage in &mut self.stages {
            stage.set_sample_rate(self.sample_rate, self.channels);
        }
    }

    /// Ramp one band toward `db`. Out-of-range bands are a no-op.
    pub fn set_band_target(&mut self, band: usize, db: f32) {
        if let Some(stage) = self.stages.get_mut(band) {
            stage.ramp_to(db, RAMP_SECONDS);
        }
    }

    pub fn set_output_target(&mut self, linear: f32) {
        self.output_gain
            .ramp_to(linear, RAMP_SECONDS * self.sample_rate);
    }

    pub fn band_gain_db(&self, band: usize) -> Option<f32> {
        self.stages.get(band).map(|s| s.gain_db())
    }

    pub fn output_gain(&self) -> f32 {
        self.output_gain.current
    }

    /// Flush filter delay lines, used when a new source is attached so the
    /// tail of the previous signal does not bleed into the next one.
    pub fn reset_state(&mut self) {
        for stage in &mut self.stages {
            stage.reset_state();
        }
    }

    /// Run one interleaved block through the chain in place and feed the tap
    /// with a mono mix of the post-filter signal.
    pub fn process_block(&mut self, block: &mut [f32]) {
        let channels = self.channels;
        let mut tap = self.tap.lock().unwrap();
        for frame in block.chunks_mut(channels) {
            for stage in &mut self.stages {
                stage.tick();
            }
            let gain = self.output_gain.tick();
            let mut mono = 0.0f32;
            for (ch, sample) in frame.iter_mut().enumerate() {
                let mut s = *sample;
                for stage in &mut self.stages {
                    s = stage.process(ch, s);
                }
                mono += s;
                *sample = s * gain;
            }
            tap.enqueue(mono / channels as f32);
        }
    }
}

pub type SharedChain = Arc<Mutex<FilterChain>>;

/// What currently feeds the chain.
pub enum GraphInput {
    /// Decoded PCM starting at an interleaved sample index.
    Buffer { buffer: DecodedBuffer, pos: usize },
    /// Live capture ring; silence is substituted while the ring runs dry so
    /// the stream never ends on its own.
    Live {
        ring: SampleRing,
        sample_rate: u32,
        channels: u16,
    },
}

impl GraphInput {
    pub fn from_buffer(buffer: DecodedBuffer, offset: Duration) -> Self {
        let pos = buffer.index_at(offset);
        Self::Buffer { buffer, pos }
    }

    fn sample_rate(&self) -> u32 {
        match self {
            Self::Buffer { buffer, .. } => buffer.sample_rate(),
            Self::Live { sample_rate, .. } => *sample_rate,
        }
    }

    fn channels(&self) -> u16 {
        match self {
            Self::Buffer { buffer, .. } => buffer.channels(),
            Self::Live { channels, .. } => *channels,
        }
    }
}

/// A one-shot rodio source wrapping the shared chain around the current
/// input. Pulls input in blocks, processes them under a single chain lock,
/// and reports natural end-of-buffer exactly once.
pub struct GraphSource {
    input: GraphInput,
    chain: SharedChain,
    block: Vec<f32>,
    block_pos: usize,
    channels: u16,
    sample_rate: u32,
    event_tx: Sender<AppEvent>,
    ended_sent: bool,
}

impl GraphSource {
    pub fn new(input: GraphInput, chain: SharedChain, event_tx: Sender<AppEvent>) -> Self {
        let channels = input.channels().max(1);
        let sample_rate = input.sample_rate().max(1);
        {
            let mut chain = chain.lock().unwrap();
            chain.configure(sample_rate, channels);
            chain.reset_state();
        }
        Self {
            input,
            chain,
            block: Vec::with_capacity(BLOCK_SAMPLES),
            block_pos: 0,
            channels,
            sample_rate,
            event_tx,
            ended_sent: false,
        }
    }

    fn refill(&mut self) {
        self.block.clear();
        self.block_pos = 0;
        let want = BLOCK_SAMPLES - BLOCK_SAMPLES % self.channels as usize;
        match &mut self.input {
            GraphInput::Buffer { buffer, pos } => {
                let samples = buffer.samples();
                if *pos >= samples.len() {
                    if !self.ended_sent {
                        self.ended_sent = true;
                        let _ = self.event_tx.send(AppEvent::PlaybackEnded);
                    }
                    return;
                }
                let end = (*pos + want).min(samples.len());
                self.block.extend_from_slice(&samples[*pos..end]);
                *pos = end;
            }
            GraphInput::Live { ring, .. } => {
                let mut ring = ring.lock().unwrap();
                for _ in 0..want {
                    self.block.push(ring.dequeue().unwrap_or(0.0));
                }
            }
        }
        if !self.block.is_empty() {
            self.chain.lock().unwrap().process_block(&mut self.block);
        }
    }
}

impl Iterator for GraphSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.block_pos >= self.block.len() {
            self.refill();
            if self.block.is_empty() {
                return None;
            }
        }
        let sample = self.block[self.block_pos];
        self.block_pos += 1;
        Some(sample)
    }
}

impl rodio::Source for GraphSource {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> rodio::ChannelCount {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::unbounded;

    fn chain_with_tap() -> (SharedChain, SampleRing) {
        let tap = sample_ring(TAP_CAPACITY);
        let chain = Arc::new(Mutex::new(FilterChain::new(tap.clone(), 1.0)));
        (chain, tap)
    }

    #[test]
    fn flat_chain_is_transparent() {
        let (chain, _tap) = chain_with_tap();
        let mut block: Vec<f32> = (0..256).map(|i| (i as f32 / 256.0).sin()).collect();
        let original = block.clone();
        chain.lock().unwrap().process_block(&mut block);
        for (a, b) in block.iter().zip(original.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn output_gain_ramps_toward_target() {
        let (chain, _tap) = chain_with_tap();
        {
            let mut c = chain.lock().unwrap();
            c.configure(44100, 1);
            c.set_output_target(0.0);
        }
        // 0.2 s of DC input, twice the ramp length
        let mut block = vec![1.0f32; 8820];
        chain.lock().unwrap().process_block(&mut block);
        assert!(block[0] > 0.9, "ramp must start near the old gain");
        assert!(block.last().unwrap().abs() < 1e-3, "ramp must reach zero");
        assert_eq!(chain.lock().unwrap().output_gain(), 0.0);
        // monotonically non-increasing for a downward ramp on DC
        for pair in block.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-6);
        }
    }

    #[test]
    fn band_ramps_settle_at_their_target() {
        let (chain, _tap) = chain_with_tap();
        {
            let mut c = chain.lock().unwrap();
            c.configure(44100, 1);
            c.set_band_target(2, 6.0);
            assert_eq!(c.band_gain_db(2), Some(0.0));
            assert_eq!(c.band_gain_db(99), None);
        }
        // 0.2 s of signal, twice the ramp length
        let mut block = vec![0.0f32; 8820];
        chain.lock().unwrap().process_block(&mut block);
        let settled = chain.lock().unwrap().band_gain_db(2).unwrap();
        assert!((settled - 6.0).abs() < 1e-3, "settled at {settled}");
    }

    #[test]
    fn buffer_source_ends_once_and_reports_it() {
        let (chain, _tap) = chain_with_tap();
        let (tx, rx) = unbounded();
        let buffer = DecodedBuffer::new(vec![0.25; 1000], 44100, 1);
        let mut source = GraphSource::new(GraphInput::from_buffer(buffer, Duration::ZERO), chain, tx);
        assert_eq!(source.by_ref().count(), 1000);
        assert!(source.next().is_none());
        let events: Vec<_> = rx.try_iter().collect();
        assert!(matches!(events.as_slice(), [AppEvent::PlaybackEnded]));
    }

    #[test]
    fn buffer_source_honors_start_offset() {
        let (chain, _tap) = chain_with_tap();
        let (tx, _rx) = unbounded();
        let buffer = DecodedBuffer::new(vec![0.5; 44100], 44100, 1);
        let source = GraphSource::new(
            GraphInput::from_buffer(buffer, Duration::from_secs_f64(0.75)),
            chain,
            tx,
        );
        assert_eq!(source.count(), 44100 / 4);
    }

    #[test]
    fn live_source_substitutes_silence() {
        let (chain, _tap) = chain_with_tap();
        let (tx, rx) = unbounded();
        let ring = sample_ring(1024);
        let mut source = GraphSource::new(
            GraphInput::Live {
                ring: ring.clone(),
                sample_rate: 48000,
                channels: 1,
            },
            chain,
            tx,
        );
        // dry ring never terminates the stream
        for _ in 0..512 {
            assert_eq!(source.next(), Some(0.0));
        }
        assert!(rx.try_iter().next().is_none());
    }

    #[test]
    fn tap_receives_mono_mix() {
        let (chain, tap) = chain_with_tap();
        {
            let mut c = chain.lock().unwrap();
            c.configure(44100, 2);
        }
        // left 1.0, right 0.0 -> mono 0.5
        let mut block: Vec<f32> = (0..512)
            .map(|i| if i % 2 == 0 { 1.0 } else { 0.0 })
            .collect();
        chain.lock().unwrap().process_block(&mut block);
        let tap = tap.lock().unwrap();
        assert_eq!(tap.len(), 256);
        for &s in tap.iter() {
            assert!((s - 0.5).abs() < 1e-4);
        }
    }
}

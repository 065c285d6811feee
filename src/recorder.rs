//! Live input capture and the chunked recording encoder.
//!
//! The capture stream stays on the thread that created it (cpal streams are
//! not Send); its callback fans each buffer out to the live monitoring ring
//! (attached to the graph) and to the encoder. The encoder flushes one
//! encoded PCM segment per captured second; stop finalizes the segments into
//! a WAV artifact on a worker thread and re-decodes it for replay.

use crate::decode;
use crate::engine::AppEvent;
use crate::error::{AudioError, Result};
use crate::graph::{SampleRing, sample_ring};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam::channel::{Receiver, Sender, unbounded};
use ringbuffer::RingBuffer;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Seconds of audio per encoded segment.
const CHUNK_SECONDS: usize = 1;

/// What the graph needs to monitor the capture.
#[derive(Debug, Clone)]
pub struct LiveInput {
    pub ring: SampleRing,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Ordered encoded segments of the current session, i16 little-endian PCM.
/// Cleared when a session starts, consumed when it stops.
pub struct ChunkEncoder {
    sample_rate: u32,
    channels: u16,
    samples_per_chunk: usize,
    pending: Vec<f32>,
    chunks: Vec<Vec<u8>>,
}

impl ChunkEncoder {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            samples_per_chunk: sample_rate as usize * channels.max(1) as usize * CHUNK_SECONDS,
            pending: Vec::new(),
            chunks: Vec::new(),
        }
    }

    pub fn push(&mut self, samples: &[f32]) {
        self.pending.extend_from_slice(samples);
        while self.pending.len() >= self.samples_per_chunk {
            let rest = self.pending.split_off(self.samples_per_chunk);
            let chunk = std::mem::replace(&mut self.pending, rest);
            self.chunks.push(encode_pcm(&chunk));
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Flush the partial tail and hand over every segment in order.
    pub fn finalize(mut self) -> Vec<Vec<u8>> {
        if !self.pending.is_empty() {
            let tail = std::mem::take(&mut self.pending);
            self.chunks.push(encode_pcm(&tail));
        }
        self.chunks
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

fn encode_pcm(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Concatenate encoded segments into one WAV container.
pub fn wav_from_chunks(chunks: &[Vec<u8>], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec)
        .map_err(|e| AudioError::Device(format!("wav encoder: {e}")))?;
    for chunk in chunks {
        for pair in chunk.chunks_exact(2) {
            let v = i16::from_le_bytes([pair[0], pair[1]]);
            writer
                .write_sample(v)
                .map_err(|e| AudioError::Device(format!("wav encoder: {e}")))?;
        }
    }
    writer
        .finalize()
        .map_err(|e| AudioError::Device(format!("wav encoder: {e}")))?;
    Ok(cursor.into_inner())
}

struct ActiveRecording {
    // capture stops when the stream is dropped
    _stream: cpal::Stream,
    sample_rx: Receiver<Vec<f32>>,
    encoder: ChunkEncoder,
    started: Instant,
}

/// Owns one capture session at a time.
#[derive(Default)]
pub struct RecordingPipeline {
    active: Option<ActiveRecording>,
}

impl RecordingPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn elapsed(&self) -> Duration {
        self.active
            .as_ref()
            .map_or(Duration::ZERO, |a| a.started.elapsed())
    }

    /// Open the default input device and start capturing. Returns what the
    /// graph needs to monitor the live signal.
    pub fn start(&mut self) -> Result<LiveInput> {
        if self.active.is_some() {
            return Err(AudioError::Device("recording already in progress".into()));
        }
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| AudioError::Device("no input device available".into()))?;
        let config = device
            .default_input_config()
            .map_err(|e| classify_capture_error(e.to_string()))?
            .config();
        let sample_rate = config.sample_rate.0;
        let channels = config.channels;

        // one second of monitoring head-room
        let ring = sample_ring(sample_rate as usize * channels.max(1) as usize);
        let (sample_tx, sample_rx): (Sender<Vec<f32>>, _) = unbounded();
        let callback_ring = ring.clone();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _info| {
                    {
                        let mut ring = callback_ring.lock().unwrap();
                        for &s in data {
                            ring.enqueue(s);
                        }
                    }
                    let _ = sample_tx.send(data.to_vec());
                },
                |err| {
                    tracing::error!(%err, "capture stream error");
                },
                None,
            )
            .map_err(|e| classify_capture_error(e.to_string()))?;
        stream
            .play()
            .map_err(|e| classify_capture_error(e.to_string()))?;

        tracing::info!(sample_rate, channels, "recording started");
        self.active = Some(ActiveRecording {
            _stream: stream,
            sample_rx,
            encoder: ChunkEncoder::new(sample_rate, channels),
            started: Instant::now(),
        });
        Ok(LiveInput {
            ring,
            sample_rate,
            channels,
        })
    }

    /// Drain captured samples into the encoder. Called once per render
    /// frame; the encoder turns them into one segment per second.
    pub fn poll(&mut self) {
        if let Some(active) = &mut self.active {
            for buf in active.sample_rx.try_iter() {
                active.encoder.push(&buf);
            }
        }
    }

    /// Stop capturing and finalize off-thread: segments become a WAV file in
    /// `out_dir`, which is then decoded back into a buffer for replay. A
    /// decode failure is logged and leaves the artifact in place.
    pub fn stop(&mut self, out_dir: PathBuf, event_tx: Sender<AppEvent>) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        // the stream must drop before the final drain so no samples race in
        drop(active._stream);
        for buf in active.sample_rx.try_iter() {
            active.encoder.push(&buf);
        }
        let sample_rate = active.encoder.sample_rate();
        let channels = active.encoder.channels();
        let chunks = active.encoder.finalize();

        std::thread::spawn(move || {
            match finalize_artifact(&chunks, sample_rate, channels, &out_dir) {
                Ok(path) => {
                    let buffer = match decode::decode_file(&path) {
                        Ok(buffer) => Some(buffer),
                        Err(err) => {
                            tracing::warn!(%err, "recorded artifact did not decode");
                            None
                        }
                    };
                    let _ = event_tx.send(AppEvent::RecordingFinalized { path, buffer });
                }
                Err(err) => {
                    tracing::error!(%err, "failed to finalize recording");
                    let _ = event_tx.send(AppEvent::Error(format!("recording failed: {err}")));
                }
            }
        });
    }
}

fn finalize_artifact(
    chunks: &[Vec<u8>],
    sample_rate: u32,
    channels: u16,
    out_dir: &PathBuf,
) -> Result<PathBuf> {
    let wav = wav_from_chunks(chunks, sample_rate, channels)?;
    std::fs::create_dir_all(out_dir)?;
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let path = out_dir.join(format!("recording_{stamp}.wav"));
    std::fs::write(&path, wav)?;
    tracing::info!(path = %path.display(), "recording saved");
    Ok(path)
}

fn classify_capture_error(msg: String) -> AudioError {
    let lower = msg.to_lowercase();
    if lower.contains("denied") || lower.contains("permission") {
        AudioError::Permission(msg)
    } else {
        AudioError::Device(msg)
    }
}

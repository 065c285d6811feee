//! Decoding of file or in-memory bytes into an immutable PCM buffer.

use crate::error::{AudioError, Result};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Immutable PCM data: interleaved f32 samples plus the stream's format.
/// Replaced wholesale when a new source is loaded, never mutated.
#[derive(Debug, Clone)]
pub struct DecodedBuffer {
    samples: Arc<Vec<f32>>,
    sample_rate: u32,
    channels: u16,
}

impl DecodedBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: Arc::new(samples),
            sample_rate,
            channels,
        }
    }

    pub fn samples(&self) -> &Arc<Vec<f32>> {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate.max(1) as f64)
    }

    /// Interleaved sample index of a time offset, clamped to the buffer and
    /// aligned to a frame boundary.
    pub fn index_at(&self, offset: Duration) -> usize {
        let frame = (offset.as_secs_f64() * self.sample_rate as f64) as usize;
        frame.min(self.frames()) * self.channels as usize
    }
}

/// Decode a local file. The extension, when present, is handed to the probe
/// as a hint.
pub fn decode_file(path: &Path) -> Result<DecodedBuffer> {
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    decode_stream(mss, hint)
}

/// Decode an in-memory byte sequence (a fetched clip or a finalized
/// recording).
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedBuffer> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }
    decode_stream(mss, hint)
}

fn decode_stream(mss: MediaSourceStream, hint: Hint) -> Result<DecodedBuffer> {
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudioError::decode(format!("unrecognized format: {e}")))?;
    let mut format = probed.format;

    // First track with a decodable codec.
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::decode("no supported audio tracks"))?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::decode(format!("unsupported codec: {e}")))?;

    let mut all_samples = Vec::<f32>::new();
    let mut sample_buf = None;
    let mut sample_rate = 0u32;
    let mut channels = 0u16;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(AudioError::decode(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(audio_buf) => {
                if sample_buf.is_none() {
                    let spec = *audio_buf.spec();
                    sample_rate = spec.rate;
                    channels = spec.channels.count() as u16;
                    sample_buf = Some(SampleBuffer::<f32>::new(audio_buf.capacity() as u64, spec));
                }
                if let Some(buf) = &mut sample_buf {
                    buf.copy_interleaved_ref(audio_buf);
                    all_samples.extend_from_slice(buf.samples());
                }
            }
            // A corrupt packet inside an otherwise valid stream is skipped.
            Err(Error::DecodeError(_)) => (),
            Err(e) => return Err(AudioError::decode(e.to_string())),
        }
    }

    if all_samples.is_empty() || sample_rate == 0 || channels == 0 {
        return Err(AudioError::decode("stream contained no audio"));
    }
    tracing::info!(
        samples = all_samples.len(),
        sample_rate,
        channels,
        "decoded audio stream"
    );
    Ok(DecodedBuffer::new(all_samples, sample_rate, channels))
}

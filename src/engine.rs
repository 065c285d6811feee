//! Engine thread: owns the output stream, the sink and the shared filter
//! chain, and services commands from the UI side. The chain is wired once
//! per engine lifetime; attaching a source only swaps what feeds it.

use crate::decode::DecodedBuffer;
use crate::eq::BAND_COUNT;
use crate::graph::{FilterChain, GraphInput, GraphSource, SampleRing, SharedChain};
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Commands the UI side sends to the engine thread.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    EnsureInitialized,
    AttachBuffer {
        buffer: DecodedBuffer,
        offset: Duration,
    },
    AttachLive {
        ring: SampleRing,
        sample_rate: u32,
        channels: u16,
    },
    Detach,
    SetBandGain {
        band: usize,
        db: f32,
    },
    SetOutputGain(f32),
    Teardown,
    Shutdown,
}

/// Events the audio side reports back to the UI.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The attached buffer played to its natural end.
    PlaybackEnded,
    /// A recording was finalized. The artifact is already on disk; the
    /// decoded buffer is absent when the artifact could not be re-decoded.
    RecordingFinalized {
        path: PathBuf,
        buffer: Option<DecodedBuffer>,
    },
    Error(String),
}

struct EngineState {
    // playback stops when the stream handle is dropped
    _stream: rodio::OutputStream,
    sink: rodio::Sink,
    chain: SharedChain,
}

pub struct AudioEngine {
    state: Option<EngineState>,
    torn_down: bool,
    tap: SampleRing,
    event_tx: Sender<AppEvent>,
    // last requested targets, survive teardown and are re-applied on re-init
    band_db: [f32; BAND_COUNT],
    output_gain: f32,
}

impl AudioEngine {
    pub fn new(tap: SampleRing, event_tx: Sender<AppEvent>, initial_gain: f32) -> Self {
        Self {
            state: None,
            torn_down: false,
            tap,
            event_tx,
            band_db: [0.0; BAND_COUNT],
            output_gain: initial_gain.clamp(0.0, 1.0),
        }
    }

    /// Command loop. Returns when `Shutdown` arrives or all senders hang up.
    pub fn run(&mut self, rx: Receiver<EngineCommand>) {
        loop {
            match rx.recv_timeout(Duration::from_millis(10)) {
                Ok(EngineCommand::Shutdown) => break,
                Ok(cmd) => self.handle(cmd),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    pub fn handle(&mut self, cmd: EngineCommand) {
        if self.torn_down && !matches!(cmd, EngineCommand::EnsureInitialized) {
            tracing::error!(?cmd, "graph operation after teardown");
            debug_assert!(false, "graph operation after teardown: {cmd:?}");
            return;
        }
        match cmd {
            EngineCommand::EnsureInitialized => self.ensure_initialized(),
            EngineCommand::AttachBuffer { buffer, offset } => {
                self.attach(GraphInput::from_buffer(buffer, offset));
            }
            EngineCommand::AttachLive {
                ring,
                sample_rate,
                channels,
            } => {
                self.attach(GraphInput::Live {
                    ring,
                    sample_rate,
                    channels,
                });
            }
            EngineCommand::Detach => {
                // detaching an absent source is a benign no-op
                if let Some(state) = &self.state {
                    state.sink.stop();
                    state.sink.clear();
                }
            }
            EngineCommand::SetBandGain { band, db } => {
                if band >= BAND_COUNT {
                    return;
                }
                self.band_db[band] = db;
                if let Some(state) = &self.state {
                    state.chain.lock().unwrap().set_band_target(band, db);
                }
            }
            EngineCommand::SetOutputGain(linear) => {
                self.output_gain = linear.clamp(0.0, 1.0);
                if let Some(state) = &self.state {
                    state.chain.lock().unwrap().set_output_target(linear);
                }
            }
            EngineCommand::Teardown => {
                self.state = None;
                self.torn_down = true;
                tracing::info!("audio engine torn down");
            }
            EngineCommand::Shutdown => unreachable!("handled by run"),
        }
    }

    /// Idempotent: builds the stream, sink and chain on the first call only.
    fn ensure_initialized(&mut self) {
        self.torn_down = false;
        if self.state.is_some() {
            return;
        }
        let stream = match rodio::OutputStreamBuilder::open_default_stream() {
            Ok(stream) => stream,
            Err(err) => {
                tracing::error!(%err, "failed to open output stream");
                let _ = self
                    .event_tx
                    .send(AppEvent::Error(format!("audio output unavailable: {err}")));
                return;
            }
        };
        let sink = rodio::Sink::connect_new(stream.mixer());
        let mut chain = FilterChain::new(self.tap.clone(), self.output_gain);
        for (band, &db) in self.band_db.iter().enumerate() {
            chain.set_band_target(band, db);
        }
        self.state = Some(EngineState {
            _stream: stream,
            sink,
            chain: Arc::new(Mutex::new(chain)),
        });
        tracing::info!("audio engine initialized");
    }

    fn attach(&mut self, input: GraphInput) {
        self.ensure_initialized();
        let Some(state) = &self.state else {
            return;
        };
        state.sink.stop();
        state.sink.clear();
        let source = GraphSource::new(input, state.chain.clone(), self.event_tx.clone());
        state.sink.append(source);
        state.sink.play();
    }
}

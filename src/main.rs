mod analyzer;
mod config;
mod decode;
mod engine;
mod eq;
mod error;
mod graph;
mod player;
mod recorder;
mod tui;

use crate::analyzer::Analyzer;
use crate::config::Config;
use crate::engine::{AppEvent, AudioEngine, EngineCommand};
use crate::graph::{TAP_CAPACITY, sample_ring};
use color_eyre::Result;
use crossbeam::channel::{bounded, unbounded};
use std::sync::Arc;
use std::thread;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let config = Config::load();

    // commands flow to the engine thread, audio-side events flow back
    let (cmd_tx, cmd_rx) = bounded::<EngineCommand>(64);
    let (event_tx, event_rx) = unbounded::<AppEvent>();

    // the analysis tap is shared between the filter chain and the renderer
    let tap = sample_ring(TAP_CAPACITY);
    let analyzer = Analyzer::new(tap.clone());

    // the engine owns the output stream, so it is built on its own thread
    let engine_event_tx = event_tx.clone();
    let volume = config.volume;
    thread::spawn(move || {
        let mut engine = AudioEngine::new(tap, engine_event_tx, volume);
        engine.run(cmd_rx);
    });

    tui::run(cmd_tx, event_tx, event_rx, analyzer, config)
}

// The TUI owns stdout, so logs land in a file next to the config.
fn init_tracing() {
    let Some(dir) = Config::path().and_then(|p| p.parent().map(|p| p.to_path_buf())) else {
        return;
    };
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }
    let Ok(file) = std::fs::File::create(dir.join("sonicwave.log")) else {
        return;
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .try_init();
}

//! Terminal UI and the per-frame visualization renderer.
//!
//! The render loop is the only mutator of playback state, the visible EQ
//! gains and the waterfall surface. It samples the analysis tap only while
//! Playing or Recording; everything else it draws is chrome.

use crate::analyzer::{Analyzer, FFT_SIZE};
use crate::config::Config;
use crate::decode;
use crate::engine::{AppEvent, EngineCommand};
use crate::eq::{BAND_COUNT, EqualizerBank, GAIN_MAX_DB};
use crate::player::{PlaybackController, PlaybackState};
use crate::recorder::RecordingPipeline;
use color_eyre::Result;
use crossbeam::channel::{Receiver, Sender};
use crossterm::event::{Event, KeyCode, KeyEventKind, poll, read};
use ratatui::{
    DefaultTerminal,
    layout::Flex,
    prelude::*,
    widgets::{
        Block, Clear, FrameExt, Paragraph,
        canvas::{Canvas, Context, Line as CanvasLine, Points, Rectangle},
    },
};
use ratatui_explorer::{FileExplorer, Theme};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Which visualization the canvas shows. Selecting a mode never alters
/// playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewMode {
    Waveform,
    Spectrogram,
    Waterfall,
}

impl ViewMode {
    pub fn next(self) -> Self {
        match self {
            Self::Waveform => Self::Spectrogram,
            Self::Spectrogram => Self::Waterfall,
            Self::Waterfall => Self::Waveform,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Waveform => "WAVEFORM",
            Self::Spectrogram => "SPECTRUM",
            Self::Waterfall => "WATERFALL",
        }
    }
}

/// Logical resolution of the canvas, independent of the terminal size.
pub const SURFACE_COLS: usize = 128;
pub const SURFACE_ROWS: usize = 64;

/// Persistent scroll buffer for the waterfall: one magnitude row per frame,
/// newest first, bounded at [`SURFACE_ROWS`].
pub struct WaterfallSurface {
    rows: std::collections::VecDeque<Vec<u8>>,
}

impl WaterfallSurface {
    pub fn new() -> Self {
        Self {
            rows: std::collections::VecDeque::with_capacity(SURFACE_ROWS),
        }
    }

    /// Scroll by one row: the new row lands on top, the oldest falls off.
    pub fn push_row(&mut self, row: Vec<u8>) {
        debug_assert_eq!(row.len(), SURFACE_COLS);
        self.rows.push_front(row);
        self.rows.truncate(SURFACE_ROWS);
    }

    /// Reset to background, used on view-mode changes and when no signal is
    /// active.
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &Vec<u8>> {
        self.rows.iter()
    }
}

// hue in degrees, s/l in 0..1
fn hsl_to_rgb(h: f32, s: f32, l: f32) -> Color {
    let h = h.rem_euclid(360.0);
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = l - c / 2.0;
    let (r, g, b) = match h as u32 {
        0..60 => (c, x, 0.0),
        60..120 => (x, c, 0.0),
        120..180 => (0.0, c, x),
        180..240 => (0.0, x, c),
        240..300 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    Color::Rgb(
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    )
}

/// Spectrum bars sweep the hue wheel with the bin index.
fn spectrum_color(bin: usize, bins: usize) -> Color {
    hsl_to_rgb(bin as f32 / bins.max(1) as f32 * 360.0, 1.0, 0.5)
}

/// Waterfall cells run blue (quiet) to red (loud).
fn waterfall_color(magnitude: u8) -> Color {
    hsl_to_rgb(240.0 - magnitude as f32 / 255.0 * 240.0, 1.0, 0.5)
}

/// Mean-pool byte bins down to `cols` columns.
fn pool_bins(bytes: &[u8], cols: usize) -> Vec<u8> {
    if bytes.is_empty() || cols == 0 {
        return vec![0; cols];
    }
    (0..cols)
        .map(|i| {
            let start = i * bytes.len() / cols;
            let end = (((i + 1) * bytes.len() / cols).max(start + 1)).min(bytes.len());
            let sum: u32 = bytes[start..end].iter().map(|&b| b as u32).sum();
            (sum / (end - start) as u32) as u8
        })
        .collect()
}

/// Advance to the next view and wipe the waterfall, so rows accumulated
/// under the previous mode never paint into the new one.
fn switch_view(view: ViewMode, waterfall: &mut WaterfallSurface) -> ViewMode {
    waterfall.clear();
    view.next()
}

fn fmt_time(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

struct App {
    controller: PlaybackController,
    eq: EqualizerBank,
    pipeline: RecordingPipeline,
    analyzer: Analyzer,
    cmd_tx: Sender<EngineCommand>,
    event_tx: Sender<AppEvent>,
    event_rx: Receiver<AppEvent>,
    config: Config,
    explorer: FileExplorer,
    show_explorer: bool,
    view: ViewMode,
    waterfall: WaterfallSurface,
    volume: f32,
    selected_band: usize,
    preset_index: Option<usize>,
    file_name: Option<String>,
    artifact: Option<PathBuf>,
    status: Option<String>,
}

impl App {
    fn new(
        cmd_tx: Sender<EngineCommand>,
        event_tx: Sender<AppEvent>,
        event_rx: Receiver<AppEvent>,
        analyzer: Analyzer,
        explorer: FileExplorer,
        config: Config,
    ) -> Self {
        let view = config.view;
        let volume = config.volume.clamp(0.0, 1.0);
        Self {
            controller: PlaybackController::new(cmd_tx.clone()),
            eq: EqualizerBank::new(cmd_tx.clone()),
            pipeline: RecordingPipeline::new(),
            analyzer,
            cmd_tx,
            event_tx,
            event_rx,
            config,
            explorer,
            show_explorer: false,
            view,
            waterfall: WaterfallSurface::new(),
            volume,
            selected_band: 0,
            preset_index: None,
            file_name: None,
            artifact: None,
            status: None,
        }
    }

    fn is_active(&self) -> bool {
        matches!(
            self.controller.state(),
            PlaybackState::Playing | PlaybackState::Recording
        )
    }

    fn run(mut self, mut terminal: DefaultTerminal) -> Result<()> {
        let _ = self.cmd_tx.send(EngineCommand::SetOutputGain(self.volume));
        loop {
            self.drain_events();
            self.pipeline.poll();
            self.tick_clock();

            terminal.draw(|f| self.draw(f))?;

            if poll(Duration::from_millis(16))? {
                let event = read()?;
                if let Event::Key(key) = &event
                    && key.kind == KeyEventKind::Press
                {
                    if self.show_explorer {
                        match key.code {
                            KeyCode::Char('e') | KeyCode::Esc => self.show_explorer = false,
                            KeyCode::Enter => self.select_file(),
                            _ => self.explorer.handle(&event)?,
                        }
                        continue;
                    }
                    match key.code {
                        KeyCode::Char('q') => {
                            let _ = self.cmd_tx.send(EngineCommand::Shutdown);
                            return Ok(());
                        }
                        KeyCode::Char('e') => self.show_explorer = true,
                        KeyCode::Char(' ') => self.toggle_play(),
                        KeyCode::Char('s') => self.stop_all(),
                        KeyCode::Char('r') => self.toggle_record(),
                        KeyCode::Tab => self.cycle_view(),
                        KeyCode::Left => self.controller.seek_by(-self.config.seek_step_secs),
                        KeyCode::Right => self.controller.seek_by(self.config.seek_step_secs),
                        KeyCode::Char(',') => {
                            self.selected_band = self.selected_band.saturating_sub(1);
                        }
                        KeyCode::Char('.') => {
                            self.selected_band = (self.selected_band + 1).min(BAND_COUNT - 1);
                        }
                        KeyCode::Up => self.nudge_band(0.5),
                        KeyCode::Down => self.nudge_band(-0.5),
                        KeyCode::Char('p') => self.cycle_preset(),
                        KeyCode::Char('x') => {
                            self.eq.reset();
                            self.preset_index = None;
                        }
                        KeyCode::Char('+') | KeyCode::Char('=') => self.nudge_volume(0.05),
                        KeyCode::Char('-') => self.nudge_volume(-0.05),
                        KeyCode::Char('g') => self.reset_engine(),
                        _ => (),
                    }
                }
            }
        }
    }

    // ---- events & clock ----

    fn drain_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                AppEvent::PlaybackEnded => {
                    self.controller.on_ended();
                    self.signal_stopped();
                }
                AppEvent::RecordingFinalized { path, buffer } => {
                    self.status = Some(format!("recording saved: {}", path.display()));
                    self.file_name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned());
                    self.artifact = Some(path);
                    if let Some(buffer) = buffer {
                        self.controller.load(buffer);
                    }
                }
                AppEvent::Error(msg) => self.status = Some(msg),
            }
        }
    }

    /// Publish the clock each frame; natural end transitions to Idle even if
    /// the end-of-stream event is still in flight.
    fn tick_clock(&mut self) {
        if self.controller.state() == PlaybackState::Playing {
            let duration = self.controller.duration();
            if duration > Duration::ZERO && self.controller.elapsed() >= duration {
                self.controller.on_ended();
                self.signal_stopped();
            }
        }
    }

    fn signal_stopped(&mut self) {
        self.waterfall.clear();
        self.analyzer.clear();
    }

    // ---- actions ----

    fn toggle_play(&mut self) {
        match self.controller.state() {
            PlaybackState::Playing => self.controller.pause(),
            PlaybackState::Recording => (),
            _ => self.controller.play(),
        }
    }

    fn stop_all(&mut self) {
        if self.pipeline.is_recording() {
            // finalization reports through the same event stream the engine
            // uses, so the render loop drains a single channel
            self.pipeline
                .stop(self.config.recordings_dir(), self.event_tx.clone());
            self.controller.end_recording();
        }
        self.controller.stop();
        self.signal_stopped();
    }

    fn toggle_record(&mut self) {
        if self.pipeline.is_recording() {
            self.stop_all();
            return;
        }
        match self.pipeline.start() {
            Ok(live) => {
                self.controller.begin_recording();
                let _ = self.cmd_tx.send(EngineCommand::AttachLive {
                    ring: live.ring,
                    sample_rate: live.sample_rate,
                    channels: live.channels,
                });
                self.file_name = Some("Live Signal".into());
                self.status = None;
            }
            Err(err) => self.status = Some(err.to_string()),
        }
    }

    fn cycle_view(&mut self) {
        self.view = switch_view(self.view, &mut self.waterfall);
    }

    fn nudge_band(&mut self, delta: f32) {
        let current = self.eq.gains()[self.selected_band];
        self.eq.set_gain(self.selected_band, current + delta);
        self.preset_index = None;
    }

    fn cycle_preset(&mut self) {
        let names = EqualizerBank::preset_names();
        let next = match self.preset_index {
            Some(i) => (i + 1) % names.len(),
            None => 0,
        };
        self.eq.apply_preset(names[next]);
        self.preset_index = Some(next);
    }

    fn nudge_volume(&mut self, delta: f32) {
        self.volume = (self.volume + delta).clamp(0.0, 1.0);
        let _ = self.cmd_tx.send(EngineCommand::SetOutputGain(self.volume));
    }

    fn reset_engine(&mut self) {
        self.stop_all();
        let _ = self.cmd_tx.send(EngineCommand::Teardown);
        let _ = self.cmd_tx.send(EngineCommand::EnsureInitialized);
        self.status = Some("audio engine reset".into());
    }

    fn select_file(&mut self) {
        let file = self.explorer.current();
        if !file.is_file() {
            return;
        }
        let path = file.path().clone();
        self.show_explorer = false;
        match decode::decode_file(&path) {
            Ok(buffer) => {
                let _ = self.cmd_tx.send(EngineCommand::EnsureInitialized);
                self.controller.load(buffer);
                self.file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned());
                self.status = None;
                self.signal_stopped();
            }
            // the previously loaded buffer stays installed
            Err(err) => self.status = Some(err.to_string()),
        }
    }

    // ---- drawing ----

    fn draw(&mut self, f: &mut Frame) {
        let [header, canvas_area, status, footer] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(10),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(f.area());

        self.render_header(f, header);
        self.render_visualization(f, canvas_area);
        self.render_status(f, status);
        self.render_footer(f, footer);

        if self.show_explorer {
            let area = Self::popup_area(f.area(), 50, 70);
            f.render_widget(Clear, area);
            f.render_widget_ref(self.explorer.widget(), area);
        }
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let state = self.controller.state();
        let (dot, label) = match state {
            PlaybackState::Playing => ("▶", "PLAYING"),
            PlaybackState::Paused => ("⏸", "PAUSED"),
            PlaybackState::Recording => ("●", "RECORDING"),
            PlaybackState::Loaded => ("■", "LOADED"),
            PlaybackState::Idle => ("■", "IDLE"),
        };
        let name = match state {
            PlaybackState::Recording => "Live Signal".to_string(),
            _ => self.file_name.clone().unwrap_or_else(|| "no track loaded".into()),
        };
        let time = if state == PlaybackState::Recording {
            fmt_time(self.pipeline.elapsed())
        } else {
            format!(
                "{} / {}",
                fmt_time(self.controller.elapsed()),
                fmt_time(self.controller.duration())
            )
        };
        let line = Line::from(vec![
            Span::styled(
                format!(" {dot} {label} "),
                Style::default().fg(if self.is_active() {
                    Color::Green
                } else {
                    Color::DarkGray
                }),
            ),
            Span::raw(name),
            Span::styled(format!("  {time}  "), Style::default().fg(Color::Green)),
            Span::styled(
                format!("[{}]", self.view.label()),
                Style::default().fg(Color::Cyan),
            ),
        ]);
        f.render_widget(Paragraph::new(line), area);
    }

    fn render_visualization(&mut self, f: &mut Frame, area: Rect) {
        let active = self.is_active();
        let sample_rate = self
            .controller
            .buffer()
            .map(|b| b.sample_rate())
            .unwrap_or(44100);

        // Tap reads happen only while a signal is live; otherwise the views
        // draw their quiescent shapes.
        let frame_data = match self.view {
            ViewMode::Waveform => {
                if active {
                    self.analyzer.byte_time_domain()
                } else {
                    vec![128; FFT_SIZE]
                }
            }
            ViewMode::Spectrogram | ViewMode::Waterfall => {
                if active {
                    self.analyzer.byte_frequency(sample_rate)
                } else {
                    Vec::new()
                }
            }
        };
        if self.view == ViewMode::Waterfall && active {
            self.waterfall.push_row(pool_bins(&frame_data, SURFACE_COLS));
        }

        let view = self.view;
        let waterfall = &self.waterfall;
        let gains = *self.eq.gains();
        let selected = self.selected_band;
        let marker = if view == ViewMode::Waveform {
            symbols::Marker::Braille
        } else {
            symbols::Marker::HalfBlock
        };

        let canvas = Canvas::default()
            .block(Block::bordered().border_style(Style::default().fg(Color::DarkGray)))
            .marker(marker)
            .x_bounds([0.0, SURFACE_COLS as f64])
            .y_bounds([0.0, SURFACE_ROWS as f64])
            .paint(move |ctx| {
                match view {
                    ViewMode::Waveform => draw_waveform(ctx, &frame_data),
                    ViewMode::Spectrogram => draw_spectrum(ctx, &frame_data),
                    ViewMode::Waterfall => draw_waterfall(ctx, waterfall),
                }
                ctx.layer();
                draw_eq_overlay(ctx, &gains, selected);
            });
        f.render_widget(canvas, area);
    }

    fn render_status(&self, f: &mut Frame, area: Rect) {
        let preset = self.eq.matching_preset().unwrap_or("Custom");
        let band = self.selected_band;
        let mut spans = vec![Span::styled(
            format!(
                " EQ {preset} | band {} Hz {:+.1} dB | vol {:.0}% ",
                crate::eq::BAND_FREQUENCIES[band],
                self.eq.gains()[band],
                self.volume * 100.0
            ),
            Style::default().fg(Color::Gray),
        )];
        if let Some(status) = &self.status {
            spans.push(Span::styled(
                format!("| {status}"),
                Style::default().fg(Color::Red),
            ));
        } else if let Some(artifact) = &self.artifact {
            spans.push(Span::styled(
                format!("| last recording: {}", artifact.display()),
                Style::default().fg(Color::Green),
            ));
        }
        f.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn render_footer(&self, f: &mut Frame, area: Rect) {
        let rate = self
            .controller
            .buffer()
            .map(|b| b.sample_rate().to_string())
            .unwrap_or_else(|| "---".into());
        let line = Line::from(vec![
            Span::styled(
                format!(" rate {rate} Hz | window {FFT_SIZE} "),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled(
                "| space play/pause | s stop | r record | tab view | e files | ,/. band | ↑↓ gain | p preset | x flat | g reset | q quit",
                Style::default().fg(Color::DarkGray),
            ),
        ]);
        f.render_widget(Paragraph::new(line), area);
    }

    fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
        let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
        let horizontal = Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
        let [area] = vertical.areas(area);
        let [area] = horizontal.areas(area);
        area
    }
}

fn draw_waveform(ctx: &mut Context, bytes: &[u8]) {
    let cols = SURFACE_COLS as f64;
    let rows = SURFACE_ROWS as f64;
    // faint reference grid
    let grid = Color::Rgb(0, 40, 0);
    for i in 0..=10 {
        let x = cols / 10.0 * i as f64;
        ctx.draw(&CanvasLine {
            x1: x,
            y1: 0.0,
            x2: x,
            y2: rows,
            color: grid,
        });
        let y = rows / 10.0 * i as f64;
        ctx.draw(&CanvasLine {
            x1: 0.0,
            y1: y,
            x2: cols,
            y2: y,
            color: grid,
        });
    }
    if bytes.is_empty() {
        return;
    }
    let step = (bytes.len() / SURFACE_COLS / 2).max(1);
    let points: Vec<(f64, f64)> = bytes
        .iter()
        .step_by(step)
        .enumerate()
        .map(|(i, &b)| {
            let x = i as f64 * step as f64 / bytes.len() as f64 * cols;
            // bytes center on 128; re-center to [-1, 1] and scale
            let v = b as f64 / 128.0 - 1.0;
            (x, rows / 2.0 + v * rows / 2.0)
        })
        .collect();
    for pair in points.windows(2) {
        ctx.draw(&CanvasLine {
            x1: pair[0].0,
            y1: pair[0].1,
            x2: pair[1].0,
            y2: pair[1].1,
            color: Color::Green,
        });
    }
}

fn draw_spectrum(ctx: &mut Context, bytes: &[u8]) {
    let bars = pool_bins(bytes, SURFACE_COLS / 2);
    let rows = SURFACE_ROWS as f64;
    for (i, &v) in bars.iter().enumerate() {
        if v == 0 {
            continue;
        }
        let height = v as f64 / 255.0 * rows;
        ctx.draw(&Rectangle {
            x: i as f64 * 2.0,
            y: 0.0,
            width: 1.6,
            height,
            color: spectrum_color(i, bars.len()),
        });
    }
}

fn draw_waterfall(ctx: &mut Context, surface: &WaterfallSurface) {
    let rows = SURFACE_ROWS as f64;
    for (r, row) in surface.rows().enumerate() {
        let y = rows - 1.0 - r as f64;
        for (c, &mag) in row.iter().enumerate() {
            if mag == 0 {
                continue;
            }
            ctx.draw(&Points {
                coords: &[(c as f64, y)],
                color: waterfall_color(mag),
            });
        }
    }
}

fn draw_eq_overlay(ctx: &mut Context, gains: &[f32; BAND_COUNT], selected: usize) {
    let cols = SURFACE_COLS as f64;
    let rows = SURFACE_ROWS as f64;
    let xy = |band: usize| {
        let x = band as f64 / (BAND_COUNT - 1) as f64 * cols;
        let y = rows / 2.0 + gains[band] as f64 / GAIN_MAX_DB as f64 * rows / 4.0;
        (x, y)
    };
    for band in 0..BAND_COUNT - 1 {
        let (x1, y1) = xy(band);
        let (x2, y2) = xy(band + 1);
        ctx.draw(&CanvasLine {
            x1,
            y1,
            x2,
            y2,
            color: Color::Gray,
        });
    }
    for band in 0..BAND_COUNT {
        let (x, y) = xy(band);
        ctx.draw(&Rectangle {
            x: x - 0.5,
            y: y - 0.5,
            width: 1.0,
            height: 1.0,
            color: if band == selected {
                Color::White
            } else {
                Color::Gray
            },
        });
    }
    ctx.print(
        2.0,
        2.0,
        Line::styled("EQ CURVE", Style::default().fg(Color::Gray)),
    );
}

pub fn run(
    cmd_tx: Sender<EngineCommand>,
    event_tx: Sender<AppEvent>,
    event_rx: Receiver<AppEvent>,
    analyzer: Analyzer,
    config: Config,
) -> Result<()> {
    let terminal = ratatui::init();
    let theme = Theme::default().add_default_title();
    let explorer = FileExplorer::with_theme(theme)?;
    let app = App::new(cmd_tx, event_tx, event_rx, analyzer, explorer, config);
    let result = app.run(terminal);
    ratatui::restore();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waterfall_scrolls_newest_first_and_stays_bounded() {
        let mut surface = WaterfallSurface::new();
        for i in 0..(SURFACE_ROWS + 10) {
            surface.push_row(vec![i as u8; SURFACE_COLS]);
        }
        let rows: Vec<_> = surface.rows().collect();
        assert_eq!(rows.len(), SURFACE_ROWS);
        // newest row first
        assert_eq!(rows[0][0], (SURFACE_ROWS + 9) as u8);
        assert_eq!(rows[1][0], (SURFACE_ROWS + 8) as u8);
    }

    #[test]
    fn clearing_the_surface_empties_it() {
        let mut surface = WaterfallSurface::new();
        surface.push_row(vec![1; SURFACE_COLS]);
        assert!(!surface.is_empty());
        surface.clear();
        assert!(surface.is_empty());
    }

    #[test]
    fn view_mode_cycles_through_all_three() {
        let mut mode = ViewMode::Waveform;
        mode = mode.next();
        assert_eq!(mode, ViewMode::Spectrogram);
        mode = mode.next();
        assert_eq!(mode, ViewMode::Waterfall);
        mode = mode.next();
        assert_eq!(mode, ViewMode::Waveform);
    }

    #[test]
    fn switching_views_clears_the_waterfall() {
        let mut surface = WaterfallSurface::new();
        surface.push_row(vec![200; SURFACE_COLS]);
        let mode = switch_view(ViewMode::Waterfall, &mut surface);
        assert_eq!(mode, ViewMode::Waveform);
        assert!(surface.is_empty(), "stale rows must not survive the switch");
    }

    #[test]
    fn waterfall_palette_runs_blue_to_red() {
        let Color::Rgb(r, _, b) = waterfall_color(0) else {
            panic!("expected rgb");
        };
        assert!(b > 200 && r < 50, "quiet should be blue");
        let Color::Rgb(r, _, b) = waterfall_color(255) else {
            panic!("expected rgb");
        };
        assert!(r > 200 && b < 50, "loud should be red");
    }

    #[test]
    fn spectrum_hue_sweeps_with_bin_index() {
        let Color::Rgb(r, _, _) = spectrum_color(0, 64) else {
            panic!("expected rgb");
        };
        assert!(r > 200, "low bins start at red");
        let Color::Rgb(_, _, b) = spectrum_color(44, 64) else {
            panic!("expected rgb");
        };
        assert!(b > 100, "high bins reach the blue end");
    }

    #[test]
    fn pooling_preserves_levels() {
        let bytes = vec![100u8; 1024];
        let pooled = pool_bins(&bytes, SURFACE_COLS);
        assert_eq!(pooled.len(), SURFACE_COLS);
        assert!(pooled.iter().all(|&v| v == 100));

        // more columns than bins still yields the requested width
        let pooled = pool_bins(&[10, 20], 8);
        assert_eq!(pooled.len(), 8);
    }

    #[test]
    fn time_formatting_pads_seconds() {
        assert_eq!(fmt_time(Duration::from_secs(0)), "0:00");
        assert_eq!(fmt_time(Duration::from_secs(65)), "1:05");
        assert_eq!(fmt_time(Duration::from_secs(600)), "10:00");
    }
}

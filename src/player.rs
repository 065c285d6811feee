//! Playback state machine and its sample-accurate clock.
//!
//! The controller never touches the audio device itself: it owns the decoded
//! buffer and the clock, and drives the engine thread through commands. The
//! underlying source is one-shot, so every seek while playing re-issues the
//! attach at the new offset together with the clock update.

use crate::decode::DecodedBuffer;
use crate::engine::EngineCommand;
use crossbeam::channel::Sender;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loaded,
    Playing,
    Paused,
    Recording,
}

pub struct PlaybackController {
    state: PlaybackState,
    buffer: Option<DecodedBuffer>,
    start_reference: Instant,
    paused_offset: Duration,
    cmd_tx: Sender<EngineCommand>,
}

impl PlaybackController {
    pub fn new(cmd_tx: Sender<EngineCommand>) -> Self {
        Self {
            state: PlaybackState::Idle,
            buffer: None,
            start_reference: Instant::now(),
            paused_offset: Duration::ZERO,
            cmd_tx,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn buffer(&self) -> Option<&DecodedBuffer> {
        self.buffer.as_ref()
    }

    pub fn duration(&self) -> Duration {
        self.buffer.as_ref().map_or(Duration::ZERO, |b| b.duration())
    }

    /// Position reported to observers: the resume point plus the time the
    /// clock has been running while playing, the resume point otherwise.
    /// Additive so no offset can push an `Instant` before the clock origin.
    pub fn elapsed(&self) -> Duration {
        match self.state {
            PlaybackState::Playing => {
                (self.paused_offset + self.start_reference.elapsed()).min(self.duration())
            }
            _ => self.paused_offset,
        }
    }

    /// Replace the loaded buffer. Any previous buffer is dropped wholesale
    /// and the resume point rewinds to zero.
    pub fn load(&mut self, buffer: DecodedBuffer) {
        if self.state == PlaybackState::Playing || self.state == PlaybackState::Recording {
            self.stop();
        }
        self.buffer = Some(buffer);
        self.paused_offset = Duration::ZERO;
        self.state = PlaybackState::Loaded;
    }

    /// Attach the buffer at the resume point and start the clock.
    pub fn play(&mut self) {
        let resumable = matches!(
            self.state,
            PlaybackState::Idle | PlaybackState::Loaded | PlaybackState::Paused
        );
        let Some(buffer) = self.buffer.clone() else {
            return;
        };
        if !resumable {
            return;
        }
        let _ = self.cmd_tx.send(EngineCommand::AttachBuffer {
            buffer,
            offset: self.paused_offset,
        });
        self.start_reference = Instant::now();
        self.state = PlaybackState::Playing;
    }

    /// Capture the resume point and detach the source.
    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.paused_offset = self.elapsed();
        let _ = self.cmd_tx.send(EngineCommand::Detach);
        self.state = PlaybackState::Paused;
    }

    /// Detach whatever is attached and rewind. Valid from any state.
    pub fn stop(&mut self) {
        if self.state == PlaybackState::Idle {
            return;
        }
        let _ = self.cmd_tx.send(EngineCommand::Detach);
        self.paused_offset = Duration::ZERO;
        self.state = PlaybackState::Idle;
    }

    /// Reposition. While playing this re-attaches the source at the new
    /// offset and moves the clock reference in the same step; while stopped
    /// it only moves the resume point. Ignored while recording.
    pub fn seek(&mut self, target: Duration) {
        if self.state == PlaybackState::Recording || self.buffer.is_none() {
            return;
        }
        let target = target.min(self.duration());
        self.paused_offset = target;
        if self.state == PlaybackState::Playing {
            if let Some(buffer) = self.buffer.clone() {
                let _ = self.cmd_tx.send(EngineCommand::AttachBuffer {
                    buffer,
                    offset: target,
                });
            }
            self.start_reference = Instant::now();
        }
    }

    /// Seek relative to the current position, saturating at zero.
    pub fn seek_by(&mut self, delta_secs: f64) {
        let now = self.elapsed().as_secs_f64();
        let target = (now + delta_secs).max(0.0);
        self.seek(Duration::from_secs_f64(target));
    }

    /// Natural end of the buffer: back to Idle with the clock rewound,
    /// without an explicit stop.
    pub fn on_ended(&mut self) {
        if self.state == PlaybackState::Playing {
            self.paused_offset = Duration::ZERO;
            self.state = PlaybackState::Idle;
        }
    }

    /// Recording and playback are mutually exclusive; entering Recording
    /// forces a stop first.
    pub fn begin_recording(&mut self) {
        self.stop();
        self.state = PlaybackState::Recording;
    }

    /// Leave Recording: detach the live source and return to Idle.
    pub fn end_recording(&mut self) {
        if self.state == PlaybackState::Recording {
            let _ = self.cmd_tx.send(EngineCommand::Detach);
            self.paused_offset = Duration::ZERO;
            self.state = PlaybackState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::{Receiver, unbounded};
    use std::thread::sleep;

    fn controller() -> (PlaybackController, Receiver<EngineCommand>) {
        let (tx, rx) = unbounded();
        (PlaybackController::new(tx), rx)
    }

    fn ten_second_buffer() -> DecodedBuffer {
        DecodedBuffer::new(vec![0.0; 44100 * 10], 44100, 1)
    }

    fn attach_offset(cmd: &EngineCommand) -> Duration {
        match cmd {
            EngineCommand::AttachBuffer { offset, .. } => *offset,
            other => panic!("expected AttachBuffer, got {other:?}"),
        }
    }

    #[test]
    fn load_enters_loaded_with_zero_offset() {
        let (mut ctl, _rx) = controller();
        ctl.load(ten_second_buffer());
        assert_eq!(ctl.state(), PlaybackState::Loaded);
        assert_eq!(ctl.elapsed(), Duration::ZERO);
        assert_eq!(ctl.duration(), Duration::from_secs(10));
    }

    #[test]
    fn play_attaches_at_resume_point() {
        let (mut ctl, rx) = controller();
        ctl.load(ten_second_buffer());
        ctl.play();
        assert_eq!(ctl.state(), PlaybackState::Playing);
        let cmds: Vec<_> = rx.try_iter().collect();
        assert_eq!(attach_offset(cmds.last().unwrap()), Duration::ZERO);
    }

    #[test]
    fn play_without_buffer_is_ignored() {
        let (mut ctl, rx) = controller();
        ctl.play();
        assert_eq!(ctl.state(), PlaybackState::Idle);
        assert!(rx.try_iter().next().is_none());
    }

    #[test]
    fn pause_then_resume_never_jumps_backward() {
        let (mut ctl, _rx) = controller();
        ctl.load(ten_second_buffer());
        ctl.play();
        sleep(Duration::from_millis(50));
        ctl.pause();
        assert_eq!(ctl.state(), PlaybackState::Paused);
        let at_pause = ctl.elapsed();
        assert!(at_pause >= Duration::from_millis(50));

        ctl.play();
        let resumed = ctl.elapsed();
        assert!(resumed >= at_pause);
        sleep(Duration::from_millis(20));
        assert!(ctl.elapsed() > resumed);
    }

    #[test]
    fn seek_while_paused_defers_the_attach() {
        let (mut ctl, rx) = controller();
        ctl.load(ten_second_buffer());
        ctl.seek(Duration::from_secs(2));
        assert_eq!(ctl.elapsed(), Duration::from_secs(2));
        assert!(rx.try_iter().next().is_none(), "no attach until play");

        ctl.play();
        let cmds: Vec<_> = rx.try_iter().collect();
        assert_eq!(attach_offset(cmds.last().unwrap()), Duration::from_secs(2));
        assert!(ctl.elapsed() >= Duration::from_secs(2));
        assert!(ctl.elapsed() < Duration::from_millis(2100));
    }

    #[test]
    fn seek_while_playing_reattaches_and_moves_the_clock() {
        let (mut ctl, rx) = controller();
        ctl.load(ten_second_buffer());
        ctl.play();
        while rx.try_recv().is_ok() {}

        ctl.seek(Duration::from_secs(7));
        let cmds: Vec<_> = rx.try_iter().collect();
        assert_eq!(cmds.len(), 1);
        assert_eq!(attach_offset(&cmds[0]), Duration::from_secs(7));
        assert!(ctl.elapsed() >= Duration::from_secs(7));
        assert_eq!(ctl.state(), PlaybackState::Playing);
    }

    // A resume point far beyond the process uptime must not push the clock
    // reference before the monotonic origin.
    #[test]
    fn huge_resume_offset_does_not_panic_the_clock() {
        let (mut ctl, rx) = controller();
        // eleven days of nominal audio at a 1 Hz sample rate
        ctl.load(DecodedBuffer::new(vec![0.0; 1_000_000], 1, 1));
        ctl.seek(Duration::from_secs(900_000));
        ctl.play();
        assert!(ctl.elapsed() >= Duration::from_secs(900_000));
        let cmds: Vec<_> = rx.try_iter().collect();
        assert_eq!(attach_offset(cmds.last().unwrap()), Duration::from_secs(900_000));

        ctl.seek(Duration::from_secs(950_000));
        assert!(ctl.elapsed() >= Duration::from_secs(950_000));
    }

    #[test]
    fn seek_clamps_to_duration() {
        let (mut ctl, _rx) = controller();
        ctl.load(ten_second_buffer());
        ctl.seek(Duration::from_secs(500));
        assert_eq!(ctl.elapsed(), Duration::from_secs(10));
    }

    #[test]
    fn stop_returns_to_idle_from_any_state() {
        let (mut ctl, rx) = controller();
        ctl.load(ten_second_buffer());
        ctl.play();
        ctl.stop();
        assert_eq!(ctl.state(), PlaybackState::Idle);
        assert_eq!(ctl.elapsed(), Duration::ZERO);
        assert!(
            rx.try_iter()
                .any(|cmd| matches!(cmd, EngineCommand::Detach))
        );

        ctl.begin_recording();
        ctl.stop();
        assert_eq!(ctl.state(), PlaybackState::Idle);
    }

    #[test]
    fn natural_end_rewinds_without_stop() {
        let (mut ctl, _rx) = controller();
        ctl.load(ten_second_buffer());
        ctl.play();
        ctl.on_ended();
        assert_eq!(ctl.state(), PlaybackState::Idle);
        assert_eq!(ctl.elapsed(), Duration::ZERO);
    }

    #[test]
    fn recording_is_exclusive_with_playback() {
        let (mut ctl, rx) = controller();
        ctl.load(ten_second_buffer());
        ctl.play();
        while rx.try_recv().is_ok() {}

        ctl.begin_recording();
        assert_eq!(ctl.state(), PlaybackState::Recording);
        assert!(
            rx.try_iter()
                .any(|cmd| matches!(cmd, EngineCommand::Detach))
        );

        // seek is undefined while recording and must be ignored
        ctl.seek(Duration::from_secs(3));
        assert_eq!(ctl.elapsed(), Duration::ZERO);

        ctl.end_recording();
        assert_eq!(ctl.state(), PlaybackState::Idle);
    }

    // Full pause/seek/resume session, scaled down so the test runs in
    // milliseconds per simulated second.
    #[test]
    fn pause_seek_resume_scenario() {
        let (mut ctl, rx) = controller();
        ctl.load(ten_second_buffer());
        ctl.play();
        sleep(Duration::from_millis(40));
        ctl.pause();
        let at_pause = ctl.elapsed();
        assert!(at_pause >= Duration::from_millis(40));

        ctl.seek(Duration::from_secs(2));
        assert_eq!(ctl.elapsed(), Duration::from_secs(2));

        while rx.try_recv().is_ok() {}
        ctl.play();
        assert_eq!(ctl.state(), PlaybackState::Playing);
        let cmds: Vec<_> = rx.try_iter().collect();
        assert_eq!(attach_offset(cmds.last().unwrap()), Duration::from_secs(2));
        sleep(Duration::from_millis(20));
        let now = ctl.elapsed();
        assert!(now > Duration::from_secs(2) && now < Duration::from_millis(2500));
    }
}

//! The simulation-and-render loop.
//!
//! One tick, strictly in this order:
//!
//! 1. stop check (only ever at a tick boundary)
//! 2. drain the control channel and apply it: parameters first, then commands
//! 3. [`TimeBase`] turns `dt` into gravity steps
//! 4. [`BoardState`] counts the lock timer down and runs the steps
//! 5. for every output frame that fell due: snapshot, render, record
//! 6. best-effort preview
//!
//! Network receipt and Ctrl-C run elsewhere and only feed the channel.

use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::config::{ClockMode, Config, GameOverPolicy};
use crate::control::{Command, ControlBatch, ControlChannel, ControlStats};
use crate::core::{BoardSnapshot, BoardState, ConfigError, TimeBase};
use crate::error::SessionError;
use crate::render::{FrameClock, FrameRecorder, FrameWriter, PngWriter, Renderer};
use crate::term::{Monitor, MonitorStatus};
use crate::types::ParamName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The frame budget is spent
    FrameLimit,
    /// Stop requested over the control channel or by Ctrl-C
    StopSignal,
    /// The board topped out under [`GameOverPolicy::Stop`]
    GameOver,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::FrameLimit => "frame limit reached",
            StopReason::StopSignal => "stop requested",
            StopReason::GameOver => "game over",
        }
    }
}

/// Wall-clock source for [`ClockMode::Realtime`].
///
/// Times are measured from an arbitrary origin fixed when the pacer is made.
pub trait Pacer {
    /// Block until `deadline` has passed, then return the current time.
    /// May return later than `deadline`, never earlier.
    fn wait_until(&mut self, deadline: Duration) -> Duration;
}

/// [`Pacer`] backed by [`Instant`] and `thread::sleep`.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    origin: Instant,
}

impl Default for WallClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Pacer for WallClock {
    fn wait_until(&mut self, deadline: Duration) -> Duration {
        let now = self.origin.elapsed();
        if let Some(wait) = deadline.checked_sub(now).filter(|w| !w.is_zero()) {
            std::thread::sleep(wait);
        }
        self.origin.elapsed().max(deadline)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub stop_reason: StopReason,
    pub ticks: u64,
    pub frames: u64,
    pub frames_rendered: u64,
    pub render_failures: u64,
    /// Steps handed out by the time base, including those the board
    /// ignored while paused or after game over.
    pub steps: u64,
    /// Steps the board actually ran.
    pub board_steps: u64,
    pub dropped_steps: u64,
    pub beats: u64,
    pub sim_time: Duration,
    pub wall_time: Duration,
    pub episode: u32,
    pub score: u32,
    pub lines: u32,
    pub level: u32,
    pub control: ControlStats,
    pub rejected_updates: u64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} frames, {} steps ({} run, {} dropped), {} beats in {:.2}s sim / {:.2}s wall; \
             score {} lines {} level {} episode {}; control {} params {} commands {} rejected",
            self.stop_reason.as_str(),
            self.frames,
            self.steps,
            self.board_steps,
            self.dropped_steps,
            self.beats,
            self.sim_time.as_secs_f64(),
            self.wall_time.as_secs_f64(),
            self.score,
            self.lines,
            self.level,
            self.episode,
            self.control.params,
            self.control.commands,
            self.control.rejected + self.rejected_updates,
        )
    }
}

pub struct Session<W: FrameWriter = PngWriter> {
    clock_mode: ClockMode,
    game_over: GameOverPolicy,
    frame_limit: u64,
    timebase: TimeBase,
    board: BoardState,
    renderer: Renderer,
    recorder: Option<FrameRecorder<W>>,
    frame_clock: FrameClock,
    control: ControlChannel,
    batch: ControlBatch,
    snapshot: BoardSnapshot,
    monitor: Option<Monitor>,
    pacer: Box<dyn Pacer>,
    ticks: u64,
    frames: u64,
    rejected_updates: u64,
    started: Instant,
}

impl Session<PngWriter> {
    /// Build a session writing PNG frames into the configured output directory.
    pub fn new(config: &Config, control: ControlChannel) -> Result<Self, SessionError> {
        Self::with_writer(config, control, PngWriter)
    }
}

impl<W: FrameWriter> Session<W> {
    pub fn with_writer(config: &Config, control: ControlChannel, writer: W) -> Result<Self, SessionError> {
        config.validate()?;

        let timebase = TimeBase::new(&config.speed)?;
        let board = BoardState::new(&config.board, &config.speed)?;

        let fps = config.frame_recorder.fps;
        let budget = match config.run.render_budget_ms {
            0 => Duration::from_secs(1) / fps.max(1),
            ms => Duration::from_millis(ms),
        };
        let renderer = Renderer::new(&config.render, config.board.cell_size, budget)?;

        let recorder = if config.frame_recorder.enabled {
            Some(FrameRecorder::with_writer(
                &config.frame_recorder,
                &config.path.output_directory,
                writer,
            )?)
        } else {
            None
        };

        log::info!(
            "board {}x{}, gravity {:?}, lock delay {:?}, {} bpm ({:?})",
            config.board.width,
            config.board.height,
            timebase.gravity_interval(),
            board.lock_delay(),
            timebase.bpm(),
            timebase.coupling(),
        );
        log::info!(
            "{}x{} texture, {} frames at {} fps, {:?} clock, game over: {:?}",
            config.render.texture_width,
            config.render.texture_height,
            config.frame_recorder.frame_limit,
            fps,
            config.run.clock,
            config.run.game_over,
        );
        match &recorder {
            Some(r) => log::info!("writing frames to {}", r.output_dir().display()),
            None => log::info!("frame recording disabled"),
        }

        Ok(Self {
            clock_mode: config.run.clock,
            game_over: config.run.game_over,
            frame_limit: config.frame_recorder.frame_limit,
            timebase,
            board,
            renderer,
            recorder,
            frame_clock: FrameClock::new(fps),
            control,
            batch: ControlBatch::default(),
            snapshot: BoardSnapshot::default(),
            monitor: None,
            pacer: Box::new(WallClock::default()),
            ticks: 0,
            frames: 0,
            rejected_updates: 0,
            started: Instant::now(),
        })
    }

    pub fn with_monitor(mut self, monitor: Monitor) -> Self {
        self.monitor = monitor.is_enabled().then_some(monitor);
        self
    }

    /// Replace the wall clock used in realtime mode.
    pub fn with_pacer(mut self, pacer: impl Pacer + 'static) -> Self {
        self.pacer = Box::new(pacer);
        self
    }

    pub fn board(&self) -> &BoardState {
        &self.board
    }

    pub fn timebase(&self) -> &TimeBase {
        &self.timebase
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn recorder(&self) -> Option<&FrameRecorder<W>> {
        self.recorder.as_ref()
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.recorder.as_ref().map(|r| r.output_dir())
    }

    /// Frames emitted so far (written, or counted when recording is off)
    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn is_complete(&self) -> bool {
        match &self.recorder {
            Some(r) => r.is_complete(),
            None => self.frames >= self.frame_limit,
        }
    }

    /// Run until a stop condition. Only a recording failure is an error.
    pub fn run(&mut self) -> Result<RunSummary, SessionError> {
        self.started = Instant::now();
        self.board.start();

        let mut last = match self.clock_mode {
            ClockMode::Offline => Duration::ZERO,
            ClockMode::Realtime => self.pacer.wait_until(Duration::ZERO),
        };
        let reason = loop {
            let dt = match self.clock_mode {
                ClockMode::Offline => self.frame_clock.time_until_next_frame(),
                ClockMode::Realtime => {
                    // A late wake-up turns into a longer dt; the frame clock
                    // then hands out every slot that passed.
                    let deadline = last + self.frame_clock.time_until_next_frame();
                    let now = self.pacer.wait_until(deadline);
                    let dt = now.saturating_sub(last);
                    last = now;
                    dt
                }
            };
            if let Some(reason) = self.tick(dt)? {
                break reason;
            }
        };

        if let Some(monitor) = self.monitor.as_mut() {
            if let Err(e) = monitor.close() {
                log::warn!("failed to restore the terminal: {:#}", e);
            }
        }

        let summary = self.summary(reason);
        log::info!("{}", summary);
        Ok(summary)
    }

    /// Advance everything by `dt` of simulated time.
    ///
    /// Returns the reason to stop, if any. A stop request is honoured before
    /// any work of this tick happens.
    pub fn tick(&mut self, dt: Duration) -> Result<Option<StopReason>, SessionError> {
        if self.control.stop_requested() {
            return Ok(Some(StopReason::StopSignal));
        }
        if self.is_complete() {
            return Ok(Some(StopReason::FrameLimit));
        }
        self.ticks += 1;

        self.apply_control();

        let steps = self.timebase.advance(dt);
        let report = self.board.advance(dt, steps);
        if report.lines > 0 {
            log::debug!(
                "cleared {} line(s), {} total, score {}",
                report.lines,
                self.board.lines(),
                self.board.score()
            );
        }

        let mut stop = None;
        if report.game_over {
            log::info!(
                "game over in episode {} at score {} after {} lines",
                self.board.episode(),
                self.board.score(),
                self.board.lines()
            );
            match self.game_over {
                GameOverPolicy::Hold => {}
                GameOverPolicy::Stop => stop = Some(StopReason::GameOver),
                GameOverPolicy::Restart => self.board.reset(),
            }
        }

        let due = self.frame_clock.advance(dt);
        if due > 0 {
            self.emit_frames(due)?;
        }

        if stop.is_none() && self.is_complete() {
            stop = Some(StopReason::FrameLimit);
        }
        Ok(stop)
    }

    fn apply_control(&mut self) {
        self.control.drain_into(&mut self.batch);
        if self.batch.is_empty() {
            return;
        }

        for update in self.batch.params() {
            let (name, value) = (update.name, update.value);
            let result: Result<(), ConfigError> = match name {
                ParamName::GravityInterval => {
                    self.timebase.set_gravity_interval(value).map(|_| ())
                }
                ParamName::LockDelay => self.board.set_lock_delay(value).map(|_| ()),
                ParamName::Bpm => self.timebase.set_bpm(value),
                ParamName::BeatDivision => self.timebase.set_beat_division(value),
                ParamName::CellStrokeWeight
                | ParamName::GridStrokeWeight
                | ParamName::RingStrokeWeight => {
                    self.renderer.set_stroke_weight(name, value).map(|_| ())
                }
            };
            match result {
                Ok(()) => log::info!(
                    "control: {} = {} (received {:?} ago)",
                    name.as_str(),
                    value,
                    update.received.elapsed().unwrap_or_default()
                ),
                Err(e) => {
                    self.rejected_updates += 1;
                    log::warn!("control update rejected, keeping previous value: {}", e);
                }
            }
        }

        for command in &self.batch.commands {
            match *command {
                Command::Action(action) => {
                    let applied = self.board.apply_action(action);
                    log::debug!("control: action {} (applied: {})", action.as_str(), applied);
                }
                Command::Reset => {
                    log::info!("control: reset");
                    self.board.reset();
                }
            }
        }
    }

    /// Render once, then persist that image into every slot that fell due.
    fn emit_frames(&mut self, due: u64) -> Result<(), SessionError> {
        self.board.snapshot_into(&mut self.snapshot);
        self.renderer
            .render(&self.snapshot, self.timebase.current_beat_phase());

        let due = due.min(self.frame_limit.saturating_sub(self.frames));
        if due > 1 {
            log::debug!("render fell behind, repeating frame {} times", due);
        }
        for _ in 0..due {
            if let Some(recorder) = self.recorder.as_mut() {
                if !recorder.capture(self.renderer.surface())? {
                    break;
                }
            }
            self.frames += 1;
        }

        if let Some(monitor) = self.monitor.as_mut() {
            let status = MonitorStatus {
                frame: self.frames,
                frame_limit: self.frame_limit,
                beat: self.timebase.beat_count(),
                bpm: self.timebase.bpm(),
                score: self.snapshot.score,
                lines: self.snapshot.lines,
                level: self.snapshot.level,
                episode: self.snapshot.episode,
                phase: self.snapshot.phase.as_str(),
            };
            monitor.present(self.renderer.surface(), &status);
            if !monitor.is_enabled() {
                self.monitor = None;
            }
        }
        Ok(())
    }

    pub fn summary(&self, stop_reason: StopReason) -> RunSummary {
        RunSummary {
            stop_reason,
            ticks: self.ticks,
            frames: self.frames,
            frames_rendered: self.renderer.stats().frames,
            render_failures: self.renderer.stats().failures,
            steps: self.timebase.step_count(),
            board_steps: self.board.steps(),
            dropped_steps: self.timebase.dropped_steps(),
            beats: self.timebase.beat_count(),
            sim_time: self.timebase.elapsed(),
            wall_time: self.started.elapsed(),
            episode: self.board.episode(),
            score: self.board.score(),
            lines: self.board.lines(),
            level: self.board.level(),
            control: self.control.stats(),
            rejected_updates: self.rejected_updates,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;

    use super::*;
    use crate::control::channel;
    use crate::core::PieceSequence;
    use crate::render::RenderSurface;
    use crate::types::{GameAction, PieceKind};

    /// Counts frames without touching the disk.
    #[derive(Default)]
    struct NullWriter {
        frames: u64,
    }

    impl FrameWriter for NullWriter {
        fn write(&mut self, path: &Path, _surface: &RenderSurface) -> io::Result<()> {
            self.frames += 1;
            std::fs::write(path, b"")
        }

        fn extension(&self) -> &str {
            "raw"
        }
    }

    /// Keeps the fingerprint of every surface it was asked to write.
    #[derive(Default)]
    struct FingerprintWriter {
        prints: Vec<u64>,
    }

    impl FrameWriter for FingerprintWriter {
        fn write(&mut self, path: &Path, surface: &RenderSurface) -> io::Result<()> {
            self.prints.push(surface.fingerprint());
            std::fs::write(path, b"")
        }

        fn extension(&self) -> &str {
            "raw"
        }
    }

    /// Wakes exactly on the deadline plus a scripted delay per call.
    struct ScriptedPacer {
        now: Duration,
        late: VecDeque<Duration>,
    }

    impl Pacer for ScriptedPacer {
        fn wait_until(&mut self, deadline: Duration) -> Duration {
            self.now = self.now.max(deadline) + self.late.pop_front().unwrap_or_default();
            self.now
        }
    }

    fn config(dir: &Path, frame_limit: u64) -> Config {
        let mut cfg = Config::default();
        cfg.board.width = 4;
        cfg.board.height = 6;
        cfg.board.cell_size = 8.0;
        cfg.render.texture_width = 48;
        cfg.render.texture_height = 64;
        cfg.render.texture_samples = 1;
        cfg.frame_recorder.frame_limit = frame_limit;
        cfg.frame_recorder.fps = 10;
        cfg.path.output_directory = dir.to_path_buf();
        cfg
    }

    #[test]
    fn offline_run_stops_at_frame_limit() {
        let dir = tempfile::tempdir().unwrap();
        let (_tx, control) = channel(8);
        let mut session =
            Session::with_writer(&config(dir.path(), 25), control, NullWriter::default()).unwrap();
        let summary = session.run().unwrap();

        assert_eq!(summary.stop_reason, StopReason::FrameLimit);
        assert_eq!(summary.frames, 25);
        assert_eq!(session.recorder().unwrap().writer().frames, 25);
        // 25 frames at 10 fps is 2.5 s of simulated time
        assert_eq!(summary.sim_time, Duration::from_millis(2500));
        assert_eq!(summary.steps, 2);
        assert_eq!(summary.board_steps, 2);
    }

    #[test]
    fn paused_steps_are_counted_but_not_run() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, control) = channel(8);
        let mut session =
            Session::with_writer(&config(dir.path(), 25), control, NullWriter::default()).unwrap();
        tx.send_action(GameAction::Pause).unwrap();
        let summary = session.run().unwrap();

        assert_eq!(summary.steps, 2);
        assert_eq!(summary.board_steps, 0);
        assert!(session.board().paused());
    }

    #[test]
    fn stop_signal_is_honoured_at_the_next_tick() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, control) = channel(8);
        let mut session =
            Session::with_writer(&config(dir.path(), 100), control, NullWriter::default()).unwrap();
        session.board.start();
        assert_eq!(session.tick(Duration::from_millis(100)).unwrap(), None);
        tx.request_stop();
        assert_eq!(
            session.tick(Duration::from_millis(100)).unwrap(),
            Some(StopReason::StopSignal)
        );
        assert_eq!(session.frames(), 1);
    }

    #[test]
    fn negative_gravity_update_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, control) = channel(8);
        let mut session =
            Session::with_writer(&config(dir.path(), 100), control, NullWriter::default()).unwrap();
        tx.update_param(ParamName::GravityInterval, -1.0, None);
        session.tick(Duration::from_millis(100)).unwrap();

        assert_eq!(session.timebase().gravity_interval(), Duration::from_secs(1));
        assert_eq!(session.summary(StopReason::StopSignal).rejected_updates, 1);
    }

    #[test]
    fn latest_parameter_value_wins() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, control) = channel(8);
        let mut session =
            Session::with_writer(&config(dir.path(), 100), control, NullWriter::default()).unwrap();
        tx.update_param(ParamName::GravityInterval, 0.25, None);
        tx.update_param(ParamName::GravityInterval, 0.5, None);
        session.tick(Duration::ZERO).unwrap();
        assert_eq!(session.timebase().gravity_interval(), Duration::from_millis(500));
    }

    #[test]
    fn actions_apply_before_gravity() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, control) = channel(8);
        let mut session =
            Session::with_writer(&config(dir.path(), 100), control, NullWriter::default()).unwrap();
        session.board.start();
        tx.send_action(GameAction::HardDrop).unwrap();
        session.tick(Duration::from_millis(100)).unwrap();
        assert_eq!(session.board().phase(), crate::core::Phase::Locking);
    }

    #[test]
    fn game_over_stop_policy_ends_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, control) = channel(64);
        let mut cfg = config(dir.path(), 10_000);
        cfg.run.game_over = GameOverPolicy::Stop;
        cfg.speed.lock_delay = 0.0;
        // O pieces stacked in the middle columns never complete a row
        cfg.board.piece_sequence = PieceSequence(vec![PieceKind::O]);
        let mut session = Session::with_writer(&cfg, control, NullWriter::default()).unwrap();
        session.board.start();

        let mut reason = None;
        for _ in 0..200 {
            let _ = tx.send_action(GameAction::HardDrop);
            reason = session.tick(Duration::from_millis(100)).unwrap();
            if reason.is_some() {
                break;
            }
        }
        assert_eq!(reason, Some(StopReason::GameOver));
        assert!(session.board().is_game_over());
    }

    #[test]
    fn realtime_late_wakeup_repeats_the_frame() {
        let dir = tempfile::tempdir().unwrap();
        let (_tx, control) = channel(8);
        let mut cfg = config(dir.path(), 10);
        cfg.run.clock = ClockMode::Realtime;
        // origin, first frame on time, second wake-up 250 ms late
        let pacer = ScriptedPacer {
            now: Duration::ZERO,
            late: VecDeque::from([Duration::ZERO, Duration::ZERO, Duration::from_millis(250)]),
        };
        let mut session = Session::with_writer(&cfg, control, FingerprintWriter::default())
            .unwrap()
            .with_pacer(pacer);
        let summary = session.run().unwrap();

        assert_eq!(summary.stop_reason, StopReason::FrameLimit);
        // 10 frames at 10 fps end exactly at 1 s of wall and sim time
        assert_eq!(summary.frames, 10);
        assert_eq!(summary.sim_time, Duration::from_secs(1));
        // ticks end at 100, 450, 500, ..., 1000 ms
        assert_eq!(summary.ticks, 8);
        assert_eq!(summary.frames_rendered, 8);

        let prints = &session.recorder().unwrap().writer().prints;
        assert_eq!(prints.len(), 10);
        // the 450 ms tick covered slots 1..=3 with one image
        assert_eq!(prints[1], prints[2]);
        assert_eq!(prints[2], prints[3]);
    }

    #[test]
    fn realtime_on_time_ticks_once_per_frame() {
        let dir = tempfile::tempdir().unwrap();
        let (_tx, control) = channel(8);
        let mut cfg = config(dir.path(), 6);
        cfg.run.clock = ClockMode::Realtime;
        let pacer = ScriptedPacer {
            now: Duration::from_secs(3),
            late: VecDeque::new(),
        };
        let mut session = Session::with_writer(&cfg, control, NullWriter::default())
            .unwrap()
            .with_pacer(pacer);
        let summary = session.run().unwrap();
        assert_eq!(summary.ticks, 6);
        assert_eq!(summary.frames, 6);
        assert_eq!(summary.sim_time, Duration::from_millis(600));
    }

    #[test]
    fn disabled_recorder_still_counts_frames() {
        let dir = tempfile::tempdir().unwrap();
        let (_tx, control) = channel(8);
        let mut cfg = config(dir.path(), 5);
        cfg.frame_recorder.enabled = false;
        let mut session = Session::with_writer(&cfg, control, NullWriter::default()).unwrap();
        let summary = session.run().unwrap();
        assert_eq!(summary.frames, 5);
        assert!(session.recorder().is_none());
    }
}

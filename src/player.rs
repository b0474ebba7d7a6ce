//! Track-by-track playback loop.
//!
//! [`Player::step`] is called once per displayed frame. It drains the
//! commands gathered since the previous frame, loads the next track when
//! none is playing, then updates and draws every element against the
//! current playback position.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::decode::{self, AudioData, TrackLoadError};
use crate::audio::features::{self, TrackSummary};
use crate::audio::index::IndexMapper;
use crate::audio::surface::{SpectralSurface, StftParams, DB_FLOOR};
use crate::audio::transport::{CpalTransport, Transport};
use crate::input::{self, Command};
use crate::render::canvas::Canvas;
use crate::visual::element::{Shape, VisualElement};
use crate::visual::layout::Layout;
use crate::visual::palette::{ColorShift, Palette, Rgb};

/// Brings a track from disk to a running transport.
pub trait TrackLoader {
    type Transport: Transport;

    fn decode(&mut self, path: &Path) -> Result<AudioData, TrackLoadError>;
    /// Start playing `audio` from the beginning.
    fn start(&mut self, audio: AudioData) -> Result<Self::Transport, TrackLoadError>;
}

/// Decodes with symphonia and plays on the default output device.
pub struct DeviceLoader {
    pub target_rate: Option<u32>,
}

impl TrackLoader for DeviceLoader {
    type Transport = CpalTransport;

    fn decode(&mut self, path: &Path) -> Result<AudioData, TrackLoadError> {
        decode::decode_audio(path, self.target_rate)
    }

    fn start(&mut self, audio: AudioData) -> Result<CpalTransport, TrackLoadError> {
        CpalTransport::start(audio)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    LoadingTrack,
    Playing,
    TrackFinished,
    QuitRequested,
}

/// User-adjustable look of the visualizer. Survives across tracks.
#[derive(Clone, Debug)]
pub struct Settings {
    pub palette: Palette,
    pub shape: Shape,
    pub shift: ColorShift,
}

impl Settings {
    fn apply(&mut self, command: Command, max_hz: u32) {
        match command {
            Command::ToggleShape => {
                self.shape = self.shape.toggled();
                log::info!("Shape: {:?}", self.shape);
            }
            Command::SelectPalette(n) => match Palette::from_number(n) {
                Some(palette) => self.palette = palette,
                None => log::debug!("No palette {}", n),
            },
            Command::MoveMonitor(steps) => {
                self.shift.step_monitor(steps, max_hz);
                log::info!("Monitoring {} Hz", self.shift.monitored_hz());
            }
            Command::MoveThreshold(steps) => {
                self.shift.step_threshold(steps);
                log::info!("Threshold {} dB", self.shift.threshold_db());
            }
            Command::AdjustFactor(channel, steps) => {
                self.shift.step_factor(channel, steps);
                log::info!("Colour factors {:?}", self.shift.factors());
            }
            Command::Skip | Command::Quit | Command::Help | Command::Diagnostics => {}
        }
    }
}

/// Everything that belongs to the track currently playing.
struct PlaybackSession<T> {
    name: String,
    mapper: IndexMapper,
    elements: Vec<VisualElement>,
    transport: T,
    summary: TrackSummary,
}

pub struct Player<L: TrackLoader> {
    loader: L,
    queue: VecDeque<PathBuf>,
    state: LoopState,
    session: Option<PlaybackSession<L::Transport>>,
    settings: Settings,
    layout: Layout,
    params: StftParams,
    /// Upper bound for the monitored frequency; Nyquist of the last track.
    max_hz: u32,
}

impl<L: TrackLoader> Player<L> {
    pub fn new(
        loader: L,
        tracks: Vec<PathBuf>,
        settings: Settings,
        layout: Layout,
        params: StftParams,
        max_hz: u32,
    ) -> Self {
        Self {
            loader,
            queue: tracks.into(),
            state: LoopState::Idle,
            session: None,
            settings,
            layout,
            params,
            max_hz,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Elements of the playing track; empty between tracks.
    #[cfg(test)]
    pub fn elements(&self) -> &[VisualElement] {
        self.session
            .as_ref()
            .map(|s| s.elements.as_slice())
            .unwrap_or_default()
    }

    /// Run one frame. Returns the state the loop is in afterwards.
    pub fn step<C: Canvas>(&mut self, dt: f32, commands: &[Command], canvas: &mut C) -> Result<LoopState> {
        if self.state == LoopState::QuitRequested {
            return Ok(self.state);
        }

        let mut skip = false;
        let mut quit = false;
        for &command in commands {
            match command {
                Command::Skip => skip = true,
                Command::Quit => quit = true,
                Command::Help => input::print_help(),
                Command::Diagnostics => self.print_diagnostics(),
                other => self.settings.apply(other, self.max_hz),
            }
        }

        if skip && self.state == LoopState::Playing {
            self.finish_track("skipped");
        }

        if !quit && matches!(self.state, LoopState::Idle | LoopState::TrackFinished) {
            self.load_next(canvas);
        }

        if self.state == LoopState::Playing {
            self.render_frame(dt, canvas)?;
            let ended = self
                .session
                .as_ref()
                .map_or(true, |s| !s.transport.is_playing());
            if ended {
                self.finish_track("playback ended");
            }
        }

        if quit {
            self.shutdown();
        }

        Ok(self.state)
    }

    /// Stop playback and refuse any further tracks.
    pub fn shutdown(&mut self) {
        if self.session.is_some() {
            self.finish_track("quit");
        }
        if !self.queue.is_empty() {
            log::info!("Quitting with {} track(s) not played", self.queue.len());
            self.queue.clear();
        }
        self.state = LoopState::QuitRequested;
    }

    fn render_frame<C: Canvas>(&mut self, dt: f32, canvas: &mut C) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        let position = session.transport.position_secs();

        let mut triggered = false;
        for element in &mut session.elements {
            let decibel = session.mapper.lookup(position, element.freq_hz() as f32);
            element.update(dt, decibel);
            triggered |= self.settings.shift.triggered_by(element.freq_hz(), decibel);
        }

        let palette = self.settings.palette;
        let foreground: Rgb = self
            .settings
            .shift
            .frame_foreground(palette.foreground(), triggered);
        log::trace!("t={:.3}s shifted={}", position, triggered);

        canvas.clear(palette.background());
        for element in &session.elements {
            element.render(canvas, self.settings.shape, foreground);
        }
        canvas.present()
    }

    fn finish_track(&mut self, reason: &str) {
        if let Some(mut session) = self.session.take() {
            session.transport.stop();
            log::info!("Finished {} ({})", session.name, reason);
        }
        self.state = LoopState::TrackFinished;
    }

    fn load_next<C: Canvas>(&mut self, canvas: &mut C) {
        while let Some(path) = self.queue.pop_front() {
            self.state = LoopState::LoadingTrack;
            let (width, height) = canvas.size();
            match self.load(&path, width, height) {
                Ok(session) => {
                    canvas.set_caption(&session.name);
                    self.max_hz = session.mapper.surface().max_hz() as u32;
                    self.session = Some(session);
                    self.state = LoopState::Playing;
                    return;
                }
                Err(err) => log::warn!("Skipping {}: {}", path.display(), err),
            }
        }
        log::info!("No tracks left to play");
        self.state = LoopState::QuitRequested;
    }

    fn load(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
    ) -> Result<PlaybackSession<L::Transport>, TrackLoadError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        log::info!("Loading track: {}", name);

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(format!("Analysing {}", name));
        spinner.enable_steady_tick(Duration::from_millis(100));

        let loaded = self.loader.decode(path).map(|audio| {
            let surface = SpectralSurface::build(&audio.samples, audio.sample_rate, self.params);
            let summary = features::summarize(&audio, &surface);
            (audio, surface, summary)
        });
        spinner.finish_and_clear();
        let (audio, surface, summary) = loaded?;

        log::info!(
            "Surface: {} bins x {} frames ({:.1}s, up to {:.0} Hz)",
            surface.bins(),
            surface.frames(),
            surface.last_frame_seconds(),
            surface.max_hz()
        );
        if surface.peak_db() <= DB_FLOOR {
            log::warn!("{} is silent", name);
        }
        let mapper = IndexMapper::new(surface);
        log::debug!(
            "{:.2} frames/s, {:.4} bins/Hz",
            mapper.frames_per_second(),
            mapper.bins_per_hz()
        );

        let elements = self.layout.build(width, height);
        let transport = self.loader.start(audio)?;

        Ok(PlaybackSession {
            name,
            mapper,
            elements,
            transport,
            summary,
        })
    }

    fn print_diagnostics(&self) {
        let s = &self.settings;
        println!("State: {:?}", self.state);
        println!(
            "Palette {}  Shape {:?}  Monitor {} Hz  Threshold {} dB  Factors {:?}",
            s.palette.number(),
            s.shape,
            s.shift.monitored_hz(),
            s.shift.threshold_db(),
            s.shift.factors()
        );
        if let Some(ref session) = self.session {
            let t = &session.summary;
            println!("Track: {}", session.name);
            println!(
                "  {:.1}s @ {}Hz, position {:.1}s",
                t.duration,
                t.sample_rate,
                session.transport.position_secs()
            );
            println!(
                "  peak {:.3}  zcr {:.4}  centroid {:.0} Hz  rolloff {:.0} Hz",
                t.peak_amplitude, t.zero_crossing_rate, t.spectral_centroid, t.spectral_rolloff
            );
            println!("  {} onsets, tempo {:.1} BPM", t.beat_count, t.tempo_bpm);
        }
        println!("{} track(s) queued", self.queue.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::surface::tests::sine;
    use crate::render::canvas::recording::{DrawCall, RecordingCanvas};
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::rc::Rc;

    const SR: u32 = 8192;

    #[derive(Clone, Default)]
    struct Clock {
        position: Rc<Cell<f32>>,
        playing: Rc<Cell<bool>>,
    }

    struct FakeTransport {
        clock: Clock,
    }

    impl Transport for FakeTransport {
        fn position_secs(&self) -> f32 {
            self.clock.position.get()
        }

        fn is_playing(&self) -> bool {
            self.clock.playing.get()
        }

        fn stop(&mut self) {
            self.clock.playing.set(false);
        }
    }

    struct FakeLoader {
        tracks: HashMap<PathBuf, AudioData>,
        started: Rc<Cell<usize>>,
        clock: Clock,
    }

    impl TrackLoader for FakeLoader {
        type Transport = FakeTransport;

        fn decode(&mut self, path: &Path) -> Result<AudioData, TrackLoadError> {
            self.tracks
                .get(path)
                .cloned()
                .ok_or_else(|| TrackLoadError::NoAudioTrack(path.to_path_buf()))
        }

        fn start(&mut self, _audio: AudioData) -> Result<FakeTransport, TrackLoadError> {
            self.started.set(self.started.get() + 1);
            self.clock.playing.set(true);
            Ok(FakeTransport {
                clock: self.clock.clone(),
            })
        }
    }

    struct Harness {
        player: Player<FakeLoader>,
        canvas: RecordingCanvas,
        clock: Clock,
        started: Rc<Cell<usize>>,
    }

    impl Harness {
        fn step(&mut self, commands: &[Command]) -> LoopState {
            self.player.step(1.0 / 60.0, commands, &mut self.canvas).unwrap()
        }

        fn starts(&self) -> usize {
            self.started.get()
        }
    }

    fn tone_then_silence() -> AudioData {
        let mut samples = sine(440.0, SR, 1.0);
        samples.extend(std::iter::repeat(0.0).take(SR as usize));
        AudioData {
            samples,
            sample_rate: SR,
        }
    }

    fn harness(names: &[&str], broken: &[&str], shift: ColorShift) -> Harness {
        let clock = Clock::default();
        let started = Rc::new(Cell::new(0));
        let tracks = names
            .iter()
            .filter(|n| !broken.contains(n))
            .map(|n| (PathBuf::from(n), tone_then_silence()))
            .collect();
        let loader = FakeLoader {
            tracks,
            started: Rc::clone(&started),
            clock: clock.clone(),
        };
        let settings = Settings {
            palette: Palette::Classic,
            shape: Shape::Bars,
            shift,
        };
        let layout = Layout {
            freq_start_hz: 40,
            freq_end_hz: 1000,
            ..Layout::default()
        };
        let player = Player::new(
            loader,
            names.iter().map(PathBuf::from).collect(),
            settings,
            layout,
            StftParams::new(1024, 512).unwrap(),
            SR / 2,
        );
        Harness {
            player,
            canvas: RecordingCanvas::new(800, 800),
            clock,
            started,
        }
    }

    fn default_harness(names: &[&str]) -> Harness {
        harness(names, &[], ColorShift::new([0.7, 0.9, 2.0], 440, 512, -18.0))
    }

    fn rect_colors(frame: &[DrawCall]) -> Vec<Rgb> {
        frame
            .iter()
            .filter_map(|c| match c {
                DrawCall::Rect { color, .. } | DrawCall::Circle { color, .. } => Some(*color),
                DrawCall::Clear(_) => None,
            })
            .collect()
    }

    #[test]
    fn first_step_loads_and_draws_the_first_track() {
        let mut h = default_harness(&["a.wav", "b.wav"]);
        assert_eq!(h.player.state(), LoopState::Idle);
        assert_eq!(h.step(&[]), LoopState::Playing);
        assert_eq!(h.canvas.caption, "a.wav");
        assert_eq!(h.starts(), 1);

        let frame = h.canvas.last_frame();
        assert_eq!(frame[0], DrawCall::Clear(Palette::Classic.background()));
        // 40, 140, ... 940 Hz
        assert_eq!(frame.len(), 1 + 10);
        assert_eq!(h.player.elements().len(), 10);
    }

    #[test]
    fn broken_tracks_are_skipped() {
        let mut h = harness(&["bad.wav", "good.wav"], &["bad.wav"], ColorShift::default());
        assert_eq!(h.step(&[]), LoopState::Playing);
        assert_eq!(h.canvas.caption, "good.wav");
        assert_eq!(h.starts(), 1);
    }

    #[test]
    fn all_tracks_broken_means_quit() {
        let mut h = harness(&["x.wav", "y.wav"], &["x.wav", "y.wav"], ColorShift::default());
        assert_eq!(h.step(&[]), LoopState::QuitRequested);
        assert!(h.canvas.frames.is_empty());
    }

    #[test]
    fn empty_input_quits_immediately() {
        let mut h = default_harness(&[]);
        assert_eq!(h.step(&[]), LoopState::QuitRequested);
    }

    #[test]
    fn skip_loads_the_next_track_at_once() {
        let mut h = default_harness(&["a.wav", "b.wav", "c.wav"]);
        h.step(&[]);
        h.clock.position.set(0.3);
        assert_eq!(h.step(&[Command::Skip]), LoopState::Playing);
        assert_eq!(h.canvas.caption, "b.wav");
        assert_eq!(h.starts(), 2);
    }

    #[test]
    fn natural_end_finishes_then_advances() {
        let mut h = default_harness(&["a.wav", "b.wav"]);
        h.step(&[]);
        h.clock.playing.set(false);
        assert_eq!(h.step(&[]), LoopState::TrackFinished);
        assert!(h.player.elements().is_empty());
        assert_eq!(h.step(&[]), LoopState::Playing);
        assert_eq!(h.canvas.caption, "b.wav");

        h.clock.playing.set(false);
        assert_eq!(h.step(&[]), LoopState::TrackFinished);
        assert_eq!(h.step(&[]), LoopState::QuitRequested);
    }

    #[test]
    fn quit_finishes_the_frame_and_stops_everything() {
        let mut h = default_harness(&["a.wav", "b.wav", "c.wav"]);
        h.step(&[]);
        let frames_before = h.canvas.frames.len();

        assert_eq!(h.step(&[Command::Quit]), LoopState::QuitRequested);
        assert_eq!(h.canvas.frames.len(), frames_before + 1);
        assert!(!h.clock.playing.get());

        for _ in 0..5 {
            assert_eq!(h.step(&[Command::Skip]), LoopState::QuitRequested);
        }
        assert_eq!(h.starts(), 1);
    }

    #[test]
    fn quit_with_skip_does_not_load_another_track() {
        let mut h = default_harness(&["a.wav", "b.wav"]);
        h.step(&[]);
        assert_eq!(h.step(&[Command::Skip, Command::Quit]), LoopState::QuitRequested);
        assert_eq!(h.starts(), 1);
    }

    #[test]
    fn tone_drives_its_element_to_the_top() {
        let mut h = default_harness(&["a.wav"]);
        h.step(&[]);
        for i in 0..60 {
            h.clock.position.set(0.2 + i as f32 / 60.0 * 0.6);
            h.step(&[]);
        }
        let element = h
            .player
            .elements()
            .iter()
            .find(|e| e.freq_hz() == 440)
            .unwrap();
        assert!(element.size() > 390.0, "size {}", element.size());

        let quiet = h
            .player
            .elements()
            .iter()
            .find(|e| e.freq_hz() == 940)
            .unwrap();
        assert!(quiet.size() < 200.0, "size {}", quiet.size());
    }

    #[test]
    fn loud_monitored_bin_shifts_only_that_frame() {
        let mut h = default_harness(&["a.wav"]);
        let stored = Palette::Classic.foreground();
        let shifted = stored.scaled([0.7, 0.9, 2.0]);

        h.clock.position.set(0.5);
        h.step(&[]);
        assert!(rect_colors(h.canvas.last_frame()).iter().all(|&c| c == shifted));
        assert_eq!(h.player.settings().palette.foreground(), stored);

        // Silence in the second half of the track.
        h.clock.position.set(1.6);
        h.step(&[]);
        assert!(rect_colors(h.canvas.last_frame()).iter().all(|&c| c == stored));
    }

    #[test]
    fn moving_the_monitor_off_the_element_stops_the_shift() {
        let mut h = default_harness(&["a.wav"]);
        h.clock.position.set(0.5);
        h.step(&[]);
        h.step(&[Command::MoveMonitor(1)]);
        assert_eq!(h.player.settings().shift.monitored_hz(), 952);
        let stored = Palette::Classic.foreground();
        assert!(rect_colors(h.canvas.last_frame()).iter().all(|&c| c == stored));
    }

    #[test]
    fn threshold_above_reading_stops_the_shift() {
        let shift = ColorShift::new([0.7, 0.9, 2.0], 440, 512, -18.0);
        let mut h = harness(&["a.wav"], &[], shift);
        h.clock.position.set(0.5);
        h.step(&[Command::MoveThreshold(3)]);
        assert_eq!(h.player.settings().shift.threshold_db(), 0.0);
        let stored = Palette::Classic.foreground();
        assert!(rect_colors(h.canvas.last_frame()).iter().all(|&c| c == stored));
    }

    #[test]
    fn monitor_is_clamped_to_the_track_bandwidth() {
        let mut h = default_harness(&["a.wav"]);
        h.step(&[]);
        h.step(&[Command::MoveMonitor(100)]);
        assert_eq!(h.player.settings().shift.monitored_hz(), SR / 2);
    }

    #[test]
    fn palette_and_shape_commands_change_the_next_frame() {
        let mut h = default_harness(&["a.wav"]);
        h.clock.position.set(1.6);
        h.step(&[Command::SelectPalette(2), Command::ToggleShape]);
        let frame = h.canvas.last_frame();
        assert_eq!(frame[0], DrawCall::Clear(Palette::Night.background()));
        assert!(frame[1..].iter().all(|c| matches!(c, DrawCall::Circle { .. })));
        assert!(rect_colors(frame)
            .iter()
            .all(|&c| c == Palette::Night.foreground()));

        h.step(&[Command::SelectPalette(7)]);
        assert_eq!(h.player.settings().palette, Palette::Night);
    }

    #[test]
    fn help_and_diagnostics_leave_state_alone() {
        let mut h = default_harness(&["a.wav"]);
        h.step(&[]);
        assert_eq!(
            h.step(&[Command::Help, Command::Diagnostics]),
            LoopState::Playing
        );
        assert_eq!(h.starts(), 1);
    }
}

mod audio;
mod cli;
mod config;
mod input;
mod library;
mod player;
mod render;
mod visual;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::PhysicalKey,
    window::{Window, WindowId},
};

use audio::surface::StftParams;
use cli::Cli;
use config::Config;
use input::Command;
use player::{DeviceLoader, LoopState, Player, Settings};
use render::canvas::Canvas;
use render::frame::GpuCanvas;

/// Rate assumed for the monitor bound until the first track reports its own.
const FALLBACK_SAMPLE_RATE: u32 = 44_100;

struct App {
    player: Player<DeviceLoader>,
    window_size: (u32, u32),
    canvas: Option<GpuCanvas>,
    pending: Vec<Command>,
    last_frame: Option<Instant>,
    fatal: Option<anyhow::Error>,
}

impl App {
    fn init_canvas(&self, event_loop: &ActiveEventLoop) -> Result<GpuCanvas> {
        let (width, height) = self.window_size;
        let attributes = Window::default_attributes()
            .with_title("barviz")
            .with_inner_size(winit::dpi::LogicalSize::new(width, height));
        let window = event_loop
            .create_window(attributes)
            .context("Failed to create window")?;
        GpuCanvas::new(Arc::new(window)).context("Failed to initialise GPU")
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(canvas) = self.canvas.as_mut() else {
            return;
        };
        let now = Instant::now();
        let dt = self
            .last_frame
            .map_or(0.0, |prev| now.duration_since(prev).as_secs_f32());
        self.last_frame = Some(now);

        let commands = std::mem::take(&mut self.pending);
        match self.player.step(dt, &commands, canvas) {
            Ok(LoopState::QuitRequested) => event_loop.exit(),
            Ok(_) => {}
            Err(e) => {
                self.player.shutdown();
                self.fatal = Some(e);
                event_loop.exit();
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.canvas.is_some() {
            return;
        }
        match self.init_canvas(event_loop) {
            Ok(canvas) => {
                let (width, height) = canvas.size();
                log::info!("Window ready ({}x{})", width, height);
                self.canvas = Some(canvas);
            }
            Err(e) => {
                self.fatal = Some(e);
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref canvas) = self.canvas {
            canvas.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.pending.push(Command::Quit),
            WindowEvent::Resized(size) => {
                if let Some(ref mut canvas) = self.canvas {
                    canvas.resize(size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(code),
                        repeat: false,
                        ..
                    },
                ..
            } => {
                if let Some(command) = input::command_for_key(code) {
                    self.pending.push(command);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let mut cfg = match cli.config.clone().or_else(config::discover_config) {
        Some(path) => match config::load_config(&path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            Err(e) => {
                log::warn!("{:#}; using defaults", e);
                Config::default()
            }
        },
        None => Config::default(),
    };
    cli.apply_to(&mut cfg);

    let params = StftParams::new(cfg.analysis.window_length, cfg.analysis.hop_length)
        .context("Invalid analysis settings")?;
    let layout = cfg.layout();
    layout.validate().context("Invalid layout settings")?;
    let settings = Settings {
        palette: cfg.palette()?,
        shape: cfg.shape()?,
        shift: cfg.color_shift(),
    };

    let tracks = library::enumerate_tracks(&cli.input, &cfg.analysis.extensions)?;
    if tracks.is_empty() {
        log::info!("No playable tracks in {}", cli.input.display());
        return Ok(());
    }
    log::info!("Found {} track(s) in {}", tracks.len(), cli.input.display());

    let target_rate = cfg.analysis.sample_rate;
    let max_hz = target_rate.unwrap_or(FALLBACK_SAMPLE_RATE) / 2;
    let player = Player::new(
        DeviceLoader { target_rate },
        tracks,
        settings,
        layout,
        params,
        max_hz,
    );
    let s = player.settings();
    log::info!(
        "Palette {}, {:?}, monitoring {} Hz above {} dB",
        s.palette.number(),
        s.shape,
        s.shift.monitored_hz(),
        s.shift.threshold_db()
    );

    let mut app = App {
        player,
        window_size: (cfg.display.width, cfg.display.height),
        canvas: None,
        pending: Vec::new(),
        last_frame: None,
        fatal: None,
    };

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);
    event_loop.run_app(&mut app).context("Event loop failed")?;

    app.player.shutdown();
    match app.fatal {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

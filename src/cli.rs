use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "barviz", about = "Real-time bar and circle visualizer for a folder of audio tracks")]
pub struct Cli {
    /// Directory of audio files (or a single file) to play
    #[arg(default_value = "input")]
    pub input: PathBuf,

    /// Config file (defaults to ./barviz.toml or ~/.config/barviz/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Window width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Window height in pixels
    #[arg(long)]
    pub height: Option<u32>,

    /// Element shape: bars or circles
    #[arg(long)]
    pub shape: Option<String>,

    /// Starting palette (1-4)
    #[arg(short, long)]
    pub palette: Option<u8>,

    /// STFT window length in samples
    #[arg(long)]
    pub window_length: Option<usize>,

    /// STFT hop length in samples
    #[arg(long)]
    pub hop_length: Option<usize>,

    /// Resample tracks to this rate before analysis
    #[arg(long)]
    pub sample_rate: Option<u32>,
}

impl Cli {
    /// Command-line values win over the config file.
    pub fn apply_to(&self, cfg: &mut Config) {
        if let Some(width) = self.width {
            cfg.display.width = width;
        }
        if let Some(height) = self.height {
            cfg.display.height = height;
        }
        if let Some(ref shape) = self.shape {
            cfg.style.shape = shape.clone();
        }
        if let Some(palette) = self.palette {
            cfg.style.palette = palette;
        }
        if let Some(window_length) = self.window_length {
            cfg.analysis.window_length = window_length;
        }
        if let Some(hop_length) = self.hop_length {
            cfg.analysis.hop_length = hop_length;
        }
        if self.sample_rate.is_some() {
            cfg.analysis.sample_rate = self.sample_rate;
        }
    }
}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::visual::element::{ElementRange, Shape};
use crate::visual::layout::Layout;
use crate::visual::palette::{ColorShift, Palette};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub style: StyleConfig,
    #[serde(default)]
    pub shift: ShiftConfig,
}

#[derive(Debug, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_window_length")]
    pub window_length: usize,
    #[serde(default = "default_hop_length")]
    pub hop_length: usize,
    /// Resample every track to this rate; native rate when unset.
    #[serde(default)]
    pub sample_rate: Option<u32>,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_freq_start")]
    pub freq_start_hz: u32,
    #[serde(default = "default_freq_end")]
    pub freq_end_hz: u32,
    #[serde(default = "default_freq_step")]
    pub freq_step_hz: u32,
    #[serde(default = "default_min_size")]
    pub min_size: f32,
    #[serde(default = "default_max_size")]
    pub max_size: f32,
    #[serde(default = "default_min_decibel")]
    pub min_decibel: f32,
    #[serde(default = "default_max_decibel")]
    pub max_decibel: f32,
    #[serde(default = "default_floor_margin")]
    pub floor_margin: f32,
}

#[derive(Debug, Deserialize)]
pub struct StyleConfig {
    #[serde(default = "default_shape")]
    pub shape: String,
    #[serde(default = "default_palette")]
    pub palette: u8,
}

#[derive(Debug, Deserialize)]
pub struct ShiftConfig {
    #[serde(default = "default_red")]
    pub red: f32,
    #[serde(default = "default_green")]
    pub green: f32,
    #[serde(default = "default_blue")]
    pub blue: f32,
    #[serde(default = "default_monitored_hz")]
    pub monitored_hz: u32,
    #[serde(default = "default_threshold_db")]
    pub threshold_db: f32,
    /// Defaults to the analysis hop length.
    #[serde(default)]
    pub monitor_step_hz: Option<u32>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_length: default_window_length(),
            hop_length: default_hop_length(),
            sample_rate: None,
            extensions: default_extensions(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            freq_start_hz: default_freq_start(),
            freq_end_hz: default_freq_end(),
            freq_step_hz: default_freq_step(),
            min_size: default_min_size(),
            max_size: default_max_size(),
            min_decibel: default_min_decibel(),
            max_decibel: default_max_decibel(),
            floor_margin: default_floor_margin(),
        }
    }
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            shape: default_shape(),
            palette: default_palette(),
        }
    }
}

impl Default for ShiftConfig {
    fn default() -> Self {
        Self {
            red: default_red(),
            green: default_green(),
            blue: default_blue(),
            monitored_hz: default_monitored_hz(),
            threshold_db: default_threshold_db(),
            monitor_step_hz: None,
        }
    }
}

fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 800 }
fn default_window_length() -> usize { 1024 }
fn default_hop_length() -> usize { 512 }
fn default_extensions() -> Vec<String> {
    ["wav", "mp3", "flac", "ogg"].iter().map(|s| s.to_string()).collect()
}
fn default_freq_start() -> u32 { 100 }
fn default_freq_end() -> u32 { 8000 }
fn default_freq_step() -> u32 { 100 }
fn default_min_size() -> f32 { 10.0 }
fn default_max_size() -> f32 { 400.0 }
fn default_min_decibel() -> f32 { -80.0 }
fn default_max_decibel() -> f32 { 0.0 }
fn default_floor_margin() -> f32 { 40.0 }
fn default_shape() -> String { "bars".into() }
fn default_palette() -> u8 { 1 }
fn default_red() -> f32 { 0.7 }
fn default_green() -> f32 { 0.9 }
fn default_blue() -> f32 { 2.0 }
fn default_monitored_hz() -> u32 { 100 }
fn default_threshold_db() -> f32 { -18.0 }

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config: {}", path.display()))
}

/// `./barviz.toml`, then the per-user config file, if any exists.
pub fn discover_config() -> Option<PathBuf> {
    let local = PathBuf::from("barviz.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("barviz").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("barviz").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

impl Config {
    pub fn layout(&self) -> Layout {
        let l = &self.layout;
        Layout {
            freq_start_hz: l.freq_start_hz,
            freq_end_hz: l.freq_end_hz,
            freq_step_hz: l.freq_step_hz,
            range: ElementRange {
                min_size: l.min_size,
                max_size: l.max_size,
                min_decibel: l.min_decibel,
                max_decibel: l.max_decibel,
            },
            floor_margin: l.floor_margin,
        }
    }

    pub fn shape(&self) -> Result<Shape> {
        Shape::parse(&self.style.shape)
            .with_context(|| format!("Unknown shape '{}', expected bars or circles", self.style.shape))
    }

    pub fn palette(&self) -> Result<Palette> {
        Palette::from_number(self.style.palette)
            .with_context(|| format!("Palette must be 1-4, got {}", self.style.palette))
    }

    pub fn color_shift(&self) -> ColorShift {
        let s = &self.shift;
        let step = s.monitor_step_hz.unwrap_or(self.analysis.hop_length as u32);
        ColorShift::new([s.red, s.green, s.blue], s.monitored_hz, step, s.threshold_db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.display.width, 800);
        assert_eq!(cfg.analysis.window_length, 1024);
        assert_eq!(cfg.analysis.hop_length, 512);
        assert_eq!(cfg.analysis.sample_rate, None);
        assert_eq!(cfg.layout().frequencies().len(), 79);
        assert_eq!(cfg.shape().unwrap(), Shape::Bars);
        assert_eq!(cfg.palette().unwrap(), Palette::Classic);
        assert_eq!(cfg.color_shift(), ColorShift::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [analysis]
            hop_length = 256
            sample_rate = 22050

            [style]
            shape = "circles"
            palette = 3

            [shift]
            blue = 1.5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.analysis.window_length, 1024);
        assert_eq!(cfg.analysis.sample_rate, Some(22050));
        assert_eq!(cfg.shape().unwrap(), Shape::Circles);
        assert_eq!(cfg.palette().unwrap(), Palette::Sunset);

        let mut shift = cfg.color_shift();
        assert_eq!(shift.factors(), [0.7, 0.9, 1.5]);
        shift.step_monitor(1, 10_000);
        assert_eq!(shift.monitored_hz(), 356);
    }

    #[test]
    fn bad_style_values_are_reported() {
        let cfg: Config = toml::from_str("[style]\nshape = \"stars\"\npalette = 9").unwrap();
        assert!(cfg.shape().is_err());
        assert!(cfg.palette().is_err());
    }

    #[test]
    fn load_config_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("barviz.toml");
        std::fs::write(&path, "[display\nwidth = ").unwrap();
        assert!(load_config(&path).is_err());

        std::fs::write(&path, "[display]\nwidth = 1024").unwrap();
        assert_eq!(load_config(&path).unwrap().display.width, 1024);
    }
}

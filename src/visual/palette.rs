//! Colour palettes and the loudness-triggered colour shift.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Channels as 0.0-1.0 floats.
    pub fn to_f32(self) -> [f32; 3] {
        [
            self.0 as f32 / 255.0,
            self.1 as f32 / 255.0,
            self.2 as f32 / 255.0,
        ]
    }

    /// Multiply each channel by its factor, saturating at 0 and 255.
    pub fn scaled(self, factors: [f32; 3]) -> Rgb {
        let scale = |c: u8, f: f32| (c as f32 * f).round().clamp(0.0, 255.0) as u8;
        Rgb(
            scale(self.0, factors[0]),
            scale(self.1, factors[1]),
            scale(self.2, factors[2]),
        )
    }
}

/// The four selectable background/foreground pairs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Palette {
    #[default]
    Classic,
    Night,
    Sunset,
    Terminal,
}

impl Palette {
    pub const ALL: [Palette; 4] = [
        Palette::Classic,
        Palette::Night,
        Palette::Sunset,
        Palette::Terminal,
    ];

    /// Palette for the 1-based number key.
    pub fn from_number(n: u8) -> Option<Palette> {
        Self::ALL.get((n as usize).checked_sub(1)?).copied()
    }

    pub fn number(self) -> u8 {
        match self {
            Palette::Classic => 1,
            Palette::Night => 2,
            Palette::Sunset => 3,
            Palette::Terminal => 4,
        }
    }

    pub fn background(self) -> Rgb {
        match self {
            Palette::Classic => Rgb(255, 255, 255),
            Palette::Night => Rgb(0, 0, 0),
            Palette::Sunset => Rgb(20, 24, 82),
            Palette::Terminal => Rgb(40, 40, 40),
        }
    }

    pub fn foreground(self) -> Rgb {
        match self {
            Palette::Classic => Rgb(255, 0, 0),
            Palette::Night => Rgb(0, 200, 255),
            Palette::Sunset => Rgb(255, 140, 40),
            Palette::Terminal => Rgb(120, 230, 60),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    fn index(self) -> usize {
        match self {
            Channel::Red => 0,
            Channel::Green => 1,
            Channel::Blue => 2,
        }
    }
}

pub const THRESHOLD_STEP_DB: f32 = 6.0;
pub const THRESHOLD_MIN_DB: f32 = -60.0;
pub const THRESHOLD_MAX_DB: f32 = 0.0;
pub const FACTOR_STEP: f32 = 0.1;
pub const FACTOR_MAX: f32 = 3.0;

/// Which bin is watched, how loud it must get, and how the colour bends.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorShift {
    factors: [f32; 3],
    monitored_hz: u32,
    monitor_step_hz: u32,
    threshold_db: f32,
}

impl ColorShift {
    pub fn new(factors: [f32; 3], monitored_hz: u32, monitor_step_hz: u32, threshold_db: f32) -> Self {
        Self {
            factors: factors.map(|f| f.clamp(0.0, FACTOR_MAX)),
            monitored_hz,
            monitor_step_hz,
            threshold_db: threshold_db.clamp(THRESHOLD_MIN_DB, THRESHOLD_MAX_DB),
        }
    }

    pub fn factors(&self) -> [f32; 3] {
        self.factors
    }

    pub fn monitored_hz(&self) -> u32 {
        self.monitored_hz
    }

    pub fn threshold_db(&self) -> f32 {
        self.threshold_db
    }

    /// Move the monitored frequency by `steps` hops, staying inside `0..=max_hz`.
    pub fn step_monitor(&mut self, steps: i32, max_hz: u32) {
        let delta = steps as i64 * self.monitor_step_hz as i64;
        let next = (self.monitored_hz as i64 + delta).clamp(0, max_hz as i64);
        self.monitored_hz = next as u32;
    }

    pub fn step_threshold(&mut self, steps: i32) {
        self.threshold_db = (self.threshold_db + steps as f32 * THRESHOLD_STEP_DB)
            .clamp(THRESHOLD_MIN_DB, THRESHOLD_MAX_DB);
    }

    pub fn step_factor(&mut self, channel: Channel, steps: i32) {
        let i = channel.index();
        let next = self.factors[i] + steps as f32 * FACTOR_STEP;
        // Keep one decimal so repeated steps land on the same values.
        self.factors[i] = ((next * 10.0).round() / 10.0).clamp(0.0, FACTOR_MAX);
    }

    /// Whether an element at `freq_hz` reading `decibel` trips the shift.
    pub fn triggered_by(&self, freq_hz: u32, decibel: f32) -> bool {
        freq_hz == self.monitored_hz && decibel > self.threshold_db
    }

    /// Foreground to draw with this frame.
    ///
    /// `stored` is never modified; the shifted colour only lives for the
    /// frame it was computed for.
    pub fn frame_foreground(&self, stored: Rgb, triggered: bool) -> Rgb {
        if triggered {
            stored.scaled(self.factors)
        } else {
            stored
        }
    }
}

impl Default for ColorShift {
    fn default() -> Self {
        Self::new([0.7, 0.9, 2.0], 100, 512, -18.0)
    }
}

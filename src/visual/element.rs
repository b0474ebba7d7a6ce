use crate::render::canvas::Canvas;

use super::palette::Rgb;

/// Time constant of the approach toward the target size (seconds).
const RESPONSE_SECONDS: f32 = 0.1;

/// How elements are drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Shape {
    #[default]
    Bars,
    Circles,
}

impl Shape {
    pub fn toggled(self) -> Shape {
        match self {
            Shape::Bars => Shape::Circles,
            Shape::Circles => Shape::Bars,
        }
    }

    pub fn parse(name: &str) -> Option<Shape> {
        match name.to_ascii_lowercase().as_str() {
            "bars" | "bar" => Some(Shape::Bars),
            "circles" | "circle" => Some(Shape::Circles),
            _ => None,
        }
    }
}

/// Size and decibel ranges shared by every element of a bank.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ElementRange {
    pub min_size: f32,
    pub max_size: f32,
    pub min_decibel: f32,
    pub max_decibel: f32,
}

/// One bar or circle bound to a single frequency.
#[derive(Clone, Debug)]
pub struct VisualElement {
    x: f32,
    floor: f32,
    width: f32,
    freq_hz: u32,
    size: f32,
    range: ElementRange,
    decibel_size_ratio: f32,
}

impl VisualElement {
    /// `x` is the left edge, `floor` the y coordinate everything grows up from.
    pub fn new(x: f32, floor: f32, width: f32, freq_hz: u32, range: ElementRange) -> Self {
        let decibel_size_ratio =
            (range.max_size - range.min_size) / (range.max_decibel - range.min_decibel);
        Self {
            x,
            floor,
            width,
            freq_hz,
            size: range.min_size,
            range,
            decibel_size_ratio,
        }
    }

    pub fn freq_hz(&self) -> u32 {
        self.freq_hz
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    /// Size this element settles at for a steady `decibel` reading.
    pub fn target_size(&self, decibel: f32) -> f32 {
        (decibel - self.range.min_decibel) * self.decibel_size_ratio + self.range.min_size
    }

    /// Move toward the size for `decibel` over `dt` seconds.
    pub fn update(&mut self, dt: f32, decibel: f32) {
        if !(dt > 0.0) || !dt.is_finite() {
            return;
        }
        let target = self.target_size(decibel);
        let gain = (dt / RESPONSE_SECONDS).min(1.0);
        self.size += (target - self.size) * gain;
        self.size = self.size.clamp(self.range.min_size, self.range.max_size);
    }

    pub fn render(&self, canvas: &mut dyn Canvas, shape: Shape, color: Rgb) {
        match shape {
            Shape::Bars => {
                canvas.fill_rect(self.x, self.floor - self.size, self.width, self.size, color)
            }
            Shape::Circles => canvas.fill_circle(
                self.x + self.width / 2.0,
                self.floor - self.size,
                self.size,
                color,
            ),
        }
    }
}

use anyhow::Result;

use super::element::{ElementRange, VisualElement};

/// How a bank of elements is spread across the window.
#[derive(Clone, Debug, PartialEq)]
pub struct Layout {
    /// First assigned frequency (inclusive)
    pub freq_start_hz: u32,
    /// Frequencies stop before this one
    pub freq_end_hz: u32,
    pub freq_step_hz: u32,
    pub range: ElementRange,
    /// Gap between the floor and the bottom of the window (pixels)
    pub floor_margin: f32,
}

impl Layout {
    pub fn validate(&self) -> Result<()> {
        if self.freq_step_hz == 0 {
            anyhow::bail!("freq_step_hz must be positive");
        }
        if self.frequencies().is_empty() {
            anyhow::bail!(
                "no frequencies between {} Hz and {} Hz",
                self.freq_start_hz,
                self.freq_end_hz
            );
        }
        if !(self.range.min_decibel < self.range.max_decibel) {
            anyhow::bail!("min_decibel must be below max_decibel");
        }
        if !(self.range.min_size < self.range.max_size) {
            anyhow::bail!("min_size must be below max_size");
        }
        Ok(())
    }

    /// Assigned frequencies, left to right.
    pub fn frequencies(&self) -> Vec<u32> {
        if self.freq_step_hz == 0 {
            return Vec::new();
        }
        (self.freq_start_hz..self.freq_end_hz)
            .step_by(self.freq_step_hz as usize)
            .collect()
    }

    /// Build the element bank for a `width` x `height` window.
    ///
    /// Elements share the width equally and grow from a common floor; the
    /// tallest element is capped so it never leaves the window.
    pub fn build(&self, width: u32, height: u32) -> Vec<VisualElement> {
        let freqs = self.frequencies();
        if freqs.is_empty() {
            return Vec::new();
        }
        let screen_w = width as f32;
        let element_w = screen_w / freqs.len() as f32;
        let floor = (height as f32 - self.floor_margin).max(1.0);
        let range = ElementRange {
            max_size: self.range.max_size.min(floor).max(self.range.min_size),
            ..self.range
        };

        let mut x = (screen_w - element_w * freqs.len() as f32) / 2.0;
        freqs
            .into_iter()
            .map(|freq| {
                let element = VisualElement::new(x, floor, element_w, freq, range);
                x += element_w;
                element
            })
            .collect()
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            freq_start_hz: 100,
            freq_end_hz: 8000,
            freq_step_hz: 100,
            range: ElementRange {
                min_size: 10.0,
                max_size: 400.0,
                min_decibel: -80.0,
                max_decibel: 0.0,
            },
            floor_margin: 40.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_has_79_bands() {
        let layout = Layout::default();
        let freqs = layout.frequencies();
        assert_eq!(freqs.len(), 79);
        assert_eq!(freqs[0], 100);
        assert_eq!(*freqs.last().unwrap(), 7900);
        layout.validate().unwrap();
    }

    #[test]
    fn elements_tile_the_width() {
        let layout = Layout::default();
        let elements = layout.build(790, 800);
        assert_eq!(elements.len(), 79);
        assert!((elements[0].x() - 0.0).abs() < 1e-4);
        assert!((elements[0].width() - 10.0).abs() < 1e-4);
        let last = elements.last().unwrap();
        assert!((last.x() + last.width() - 790.0).abs() < 1e-2);
        assert_eq!(last.freq_hz(), 7900);
    }

    #[test]
    fn short_window_caps_max_size() {
        let layout = Layout::default();
        let mut elements = layout.build(400, 200);
        let e = &mut elements[0];
        e.update(1.0, 0.0);
        assert!(e.size() <= 160.0);
    }

    #[test]
    fn rejects_empty_and_inverted_layouts() {
        let mut layout = Layout {
            freq_start_hz: 500,
            freq_end_hz: 500,
            ..Layout::default()
        };
        assert!(layout.validate().is_err());
        layout = Layout::default();
        layout.range.min_decibel = 0.0;
        assert!(layout.validate().is_err());
        layout = Layout::default();
        layout.freq_step_hz = 0;
        assert!(layout.validate().is_err());
    }
}

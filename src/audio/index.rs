use super::surface::SpectralSurface;

/// Maps continuous (seconds, Hz) queries onto the [`SpectralSurface`] it owns.
///
/// Indices are truncated toward the grid origin and clamped to the last
/// row/column, so any finite or non-finite query yields a valid cell.
pub struct IndexMapper {
    surface: SpectralSurface,
    frames_per_second: f32,
    bins_per_hz: f32,
}

impl IndexMapper {
    pub fn new(surface: SpectralSurface) -> Self {
        let last_seconds = surface.last_frame_seconds();
        let max_hz = surface.max_hz();
        let frames_per_second = if last_seconds > 0.0 {
            surface.frames() as f32 / last_seconds
        } else {
            0.0
        };
        let bins_per_hz = if max_hz > 0.0 {
            surface.bins() as f32 / max_hz
        } else {
            0.0
        };
        Self {
            surface,
            frames_per_second,
            bins_per_hz,
        }
    }

    pub fn surface(&self) -> &SpectralSurface {
        &self.surface
    }

    pub fn frames_per_second(&self) -> f32 {
        self.frames_per_second
    }

    pub fn bins_per_hz(&self) -> f32 {
        self.bins_per_hz
    }

    pub fn frame_index(&self, seconds: f32) -> usize {
        to_index(seconds * self.frames_per_second, self.surface.frames())
    }

    pub fn bin_index(&self, hz: f32) -> usize {
        to_index(hz * self.bins_per_hz, self.surface.bins())
    }

    /// Decibel reading at `seconds` into the track for frequency `hz`.
    pub fn lookup(&self, seconds: f32, hz: f32) -> f32 {
        self.surface.get(self.bin_index(hz), self.frame_index(seconds))
    }
}

fn to_index(position: f32, len: usize) -> usize {
    // `as` saturates: NaN and negatives become 0, +inf becomes usize::MAX.
    (position as usize).min(len.saturating_sub(1))
}

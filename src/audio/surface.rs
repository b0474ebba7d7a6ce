//! Short-time Fourier decibel surface for a whole track.
//!
//! Rows are frequency bins, columns are time frames. The loudest cell of the
//! track sits at 0 dB and everything else is at or below it, floored at
//! [`DB_FLOOR`].

use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

/// Lowest value stored in a surface.
pub const DB_FLOOR: f32 = -80.0;

/// Magnitudes below this are treated as this when taking logs.
const AMIN: f32 = 1e-5;

/// Validated STFT parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StftParams {
    window_length: usize,
    hop_length: usize,
}

impl StftParams {
    pub fn new(window_length: usize, hop_length: usize) -> anyhow::Result<Self> {
        if window_length < 2 {
            anyhow::bail!("window_length must be at least 2, got {}", window_length);
        }
        if hop_length == 0 || hop_length > window_length {
            anyhow::bail!(
                "hop_length must be in 1..={}, got {}",
                window_length,
                hop_length
            );
        }
        Ok(Self {
            window_length,
            hop_length,
        })
    }

    pub fn window_length(&self) -> usize {
        self.window_length
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    /// Number of frequency rows produced for this window.
    pub fn bin_count(&self) -> usize {
        self.window_length / 2 + 1
    }

    /// Number of time columns produced for `sample_count` samples.
    pub fn frame_count(&self, sample_count: usize) -> usize {
        1 + sample_count / self.hop_length
    }
}

/// Immutable decibel grid for one track.
#[derive(Clone, Debug)]
pub struct SpectralSurface {
    /// Row-major: `db[bin * frames + frame]`.
    db: Vec<f32>,
    bins: usize,
    frames: usize,
    sample_rate: u32,
    params: StftParams,
}

impl SpectralSurface {
    pub fn build(samples: &[f32], sample_rate: u32, params: StftParams) -> Self {
        let n_fft = params.window_length;
        let hop = params.hop_length;
        let bins = params.bin_count();
        let frames = params.frame_count(samples.len());

        let window = hann_window(n_fft);
        let window_sum: f32 = window.iter().sum();
        let scale = 2.0 / window_sum;

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);

        // Centred frames: frame t covers samples [t*hop - n_fft/2, t*hop + n_fft/2).
        let pad = n_fft / 2;
        let columns: Vec<Vec<f32>> = (0..frames)
            .into_par_iter()
            .map(|t| {
                let start = (t * hop) as isize - pad as isize;
                let mut buffer: Vec<Complex<f32>> = window
                    .iter()
                    .enumerate()
                    .map(|(i, &w)| {
                        let idx = start + i as isize;
                        let s = if idx >= 0 && (idx as usize) < samples.len() {
                            samples[idx as usize]
                        } else {
                            0.0
                        };
                        Complex::new(s * w, 0.0)
                    })
                    .collect();
                fft.process(&mut buffer);
                buffer[..bins].iter().map(|c| c.norm() * scale).collect()
            })
            .collect();

        let peak = columns
            .iter()
            .flat_map(|col| col.iter().copied())
            .fold(0.0f32, f32::max);

        let mut db = vec![DB_FLOOR; bins * frames];
        if peak > AMIN {
            let reference = 20.0 * peak.log10();
            for (t, col) in columns.iter().enumerate() {
                for (k, &mag) in col.iter().enumerate() {
                    let value = 20.0 * mag.max(AMIN).log10() - reference;
                    db[k * frames + t] = value.max(DB_FLOOR);
                }
            }
        } else {
            log::debug!("Silent waveform, using constant {} dB surface", DB_FLOOR);
        }

        Self {
            db,
            bins,
            frames,
            sample_rate,
            params,
        }
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Centre frequency of `bin` in Hz.
    pub fn bin_hz(&self, bin: usize) -> f32 {
        bin as f32 * self.sample_rate as f32 / self.params.window_length as f32
    }

    /// Centre time of `frame` in seconds.
    pub fn frame_seconds(&self, frame: usize) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        (frame * self.params.hop_length) as f32 / self.sample_rate as f32
    }

    /// Highest analysed frequency (Nyquist).
    pub fn max_hz(&self) -> f32 {
        self.bin_hz(self.bins - 1)
    }

    /// Time of the last column.
    pub fn last_frame_seconds(&self) -> f32 {
        self.frame_seconds(self.frames - 1)
    }

    pub fn get(&self, bin: usize, frame: usize) -> f32 {
        self.db[bin * self.frames + frame]
    }

    /// One time column as a vector of bin values.
    pub fn column(&self, frame: usize) -> Vec<f32> {
        (0..self.bins).map(|bin| self.get(bin, frame)).collect()
    }

    pub fn peak_db(&self) -> f32 {
        self.db.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }
}

/// Symmetric Hann window.
fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sine(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * seconds) as usize;
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn rejects_bad_params() {
        assert!(StftParams::new(0, 1).is_err());
        assert!(StftParams::new(1024, 0).is_err());
        assert!(StftParams::new(1024, 2048).is_err());
        assert!(StftParams::new(1024, 512).is_ok());
    }

    #[test]
    fn hann_window_shape() {
        let w = hann_window(1024);
        assert!(w[0].abs() < 1e-6);
        assert!(w[1023].abs() < 1e-6);
        assert!((w[511] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn silence_has_expected_shape_and_floor() {
        let params = StftParams::new(1024, 512).unwrap();
        let sample_rate = 22050;
        let seconds = 3.0;
        let samples = vec![0.0; (sample_rate as f32 * seconds) as usize];
        let surface = SpectralSurface::build(&samples, sample_rate, params);

        let expected = (seconds * sample_rate as f32 / 512.0).round() as isize;
        assert!((surface.frames() as isize - expected).abs() <= 1);
        assert_eq!(surface.bins(), 513);
        for bin in [0, 100, 512] {
            for frame in [0, surface.frames() / 2, surface.frames() - 1] {
                assert_eq!(surface.get(bin, frame), DB_FLOOR);
            }
        }
    }

    #[test]
    fn empty_waveform_yields_single_floor_column() {
        let params = StftParams::new(256, 128).unwrap();
        let surface = SpectralSurface::build(&[], 8000, params);
        assert_eq!(surface.frames(), 1);
        assert_eq!(surface.peak_db(), DB_FLOOR);
    }

    #[test]
    fn axes_are_strictly_increasing() {
        let params = StftParams::new(1024, 512).unwrap();
        let surface = SpectralSurface::build(&sine(440.0, 8192, 0.5), 8192, params);
        for k in 1..surface.bins() {
            assert!(surface.bin_hz(k) > surface.bin_hz(k - 1));
        }
        for t in 1..surface.frames() {
            assert!(surface.frame_seconds(t) > surface.frame_seconds(t - 1));
        }
        assert!((surface.max_hz() - 4096.0).abs() < 1e-3);
    }

    #[test]
    fn pure_tone_peaks_at_zero_db_on_its_bin() {
        // 8192 Hz / 1024 window = 8 Hz per bin, so 440 Hz is bin 55 exactly.
        let params = StftParams::new(1024, 512).unwrap();
        let surface = SpectralSurface::build(&sine(440.0, 8192, 2.0), 8192, params);

        assert!(surface.peak_db().abs() < 1e-4);
        for t in 4..surface.frames() - 4 {
            let col = surface.column(t);
            let loudest = col
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(k, _)| k)
                .unwrap();
            assert_eq!(loudest, 55);
            assert!(col[55] > -0.5, "frame {} was {}", t, col[55]);
            assert!(col[200] < -40.0);
        }
    }
}

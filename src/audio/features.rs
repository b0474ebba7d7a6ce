use super::decode::AudioData;
use super::surface::SpectralSurface;

/// Whole-track descriptors shown by the diagnostics key.
#[derive(Clone, Debug)]
pub struct TrackSummary {
    pub duration: f32,
    pub sample_rate: u32,
    pub peak_amplitude: f32,
    /// Sign changes per sample.
    pub zero_crossing_rate: f32,
    /// Mean spectral centroid (Hz)
    pub spectral_centroid: f32,
    /// Mean frequency below which 85% of the energy sits (Hz)
    pub spectral_rolloff: f32,
    pub beat_count: usize,
    pub tempo_bpm: f32,
}

const ROLLOFF_FRACTION: f32 = 0.85;

pub fn summarize(audio: &AudioData, surface: &SpectralSurface) -> TrackSummary {
    let samples = &audio.samples;
    let peak_amplitude = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    let zero_crossing_rate = if samples.len() > 1 {
        crossings as f32 / (samples.len() - 1) as f32
    } else {
        0.0
    };

    let mut centroid_sum = 0.0f32;
    let mut rolloff_sum = 0.0f32;
    let mut voiced = 0usize;
    let mut flux_values: Vec<(f32, f32)> = Vec::with_capacity(surface.frames());
    let mut prev: Option<Vec<f32>> = None;

    for t in 0..surface.frames() {
        let magnitudes: Vec<f32> = surface
            .column(t)
            .iter()
            .map(|db| 10f32.powf(db / 20.0))
            .collect();
        let total: f32 = magnitudes.iter().sum();

        if total > 1e-10 {
            let centroid = magnitudes
                .iter()
                .enumerate()
                .map(|(k, &m)| surface.bin_hz(k) * m)
                .sum::<f32>()
                / total;
            centroid_sum += centroid;
            rolloff_sum += rolloff_hz(surface, &magnitudes, total);
            voiced += 1;
        }

        let flux = prev.as_ref().map_or(0.0, |p| {
            magnitudes
                .iter()
                .zip(p.iter())
                .map(|(cur, prev)| (cur - prev).max(0.0))
                .sum()
        });
        flux_values.push((surface.frame_seconds(t), flux));
        prev = Some(magnitudes);
    }

    let beat_times = detect_beats(&flux_values);
    let tempo_bpm = estimate_tempo(&beat_times);

    TrackSummary {
        duration: audio.duration(),
        sample_rate: audio.sample_rate,
        peak_amplitude,
        zero_crossing_rate,
        spectral_centroid: if voiced > 0 { centroid_sum / voiced as f32 } else { 0.0 },
        spectral_rolloff: if voiced > 0 { rolloff_sum / voiced as f32 } else { 0.0 },
        beat_count: beat_times.len(),
        tempo_bpm,
    }
}

fn rolloff_hz(surface: &SpectralSurface, magnitudes: &[f32], total: f32) -> f32 {
    let target = total * ROLLOFF_FRACTION;
    let mut acc = 0.0;
    for (k, &m) in magnitudes.iter().enumerate() {
        acc += m;
        if acc >= target {
            return surface.bin_hz(k);
        }
    }
    surface.max_hz()
}

fn detect_beats(flux_values: &[(f32, f32)]) -> Vec<f32> {
    if flux_values.is_empty() {
        return Vec::new();
    }

    let window = 20;
    let mut beat_times = Vec::new();

    for i in 0..flux_values.len() {
        let start = i.saturating_sub(window);
        let end = (i + window + 1).min(flux_values.len());
        let local_mean: f32 = flux_values[start..end].iter().map(|(_, f)| f).sum::<f32>()
            / (end - start) as f32;

        let threshold = local_mean * 1.5 + 0.01;

        if flux_values[i].1 > threshold {
            let is_peak = (i == 0 || flux_values[i].1 >= flux_values[i - 1].1)
                && (i == flux_values.len() - 1 || flux_values[i].1 >= flux_values[i + 1].1);

            // Minimum gap between beats (100ms)
            let far_enough = beat_times
                .last()
                .map_or(true, |&last: &f32| flux_values[i].0 - last > 0.1);

            if is_peak && far_enough {
                beat_times.push(flux_values[i].0);
            }
        }
    }

    beat_times
}

fn estimate_tempo(beat_times: &[f32]) -> f32 {
    if beat_times.len() < 2 {
        return 0.0;
    }

    // 60-200 BPM → 0.3-1.0s
    let mut reasonable: Vec<f32> = beat_times
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|&i| (0.3..=1.0).contains(&i))
        .collect();

    if reasonable.is_empty() {
        return 0.0;
    }

    reasonable.sort_by(|a, b| a.total_cmp(b));
    60.0 / reasonable[reasonable.len() / 2]
}

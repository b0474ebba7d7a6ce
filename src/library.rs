use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Audio files to play, in name order.
///
/// `input` may be a directory (non-recursive) or a single file. Entries whose
/// extension is not in `extensions` (case-insensitive) are skipped.
pub fn enumerate_tracks(input: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut tracks = Vec::new();
    for entry in std::fs::read_dir(input)
        .with_context(|| format!("Failed to read input directory: {}", input.display()))?
    {
        let path = entry?.path();
        if path.is_file() && has_audio_extension(&path, extensions) {
            tracks.push(path);
        }
    }
    tracks.sort();
    Ok(tracks)
}

fn has_audio_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
}

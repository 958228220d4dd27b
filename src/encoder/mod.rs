//! Encoder abstraction
//!
//! The execution backend drives an `Encoder` to do the actual transcoding.
//! Encoding is a blocking call (the backend runs it on blocking threads);
//! the trait stays object-safe so backends can hold `Arc<dyn Encoder>`.

mod ffmpeg;

pub use ffmpeg::FfmpegEncoder;

use std::path::{Path, PathBuf};

use crate::core::OutputDestination;

/// One file to encode
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub source: PathBuf,
    pub output: PathBuf,
}

/// A transcoding engine
///
/// `encode` blocks until the file is done or failed. `abort_in_flight` is a
/// best-effort kill switch for whatever the encoder is currently running;
/// aborted encodes surface as errors from `encode`.
pub trait Encoder: Send + Sync {
    fn encode(&self, request: &EncodeRequest) -> Result<(), String>;

    fn abort_in_flight(&self) {}
}

/// Compute the output path for a source file under a destination policy
///
/// Output files are named after the source file stem with .mp3 extension.
pub fn output_path_for(source: &Path, destination: &OutputDestination) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");
    let file_name = format!("{}.mp3", stem);

    match destination {
        OutputDestination::NextToSource => source
            .parent()
            .map(|p| p.join(&file_name))
            .unwrap_or_else(|| PathBuf::from(&file_name)),
        OutputDestination::CollectionFolder(folder) => folder.join(&file_name),
    }
}

/// Get the path to the ffmpeg binary
///
/// Checks the AUDIOBATCH_FFMPEG environment variable first, then common
/// install locations.
pub fn get_ffmpeg_path() -> Result<PathBuf, String> {
    if let Ok(override_path) = std::env::var("AUDIOBATCH_FFMPEG") {
        let path = PathBuf::from(override_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(format!(
            "AUDIOBATCH_FFMPEG points at a missing file: {}",
            path.display()
        ));
    }

    for candidate in [
        "/usr/local/bin/ffmpeg",
        "/opt/homebrew/bin/ffmpeg",
        "/usr/bin/ffmpeg",
    ] {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Ok(path);
        }
    }

    Err("ffmpeg binary not found. Set AUDIOBATCH_FFMPEG or install ffmpeg".to_string())
}

/// Verify that ffmpeg exists and is executable
pub fn verify_ffmpeg() -> Result<PathBuf, String> {
    let path = get_ffmpeg_path()?;

    if !path.exists() {
        return Err(format!("ffmpeg not found at {:?}", path));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = std::fs::metadata(&path)
            .map_err(|e| format!("Failed to get ffmpeg metadata: {}", e))?;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(format!("ffmpeg at {:?} is not executable", path));
        }
    }

    log::debug!("ffmpeg verified at: {:?}", path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_next_to_source() {
        let out = output_path_for(
            Path::new("/music/album/track.flac"),
            &OutputDestination::NextToSource,
        );
        assert_eq!(out, PathBuf::from("/music/album/track.mp3"));
    }

    #[test]
    fn test_output_collection_folder() {
        let out = output_path_for(
            Path::new("/music/album/track.flac"),
            &OutputDestination::CollectionFolder(PathBuf::from("/converted")),
        );
        assert_eq!(out, PathBuf::from("/converted/track.mp3"));
    }

    #[test]
    fn test_output_keeps_stem_for_multi_dot_names() {
        let out = output_path_for(
            Path::new("/music/01. Intro.flac"),
            &OutputDestination::NextToSource,
        );
        assert_eq!(out, PathBuf::from("/music/01. Intro.mp3"));
    }

    #[test]
    fn test_output_mp3_source_gets_mp3_output() {
        // A non-target mp3 (e.g. mislabeled) still maps onto an .mp3 name;
        // destination policy keeps it apart from the source when needed
        let out = output_path_for(
            Path::new("/music/track.mp3"),
            &OutputDestination::CollectionFolder(PathBuf::from("/converted")),
        );
        assert_eq!(out, PathBuf::from("/converted/track.mp3"));
    }
}

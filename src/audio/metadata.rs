//! Audio metadata probing
//!
//! Used by the library scanner to decide whether a file already is the
//! target format and to attach duration/bitrate to candidates.

use std::fs::{self, File};
use std::path::Path;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Extract audio metadata: (duration, bitrate, codec)
pub fn get_audio_metadata(path: &Path) -> Result<(f64, u32, String), String> {
    let file = File::open(path).map_err(|e| format!("Failed to open file: {}", e))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension() {
        hint.with_extension(&ext.to_string_lossy());
    }

    let format_opts = FormatOptions::default();
    let metadata_opts = MetadataOptions::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &metadata_opts)
        .map_err(|e| format!("Failed to probe audio format: {}", e))?;

    let format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| "No default track found".to_string())?;

    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100) as f64;
    let n_frames = track.codec_params.n_frames.unwrap_or(0);
    let duration = n_frames as f64 / sample_rate;

    // Calculate bitrate from file size and duration
    let file_size = fs::metadata(path)
        .map_err(|e| format!("Failed to get file metadata: {}", e))?
        .len();
    let bitrate = if duration > 0.0 {
        ((file_size * 8) as f64 / duration / 1000.0) as u32
    } else {
        0
    };

    // Detect codec from Symphonia's codec type or fall back to file extension
    let codec_str = format!("{:?}", track.codec_params.codec);
    let codec = if codec_str.contains("MP3") || codec_str.contains("Mp3") {
        "mp3".to_string()
    } else if codec_str.contains("FLAC") || codec_str.contains("Flac") {
        "flac".to_string()
    } else if codec_str.contains("AAC") || codec_str.contains("Aac") || codec_str.contains("4100") {
        // CodecType(4100) is AAC
        "aac".to_string()
    } else if codec_str.contains("Vorbis") || codec_str.contains("OGG") {
        "ogg".to_string()
    } else if codec_str.contains("Opus") {
        "opus".to_string()
    } else if codec_str.contains("ALAC") || codec_str.contains("Alac") || codec_str.contains("4101")
    {
        // CodecType(4101) is ALAC
        "alac".to_string()
    } else if codec_str.contains("PCM") || codec_str.contains("Pcm") {
        // WAV or AIFF
        path.extension()
            .and_then(|e| e.to_str())
            .unwrap_or("wav")
            .to_lowercase()
    } else {
        // Fallback to file extension
        path.extension()
            .and_then(|e| e.to_str())
            .unwrap_or("unknown")
            .to_lowercase()
    };

    Ok((duration, bitrate, codec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_metadata_nonexistent_file() {
        let result = get_audio_metadata(Path::new("/nonexistent/file.mp3"));
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Failed to open"));
    }

    #[test]
    fn test_metadata_garbage_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("noise.flac");
        let mut f = File::create(&path).unwrap();
        f.write_all(b"this is not audio data").unwrap();

        // Probe should fail cleanly, not panic
        let result = get_audio_metadata(&path);
        assert!(result.is_err());
    }
}

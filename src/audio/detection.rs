use std::path::Path;

/// Check if a file is an audio file based on its extension
pub fn is_audio_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        let ext = ext.to_string_lossy().to_lowercase();
        matches!(
            ext.as_str(),
            "mp3" | "flac" | "wav" | "ogg" | "m4a" | "aac" | "aiff" | "opus" | "alac"
        )
    } else {
        false
    }
}

/// Check if a codec is already the conversion target (MP3)
pub fn is_target_codec(codec: &str) -> bool {
    let codec = codec.to_lowercase();
    codec == "mp3" || codec.contains("mpeg")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognizes_audio_formats() {
        assert!(is_audio_file(Path::new("test.mp3")));
        assert!(is_audio_file(Path::new("test.flac")));
        assert!(is_audio_file(Path::new("test.wav")));
        assert!(is_audio_file(Path::new("test.OGG")));
    }

    #[test]
    fn test_rejects_non_audio() {
        assert!(!is_audio_file(Path::new("test.txt")));
        assert!(!is_audio_file(Path::new("test")));
        assert!(!is_audio_file(Path::new("cover.jpg")));
    }

    #[test]
    fn test_target_codec() {
        assert!(is_target_codec("mp3"));
        assert!(is_target_codec("MP3"));
        assert!(is_target_codec("mpeg audio"));
        assert!(!is_target_codec("flac"));
        assert!(!is_target_codec("aac"));
    }
}

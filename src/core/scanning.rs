//! Library scanning and candidate discovery
//!
//! Walks a directory tree, finds audio files, and produces the candidate
//! list the scheduler consumes. Whether a file needs conversion is decided
//! here, from the probed codec (with an extension fallback when probing
//! fails); the scheduler itself never touches the filesystem.

use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::audio::{get_audio_metadata, is_audio_file, is_target_codec};
use crate::core::file_id::FileId;

/// A file the scanner found, with enough metadata to schedule it
#[derive(Debug, Clone)]
pub struct CandidateFile {
    /// Stable identity derived from the source path
    pub id: FileId,
    pub path: PathBuf,
    pub size: u64,
    pub duration: f64,
    /// Probed codec name (lowercase), or the extension if probing failed
    pub codec: String,
    /// False when the file already is the target format
    pub needs_conversion: bool,
}

/// Scan a directory tree and return all audio files as candidates
///
/// Files that fail the metadata probe are still listed, with their codec
/// taken from the extension and the duration estimated from the size.
/// Results are sorted by path for consistent ordering.
pub fn scan_directory(path: &Path) -> Result<Vec<CandidateFile>, String> {
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", path.display()));
    }

    let mut candidates = Vec::new();

    for entry in WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let entry_path = entry.path();
        if entry_path.is_file() && is_audio_file(entry_path) {
            match scan_file(entry_path) {
                Ok(candidate) => candidates.push(candidate),
                Err(e) => log::warn!("Skipping {}: {}", entry_path.display(), e),
            }
        }
    }

    candidates.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(candidates)
}

/// Scan a single audio file and return it as a candidate
pub fn scan_file(path: &Path) -> Result<CandidateFile, String> {
    if !path.is_file() {
        return Err(format!("Path is not a file: {}", path.display()));
    }

    if !is_audio_file(path) {
        return Err(format!("Not an audio file: {}", path.display()));
    }

    let metadata =
        fs::metadata(path).map_err(|e| format!("Failed to get file metadata: {}", e))?;

    let (duration, _bitrate, codec) = get_audio_metadata(path).unwrap_or_else(|_| {
        // Fallback: trust the extension and estimate duration from size
        // (assume 320kbps)
        let estimated_duration = (metadata.len() * 8) as f64 / (320.0 * 1000.0);
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("unknown")
            .to_lowercase();
        (estimated_duration, 320, ext)
    });

    let needs_conversion = !is_target_codec(&codec);

    Ok(CandidateFile {
        id: FileId::from_path(path),
        path: path.to_path_buf(),
        size: metadata.len(),
        duration,
        codec,
        needs_conversion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(contents).unwrap();
        path
    }

    #[test]
    fn test_scan_nonexistent_directory() {
        let result = scan_directory(Path::new("/nonexistent/path"));
        assert!(result.is_err());
    }

    #[test]
    fn test_scan_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let result = scan_directory(temp_dir.path()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_scan_ignores_non_audio_files() {
        let temp_dir = TempDir::new().unwrap();
        write_file(temp_dir.path(), "readme.txt", b"not audio");
        write_file(temp_dir.path(), "cover.jpg", b"not audio either");

        let result = scan_directory(temp_dir.path()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_scan_finds_audio_by_extension() {
        let temp_dir = TempDir::new().unwrap();
        write_file(temp_dir.path(), "a.flac", b"fake flac data");
        write_file(temp_dir.path(), "b.wav", b"fake wav data");

        let result = scan_directory(temp_dir.path()).unwrap();
        assert_eq!(result.len(), 2);
        // Sorted by path
        assert!(result[0].path.ends_with("a.flac"));
        assert!(result[1].path.ends_with("b.wav"));
    }

    #[test]
    fn test_scan_recurses_into_subdirectories() {
        let temp_dir = TempDir::new().unwrap();
        let sub = temp_dir.path().join("album");
        fs::create_dir(&sub).unwrap();
        write_file(&sub, "track.ogg", b"fake ogg");

        let result = scan_directory(temp_dir.path()).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].codec, "ogg");
    }

    #[test]
    fn test_unprobeable_flac_needs_conversion() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_file(temp_dir.path(), "track.flac", b"fake flac");

        let candidate = scan_file(&path).unwrap();
        assert_eq!(candidate.codec, "flac");
        assert!(candidate.needs_conversion);
        assert_eq!(candidate.id, FileId::from_path(&path));
    }

    #[test]
    fn test_unprobeable_mp3_does_not_need_conversion() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_file(temp_dir.path(), "track.mp3", b"fake mp3");

        let candidate = scan_file(&path).unwrap();
        assert_eq!(candidate.codec, "mp3");
        assert!(!candidate.needs_conversion);
    }

    #[test]
    fn test_scan_file_rejects_directory() {
        let temp_dir = TempDir::new().unwrap();
        let result = scan_file(temp_dir.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_scan_file_rejects_non_audio() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_file(temp_dir.path(), "notes.txt", b"text");
        let result = scan_file(&path);
        assert!(result.is_err());
    }

    #[test]
    fn test_candidate_size_matches_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_file(temp_dir.path(), "track.wav", b"0123456789");

        let candidate = scan_file(&path).unwrap();
        assert_eq!(candidate.size, 10);
    }
}

// Audio module - format detection and metadata probing

pub mod detection;
pub mod metadata;

pub use detection::{is_audio_file, is_target_codec};
pub use metadata::get_audio_metadata;

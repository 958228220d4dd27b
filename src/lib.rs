//! audiobatch - bulk audio conversion engine
//!
//! Converts audio libraries to a common format (MP3) in bulk. The crate is
//! the scheduling core of a converter application: it filters candidate
//! files, submits them to a bounded-concurrency execution backend,
//! deduplicates in-flight work, reconciles asynchronously reported job
//! outcomes into a coalesced snapshot, and supports mid-flight cancellation.
//!
//! The main entry point is [`scheduler::ConversionScheduler`]:
//!
//! ```no_run
//! use std::sync::Arc;
//! use audiobatch::core::{scan_directory, ConverterSettings};
//! use audiobatch::encoder::FfmpegEncoder;
//! use audiobatch::exec::LocalExecutionService;
//! use audiobatch::scheduler::{ConversionScheduler, SchedulerConfig};
//!
//! # async fn run() -> Result<(), String> {
//! let settings = ConverterSettings::load();
//! let encoder = Arc::new(FfmpegEncoder::discover(settings.bitrate)?);
//! let service = Arc::new(LocalExecutionService::new(encoder));
//! let scheduler = ConversionScheduler::new(service, SchedulerConfig::default());
//!
//! let candidates = scan_directory(std::path::Path::new("/music"))?;
//! scheduler.convert_batch(&candidates, &settings.policy()).ok();
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod core;
pub mod encoder;
pub mod exec;
pub mod logging;
pub mod scheduler;

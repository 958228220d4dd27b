//! Conversion policy types
//!
//! The policy describes what should happen to a file once it is converted:
//! where the output lands and whether the source is kept. It is passed in at
//! submission time and attached to each job; the scheduler itself never
//! stores a policy.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where converted files are written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputDestination {
    /// Write the output next to the source file
    #[default]
    NextToSource,
    /// Write all outputs into a single collection folder
    CollectionFolder(PathBuf),
}

/// Per-submission conversion policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConversionPolicy {
    /// Delete the source file after a successful conversion
    #[serde(default)]
    pub delete_original: bool,
    /// Destination for the converted file
    #[serde(default)]
    pub destination: OutputDestination,
}

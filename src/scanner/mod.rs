//! Scan session
//!
//! [`ScanController`] owns everything one scan mutates: the rotation cursor
//! (inside its strategy), the output sink, the line cursor and the found
//! records. Sessions share nothing, so several may run side by side.

pub mod controller;
pub mod events;

use std::path::PathBuf;
use thiserror::Error;

pub use controller::ScanController;
pub use events::{
    progress_channel, FoundKey, FoundRecord, ProgressCallback, ProgressEvent, ScanState,
    ScanSummary, StepOutcome, TIMESTAMP_FORMAT,
};

/// Errors that stop a scan before the first line
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("input file not found: {0}")]
    InputMissing(PathBuf),

    #[error("cannot read input file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("scan already started")]
    AlreadyStarted,
}

impl ScanError {
    fn from_io(path: PathBuf, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            ScanError::InputMissing(path)
        } else {
            ScanError::Unreadable { path, source: err }
        }
    }
}

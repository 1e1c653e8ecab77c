//! CSV result sink
//!
//! Appends one row per confirmed balance. Each physical file carries the
//! header exactly once; when a file reaches the size limit the sink moves on
//! to `<stem>_NN.<ext>` next to the template. If the configured location is
//! unusable, rows go to `found_balances_<unix-ts>.txt` in the fallback
//! directory instead.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::common::logging::log_output_rollover;
use crate::scanner::FoundRecord;
use crate::units::format_btc;

/// First line of every output file
pub const CSV_HEADER: &str = "Private Key,Address,Balance (BTC),Timestamp,API Used";

/// Sink errors
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("output unavailable: {0}")]
    Unavailable(String),

    #[error("sink used before initialize")]
    NotInitialized,
}

/// Size-bounded, append-only CSV writer for one scan session
#[derive(Debug)]
pub struct ResultSink {
    template: PathBuf,
    max_bytes: u64,
    fallback_dir: PathBuf,
    current: Option<PathBuf>,
    next_suffix: u32,
}

impl ResultSink {
    pub fn new(template: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            template: template.into(),
            max_bytes,
            fallback_dir: PathBuf::from("."),
            current: None,
            next_suffix: 1,
        }
    }

    /// Directory for the fallback file (defaults to the working directory)
    pub fn with_fallback_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fallback_dir = dir.into();
        self
    }

    /// File rows are currently appended to
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    /// Pick the output file and make sure it starts with the header
    ///
    /// Returns the path in use, which may be a rollover or fallback file.
    pub fn initialize(&mut self) -> Result<PathBuf, SinkError> {
        let start = self.current.clone().unwrap_or_else(|| self.template.clone());

        let path = match self.prepare(&start) {
            Ok(path) => path,
            Err(e) => {
                warn!(
                    path = %self.template.display(),
                    error = %e,
                    "output file unusable, switching to fallback"
                );
                self.fall_back()?
            }
        };

        info!(path = %path.display(), "output file ready");
        self.current = Some(path.clone());
        Ok(path)
    }

    /// Append one record, rolling over first if the current file is full
    pub fn append(&mut self, record: &FoundRecord) -> Result<(), SinkError> {
        let current = self.current.clone().ok_or(SinkError::NotInitialized)?;
        let row = csv_row(record);

        let path = match self.write_row(&current, &row) {
            Ok(path) => path,
            Err(e) => {
                warn!(
                    path = %current.display(),
                    error = %e,
                    "append failed, switching to fallback"
                );
                let fallback = self.fall_back()?;
                self.write_row(&fallback, &row)
                    .map_err(|e| SinkError::Unavailable(format!("{}: {}", fallback.display(), e)))?
            }
        };

        self.current = Some(path);
        Ok(())
    }

    fn prepare(&mut self, start: &Path) -> io::Result<PathBuf> {
        if let Some(parent) = start.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let path = self.first_with_room(start);
        open_with_header(&path)?;
        Ok(path)
    }

    fn write_row(&mut self, current: &Path, row: &str) -> io::Result<PathBuf> {
        let path = self.first_with_room(current);
        let mut file = open_with_header(&path)?;
        writeln!(file, "{}", row)?;
        Ok(path)
    }

    /// Walk the rollover sequence until a file below the limit (or a new one)
    fn first_with_room(&mut self, start: &Path) -> PathBuf {
        let mut candidate = start.to_path_buf();

        while let Some(size) = file_size(&candidate).filter(|s| *s >= self.max_bytes) {
            let next = rollover_path(&self.template, self.next_suffix);
            self.next_suffix += 1;
            log_output_rollover(
                &candidate.display().to_string(),
                &next.display().to_string(),
                size,
                self.max_bytes,
            );
            candidate = next;
        }

        candidate
    }

    fn fall_back(&mut self) -> Result<PathBuf, SinkError> {
        let path = self.fallback_dir.join(format!(
            "found_balances_{}.txt",
            chrono::Utc::now().timestamp()
        ));

        open_with_header(&path)
            .map_err(|e| SinkError::Unavailable(format!("{}: {}", path.display(), e)))?;

        // Later rollovers number from the fallback file
        self.template = path.clone();
        self.next_suffix = 1;
        self.current = Some(path.clone());
        Ok(path)
    }
}

/// `<stem>_NN.<ext>` beside the template
pub fn rollover_path(template: &Path, index: u32) -> PathBuf {
    let stem = template
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name = match template.extension() {
        Some(ext) => format!("{}_{:02}.{}", stem, index, ext.to_string_lossy()),
        None => format!("{}_{:02}", stem, index),
    };

    template.with_file_name(name)
}

fn file_size(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().map(|m| m.len())
}

fn open_with_header(path: &Path) -> io::Result<File> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if file.metadata()?.len() == 0 {
        writeln!(file, "{}", CSV_HEADER)?;
    }
    Ok(file)
}

fn csv_row(record: &FoundRecord) -> String {
    format!(
        "{},{},{},{},{}",
        record.private_key,
        record.address,
        format_btc(record.balance),
        record.timestamp,
        record.provider_name
    )
}

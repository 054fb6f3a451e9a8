// src/recording/rotating_sink.rs
//! Rotating directory sink
//!
//! Manages a directory of append-only `.jsonl` files under byte-count
//! rotation and retention pruning. File names are UTC timestamps with
//! microsecond precision, so lexical order equals creation order. At most
//! one file is open for append at a time; pruning runs only when rotation
//! is about to occur and never touches the open file.

use crate::recording::record::CaptureRecord;
use crate::recording::sink::Sink;
use crate::utils::errors::Result;
use chrono::Utc;
use parking_lot::Mutex;
use serde::Deserialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, info};

const LOG_EXTENSION: &str = "jsonl";

/// Rotating sink configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RotatingSinkConfig {
    /// Directory holding the log files; created (with intermediate
    /// segments) at construction.
    pub directory: PathBuf,

    /// Rotation threshold for a single file. The size check runs before a
    /// write only, so one record may push a file past the limit.
    pub max_bytes_per_file: u64,

    /// Retention ceiling for the whole directory; zero or less disables
    /// pruning and files accumulate unbounded.
    pub max_bytes_per_dir: i64,
}

impl Default for RotatingSinkConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("capture-logs"),
            max_bytes_per_file: 10 * 1024 * 1024,
            max_bytes_per_dir: 100 * 1024 * 1024,
        }
    }
}

/// The file currently open for append.
struct OpenFile {
    writer: BufWriter<File>,
    bytes: u64,
}

/// Size-bounded rotating directory sink.
pub struct RotatingSink {
    config: RotatingSinkConfig,
    current: Mutex<Option<OpenFile>>,
}

impl RotatingSink {
    /// Create the sink, creating the log directory up front.
    pub fn new(config: RotatingSinkConfig) -> Result<Self> {
        fs::create_dir_all(&config.directory)?;
        info!(
            "Rotating sink initialized at {:?} (file limit {} bytes, dir limit {} bytes)",
            config.directory, config.max_bytes_per_file, config.max_bytes_per_dir
        );
        Ok(Self {
            config,
            current: Mutex::new(None),
        })
    }

    fn open_new_file(&self) -> Result<OpenFile> {
        let name = format!(
            "{}.{}",
            Utc::now().format("%Y-%m-%dT%H-%M-%S%.6fZ"),
            LOG_EXTENSION
        );
        let path = self.config.directory.join(name);
        let file = OpenOptions::new().append(true).create(true).open(&path)?;
        debug!("Opened log file {:?}", path);
        Ok(OpenFile {
            writer: BufWriter::new(file),
            bytes: 0,
        })
    }

    /// Delete oldest files until the directory fits under the ceiling.
    ///
    /// Runs only at rotation; the previous descriptor is already closed at
    /// that point, so every enumerated file is eligible.
    fn prune(&self) -> Result<()> {
        if self.config.max_bytes_per_dir <= 0 {
            return Ok(());
        }
        let ceiling = self.config.max_bytes_per_dir as u64;

        let mut files: Vec<(PathBuf, u64)> = Vec::new();
        for entry in fs::read_dir(&self.config.directory)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(LOG_EXTENSION) {
                continue;
            }
            let size = entry.metadata()?.len();
            files.push((path, size));
        }
        // Name order equals creation order.
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let mut total: u64 = files.iter().map(|(_, size)| size).sum();
        for (path, size) in files {
            if total <= ceiling {
                break;
            }
            fs::remove_file(&path)?;
            debug!("Pruned log file {:?} ({} bytes)", path, size);
            total -= size;
        }
        Ok(())
    }
}

impl Sink for RotatingSink {
    fn write(&self, record: &CaptureRecord) -> Result<()> {
        let line = record.to_line()?;
        let mut current = self.current.lock();

        // Rotate before the write: close the old descriptor, prune, open
        // a fresh file.
        if let Some(open) = current.as_mut() {
            if open.bytes >= self.config.max_bytes_per_file {
                if let Some(mut old) = current.take() {
                    old.writer.flush()?;
                }
                self.prune()?;
            }
        }
        if current.is_none() {
            *current = Some(self.open_new_file()?);
        }

        // The slot was just filled above.
        if let Some(open) = current.as_mut() {
            writeln!(open.writer, "{}", line)?;
            open.writer.flush()?;
            open.bytes += line.len() as u64 + 1;
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if let Some(mut open) = self.current.lock().take() {
            open.writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for RotatingSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

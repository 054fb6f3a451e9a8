// src/recording/sink.rs
//! Sink capability and basic implementations
//!
//! A sink emits capture records, one JSON line each:
//!
//! - **StreamSink**: direct passthrough to any writer
//! - **FileSink**: append-only single file
//! - **MemorySink**: in-memory buffer for tests and assertions
//! - **FanoutSink**: broadcast to several sinks
//!
//! `close` is idempotent on every implementation.

use crate::recording::record::CaptureRecord;
use crate::utils::errors::{CaptureError, Result};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Capability that durably or transiently emits capture records.
pub trait Sink: Send + Sync {
    /// Emit one record. Transient faults a sink is documented to absorb
    /// (e.g. pipe backpressure) must not surface here.
    fn write(&self, record: &CaptureRecord) -> Result<()>;

    /// Release held resources. Calling again is a no-op.
    fn close(&self) -> Result<()>;
}

/// Line-stream sink: one JSON line per record, flushed on every write.
pub struct StreamSink<W: Write + Send> {
    writer: Mutex<Option<W>>,
}

impl<W: Write + Send> StreamSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(Some(writer)),
        }
    }
}

impl<W: Write + Send> Sink for StreamSink<W> {
    fn write(&self, record: &CaptureRecord) -> Result<()> {
        let line = record.to_line()?;
        let mut guard = self.writer.lock();
        let writer = guard
            .as_mut()
            .ok_or_else(|| CaptureError::SinkFailed("stream sink is closed".to_string()))?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if let Some(mut writer) = self.writer.lock().take() {
            writer.flush()?;
        }
        Ok(())
    }
}

/// Append-only single-file sink.
pub struct FileSink {
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl FileSink {
    /// Open (or create) the file for append, creating parent directories.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().append(true).create(true).open(&path)?;
        debug!("File sink opened at {:?}", path);
        Ok(Self {
            path,
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for FileSink {
    fn write(&self, record: &CaptureRecord) -> Result<()> {
        let line = record.to_line()?;
        let mut guard = self.writer.lock();
        let writer = guard
            .as_mut()
            .ok_or_else(|| CaptureError::SinkFailed("file sink is closed".to_string()))?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if let Some(mut writer) = self.writer.lock().take() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// In-memory sink for tests and programmatic assertions.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<CaptureRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records written so far.
    pub fn records(&self) -> Vec<CaptureRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Sink for MemorySink {
    fn write(&self, record: &CaptureRecord) -> Result<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Broadcast one record to every inner sink, in order.
///
/// The first write error propagates; later sinks in the list are not
/// attempted for that record. `close` attempts every sink and reports the
/// first failure afterwards.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn Sink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self { sinks }
    }
}

impl Sink for FanoutSink {
    fn write(&self, record: &CaptureRecord) -> Result<()> {
        for sink in &self.sinks {
            sink.write(record)?;
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.close() {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// src/recording/pipe_sink.rs
//! Non-blocking named-pipe sink
//!
//! Best-effort delivery to an external reader attached to a FIFO. The pipe
//! is opened lazily and non-blocking on first write; with no reader
//! attached, records are silently dropped. A reader disconnect mid-write
//! closes the descriptor and drops that record; the next write reopens.
//! Any other I/O condition propagates to the caller.

use crate::recording::record::CaptureRecord;
use crate::recording::sink::Sink;
use crate::utils::errors::Result;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Best-effort sink writing to a named pipe.
pub struct PipeSink {
    path: PathBuf,
    pipe: Mutex<Option<File>>,
}

impl PipeSink {
    /// Create the sink; the pipe is not opened until the first write.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            pipe: Mutex::new(None),
        }
    }

    /// Path of the named pipe.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the pipe write-only and non-blocking.
    ///
    /// `ENXIO` means no reader is attached yet; that is not an error.
    fn try_open(&self) -> Result<Option<File>> {
        match OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&self.path)
        {
            Ok(file) => {
                debug!("Pipe reader attached at {:?}", self.path);
                Ok(Some(file))
            }
            Err(e) if e.raw_os_error() == Some(libc::ENXIO) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Sink for PipeSink {
    fn write(&self, record: &CaptureRecord) -> Result<()> {
        let line = format!("{}\n", record.to_line()?);
        let mut guard = self.pipe.lock();

        if guard.is_none() {
            *guard = self.try_open()?;
        }
        let Some(pipe) = guard.as_mut() else {
            // No reader attached; drop the record.
            return Ok(());
        };

        let mut remaining = line.as_bytes();
        while !remaining.is_empty() {
            match pipe.write(remaining) {
                Ok(written) => remaining = &remaining[written..],
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    // Reader still draining its buffer; retry until the
                    // full line is flushed.
                    std::thread::yield_now();
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    debug!("Pipe reader disconnected, dropping record");
                    *guard = None;
                    return Ok(());
                }
                Err(e) => {
                    *guard = None;
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.pipe.lock().take();
        Ok(())
    }
}

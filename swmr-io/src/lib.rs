//! Positioned I/O over the shadow metadata file.
//!
//! This layer is deliberately thin: it knows nothing about headers, indices,
//! or ticks. It hands the engine in `swmr-core` a file sized in whole pages,
//! lets it write and read byte ranges at arbitrary offsets, and unlinks the
//! file on session close. No `fsync` is issued anywhere in this crate; the
//! protocol's correctness rests on the reader retrying a torn read, not on
//! durability of any single write (see the coordination engine's docs).

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

/// Filesystem operation that failed, kept alongside the path for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    Create,
    Open,
    Read,
    Write,
    Truncate,
    Unlink,
}

impl core::fmt::Display for IoOp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            IoOp::Create => "create",
            IoOp::Open => "open",
            IoOp::Read => "read",
            IoOp::Write => "write",
            IoOp::Truncate => "truncate",
            IoOp::Unlink => "unlink",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("shadow file {op} failed at {path}: {source}")]
pub struct IoError {
    pub op: IoOp,
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl IoError {
    fn new(op: IoOp, path: &Path, source: io::Error) -> Self {
        IoError {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// An open shadow file, sized in whole pages, ready for positioned I/O.
pub struct ShadowFile {
    file: File,
    path: PathBuf,
}

impl ShadowFile {
    /// Create the shadow file at `path`, truncating any previous contents, and size it to
    /// exactly `bytes`. Used by the writer session at open.
    pub fn create_and_size(path: &Path, bytes: u64) -> Result<Self, IoError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| IoError::new(IoOp::Create, path, e))?;

        file.set_len(bytes)
            .map_err(|e| IoError::new(IoOp::Truncate, path, e))?;

        #[cfg(feature = "tracing")]
        tracing::trace!(path = %path.display(), bytes, "created shadow file");

        Ok(ShadowFile {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Open an existing shadow file read-only. Used by reader sessions.
    pub fn open_read(path: &Path) -> Result<Self, IoError> {
        let file = OpenOptions::new()
            .read(true)
            .open(path)
            .map_err(|e| IoError::new(IoOp::Open, path, e))?;

        Ok(ShadowFile {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn write_at(&self, offset: u64, bytes: &[u8]) -> Result<(), IoError> {
        self.file
            .write_all_at(bytes, offset)
            .map_err(|e| IoError::new(IoOp::Write, &self.path, e))
    }

    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), IoError> {
        self.file
            .read_exact_at(buf, offset)
            .map_err(|e| IoError::new(IoOp::Read, &self.path, e))
    }

    /// Grow the shadow file to at least `bytes` long. The writer calls this before any write that
    /// may land past the space reserved at open — a page allocation beyond the initial
    /// reservation, or a republished index after `ShadowIndex::enlarge` relocates it.
    pub fn ensure_size(&self, bytes: u64) -> Result<(), IoError> {
        let len = self
            .file
            .metadata()
            .map_err(|e| IoError::new(IoOp::Truncate, &self.path, e))?
            .len();
        if len < bytes {
            self.file
                .set_len(bytes)
                .map_err(|e| IoError::new(IoOp::Truncate, &self.path, e))?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close and unlink the shadow file. Only meaningful for a writer: it is the writer's
    /// session that owns the file's lifetime on disk.
    pub fn close_and_unlink(self) -> Result<(), IoError> {
        let path = self.path.clone();
        drop(self.file);
        std::fs::remove_file(&path).map_err(|e| IoError::new(IoOp::Unlink, &path, e))?;

        #[cfg(feature = "tracing")]
        tracing::trace!(path = %path.display(), "unlinked shadow file");

        Ok(())
    }
}

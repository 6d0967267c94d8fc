//! The engine's single layered error type.
//!
//! Every category from the coordination contract gets its own variant with enough context
//! (path, offset, expected-vs-found tick or checksum) to diagnose without re-deriving it from
//! logs. `Decode` errors are the one kind callers are expected to recover from themselves (a
//! reader retries); everything else is fatal to the current operation.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SwmrError {
    #[error(transparent)]
    Io(#[from] swmr_io::IoError),

    #[error("out of memory growing the shadow index to {requested} entries")]
    OutOfMemory { requested: u32 },

    #[error("shadow file {path} has no room left for a {requested}-byte allocation")]
    ShadowFull { path: PathBuf, requested: u64 },

    #[error("bad magic tag at offset {offset}: expected {expected:?}, found {found:?}")]
    DecodeMagic {
        offset: u64,
        expected: [u8; 4],
        found: [u8; 4],
    },

    #[error("truncated block at offset {offset}: needed {needed} bytes, file had {available}")]
    DecodeTruncated {
        offset: u64,
        needed: usize,
        available: usize,
    },

    #[error("checksum mismatch at offset {offset}: expected {expected:#010x}, computed {computed:#010x}")]
    DecodeChecksum {
        offset: u64,
        expected: u32,
        computed: u32,
    },

    #[error(
        "reader gave up after {attempts} attempts to read a self-consistent header/index pair"
    )]
    DecodeRetriesExhausted { attempts: u32 },

    #[error("index entries out of order: page {prev} is followed by page {next}")]
    InvariantSortOrder { prev: u32, next: u32 },

    #[error("duplicate index entry for data-file page {page}")]
    InvariantDuplicate { page: u32 },

    #[error(
        "may_publish({page}) returned {until}, outside [{current_tick}, {current_tick} + {max_lag}]"
    )]
    InvariantDelayOutOfRange {
        page: u32,
        until: u64,
        current_tick: u64,
        max_lag: u32,
    },

    #[error("monotonic clock unavailable")]
    Clock,

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: &'static str },
}

pub type Result<T> = std::result::Result<T, SwmrError>;

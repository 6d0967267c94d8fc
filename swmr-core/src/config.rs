use crate::error::{Result, SwmrError};
use std::path::PathBuf;

/// Configuration consumed at session open, mirroring the on-disk contract in the shadow-file
/// layout doc: page size, reservation, tick cadence, and reader lag tolerance.
#[derive(Debug, Clone)]
pub struct SwmrConfig {
    pub md_file_path: PathBuf,
    pub writer: bool,
    /// Page size `P`, in bytes. Must be a power of two and large enough for the header.
    pub page_size: u32,
    /// Initial shadow-file size, in pages. Must be `>= 2` (header page + at least one index
    /// page).
    pub md_pages_reserved: u32,
    /// Tick length, in tenths of a second.
    pub tick_len: u32,
    /// Maximum ticks a reader may lag before its referenced shadow ranges may be reclaimed.
    pub max_lag: u32,
    /// Reserved. Semantics for `true` are unspecified; rejected at open.
    pub flush_raw_data: bool,
}

impl SwmrConfig {
    pub fn validate(&self) -> Result<()> {
        if self.flush_raw_data {
            return Err(SwmrError::InvalidConfig {
                reason: "flush_raw_data is reserved and must be false",
            });
        }
        if self.md_pages_reserved < 2 {
            return Err(SwmrError::InvalidConfig {
                reason: "md_pages_reserved must be at least 2 (header page + index page)",
            });
        }
        if !self.page_size.is_power_of_two() {
            return Err(SwmrError::InvalidConfig {
                reason: "page_size must be a power of two",
            });
        }
        if (self.page_size as usize) < crate::codec::Header::ENCODED_LEN {
            return Err(SwmrError::InvalidConfig {
                reason: "page_size is too small to hold the header",
            });
        }
        if self.tick_len == 0 {
            return Err(SwmrError::InvalidConfig {
                reason: "tick_len must be nonzero",
            });
        }
        Ok(())
    }

    pub fn shadow_bytes_reserved(&self) -> u64 {
        u64::from(self.md_pages_reserved) * u64::from(self.page_size)
    }
}

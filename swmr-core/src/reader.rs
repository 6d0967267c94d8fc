//! Polls the shadow header, diffs the old and new index against each other, and drives
//! page-buffer/cache invalidation for whatever changed.

use crate::codec::{Header, IndexBlock, IndexEntry};
use crate::collab::{MetadataCache, PageBuffer};
use crate::config::SwmrConfig;
use crate::error::{Result, SwmrError};

use swmr_io::ShadowFile;

const HEADER_OFFSET: u64 = 0;
const MAX_RETRIES: u32 = 16;

/// The three ways a data-file page can differ between two successive published indices.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Diff {
    /// Present in the new index but not the old. No action needed — the reader faults these in
    /// lazily.
    pub added: Vec<u32>,
    /// Present in both, but the published location moved.
    pub changed: Vec<u32>,
    /// Present in the old index but not the new.
    pub removed: Vec<u32>,
}

/// Symmetric difference between two sorted, key-unique index entry arrays, by a linear merge.
pub fn diff_indices(old: &[IndexEntry], new: &[IndexEntry]) -> Diff {
    let mut diff = Diff::default();
    let (mut i, mut j) = (0, 0);

    while i < old.len() && j < new.len() {
        let (o, n) = (&old[i], &new[j]);
        match o.hdf5_page_offset.cmp(&n.hdf5_page_offset) {
            std::cmp::Ordering::Equal => {
                if o.md_file_page_offset != n.md_file_page_offset {
                    diff.changed.push(o.hdf5_page_offset);
                }
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => {
                diff.removed.push(o.hdf5_page_offset);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                diff.added.push(n.hdf5_page_offset);
                j += 1;
            }
        }
    }
    diff.removed.extend(old[i..].iter().map(|e| e.hdf5_page_offset));
    diff.added.extend(new[j..].iter().map(|e| e.hdf5_page_offset));
    diff
}

/// A reader's session over one shadow file. Keeps exactly two index buffers and alternates
/// between them rather than allocating a fresh one every tick.
pub struct ReaderSession {
    config: SwmrConfig,
    shadow: ShadowFile,
    tick: u64,
    current: Vec<IndexEntry>,
    previous: Vec<IndexEntry>,
}

impl ReaderSession {
    pub fn open(config: SwmrConfig) -> Result<Self> {
        config.validate()?;
        let shadow = ShadowFile::open_read(&config.md_file_path)?;

        let header = read_header(&shadow)?;
        let entries = read_index(&shadow, &header)?.entries;

        #[cfg(feature = "tracing")]
        tracing::debug!(tick = header.tick, entries = entries.len(), "opened reader session");

        Ok(ReaderSession {
            config,
            shadow,
            tick: header.tick,
            current: entries,
            previous: Vec::new(),
        })
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn config(&self) -> &SwmrConfig {
        &self.config
    }

    pub fn current_index(&self) -> &[IndexEntry] {
        &self.current
    }

    /// Run one reader end-of-tick. Returns `None` if the tick was unchanged (no-op, idempotent —
    /// no page-buffer or cache interaction occurs), or `Some(diff)` describing what changed.
    pub fn end_of_tick(
        &mut self,
        page_buffer: &mut dyn PageBuffer,
        metadata_cache: &mut dyn MetadataCache,
    ) -> Result<Option<Diff>> {
        let mut attempts = 0;
        let (header, new_entries) = loop {
            attempts += 1;
            if attempts > MAX_RETRIES {
                return Err(SwmrError::DecodeRetriesExhausted { attempts });
            }

            let header = read_header(&self.shadow)?;
            if header.tick == self.tick {
                return Ok(None);
            }

            match read_index(&self.shadow, &header) {
                Ok(block) if block.tick == header.tick => break (header, block.entries),
                // The writer raced ahead mid-publish; retry from the header read.
                Ok(_) | Err(SwmrError::DecodeChecksum { .. }) | Err(SwmrError::DecodeMagic { .. }) => {
                    continue
                }
                Err(other) => return Err(other),
            }
        };

        // Ping-pong: what was "current" becomes "previous" for this round's diff.
        let diff = diff_indices(&self.previous_slot_becomes(&new_entries), &new_entries);

        for &page in diff.changed.iter().chain(diff.removed.iter()) {
            page_buffer.evict_page(page);
        }
        for &page in diff.changed.iter().chain(diff.removed.iter()) {
            metadata_cache.evict_or_refresh(page);
        }

        self.tick = header.tick;

        #[cfg(feature = "tracing")]
        tracing::trace!(
            tick = self.tick,
            added = diff.added.len(),
            changed = diff.changed.len(),
            removed = diff.removed.len(),
            "reader end-of-tick"
        );

        Ok(Some(diff))
    }

    /// Swaps the ping-pong buffers, returning the array the diff should treat as "old".
    fn previous_slot_becomes(&mut self, new_entries: &[IndexEntry]) -> Vec<IndexEntry> {
        std::mem::swap(&mut self.previous, &mut self.current);
        self.current = new_entries.to_vec();
        self.previous.clone()
    }
}

/// Read the header, re-reading until two successive reads agree (invariant 1) or the retry
/// budget is exhausted.
fn read_header(shadow: &ShadowFile) -> Result<Header> {
    let mut buf = [0u8; Header::ENCODED_LEN];
    let mut last: Option<Header> = None;

    for _ in 0..MAX_RETRIES {
        shadow.read_at(HEADER_OFFSET, &mut buf)?;
        let header = Header::decode(&buf, HEADER_OFFSET)?;
        if last == Some(header) {
            return Ok(header);
        }
        last = Some(header);
    }

    Err(SwmrError::DecodeRetriesExhausted {
        attempts: MAX_RETRIES,
    })
}

fn read_index(shadow: &ShadowFile, header: &Header) -> Result<IndexBlock> {
    let mut buf = vec![0u8; header.index_len as usize];
    shadow.read_at(header.index_offset, &mut buf)?;
    IndexBlock::decode(&buf, header.index_offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(page: u32, loc: u32) -> IndexEntry {
        IndexEntry {
            hdf5_page_offset: page,
            md_file_page_offset: loc,
            length: 4096,
            chksum: 0,
        }
    }

    #[test]
    fn diff_detects_added_changed_removed() {
        let old = vec![entry(3, 1)];
        let new = vec![entry(3, 2), entry(9, 5)];

        let diff = diff_indices(&old, &new);
        assert_eq!(diff.changed, vec![3]);
        assert_eq!(diff.added, vec![9]);
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn diff_detects_removed_page() {
        let old = vec![entry(3, 1), entry(4, 1)];
        let new = vec![entry(4, 1)];

        let diff = diff_indices(&old, &new);
        assert_eq!(diff.removed, vec![3]);
        assert!(diff.changed.is_empty());
        assert!(diff.added.is_empty());
    }

    #[test]
    fn diff_of_identical_indices_is_empty() {
        let a = vec![entry(1, 1), entry(2, 2)];
        let diff = diff_indices(&a, &a);
        assert_eq!(diff, Diff::default());
    }

    #[test]
    fn open_reads_writer_bootstrap_state() {
        use crate::writer::WriterSession;

        let dir = tempfile::tempdir().unwrap();
        let cfg = SwmrConfig {
            md_file_path: dir.path().join("shadow.bin"),
            writer: true,
            page_size: 4096,
            md_pages_reserved: 4,
            tick_len: 1,
            max_lag: 5,
            flush_raw_data: false,
        };
        let writer_cfg = cfg.clone();
        let _writer = WriterSession::open(writer_cfg).unwrap();

        let reader_cfg = SwmrConfig {
            writer: false,
            ..cfg
        };
        let reader = ReaderSession::open(reader_cfg).unwrap();
        assert_eq!(reader.tick(), 1);
        assert!(reader.current_index().is_empty());
    }
}

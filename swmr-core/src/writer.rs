//! Orchestrates a writer's end-of-tick: cache flush, index update, shadow write, reclamation,
//! tick advance.

use std::time::{Duration, Instant};

use crate::codec::{self, Header};
use crate::collab::{MetadataCache, PageBuffer};
use crate::config::SwmrConfig;
use crate::defree::DeferredFreeQueue;
use crate::delay::{self, UntilTick};
use crate::error::{Result, SwmrError};
use crate::index::{ShadowAllocator, ShadowIndex};

use swmr_io::ShadowFile;

const HEADER_OFFSET: u64 = 0;

/// A writer's session over one shadow file. Owns the in-memory index mirror and the
/// deferred-free queue; everything else (page buffer, metadata cache, shadow free-space
/// manager) is an external collaborator passed in per call.
pub struct WriterSession {
    config: SwmrConfig,
    shadow: ShadowFile,
    /// `None` until the first end-of-tick (tick 1), per the bootstrap note: the on-disk empty
    /// index is written at open, but the in-memory mirror is allocated lazily.
    index: Option<ShadowIndex>,
    defree: DeferredFreeQueue,
    tick: u64,
}

impl WriterSession {
    /// Open a fresh writer session: creates the shadow file sized `md_pages_reserved` pages and
    /// publishes an empty header+index at tick 1.
    pub fn open(config: SwmrConfig) -> Result<Self> {
        config.validate()?;

        let shadow = ShadowFile::create_and_size(&config.md_file_path, config.shadow_bytes_reserved())?;

        let index_offset = u64::from(config.page_size);
        let empty_index = crate::codec::IndexBlock {
            tick: 1,
            entries: vec![],
        };
        let encoded_index = empty_index.encode();
        shadow.write_at(index_offset, &encoded_index)?;

        let header = Header {
            page_size: config.page_size,
            tick: 1,
            index_offset,
            index_len: encoded_index.len() as u64,
        };
        shadow.write_at(HEADER_OFFSET, &header.encode())?;

        #[cfg(feature = "tracing")]
        tracing::debug!(path = %config.md_file_path.display(), "opened writer session at tick 1");

        Ok(WriterSession {
            config,
            shadow,
            index: None,
            defree: DeferredFreeQueue::new(),
            tick: 1,
        })
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn config(&self) -> &SwmrConfig {
        &self.config
    }

    /// Delay predicate for the page buffer to consult before it writes a dirty page through.
    pub fn may_publish(&self, page: u32) -> Result<UntilTick> {
        match &self.index {
            None => Ok(self.tick + u64::from(self.config.max_lag)),
            Some(index) => delay::may_publish(index, page, self.tick, self.config.max_lag),
        }
    }

    fn ensure_index_allocated(&mut self) {
        if self.index.is_none() {
            let capacity = (self.config.page_size / crate::codec::IndexEntry::ENCODED_LEN as u32).max(1);
            self.index = Some(ShadowIndex::new(
                capacity,
                u64::from(self.config.page_size),
                self.config.page_size,
            ));
        }
    }

    /// Run one full end-of-tick: flush caches, drain the page buffer's tick list into the index,
    /// publish images/index/header in that order, reclaim expired deferred frees, release due
    /// delayed writes, and advance the tick.
    pub fn end_of_tick(
        &mut self,
        page_buffer: &mut dyn PageBuffer,
        metadata_cache: &mut dyn MetadataCache,
        allocator: &mut dyn ShadowAllocator,
    ) -> Result<()> {
        // Steps 1-2: flush resident caches, then the metadata cache so anything it dirties in
        // turn lands in the page buffer's tick list.
        page_buffer.flush_resident_caches()?;
        metadata_cache.flush()?;

        // Step 3: lazily allocate the in-memory mirror on tick 1.
        self.ensure_index_allocated();
        let index = self.index.as_mut().expect("just allocated above");

        // Steps 4-6: patch the index and publish each upserted image.
        let dirty = page_buffer.take_tick_list();
        for page in dirty {
            let is_new = index.lookup(page.hdf5_page_offset).is_none();
            if is_new && index.needs_enlarge() {
                index.enlarge(allocator, &mut self.defree, self.tick)?;
            }

            let aligned_len = page_aligned(page.image.len() as u64, self.config.page_size);
            let byte_offset = allocator.alloc(aligned_len)?;
            let chksum = codec::checksum(page.image);

            self.shadow.ensure_size(byte_offset + aligned_len)?;
            self.shadow.write_at(byte_offset, page.image)?;

            let md_file_page_offset = u32::try_from(byte_offset / u64::from(self.config.page_size))
                .map_err(|_| SwmrError::ShadowFull {
                    path: self.shadow.path().to_path_buf(),
                    requested: aligned_len,
                })?;

            index.upsert(
                page.hdf5_page_offset,
                md_file_page_offset,
                page.image.len() as u32,
                chksum,
                page.delayed_flush,
                &mut self.defree,
                self.tick,
            )?;
        }

        // Step 5 (validate, in case an implementation detail above slipped): invariant 2 must
        // hold before we write the header.
        index.validate_sorted()?;

        let next_tick = self.tick + 1;
        self.publish(next_tick, false)?;

        // Step 8: reclaim deferred frees that have aged past max_lag.
        self.defree
            .reclaim(next_tick, self.config.max_lag, allocator);

        // Step 9: release delayed writes whose due-tick has arrived.
        page_buffer.release_delayed_writes_due(next_tick);

        self.tick = next_tick;

        #[cfg(feature = "tracing")]
        tracing::trace!(tick = self.tick, "writer end-of-tick complete");

        Ok(())
    }

    /// Publish the index and header at `tick`. When `empty` is set, publishes a zero-entry index
    /// at the index mirror's current shadow range (or the default offset if none is allocated
    /// yet) without discarding the in-memory mirror itself.
    fn publish(&mut self, tick: u64, empty: bool) -> Result<()> {
        let index_offset = self
            .index
            .as_ref()
            .map(|i| i.index_shadow_offset)
            .unwrap_or(u64::from(self.config.page_size));

        let block = match &self.index {
            Some(index) if !empty => index.to_index_block(tick),
            _ => crate::codec::IndexBlock {
                tick,
                entries: vec![],
            },
        };
        let encoded = block.encode();

        self.shadow.ensure_size(index_offset + encoded.len() as u64)?;
        self.shadow.write_at(index_offset, &encoded)?;

        let header = Header {
            page_size: self.config.page_size,
            tick,
            index_offset,
            index_len: encoded.len() as u64,
        };
        self.shadow.write_at(HEADER_OFFSET, &header.encode())?;
        Ok(())
    }

    /// Publish an empty index+header and advance the tick, without touching the page buffer's
    /// tick list. The in-memory mirror is retained so a later end-of-tick resumes from it.
    pub fn flush(&mut self) -> Result<()> {
        let next_tick = self.tick + 1;
        self.publish(next_tick, true)?;
        self.tick = next_tick;
        Ok(())
    }

    /// Force a final end-of-tick to drain the tick list, then repeatedly wait one tick length
    /// and run a full EOT until the page buffer's delayed-write list is empty, then publish an
    /// empty index+header, close the shadow file, and unlink it. The deferred-free queue is
    /// drained unconditionally.
    pub fn close(
        mut self,
        page_buffer: &mut dyn PageBuffer,
        metadata_cache: &mut dyn MetadataCache,
        allocator: &mut dyn ShadowAllocator,
    ) -> Result<()> {
        self.end_of_tick(page_buffer, metadata_cache, allocator)?;

        let tick_duration = Duration::from_millis(u64::from(self.config.tick_len) * 100);
        while page_buffer.has_pending_delayed_writes() {
            sleep_monotonic(tick_duration);
            self.end_of_tick(page_buffer, metadata_cache, allocator)?;
        }

        let final_tick = self.tick + 1;
        self.publish(final_tick, true)?;
        self.tick = final_tick;

        self.defree.drain_all(allocator);

        #[cfg(feature = "tracing")]
        tracing::debug!(tick = final_tick, "closing writer session");

        self.shadow.close_and_unlink()?;
        Ok(())
    }
}

fn page_aligned(len: u64, page_size: u32) -> u64 {
    let page_size = u64::from(page_size);
    len.div_ceil(page_size) * page_size
}

fn sleep_monotonic(duration: Duration) {
    let deadline = Instant::now() + duration;
    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep(deadline - now);
    }
}

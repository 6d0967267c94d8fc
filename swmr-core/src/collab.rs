//! Contracts for the collaborators this engine treats as external: the page buffer and the
//! metadata cache. Neither is implemented here — the host application owns both — but the EOT
//! engines drive them through these traits.

/// One dirty metadata page ready to be published, as surfaced by the page buffer's tick list.
/// The borrow is valid only for the duration of the writer EOT call that obtained it; nothing in
/// this engine stores it past that call.
pub struct DirtyPage<'tick> {
    pub hdf5_page_offset: u32,
    pub image: &'tick [u8],
    /// Tick before which this page's *next* rewrite must stay deferred, or `0` for no delay. Only
    /// the page buffer knows whether some other reader-visible constraint on this page outlives
    /// the current publish, so it sets this per page rather than the engine inferring it.
    pub delayed_flush: u64,
}

/// The page buffer: owns dirty metadata pages awaiting publication and pages whose write was
/// postponed by the delay predicate.
pub trait PageBuffer {
    /// Flush resident data-related caches (dataset cache, free-space aggregators) into this
    /// page buffer, and truncate underlying storage if it is dirty. Step 1 of the writer EOT.
    fn flush_resident_caches(&mut self) -> Result<(), crate::error::SwmrError>;

    /// Hand back every page dirtied since the last tick, consuming the tick list. The returned
    /// borrows live only as long as this call's caller keeps them around within the same EOT.
    fn take_tick_list<'tick>(&'tick mut self) -> Vec<DirtyPage<'tick>>;

    /// Release any writes that were postponed by the delay predicate and whose due-tick has now
    /// arrived.
    fn release_delayed_writes_due(&mut self, current_tick: u64);

    /// True if any delayed write remains pending (consulted by the writer's close drain loop).
    fn has_pending_delayed_writes(&self) -> bool;

    /// Evict whatever this page buffer holds for `page`. Used by both the writer (query of the
    /// delay predicate's "not in the index" branch has no effect here) and the reader (on
    /// observing a changed or removed page).
    fn evict_page(&mut self, page: u32);
}

/// The metadata cache: in-memory objects decoded from specific data-file pages.
pub trait MetadataCache {
    /// Flush any cache entries dirtied since the last flush into the page buffer. Step 2 of the
    /// writer EOT, run after `PageBuffer::flush_resident_caches` so entries it dirties are
    /// captured too.
    fn flush(&mut self) -> Result<(), crate::error::SwmrError>;

    /// Evict or refresh every entry whose backing storage falls within `page`. Called by the
    /// reader after the page buffer has already been updated for the new tick, since a refresh
    /// may read back through the page buffer.
    fn evict_or_refresh(&mut self, page: u32);
}

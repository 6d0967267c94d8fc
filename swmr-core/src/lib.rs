//! Tick-driven single-writer/multi-reader coordination over a shadow metadata file.
//!
//! One process opens a paged data file for writing; any number of reader processes open the
//! same data file read-only and must observe a consistent view of its metadata even while the
//! writer mutates it. Coordination happens through a secondary *shadow file* that publishes,
//! once per tick, every metadata page that has been rewritten but whose old bytes might still be
//! visible in the main data file.
//!
//! This crate is the hard core of that protocol: the shadow-file layout and codec, the in-memory
//! index mirror, the deferred-free discipline that prevents a reader from ever dereferencing
//! stale bytes, and the writer/reader end-of-tick state machines. The page buffer, metadata
//! cache, and shadow free-space manager are external collaborators, represented here only as
//! traits ([`collab::PageBuffer`], [`collab::MetadataCache`], [`index::ShadowAllocator`]).

pub mod codec;
pub mod collab;
pub mod config;
pub mod defree;
pub mod delay;
pub mod error;
pub mod index;
pub mod reader;
pub mod scheduler;
pub mod writer;

pub use codec::{Header, IndexBlock, IndexEntry};
pub use collab::{DirtyPage, MetadataCache, PageBuffer};
pub use config::SwmrConfig;
pub use defree::{DeferredFree, DeferredFreeQueue, ShadowFreeSpace};
pub use delay::{may_publish, UntilTick};
pub use error::{Result, SwmrError};
pub use index::{MirrorEntry, ShadowAllocator, ShadowIndex};
pub use reader::{Diff, ReaderSession};
pub use scheduler::{EotEntry, EotScheduler};
pub use writer::WriterSession;

//! Global (per-process) priority queue of files ordered by their next EOT deadline.
//!
//! This is a plain struct the host owns and threads through its API-entry hook; it is not a
//! lazily-initialized singleton, in keeping with the coordination contract's requirement that
//! the queue not rely on static constructors.

use std::time::Instant;

#[derive(Debug, Clone)]
pub struct EotEntry<H> {
    pub handle: H,
    pub is_writer: bool,
    pub tick: u64,
    pub deadline: Instant,
}

#[derive(Debug, Default)]
pub struct EotScheduler<H> {
    entries: Vec<EotEntry<H>>,
}

impl<H: PartialEq + Clone> EotScheduler<H> {
    pub fn new() -> Self {
        EotScheduler {
            entries: Vec::new(),
        }
    }

    /// Insert after the rightmost predecessor whose deadline is `<=` the new entry's, giving
    /// O(n) worst case but stable FIFO ordering among ties.
    pub fn insert(&mut self, entry: EotEntry<H>) {
        let pos = self
            .entries
            .iter()
            .rposition(|e| e.deadline <= entry.deadline)
            .map_or(0, |i| i + 1);
        self.entries.insert(pos, entry);
    }

    pub fn remove(&mut self, handle: &H) -> Option<EotEntry<H>> {
        let pos = self.entries.iter().position(|e| &e.handle == handle)?;
        Some(self.entries.remove(pos))
    }

    pub fn peek_head(&self) -> Option<&EotEntry<H>> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `true` iff the head entry (earliest deadline) is a writer. Part of the snapshot pair the
    /// API-entry hook reads before deciding whether to drive an EOT.
    pub fn writer_mode(&self) -> bool {
        self.peek_head().is_some_and(|e| e.is_writer)
    }

    /// The earliest deadline in the queue, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.peek_head().map(|e| e.deadline)
    }

    /// Convenience for the common writer/reader pattern: remove the entry for `handle` and
    /// reinsert it with a new tick and deadline.
    pub fn requeue(&mut self, handle: H, is_writer: bool, tick: u64, deadline: Instant) {
        self.remove(&handle);
        self.insert(EotEntry {
            handle,
            is_writer,
            tick,
            deadline,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(base: Instant, secs: u64) -> Instant {
        base + Duration::from_secs(secs)
    }

    #[test]
    fn peek_head_returns_earliest_deadline() {
        let base = Instant::now();
        let mut sched = EotScheduler::new();
        sched.insert(EotEntry {
            handle: "b",
            is_writer: false,
            tick: 1,
            deadline: at(base, 5),
        });
        sched.insert(EotEntry {
            handle: "a",
            is_writer: true,
            tick: 1,
            deadline: at(base, 1),
        });

        assert_eq!(sched.peek_head().unwrap().handle, "a");
        assert!(sched.writer_mode());
    }

    #[test]
    fn ties_preserve_insertion_order() {
        let base = Instant::now();
        let mut sched = EotScheduler::new();
        sched.insert(EotEntry {
            handle: "first",
            is_writer: false,
            tick: 1,
            deadline: base,
        });
        sched.insert(EotEntry {
            handle: "second",
            is_writer: false,
            tick: 1,
            deadline: base,
        });

        assert_eq!(sched.peek_head().unwrap().handle, "first");
    }

    #[test]
    fn remove_and_requeue_moves_entry() {
        let base = Instant::now();
        let mut sched = EotScheduler::new();
        sched.insert(EotEntry {
            handle: "a",
            is_writer: true,
            tick: 1,
            deadline: at(base, 1),
        });
        sched.insert(EotEntry {
            handle: "b",
            is_writer: false,
            tick: 1,
            deadline: at(base, 2),
        });

        sched.requeue("a", true, 2, at(base, 10));
        assert_eq!(sched.peek_head().unwrap().handle, "b");
        assert_eq!(sched.len(), 2);
    }

    #[test]
    fn empty_scheduler_has_no_next_deadline() {
        let sched: EotScheduler<&str> = EotScheduler::new();
        assert!(sched.next_deadline().is_none());
        assert!(!sched.writer_mode());
    }
}

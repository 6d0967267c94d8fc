//! The delay predicate: decides, per dirty metadata page, whether the writer may publish it now
//! or must wait for lagging readers to catch up.

use crate::error::{Result, SwmrError};
use crate::index::ShadowIndex;

/// `0` means "may publish immediately"; any other value is the tick at or after which
/// publication becomes permissible.
pub type UntilTick = u64;

/// Used by the page buffer to decide whether a freshly-dirty metadata page may be flushed now.
///
/// - If `page` is not in the current index, readers may still be looking at its on-disk bytes
///   from before the index ever mentioned it, so publication must wait a full `max_lag`.
/// - If the existing entry's `delayed_flush` tick hasn't arrived yet, honor it.
/// - Otherwise publication may proceed immediately.
pub fn may_publish(
    index: &ShadowIndex,
    page: u32,
    current_tick: u64,
    max_lag: u32,
) -> Result<UntilTick> {
    let until = match index.lookup(page) {
        None => current_tick + u64::from(max_lag),
        Some(entry) if entry.delayed_flush >= current_tick => entry.delayed_flush,
        Some(_) => 0,
    };

    if until != 0 && !(current_tick..=current_tick + u64::from(max_lag)).contains(&until) {
        return Err(SwmrError::InvariantDelayOutOfRange {
            page,
            until,
            current_tick,
            max_lag,
        });
    }

    Ok(until)
}

//! Helpers for tracking a store's modify index across polls.

/// Whether a freshly read index is newer than the one last observed.
pub fn index_has_change(new: u64, old: u64) -> bool {
    new > old
}

/// The highest index seen so far.
pub fn find_max_found(new: u64, old: u64) -> u64 {
    new.max(old)
}

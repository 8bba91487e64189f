//! Identifier allocation
//!
//! Ids are `1 + max(existing ids)`. No counter is stored anywhere, so the
//! allocator is correct across restarts without a sequence file.
//!
//! This is only race-free when the collection it scans was loaded inside the
//! exclusive write section that will commit the new record. The only caller
//! is [`Collection::insert`](super::collection::Collection::insert), and a
//! collection can only be committed through
//! [`Store::with_exclusive_write`](crate::Store::with_exclusive_write).

use super::record::Record;

/// Compute the next free id for a set of records
pub(crate) fn next_id(records: &[Record]) -> u64 {
    records.iter().map(|r| r.id).max().unwrap_or(0) + 1
}

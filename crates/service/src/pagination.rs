//! Pagination utilities for service layer
//!
//! Listings are addressed by an absolute `position` and a page `size`; the
//! window `[position, position + size)` is cut out of the fully sorted result.

use std::ops::Range;

pub const DEFAULT_POSITION: u64 = 0;
pub const DEFAULT_SIZE: u64 = 25;

/// Pagination parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    /// 0-based offset of the first item
    pub position: u64,
    /// maximum number of items returned
    pub size: u64,
}

impl Pagination {
    pub fn new(position: u64, size: u64) -> Self { Self { position, size } }

    /// Index range within a listing of `total` items. Empty when `position` is past the end.
    pub fn bounds(self, total: usize) -> Range<usize> {
        let start = usize::try_from(self.position).unwrap_or(usize::MAX).min(total);
        let end = usize::try_from(self.position.saturating_add(self.size))
            .unwrap_or(usize::MAX)
            .min(total);
        start..end
    }

    /// Keep only the items inside the window.
    pub fn apply<T>(self, mut items: Vec<T>) -> Vec<T> {
        let range = self.bounds(items.len());
        items.truncate(range.end);
        items.drain(..range.start);
        items
    }
}

impl Default for Pagination {
    fn default() -> Self { Self { position: DEFAULT_POSITION, size: DEFAULT_SIZE } }
}

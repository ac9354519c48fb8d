//! Page boundaries for HTML feed output.

use std::ops::Range;

/// One page of a feed: a 1-based number and the slice of items it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedPage {
    pub number: usize,
    pub total_pages: usize,
    pub range: Range<usize>,
}

impl FeedPage {
    pub fn has_prev(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Split `total` items into pages of `items_per_page`.
///
/// Always returns at least one page, so an empty feed still renders.
/// `items_per_page <= 0` puts everything on a single page.
pub fn paginate(total: usize, items_per_page: i64) -> Vec<FeedPage> {
    let size = match usize::try_from(items_per_page) {
        Ok(0) | Err(_) => total.max(1),
        Ok(n) => n,
    };
    let total_pages = total.div_ceil(size).max(1);
    (0..total_pages)
        .map(|i| FeedPage {
            number: i + 1,
            total_pages,
            range: (i * size)..((i + 1) * size).min(total),
        })
        .collect()
}

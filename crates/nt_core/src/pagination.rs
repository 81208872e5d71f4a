/// Fixed page size of the article list.
pub const ARTICLES_PER_PAGE: usize = 20;

/// How many numbered page buttons are shown at once.
pub const MAX_VISIBLE_PAGES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    Page(usize),
    Gap,
}

/// Page arithmetic for a 1-based current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: usize,
    pub total_items: usize,
    pub per_page: usize,
}

impl Pagination {
    pub fn new(current_page: usize, total_items: usize, per_page: usize) -> Self {
        Self {
            current_page: current_page.max(1),
            total_items,
            per_page: per_page.max(1),
        }
    }

    pub fn total_pages(&self) -> usize {
        self.total_items.div_ceil(self.per_page)
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages()
    }

    /// Pagination controls are only shown when there is more than one page.
    pub fn is_needed(&self) -> bool {
        self.total_items > self.per_page
    }

    /// 1-based inclusive range of the items on the current page, `(0, 0)` when empty.
    pub fn range(&self) -> (usize, usize) {
        if self.total_items == 0 {
            return (0, 0);
        }
        let start = (self.current_page - 1) * self.per_page + 1;
        let end = (self.current_page * self.per_page).min(self.total_items);
        (start.min(end), end)
    }

    pub fn summary(&self) -> String {
        let (start, end) = self.range();
        format!("Showing {}-{} of {} articles", start, end, self.total_items)
    }

    /// Numbered pages around the current one, with the first and last page
    /// pinned behind a gap when the window does not reach them.
    pub fn page_items(&self) -> Vec<PageItem> {
        let total = self.total_pages();
        if total <= MAX_VISIBLE_PAGES {
            return (1..=total).map(PageItem::Page).collect();
        }

        let start = self.current_page.saturating_sub(2).max(1);
        let end = (start + MAX_VISIBLE_PAGES - 1).min(total);

        let mut items = Vec::with_capacity(MAX_VISIBLE_PAGES + 4);
        if start > 1 {
            items.push(PageItem::Page(1));
            items.push(PageItem::Gap);
        }
        items.extend((start..=end).map(PageItem::Page));
        if end < total {
            items.push(PageItem::Gap);
            items.push(PageItem::Page(total));
        }
        items
    }
}

/// Items of `page` (1-based) out of an in-memory list.
pub fn paginate<T>(items: &[T], page: usize, per_page: usize) -> &[T] {
    let start = page.saturating_sub(1).saturating_mul(per_page);
    if start >= items.len() {
        return &[];
    }
    let end = (start + per_page).min(items.len());
    &items[start..end]
}

use crate::models::ServerPagination;

pub const PAGE_SIZES: [u32; 4] = [10, 25, 50, 100];
pub const DEFAULT_PAGE_SIZE: u32 = PAGE_SIZES[0];

/// Widest run of page buttons shown at once.
const WINDOW: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
    current_page: u32,
    items_per_page: u32,
    total_items: u64,
}

/// What the page selector renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageControls {
    pub current_page: u32,
    pub total_pages: u32,
    pub pages: Vec<u32>,
    pub has_previous: bool,
    pub has_next: bool,
    /// 1-based range of the items on screen; `0..=0` when there are none.
    pub first_item: u64,
    pub last_item: u64,
    pub total_items: u64,
}

impl PageState {
    pub fn new(items_per_page: u32) -> Self {
        Self {
            current_page: 1,
            items_per_page: items_per_page.max(1),
            total_items: 0,
        }
    }

    pub fn from_server(meta: ServerPagination) -> Self {
        let mut state = Self::new(meta.limit);
        state.total_items = meta.total_items;
        state.go_to(meta.current_page);
        state
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn items_per_page(&self) -> u32 {
        self.items_per_page
    }

    pub fn total_items(&self) -> u64 {
        self.total_items
    }

    pub fn total_pages(&self) -> u32 {
        let per_page = u64::from(self.items_per_page);
        let pages = self.total_items.div_ceil(per_page).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn reset(&mut self) {
        self.current_page = 1;
    }

    pub fn go_to(&mut self, page: u32) {
        self.current_page = page.clamp(1, self.total_pages());
    }

    pub fn set_items_per_page(&mut self, items_per_page: u32) {
        self.items_per_page = items_per_page.max(1);
        self.reset();
    }

    /// Records a new result count, pulling the current page back in range.
    pub fn set_total_items(&mut self, total_items: u64) {
        self.total_items = total_items;
        self.go_to(self.current_page);
    }

    /// Items belonging to the current page.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let per_page = self.items_per_page as usize;
        let start = (self.current_page as usize - 1).saturating_mul(per_page);
        if start >= items.len() {
            return &[];
        }
        let end = start.saturating_add(per_page).min(items.len());
        &items[start..end]
    }

    pub fn controls(&self) -> PageControls {
        let total_pages = self.total_pages();
        let current = self.current_page;

        let mut start = current.saturating_sub(WINDOW / 2).max(1);
        let end = (start + WINDOW - 1).min(total_pages);
        start = end.saturating_sub(WINDOW - 1).max(1);

        let (first_item, last_item) = if self.total_items == 0 {
            (0, 0)
        } else {
            let per_page = u64::from(self.items_per_page);
            let first = u64::from(current - 1) * per_page + 1;
            (first, (first + per_page - 1).min(self.total_items))
        };

        PageControls {
            current_page: current,
            total_pages,
            pages: (start..=end).collect(),
            has_previous: current > 1,
            has_next: current < total_pages,
            first_item,
            last_item,
            total_items: self.total_items,
        }
    }
}

impl Default for PageState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn state(total_items: u64, per_page: u32, page: u32) -> PageState {
        let mut state = PageState::new(per_page);
        state.set_total_items(total_items);
        state.go_to(page);
        state
    }

    #[test]
    fn window_is_centered_on_current_page() {
        let controls = state(200, 10, 10).controls();
        assert_eq!(controls.pages, vec![8, 9, 10, 11, 12]);
        assert!(controls.has_previous);
        assert!(controls.has_next);
    }

    #[test]
    fn window_is_clamped_at_both_ends() {
        assert_eq!(state(200, 10, 1).controls().pages, vec![1, 2, 3, 4, 5]);
        assert_eq!(state(200, 10, 2).controls().pages, vec![1, 2, 3, 4, 5]);
        assert_eq!(state(200, 10, 20).controls().pages, vec![16, 17, 18, 19, 20]);
        assert_eq!(state(30, 10, 2).controls().pages, vec![1, 2, 3]);
    }

    #[test]
    fn empty_results_still_have_one_page() {
        let controls = state(0, 10, 4).controls();
        assert_eq!(controls.current_page, 1);
        assert_eq!(controls.total_pages, 1);
        assert_eq!(controls.pages, vec![1]);
        assert!(!controls.has_previous);
        assert!(!controls.has_next);
        assert_eq!((controls.first_item, controls.last_item), (0, 0));
    }

    #[test]
    fn shrinking_results_pull_page_back_in_range() {
        let mut page = state(100, 10, 9);
        page.set_total_items(25);
        assert_eq!(page.current_page(), 3);
        let controls = page.controls();
        assert_eq!((controls.first_item, controls.last_item), (21, 25));
    }

    #[test]
    fn changing_page_size_goes_back_to_first_page() {
        let mut page = state(100, 10, 4);
        page.set_items_per_page(25);
        assert_eq!(page.current_page(), 1);
        assert_eq!(page.total_pages(), 4);
    }

    #[test]
    fn slice_returns_current_page_items() {
        let items: Vec<u32> = (1..=23).collect();
        assert_eq!(state(23, 10, 3).slice(&items), &[21, 22, 23]);
        assert_eq!(state(23, 10, 1).slice(&items).len(), 10);
    }

    #[test]
    fn server_metadata_converts() {
        let page = PageState::from_server(ServerPagination {
            current_page: 2,
            total_pages: 5,
            total_items: 48,
            limit: 10,
        });
        assert_eq!(page.current_page(), 2);
        assert_eq!(page.total_pages(), 5);
    }
}

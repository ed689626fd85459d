//! Keyboard selection cursor over the visible result list.

use std::time::{Duration, Instant};

/// Mouse hover is ignored for a short window after keyboard navigation, so
/// the cursor does not jump when scrolling moves the list under the pointer.
pub const HOVER_SUPPRESS: Duration = Duration::from_millis(400);

/// Cursor over the visible result set. `index` is always within
/// `0..item_count`; an empty list forces the unselected state.
#[derive(Debug, Default)]
pub struct Selection {
    index: Option<usize>,
    item_count: usize,
    hover_suppressed_until: Option<Instant>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Select a row directly (mouse hover or click). Out-of-range indices
    /// are ignored.
    pub fn select(&mut self, index: usize) {
        if index < self.item_count {
            self.index = Some(index);
        }
    }

    pub fn unselect(&mut self) {
        self.index = None;
    }

    /// Move the cursor by `delta` rows, saturating at the list edges. From
    /// the unselected state any movement lands on the first row.
    pub fn advance(&mut self, delta: isize, now: Instant) {
        if self.item_count == 0 {
            return;
        }
        self.note_keyboard_nav(now);
        let next = match self.index {
            None => 0,
            Some(current) => current
                .saturating_add_signed(delta)
                .min(self.item_count - 1),
        };
        self.index = Some(next);
    }

    /// The list was replaced with `item_count` rows. The cursor is clamped
    /// to the new last row, or cleared when the list is empty.
    pub fn on_results_replaced(&mut self, item_count: usize) {
        self.item_count = item_count;
        if item_count == 0 {
            self.index = None;
        } else if let Some(index) = self.index {
            self.index = Some(index.min(item_count - 1));
        }
    }

    fn note_keyboard_nav(&mut self, now: Instant) {
        self.hover_suppressed_until = Some(now + HOVER_SUPPRESS);
    }

    /// Whether mouse hover may move the cursor right now.
    pub fn hover_allowed(&self, now: Instant) -> bool {
        self.hover_suppressed_until.map_or(true, |until| now >= until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_saturates_at_both_edges() {
        let mut selection = Selection::new();
        let now = Instant::now();
        selection.on_results_replaced(3);

        selection.advance(1, now);
        assert_eq!(selection.index(), Some(0));
        selection.advance(1, now);
        assert_eq!(selection.index(), Some(1));
        selection.advance(1, now);
        assert_eq!(selection.index(), Some(2));
        selection.advance(1, now);
        assert_eq!(selection.index(), Some(2));

        selection.advance(-5, now);
        assert_eq!(selection.index(), Some(0));
    }

    #[test]
    fn advance_on_empty_list_stays_unselected() {
        let mut selection = Selection::new();
        selection.advance(1, Instant::now());
        assert_eq!(selection.index(), None);
    }

    #[test]
    fn results_replaced_clamps_or_clears() {
        let mut selection = Selection::new();
        let now = Instant::now();
        selection.on_results_replaced(10);
        selection.select(7);
        assert_eq!(selection.index(), Some(7));

        selection.on_results_replaced(3);
        assert_eq!(selection.index(), Some(2));

        selection.on_results_replaced(0);
        assert_eq!(selection.index(), None);

        // A later non-empty list does not resurrect the old cursor.
        selection.on_results_replaced(5);
        assert_eq!(selection.index(), None);
        selection.advance(1, now);
        assert_eq!(selection.index(), Some(0));
    }

    #[test]
    fn select_ignores_out_of_range() {
        let mut selection = Selection::new();
        selection.on_results_replaced(2);
        selection.select(5);
        assert_eq!(selection.index(), None);
        selection.select(1);
        assert_eq!(selection.index(), Some(1));
    }

    #[test]
    fn hover_suppressed_after_keyboard_nav() {
        let mut selection = Selection::new();
        let t0 = Instant::now();
        selection.on_results_replaced(3);

        assert!(selection.hover_allowed(t0));
        selection.advance(1, t0);
        assert!(!selection.hover_allowed(t0 + Duration::from_millis(100)));
        assert!(selection.hover_allowed(t0 + HOVER_SUPPRESS));
    }
}

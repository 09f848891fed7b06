//! Windowed rendering: which slice of a long list is worth materializing.

use crate::config::PerformanceConfig;
use serde::{Deserialize, Serialize};

/// The index range to render plus the geometry needed to place it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisibleRange {
    /// First index to render.
    pub start: usize,
    /// One past the last index to render.
    pub end: usize,
    /// Vertical offset of `start` from the top of the list.
    pub offset_y: f64,
    /// Height of the whole list if every item were rendered.
    pub total_height: f64,
}

impl VisibleRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.start..self.end).contains(&index)
    }
}

/// Fixed-height list geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualWindow {
    pub item_height: f64,
    pub viewport_height: f64,
    /// Extra items rendered above and below the viewport.
    pub buffer: usize,
}

impl VirtualWindow {
    pub fn new(item_height: f64, viewport_height: f64, buffer: usize) -> Self {
        Self {
            item_height,
            viewport_height,
            buffer,
        }
    }

    pub fn from_config(config: &PerformanceConfig) -> Self {
        Self::new(config.item_height, config.viewport_height, config.buffer)
    }

    /// Compute the range for `total_items` at `scroll_offset`. Constant time
    /// regardless of `total_items`.
    pub fn range(&self, total_items: usize, scroll_offset: f64) -> VisibleRange {
        if total_items == 0 || !(self.item_height.is_finite() && self.item_height > 0.0) {
            return VisibleRange {
                start: 0,
                end: 0,
                offset_y: 0.0,
                total_height: 0.0,
            };
        }

        let total_height = total_items as f64 * self.item_height;
        let scroll = if scroll_offset.is_finite() {
            scroll_offset.clamp(0.0, total_height)
        } else {
            0.0
        };
        let viewport = self.viewport_height.max(0.0);

        let first_visible = (scroll / self.item_height).floor() as usize;
        let last_visible = ((scroll + viewport) / self.item_height).ceil() as usize;

        let start = first_visible.saturating_sub(self.buffer).min(total_items);
        let end = last_visible.saturating_add(self.buffer).min(total_items).max(start);

        VisibleRange {
            start,
            end,
            offset_y: start as f64 * self.item_height,
            total_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_of_list() {
        let window = VirtualWindow::new(20.0, 100.0, 2);
        let range = window.range(1000, 0.0);
        assert_eq!(range.start, 0);
        assert_eq!(range.end, 7);
        assert_eq!(range.offset_y, 0.0);
        assert_eq!(range.total_height, 20_000.0);
    }

    #[test]
    fn test_scrolled_middle() {
        let window = VirtualWindow::new(20.0, 100.0, 2);
        let range = window.range(1000, 410.0);
        // items 20..26 intersect the viewport, plus two on each side
        assert_eq!(range.start, 18);
        assert_eq!(range.end, 28);
        assert_eq!(range.offset_y, 360.0);
        assert!(range.contains(25));
        assert_eq!(range.len(), 10);
    }

    #[test]
    fn test_clamped_at_end() {
        let window = VirtualWindow::new(10.0, 50.0, 3);
        let range = window.range(20, 10_000.0);
        assert_eq!(range.end, 20);
        assert!(range.start <= 20);
        assert_eq!(range.total_height, 200.0);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(VirtualWindow::new(10.0, 50.0, 3).range(0, 0.0).is_empty());
        assert!(VirtualWindow::new(0.0, 50.0, 3).range(10, 0.0).is_empty());
        let range = VirtualWindow::new(10.0, 50.0, 0).range(100, f64::NAN);
        assert_eq!((range.start, range.end), (0, 5));
    }

    #[test]
    fn test_huge_list_is_constant_time() {
        let window = VirtualWindow::from_config(&PerformanceConfig::default());
        let range = window.range(usize::MAX / 4, 24.0 * 1_000_000.0);
        assert_eq!(range.start, 1_000_000 - 5);
        assert_eq!(range.len(), 25 + 10);
    }
}

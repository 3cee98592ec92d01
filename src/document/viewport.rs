//! Viewport management for scrolling.
//!
//! The [`Viewport`] struct tracks which rows of a document are visible
//! and resolves scroll requests against a [`ScrollAnchor`].

use std::ops::Range;

use super::ScrollAnchor;

/// Manages the visible portion of a document.
///
/// # Example
///
/// ```
/// use rfcview::document::ScrollAnchor;
/// use rfcview::document::viewport::Viewport;
///
/// let mut vp = Viewport::new(24, 100);
/// assert_eq!(vp.visible_range(), 0..24);
///
/// vp.scroll_to(50, ScrollAnchor::Top);
/// assert_eq!(vp.visible_range(), 50..74);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewport {
    height: u16,
    offset: usize,
    total_lines: usize,
}

impl Viewport {
    /// Create a new viewport.
    ///
    /// # Arguments
    ///
    /// * `height` - Visible rows
    /// * `total_lines` - Total lines in the document
    pub const fn new(height: u16, total_lines: usize) -> Self {
        Self {
            height,
            offset: 0,
            total_lines,
        }
    }

    /// Get the current scroll offset (first visible row).
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Get the viewport height.
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Get the range of visible lines, clamped to the document bounds.
    pub fn visible_range(&self) -> Range<usize> {
        let start = self.offset;
        let end = (self.offset + self.height as usize).min(self.total_lines);
        start..end
    }

    /// Whether `row` is currently on screen.
    pub fn is_visible(&self, row: usize) -> bool {
        self.visible_range().contains(&row)
    }

    /// Scroll so `row` sits at `anchor`.
    pub fn scroll_to(&mut self, row: usize, anchor: ScrollAnchor) {
        let height = self.height as usize;
        let target = match anchor {
            ScrollAnchor::Top => row,
            ScrollAnchor::Center => row.saturating_sub(height / 2),
            ScrollAnchor::Visible => {
                if row < self.offset {
                    row
                } else if row >= self.offset + height {
                    (row + 1).saturating_sub(height)
                } else {
                    self.offset
                }
            }
        };
        self.offset = target.min(self.max_offset());
    }

    /// Resize the viewport.
    pub fn resize(&mut self, height: u16) {
        self.height = height;
        self.offset = self.offset.min(self.max_offset());
    }

    const fn max_offset(&self) -> usize {
        self.total_lines.saturating_sub(self.height as usize)
    }
}

//! Form-feed pagination.
//!
//! RFCs rendered as plain text separate pages with a line holding a single
//! form-feed character. [`PageIndex`] records those boundary rows; the free
//! functions move an [`Editor`]'s selection between pages.
//!
//! Page 1 runs from row 0 to the first boundary. Page `n > 1` opens with
//! boundary `n - 2` (zero-based), so a boundary row belongs to the page that
//! follows it.

use crate::document::{Editor, Point, ScrollAnchor, Selection};

/// The page-break control character.
pub const FORM_FEED: char = '\u{c}';

/// Returns true if `line` consists solely of a form feed.
pub fn is_page_boundary(line: &str) -> bool {
    let mut chars = line.chars();
    chars.next() == Some(FORM_FEED) && chars.next().is_none()
}

/// Ordered boundary rows of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageIndex {
    boundaries: Vec<usize>,
    last_row: usize,
}

impl PageIndex {
    /// Scan every line of `editor` for page boundaries.
    pub fn scan<E: Editor + ?Sized>(editor: &E) -> Self {
        let boundaries = (0..editor.line_count())
            .filter(|&row| editor.line(row).is_some_and(|l| is_page_boundary(&l)))
            .collect();
        Self {
            boundaries,
            last_row: editor.last_row(),
        }
    }

    /// Build an index from raw lines.
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut boundaries = Vec::new();
        let mut count = 0;
        for (row, line) in lines.into_iter().enumerate() {
            if is_page_boundary(line) {
                boundaries.push(row);
            }
            count = row + 1;
        }
        Self {
            boundaries,
            last_row: count.saturating_sub(1),
        }
    }

    pub fn boundaries(&self) -> &[usize] {
        &self.boundaries
    }

    /// Number of pages; a document without boundaries has one.
    pub fn page_count(&self) -> usize {
        self.boundaries.len() + 1
    }

    pub fn is_boundary(&self, row: usize) -> bool {
        self.boundaries.binary_search(&row).is_ok()
    }

    /// The one-based page containing `row`.
    pub fn page_of_row(&self, row: usize) -> usize {
        1 + self.boundaries.partition_point(|&b| b <= row)
    }

    /// Clamp a requested page number into `1..=page_count`.
    pub fn clamp_page(&self, page: i64) -> usize {
        let max = self.page_count();
        usize::try_from(page).map_or(1, |p| p.clamp(1, max))
    }

    /// The nearest boundary at or above `row`.
    fn boundary_at_or_above(&self, row: usize) -> Option<usize> {
        let idx = self.boundaries.partition_point(|&b| b <= row);
        idx.checked_sub(1).map(|i| self.boundaries[i])
    }

    /// The nearest boundary at or below `row`.
    fn boundary_at_or_below(&self, row: usize) -> Option<usize> {
        let idx = self.boundaries.partition_point(|&b| b < row);
        self.boundaries.get(idx).copied()
    }
}

/// Jump to `page`, clamped to the pages the document has.
///
/// Page 1 lands on the document start. Later pages land on the first row
/// after their boundary, with the viewport top aligned to it.
pub fn go_to_page<E: Editor + ?Sized>(editor: &mut E, page: i64) -> Point {
    let index = PageIndex::scan(editor);
    let page = index.clamp_page(page);
    tracing::debug!(page, pages = index.page_count(), "go to page");
    if page == 1 {
        return land(editor, 0, 0);
    }
    let row = (index.boundaries[page - 2] + 1).min(index.last_row);
    land(editor, row, row)
}

/// Move to the start of the current page, or of the previous page when the
/// selection already sits on a boundary.
pub fn prev_page<E: Editor + ?Sized>(editor: &mut E) -> Point {
    let index = PageIndex::scan(editor);
    let mut row = editor.selection().min_row();
    if index.is_boundary(row) {
        row = row.saturating_sub(1);
    }
    let target = index.boundary_at_or_above(row).unwrap_or(0);
    land(editor, target, target)
}

/// Move to the boundary that opens the next page, or to the last row on the
/// final page.
///
/// The view starts on the first row of the new page rather than on the
/// form feed, unless the viewport is a single row and would lose the cursor.
pub fn next_page<E: Editor + ?Sized>(editor: &mut E) -> Point {
    let index = PageIndex::scan(editor);
    let mut row = editor.selection().max_row();
    if index.is_boundary(row) {
        row = (row + 1).min(index.last_row);
    }
    match index.boundary_at_or_below(row) {
        Some(boundary) => land(editor, boundary, page_top(editor, boundary, index.last_row)),
        None => land(editor, index.last_row, index.last_row),
    }
}

// First visible row when revealing the page opened by `boundary`.
fn page_top<E: Editor + ?Sized>(editor: &E, boundary: usize, last_row: usize) -> usize {
    if editor.rows_per_page() > 1 {
        (boundary + 1).min(last_row)
    } else {
        boundary
    }
}

fn land<E: Editor + ?Sized>(editor: &mut E, row: usize, top: usize) -> Point {
    let point = Point::new(row, 0);
    editor.set_selection(Selection::at(point));
    editor.scroll_to(Point::new(top, 0), ScrollAnchor::Top);
    point
}

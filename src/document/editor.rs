use std::path::{Path, PathBuf};

use ropey::Rope;

use super::viewport::Viewport;
use super::{Editor, Point, ScrollAnchor, Selection};

/// Rows shown when no height is configured.
pub const DEFAULT_ROWS: u16 = 24;

/// A read-only text document backed by a rope, with a selection and a
/// viewport.
pub struct TextEditor {
    rope: Rope,
    path: Option<PathBuf>,
    selection: Selection,
    viewport: Viewport,
}

impl TextEditor {
    /// Create a document from a string.
    pub fn from_text(text: &str) -> Self {
        let rope = Rope::from_str(text);
        let viewport = Viewport::new(DEFAULT_ROWS, rope.len_lines());
        Self {
            rope,
            path: None,
            selection: Selection::default(),
            viewport,
        }
    }

    /// Load a document from disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_text(&text).with_path(path.to_path_buf()))
    }

    #[must_use]
    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    #[must_use]
    pub fn with_rows(mut self, rows: u16) -> Self {
        self.viewport.resize(rows.max(1));
        self
    }

    /// The viewport state.
    pub const fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Number of characters in a line, without its terminator.
    pub fn line_len(&self, row: usize) -> usize {
        self.line(row).map_or(0, |s| s.chars().count())
    }

    /// The whole document as a string.
    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    /// Rows currently inside the viewport, paired with their row index.
    pub fn visible_lines(&self) -> Vec<(usize, String)> {
        self.viewport
            .visible_range()
            .filter_map(|row| self.line(row).map(|line| (row, line)))
            .collect()
    }

    /// Clamp a point to an existing row and column.
    pub fn clip_point(&self, point: Point) -> Point {
        let row = point.row.min(self.last_row());
        Point::new(row, point.column.min(self.line_len(row)))
    }
}

impl Editor for TextEditor {
    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    fn line(&self, row: usize) -> Option<String> {
        if row >= self.rope.len_lines() {
            return None;
        }
        let s = self.rope.line(row).to_string();
        Some(s.trim_end_matches('\n').trim_end_matches('\r').to_string())
    }

    fn selection(&self) -> Selection {
        self.selection
    }

    fn set_selection(&mut self, selection: Selection) {
        self.selection = Selection::new(
            self.clip_point(selection.start),
            self.clip_point(selection.end),
        );
    }

    fn scroll_to(&mut self, point: Point, anchor: ScrollAnchor) {
        self.viewport.scroll_to(point.row, anchor);
    }

    fn rows_per_page(&self) -> usize {
        self.viewport.height() as usize
    }
}

impl std::fmt::Debug for TextEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextEditor")
            .field(
                "rope",
                &format_args!("Rope({} lines)", self.rope.len_lines()),
            )
            .field("path", &self.path)
            .field("selection", &self.selection)
            .field("viewport", &self.viewport)
            .finish()
    }
}

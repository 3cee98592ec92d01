//! Line-oriented document model and the host seam.
//!
//! This module handles:
//! - Positions and selections over a document ([`Point`], [`Selection`])
//! - The capabilities the navigation engine needs from whatever owns the
//!   open documents ([`Editor`], [`DocumentHost`])
//! - Recognizing RFC-formatted text files
//! - A rope-backed in-memory host used by the CLI and tests ([`Workspace`])

mod editor;
pub mod viewport;
mod workspace;

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

pub use editor::TextEditor;
pub use workspace::{Notification, Workspace};

/// How many leading lines are inspected for an RFC header.
const HEADER_SCAN_LINES: usize = 40;

static RFC_FILE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^rfc[0-9]+\.txt$").expect("valid file name pattern"));

static RFC_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Request for Comments:\s*[0-9]+").expect("valid header pattern")
});

/// A zero-based position in a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Point {
    /// Zero-based line index.
    pub row: usize,
    /// Zero-based column (character offset within the line).
    pub column: usize,
}

impl Point {
    /// The document start.
    pub const ZERO: Self = Self { row: 0, column: 0 };

    /// Create a point at `row`, `column`.
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

/// A selected range. `start <= end` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Selection {
    pub start: Point,
    pub end: Point,
}

impl Selection {
    /// Create a selection between two points, in either order.
    pub fn new(a: Point, b: Point) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    /// A zero-width selection at `point`.
    pub const fn at(point: Point) -> Self {
        Self {
            start: point,
            end: point,
        }
    }

    /// Whether the selection covers no text.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The first row touched by the selection.
    pub const fn min_row(&self) -> usize {
        self.start.row
    }

    /// The last row touched by the selection.
    pub const fn max_row(&self) -> usize {
        self.end.row
    }
}

/// Where a scrolled-to position should sit inside the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAnchor {
    /// Place the row on the first visible line.
    Top,
    /// Place the row in the middle of the viewport.
    Center,
    /// Scroll the minimum amount needed to make the row visible.
    Visible,
}

/// An opaque handle to a document owned by a [`DocumentHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(pub usize);

/// Failure to open a document in the host.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// An open document with a selection and a viewport.
///
/// The navigation engine never stores document content; it reads lines
/// and moves the selection through this trait.
pub trait Editor {
    /// Path the document was loaded from, if any.
    fn path(&self) -> Option<&Path>;

    /// Total number of lines.
    fn line_count(&self) -> usize;

    /// Content of a line without its line terminator.
    fn line(&self, row: usize) -> Option<String>;

    /// The current selection.
    fn selection(&self) -> Selection;

    /// Replace the selection. Implementations clamp it to the document.
    fn set_selection(&mut self, selection: Selection);

    /// Scroll the viewport so `point` sits at `anchor`.
    fn scroll_to(&mut self, point: Point, anchor: ScrollAnchor);

    /// Number of rows visible at once.
    fn rows_per_page(&self) -> usize;

    /// Index of the last line.
    fn last_row(&self) -> usize {
        self.line_count().saturating_sub(1)
    }
}

/// Owner of open documents.
pub trait DocumentHost {
    type Editor: Editor;

    /// The document commands act on when no handle is given.
    fn active(&self) -> Option<DocumentId>;

    /// The handle of an already-open document at `path`.
    fn find_open(&self, path: &Path) -> Option<DocumentId>;

    /// Open the document at `path`, reusing it when already open.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    fn open(&mut self, path: &Path) -> Result<DocumentId, HostError>;

    /// Mutable access to an open document.
    fn editor_mut(&mut self, id: DocumentId) -> Option<&mut Self::Editor>;

    /// Show a user-visible error.
    fn notify_error(&mut self, message: &str, detail: &str);
}

/// Returns true if the file looks like an RFC rendered as paginated text.
///
/// Either the file name is `rfc<N>.txt` or one of the first lines carries
/// the `Request for Comments: <N>` header.
pub fn is_rfc_document(path: Option<&Path>, text: &str) -> bool {
    let named = path
        .and_then(Path::file_name)
        .and_then(|name| name.to_str())
        .is_some_and(|name| RFC_FILE_NAME.is_match(name));
    named
        || text
            .lines()
            .take(HEADER_SCAN_LINES)
            .any(|line| RFC_HEADER.is_match(line))
}

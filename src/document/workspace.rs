use std::path::{Path, PathBuf};

use super::editor::DEFAULT_ROWS;
use super::{DocumentHost, DocumentId, Editor, HostError, TextEditor};

/// A user-visible error raised through [`DocumentHost::notify_error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub detail: String,
}

/// In-memory document host.
///
/// Documents are keyed by canonical path so the same file opened through
/// different spellings resolves to one handle.
#[derive(Debug)]
pub struct Workspace {
    documents: Vec<(PathBuf, TextEditor)>,
    active: Option<DocumentId>,
    rows: u16,
    notifications: Vec<Notification>,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            documents: Vec::new(),
            active: None,
            rows: DEFAULT_ROWS,
            notifications: Vec::new(),
        }
    }

    /// Set the viewport height used for documents opened afterwards.
    #[must_use]
    pub fn with_rows(mut self, rows: u16) -> Self {
        self.rows = rows.max(1);
        self
    }

    /// Add an already-built document and make it active.
    pub fn insert(&mut self, editor: TextEditor) -> DocumentId {
        let key = editor.path().map(canonical).unwrap_or_default();
        let id = DocumentId(self.documents.len());
        self.documents.push((key, editor));
        self.active = Some(id);
        id
    }

    pub fn editor(&self, id: DocumentId) -> Option<&TextEditor> {
        self.documents.get(id.0).map(|(_, editor)| editor)
    }

    /// Number of open documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Errors surfaced so far, oldest first.
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentHost for Workspace {
    type Editor = TextEditor;

    fn active(&self) -> Option<DocumentId> {
        self.active
    }

    fn find_open(&self, path: &Path) -> Option<DocumentId> {
        let key = canonical(path);
        self.documents
            .iter()
            .position(|(p, _)| *p == key)
            .map(DocumentId)
    }

    fn open(&mut self, path: &Path) -> Result<DocumentId, HostError> {
        if let Some(id) = self.find_open(path) {
            self.active = Some(id);
            return Ok(id);
        }
        let editor = TextEditor::open(path)
            .map_err(|source| HostError::Open {
                path: path.display().to_string(),
                source,
            })?
            .with_rows(self.rows);
        tracing::debug!(path = %path.display(), "opened document");
        Ok(self.insert(editor))
    }

    fn editor_mut(&mut self, id: DocumentId) -> Option<&mut TextEditor> {
        self.documents.get_mut(id.0).map(|(_, editor)| editor)
    }

    fn notify_error(&mut self, message: &str, detail: &str) {
        tracing::error!(%detail, "{message}");
        self.notifications.push(Notification {
            message: message.to_string(),
            detail: detail.to_string(),
        });
    }
}

// Canonicalize so different spellings of one file compare equal.
fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

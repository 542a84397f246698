use crate::backend::FileContent;
use crate::error::ApiError;

const EDITABLE_EXTENSIONS: [&str; 10] = [
    "md", "html", "htm", "txt", "css", "js", "json", "py", "yaml", "yml",
];

fn extension(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

pub fn is_editable(path: &str) -> bool {
    EDITABLE_EXTENSIONS.contains(&extension(path).as_str())
}

pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Markdown,
    Html,
    /// Syntax-highlighted source, tagged with a highlighter language name.
    Code(&'static str),
    Plain,
}

impl ContentKind {
    pub fn for_path(path: &str) -> Self {
        match extension(path).as_str() {
            "md" => Self::Markdown,
            "html" | "htm" => Self::Html,
            "js" | "jsx" => Self::Code("javascript"),
            "ts" | "tsx" => Self::Code("typescript"),
            "py" => Self::Code("python"),
            "css" => Self::Code("css"),
            "json" => Self::Code("json"),
            "yaml" | "yml" => Self::Code("yaml"),
            _ => Self::Plain,
        }
    }

    pub fn previewable(self) -> bool {
        matches!(self, Self::Markdown | Self::Html)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    pub buffer: String,
    pub previewing: bool,
    /// Content submitted with an outstanding save request.
    pub saving: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenDocument {
    pub path: String,
    pub content: String,
    pub kind: ContentKind,
    pub editing: Option<EditSession>,
}

impl OpenDocument {
    fn new(path: String, content: String) -> Self {
        let kind = ContentKind::for_path(&path);
        Self {
            path,
            content,
            kind,
            editing: None,
        }
    }

    pub fn name(&self) -> &str {
        file_name(&self.path)
    }

    pub fn editable(&self) -> bool {
        is_editable(&self.path)
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    fn relocate(&mut self, path: String) {
        self.kind = ContentKind::for_path(&path);
        self.path = path;
    }
}

/// View/edit/preview state machine for the single open file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EditorPane {
    #[default]
    Empty,
    Loading {
        path: String,
    },
    Failed {
        path: String,
        message: String,
    },
    Open(OpenDocument),
}

impl EditorPane {
    pub fn active_path(&self) -> Option<&str> {
        match self {
            Self::Empty => None,
            Self::Loading { path } | Self::Failed { path, .. } => Some(path),
            Self::Open(document) => Some(&document.path),
        }
    }

    #[cfg(test)]
    pub fn document(&self) -> Option<&OpenDocument> {
        match self {
            Self::Open(document) => Some(document),
            _ => None,
        }
    }

    pub fn document_mut(&mut self) -> Option<&mut OpenDocument> {
        match self {
            Self::Open(document) => Some(document),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn is_editing(&self) -> bool {
        self.document().is_some_and(OpenDocument::is_editing)
    }

    pub fn begin_open(&mut self, path: impl Into<String>) {
        *self = Self::Loading { path: path.into() };
    }

    /// Applies a file response. Responses are applied in arrival order even if
    /// another file was requested since.
    pub fn finish_open(&mut self, path: String, result: Result<FileContent, ApiError>) {
        *self = match result {
            Ok(file) => {
                let path = if file.path.is_empty() { path } else { file.path };
                Self::Open(OpenDocument::new(path, file.content))
            }
            Err(err) => Self::Failed {
                path,
                message: format!("加载失败: {err}"),
            },
        };
    }

    pub fn enter_edit(&mut self) -> bool {
        let Some(document) = self.document_mut() else {
            return false;
        };
        if !document.editable() || document.editing.is_some() {
            return false;
        }
        document.editing = Some(EditSession {
            buffer: document.content.clone(),
            previewing: false,
            saving: None,
        });
        true
    }

    pub fn cancel_edit(&mut self) {
        if let Some(document) = self.document_mut() {
            document.editing = None;
        }
    }

    /// Flips between the raw editor and a rendered preview of the unsaved buffer.
    pub fn toggle_preview(&mut self) {
        let Some(document) = self.document_mut() else {
            return;
        };
        if !document.kind.previewable() {
            return;
        }
        if let Some(session) = document.editing.as_mut() {
            session.previewing = !session.previewing;
        }
    }

    /// Starts a save of the edit buffer. Yields the request at most once until
    /// the outstanding save finishes.
    pub fn begin_save(&mut self) -> Option<(String, String)> {
        let document = self.document_mut()?;
        let session = document.editing.as_mut()?;
        if session.saving.is_some() {
            return None;
        }
        session.saving = Some(session.buffer.clone());
        Some((document.path.clone(), session.buffer.clone()))
    }

    /// Commits `content` on success and leaves edit mode. On failure the
    /// buffer is kept and saving is re-enabled.
    pub fn finish_save(&mut self, path: &str, content: String, result: &Result<(), ApiError>) {
        let Some(document) = self.document_mut() else {
            return;
        };
        if document.path != path {
            return;
        }
        match result {
            Ok(()) => {
                document.content = content;
                document.editing = None;
            }
            Err(_) => {
                if let Some(session) = document.editing.as_mut() {
                    session.saving = None;
                }
            }
        }
    }

    /// Patches the stored content of the open file. An active edit buffer is
    /// never touched.
    pub fn apply_remote_update(&mut self, path: &str, content: String) -> bool {
        match self.document_mut() {
            Some(document) if document.path == path => {
                document.content = content;
                true
            }
            _ => false,
        }
    }

    /// Follows a rename or move of the open file or one of its ancestors.
    pub fn relocate(&mut self, from: &str, to: &str) -> bool {
        let Some(current) = self.active_path() else {
            return false;
        };
        let relocated = if current == from {
            to.to_string()
        } else if let Some(rest) = current.strip_prefix(&format!("{from}/")) {
            format!("{to}/{rest}")
        } else {
            return false;
        };

        match self {
            Self::Open(document) => document.relocate(relocated),
            Self::Loading { path } | Self::Failed { path, .. } => *path = relocated,
            Self::Empty => {}
        }
        true
    }

    /// Closes the open file if it is `path` or lives under directory `path`.
    pub fn clear_if_under(&mut self, path: &str, is_directory: bool) -> bool {
        let Some(current) = self.active_path() else {
            return false;
        };
        let affected = current == path || (is_directory && current.starts_with(&format!("{path}/")));
        if affected {
            *self = Self::Empty;
        }
        affected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opened(path: &str, content: &str) -> EditorPane {
        let mut pane = EditorPane::default();
        pane.begin_open(path);
        pane.finish_open(
            path.to_string(),
            Ok(FileContent {
                path: path.to_string(),
                content: content.to_string(),
            }),
        );
        pane
    }

    fn session(pane: &EditorPane) -> &EditSession {
        pane.document()
            .and_then(|document| document.editing.as_ref())
            .expect("editing session")
    }

    #[test]
    fn kinds_by_extension() {
        assert_eq!(ContentKind::for_path("docs/readme.md"), ContentKind::Markdown);
        assert_eq!(ContentKind::for_path("index.HTM"), ContentKind::Html);
        assert_eq!(ContentKind::for_path("app.tsx"), ContentKind::Code("typescript"));
        assert_eq!(ContentKind::for_path("conf.yml"), ContentKind::Code("yaml"));
        assert_eq!(ContentKind::for_path("data.csv"), ContentKind::Plain);
        assert!(is_editable("a/b.json"));
        assert!(!is_editable("a/b.ts"));
        assert!(!is_editable("dir.md/file"));
    }

    #[test]
    fn save_failure_keeps_buffer_and_reenables_save() {
        let mut pane = opened("a.md", "old");
        assert!(pane.enter_edit());
        if let Some(EditSession { buffer, .. }) =
            pane.document_mut().and_then(|document| document.editing.as_mut())
        {
            buffer.push_str(" plus edits");
        }

        let (path, content) = pane.begin_save().expect("first save starts");
        assert_eq!(content, "old plus edits");
        assert!(pane.begin_save().is_none(), "save is disabled while in flight");

        pane.finish_save(&path, content, &Err(ApiError::Server("disk full".to_string())));
        assert!(pane.is_editing());
        assert_eq!(session(&pane).buffer, "old plus edits");
        assert_eq!(session(&pane).saving, None);
        assert_eq!(pane.document().map(|d| d.content.as_str()), Some("old"));
        assert!(pane.begin_save().is_some(), "save is enabled again");
    }

    #[test]
    fn save_success_commits_and_leaves_edit_mode() {
        let mut pane = opened("a.md", "old");
        pane.enter_edit();
        if let Some(session) = pane.document_mut().and_then(|d| d.editing.as_mut()) {
            session.buffer = "new".to_string();
        }
        let (path, content) = pane.begin_save().expect("save starts");
        pane.finish_save(&path, content, &Ok(()));
        assert!(!pane.is_editing());
        assert_eq!(pane.document().map(|d| d.content.as_str()), Some("new"));
    }

    #[test]
    fn remote_update_never_overwrites_edit_buffer() {
        let mut pane = opened("a.md", "old");
        pane.enter_edit();
        assert!(pane.apply_remote_update("a.md", "remote".to_string()));
        assert_eq!(session(&pane).buffer, "old");
        assert_eq!(pane.document().map(|d| d.content.as_str()), Some("remote"));
        assert!(!pane.apply_remote_update("other.md", "x".to_string()));
    }

    #[test]
    fn preview_toggles_only_for_markdown_and_html() {
        let mut pane = opened("a.md", "# t");
        pane.enter_edit();
        pane.toggle_preview();
        assert!(session(&pane).previewing);

        let mut pane = opened("a.py", "x = 1");
        pane.enter_edit();
        pane.toggle_preview();
        assert!(!session(&pane).previewing);
    }

    #[test]
    fn non_editable_files_stay_read_only() {
        let mut pane = opened("image.png", "");
        assert!(!pane.enter_edit());
        assert!(pane.begin_save().is_none());
    }

    #[test]
    fn stale_response_is_applied() {
        let mut pane = EditorPane::default();
        pane.begin_open("a.md");
        pane.begin_open("b.md");
        pane.finish_open(
            "a.md".to_string(),
            Ok(FileContent {
                path: "a.md".to_string(),
                content: "late".to_string(),
            }),
        );
        assert_eq!(pane.active_path(), Some("a.md"));
    }

    #[test]
    fn relocation_and_clearing() {
        let mut pane = opened("docs/a.md", "x");
        assert!(pane.relocate("docs", "notes"));
        assert_eq!(pane.active_path(), Some("notes/a.md"));
        assert!(!pane.relocate("doc", "elsewhere"));

        assert!(!pane.clear_if_under("notes", false));
        assert!(pane.clear_if_under("notes", true));
        assert_eq!(pane, EditorPane::Empty);
    }

    #[test]
    fn load_failure_is_shown_inline() {
        let mut pane = EditorPane::default();
        pane.begin_open("gone.md");
        pane.finish_open("gone.md".to_string(), Err(ApiError::Server("File does not exist".to_string())));
        assert_eq!(
            pane,
            EditorPane::Failed {
                path: "gone.md".to_string(),
                message: "加载失败: File does not exist".to_string(),
            }
        );
    }
}

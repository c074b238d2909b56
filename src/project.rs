use std::path::PathBuf;

use uuid::Uuid;

use crate::editor::EditorSession;
use crate::io::{PxfeError, load_pxfe, save_pxfe};

/// Single open document: an editor session plus file identity.
pub struct Project {
    pub id: Uuid,
    pub session: EditorSession,
    /// `None` for unsaved/untitled documents.
    pub path: Option<PathBuf>,
    pub is_dirty: bool,
    /// Display name (derived from path or "Untitled-X").
    pub name: String,
}

impl Project {
    #[must_use]
    pub fn new_untitled(untitled_counter: usize, width: u32, height: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            session: EditorSession::new(width, height),
            path: None,
            is_dirty: false,
            name: format!("Untitled-{}", untitled_counter),
        }
    }

    /// Open an existing `.pxfe` project.
    pub fn open(path: PathBuf) -> Result<Self, PxfeError> {
        let canvas = load_pxfe(&path)?;
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        Ok(Self {
            id: Uuid::new_v4(),
            session: EditorSession::from_canvas(canvas),
            path: Some(path),
            is_dirty: false,
            name,
        })
    }

    /// Save to the project's path. Returns false (untouched) when the
    /// project has no path yet — use [`Project::save_as`].
    pub fn save(&mut self) -> Result<bool, PxfeError> {
        let Some(path) = self.path.clone() else {
            return Ok(false);
        };
        save_pxfe(&self.session.canvas, &path)?;
        self.is_dirty = false;
        Ok(true)
    }

    /// Save to a new path, adopting it and the derived display name.
    pub fn save_as(&mut self, path: PathBuf) -> Result<(), PxfeError> {
        save_pxfe(&self.session.canvas, &path)?;
        if let Some(stem) = path.file_name() {
            self.name = stem.to_string_lossy().to_string();
        }
        self.path = Some(path);
        self.is_dirty = false;
        Ok(())
    }
}

//! Open sessions keyed by logical path
//!
//! The workspace owns the configuration, the provenance record and every
//! open [`EditSession`]. Hosts hold one workspace instead of a global
//! "current document".

use crate::config::EditorConfig;
use crate::crop::{CropId, ThumbnailSize, UiRect};
use crate::error::PageEditError;
use crate::provenance::{MergeOrder, MergeProvenance};
use crate::session::EditSession;
use crate::split::{self, RangeSet};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct Workspace {
    config: EditorConfig,
    provenance: MergeProvenance,
    sessions: HashMap<PathBuf, EditSession>,
    ranges: RangeSet,
}

impl Workspace {
    pub fn new(config: EditorConfig) -> Self {
        let provenance = MergeProvenance::new(config.materialize.clone());
        Self {
            config,
            provenance,
            sessions: HashMap::new(),
            ranges: RangeSet::new(),
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn provenance(&self) -> &MergeProvenance {
        &self.provenance
    }

    /// Open `path` (through provenance), replacing any session already
    /// open for it.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<&mut EditSession, PageEditError> {
        let path = path.as_ref().to_path_buf();
        let session = EditSession::open(&path, &self.provenance)?;
        if self.sessions.contains_key(&path) {
            tracing::debug!("Replacing open session for {}", path.display());
        }
        self.sessions.insert(path.clone(), session);
        self.session_mut(&path)
    }

    pub fn session(&self, path: &Path) -> Option<&EditSession> {
        self.sessions.get(path)
    }

    pub fn session_mut(&mut self, path: &Path) -> Result<&mut EditSession, PageEditError> {
        self.sessions
            .get_mut(path)
            .ok_or_else(|| PageEditError::NoSession(path.to_path_buf()))
    }

    /// Apply the pending edits of the session for `path`; returns the
    /// materialized document path.
    pub fn apply(&mut self, path: &Path) -> Result<PathBuf, PageEditError> {
        let session = self
            .sessions
            .get_mut(path)
            .ok_or_else(|| PageEditError::NoSession(path.to_path_buf()))?;
        session.apply(&mut self.provenance)
    }

    pub fn reset(&mut self, path: &Path) -> Result<(), PageEditError> {
        self.session_mut(path)?.reset();
        Ok(())
    }

    /// Merge `a` and `b` into a new session. The returned path is the merged
    /// document, which is also the key of the new session.
    pub fn merge(&mut self, a: &Path, b: &Path, order: MergeOrder) -> Result<PathBuf, PageEditError> {
        let session = self.provenance.merge(a, b, order)?;
        let key = session.document().path().to_path_buf();
        self.sessions.insert(key.clone(), session);
        Ok(key)
    }

    /// Register a crop on the session for `path`, using the configured
    /// minimum selection size.
    pub fn add_crop(
        &mut self,
        path: &Path,
        position: usize,
        selection: UiRect,
        thumbnail: ThumbnailSize,
    ) -> Result<CropId, PageEditError> {
        let min_pixels = self.config.crop.min_pixels;
        self.session_mut(path)?
            .add_crop(position, selection, thumbnail, min_pixels)
    }

    pub fn close(&mut self, path: &Path) -> Option<EditSession> {
        self.sessions.remove(path)
    }

    pub fn open_paths(&self) -> impl Iterator<Item = &Path> {
        self.sessions.keys().map(PathBuf::as_path)
    }

    /// Ranges picked for export, possibly spanning several documents
    pub fn ranges(&self) -> &RangeSet {
        &self.ranges
    }

    pub fn ranges_mut(&mut self) -> &mut RangeSet {
        &mut self.ranges
    }

    /// Write every picked range to its own document in `out_dir`
    pub fn export_ranges(&self, out_dir: &Path) -> Result<Vec<PathBuf>, PageEditError> {
        split::export_ranges(self, &self.ranges, out_dir, self.config.materialize.compress)
    }
}

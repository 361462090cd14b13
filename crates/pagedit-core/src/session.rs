//! Edit session
//!
//! One open document plus its uncommitted edits. Deletions, moves and
//! rotations only touch the in-memory model; [`EditSession::apply`] writes a
//! new document reflecting them and makes it the working document.
//!
//! A session is a single-writer value: every mutation takes `&mut self`.
//! Readers on other threads work from a [`SessionSnapshot`] and use
//! [`EditSession::is_stale`] to notice that the session moved on.

use crate::backend::SourceDocument;
use crate::crop::{self, CropId, CropSet, ThumbnailSize, UiRect};
use crate::error::PageEditError;
use crate::order::OrderModel;
use crate::provenance::MergeProvenance;
use crate::ranges;
use crate::reconstruct;
use crate::rotation::{Rotation, RotationDirection, RotationTracker};
use crate::types::PageId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Where the working document of a session came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOrigin {
    /// Opened from a file; applying edits updates its provenance record
    File(PathBuf),
    /// Produced by merging two documents
    Merge { first: PathBuf, second: PathBuf },
}

impl SessionOrigin {
    /// File stem used to name materialized documents
    pub fn stem(&self) -> String {
        let path = match self {
            SessionOrigin::File(path) => path,
            SessionOrigin::Merge { first, .. } => first,
        };
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    }
}

/// Owned copy of the edit state, safe to hand to another thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub revision: u64,
    pub order: Vec<PageId>,
    pub deleted: BTreeSet<PageId>,
    pub rotations: RotationTracker,
}

impl SessionSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Emitted to subscribers after every successful mutation
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Deleted(Vec<PageId>),
    Reordered { id: PageId, from: usize, to: usize },
    Rotated { id: PageId, rotation: Rotation },
    Reset,
    Applied { path: PathBuf, page_count: usize },
}

/// Counts for an edit status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditSummary {
    pub surviving: usize,
    pub deleted: usize,
    pub rotated: usize,
    pub reordered: bool,
}

impl fmt::Display for EditSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pages, {} deleted, {} rotated",
            self.surviving, self.deleted, self.rotated
        )?;
        if self.reordered {
            f.write_str(", reordered")?;
        }
        Ok(())
    }
}

type Listener = Box<dyn Fn(&SessionEvent) + Send + Sync>;

pub struct EditSession {
    origin: SessionOrigin,
    document: SourceDocument,
    model: OrderModel,
    rotations: RotationTracker,
    /// Order at session start or last apply. Rotations always start empty.
    original_order: Vec<PageId>,
    crops: CropSet,
    revision: u64,
    listeners: Vec<Listener>,
}

impl EditSession {
    pub fn new(origin: SessionOrigin, document: SourceDocument) -> Self {
        let model = OrderModel::new(document.page_count());
        let original_order = model.order().to_vec();
        Self {
            origin,
            document,
            model,
            rotations: RotationTracker::new(),
            original_order,
            crops: CropSet::new(),
            revision: 0,
            listeners: Vec::new(),
        }
    }

    /// Open `path`, reading whichever materialization currently stands in
    /// for it.
    pub fn open(path: impl AsRef<Path>, provenance: &MergeProvenance) -> Result<Self, PageEditError> {
        let path = path.as_ref();
        let resolved = provenance.resolve(path);
        let document = SourceDocument::open(&resolved)?;
        tracing::info!(
            "Opened {} ({} pages) from {}",
            path.display(),
            document.page_count(),
            resolved.display()
        );
        Ok(Self::new(SessionOrigin::File(path.to_path_buf()), document))
    }

    pub fn origin(&self) -> &SessionOrigin {
        &self.origin
    }

    /// The working document
    pub fn document(&self) -> &SourceDocument {
        &self.document
    }

    pub fn order(&self) -> &[PageId] {
        self.model.order()
    }

    pub fn deleted(&self) -> &BTreeSet<PageId> {
        self.model.deleted()
    }

    pub fn rotations(&self) -> &RotationTracker {
        &self.rotations
    }

    pub fn crops(&self) -> &CropSet {
        &self.crops
    }

    pub fn crops_mut(&mut self) -> &mut CropSet {
        &mut self.crops
    }

    pub fn page_count(&self) -> usize {
        self.model.len()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// True while the model differs from the last applied state
    pub fn is_dirty(&self) -> bool {
        !self.model.deleted().is_empty()
            || !self.rotations.is_empty()
            || self.model.order() != self.original_order.as_slice()
    }

    pub fn identity_at(&self, position: usize) -> Result<PageId, PageEditError> {
        self.model.identity_at(position)
    }

    pub fn delete(&mut self, position: usize) -> Result<PageId, PageEditError> {
        let id = self.model.delete_at_position(position)?;
        self.rotations.set(id, Rotation::None);
        tracing::debug!("Deleted page {} at position {}", id, position);
        self.touch(SessionEvent::Deleted(vec![id]));
        Ok(id)
    }

    /// Delete a batch of positions; nothing changes if any is out of range.
    /// Returns the number of pages removed.
    pub fn bulk_delete(&mut self, positions: &BTreeSet<usize>) -> Result<usize, PageEditError> {
        let removed = self.model.bulk_delete(positions)?;
        if removed.is_empty() {
            return Ok(0);
        }
        for id in &removed {
            self.rotations.set(*id, Rotation::None);
        }
        tracing::debug!("Deleted {} pages", removed.len());
        let count = removed.len();
        self.touch(SessionEvent::Deleted(removed));
        Ok(count)
    }

    /// Delete the positions named by range text such as `"1,3-5"`
    pub fn delete_range_text(&mut self, text: &str) -> Result<usize, PageEditError> {
        let positions = ranges::parse(text, self.model.len())?;
        self.bulk_delete(&positions)
    }

    pub fn reorder(&mut self, source: usize, target: usize) -> Result<(), PageEditError> {
        let id = self.model.identity_at(source)?;
        if self.model.reorder(source, target)? {
            tracing::debug!("Moved page {} from {} to {}", id, source, target);
            self.touch(SessionEvent::Reordered {
                id,
                from: source,
                to: target,
            });
        }
        Ok(())
    }

    /// Rotate the page shown at `position`
    pub fn rotate(
        &mut self,
        position: usize,
        direction: RotationDirection,
    ) -> Result<Rotation, PageEditError> {
        let id = self.model.identity_at(position)?;
        self.rotate_identity(id, direction)
    }

    /// Rotate a surviving page by identity
    pub fn rotate_identity(
        &mut self,
        id: PageId,
        direction: RotationDirection,
    ) -> Result<Rotation, PageEditError> {
        if self.model.position_of(id).is_none() {
            return Err(PageEditError::SourceUnavailable {
                identity: id.index(),
                page_count: self.document.page_count(),
            });
        }
        let rotation = self.rotations.rotate(id, direction);
        tracing::debug!("Rotated page {} to {} degrees", id, rotation.degrees());
        self.touch(SessionEvent::Rotated { id, rotation });
        Ok(rotation)
    }

    /// Drop every uncommitted edit
    pub fn reset(&mut self) {
        self.model.reset(&self.original_order);
        self.rotations.clear();
        tracing::debug!("Reset edits on {}", self.document.path().display());
        self.touch(SessionEvent::Reset);
    }

    /// Write the edited document and switch the session over to it.
    ///
    /// On failure the session is left exactly as it was and the error comes
    /// back wrapped in [`PageEditError::Recoverable`].
    pub fn apply(&mut self, provenance: &mut MergeProvenance) -> Result<PathBuf, PageEditError> {
        if !self.is_dirty() {
            return Err(PageEditError::NotDirty);
        }

        let written = provenance
            .allocate_path(&self.origin.stem(), "edited")
            .and_then(|path| {
                let document = reconstruct::materialize(
                    &self.document,
                    self.model.order(),
                    &self.rotations,
                    &path,
                    provenance.compress(),
                )?;
                Ok((path, document))
            });
        let (path, document) = match written {
            Ok(written) => written,
            Err(e) => {
                tracing::warn!("Apply failed for {}: {}", self.document.path().display(), e);
                return Err(PageEditError::Recoverable(Box::new(e)));
            }
        };

        let page_count = document.page_count();
        self.document = document;
        self.model = OrderModel::new(page_count);
        self.original_order = self.model.order().to_vec();
        self.rotations.clear();

        if let SessionOrigin::File(source) = &self.origin {
            provenance.record(source.clone(), path.clone());
        }

        tracing::info!("Applied edits: {} pages now in {}", page_count, path.display());
        self.touch(SessionEvent::Applied {
            path: path.clone(),
            page_count,
        });
        Ok(path)
    }

    /// Register a crop drawn on the thumbnail of the page at `position`.
    ///
    /// The thumbnail shows the page with its own /Rotate plus any pending
    /// rotation; the selection is mapped back to unrotated page space.
    pub fn add_crop(
        &mut self,
        position: usize,
        selection: UiRect,
        thumbnail: ThumbnailSize,
        min_pixels: f64,
    ) -> Result<CropId, PageEditError> {
        let id = self.model.identity_at(position)?;
        let pending = self.rotations.get(id);
        let shown = self.document.page_rotation(id)?.add(pending);
        let geometry = self.document.page_geometry(id)?;

        let displayed = crop::to_document_rect(
            selection,
            thumbnail,
            geometry.rotated(shown.degrees()),
            min_pixels,
        )?;
        let rect = displayed.to_unrotated(geometry, shown);
        Ok(self
            .crops
            .add_rotated(id, rect, pending, self.document.path()))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            revision: self.revision,
            order: self.model.order().to_vec(),
            deleted: self.model.deleted().clone(),
            rotations: self.rotations.clone(),
        }
    }

    pub fn is_stale(&self, snapshot: &SessionSnapshot) -> bool {
        snapshot.revision != self.revision
    }

    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    pub fn summary(&self) -> EditSummary {
        let surviving: BTreeSet<PageId> = self.model.order().iter().copied().collect();
        let original_survivors: Vec<PageId> = self
            .original_order
            .iter()
            .copied()
            .filter(|id| surviving.contains(id))
            .collect();
        EditSummary {
            surviving: self.model.len(),
            deleted: self.model.deleted().len(),
            rotated: self.rotations.len(),
            reordered: self.model.order() != original_survivors.as_slice(),
        }
    }

    fn touch(&mut self, event: SessionEvent) {
        self.revision += 1;
        for listener in &self.listeners {
            listener(&event);
        }
    }
}

impl fmt::Debug for EditSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditSession")
            .field("origin", &self.origin)
            .field("document", &self.document.path())
            .field("model", &self.model)
            .field("rotations", &self.rotations)
            .field("revision", &self.revision)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

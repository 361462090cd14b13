//! Page-level PDF editing
//!
//! This crate models an edit session over a PDF: pages can be deleted,
//! moved and rotated in memory, then applied in one step that writes a new
//! document with lopdf. Applied documents are tracked so that a later merge
//! of the same source picks up the edited pages.
//!
//! - [`EditSession`]: the edit state of one open document
//! - [`Workspace`]: open sessions plus provenance, keyed by path
//! - [`ranges::parse`]: range text like `"1-3, 5, 8-"`
//! - [`crop`]: thumbnail selections mapped to page space and exported

pub mod backend;
pub mod config;
pub mod crop;
pub mod error;
pub mod order;
pub mod provenance;
pub mod ranges;
pub mod reconstruct;
pub mod rotation;
pub mod session;
pub mod split;
pub mod types;
pub mod workspace;

pub use backend::{DocumentBuilder, SourceDocument};
pub use config::EditorConfig;
pub use crop::{CropId, CropRegion, CropSet, DocRect, ThumbnailSize, UiRect};
pub use error::{ErrorKind, PageEditError};
pub use order::OrderModel;
pub use provenance::{MergeOrder, MergeProvenance};
pub use rotation::{Rotation, RotationDirection, RotationTracker};
pub use session::{EditSession, EditSummary, SessionEvent, SessionOrigin, SessionSnapshot};
pub use split::{export_ranges, split_ranges, PageRange, RangeId, RangeSet};
pub use types::{PageGeometry, PageId};
pub use workspace::Workspace;

/// Open a PDF and return its page count
pub fn get_page_count(path: impl AsRef<std::path::Path>) -> Result<usize, PageEditError> {
    Ok(SourceDocument::open(path)?.page_count())
}

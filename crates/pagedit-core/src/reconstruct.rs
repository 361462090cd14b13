//! Rebuild a document from an edit state
//!
//! Pages are taken from the source by original index, in the order given,
//! with their rotation applied as a page attribute. Deleted pages are simply
//! never appended.

use crate::backend::{DocumentBuilder, SourceDocument};
use crate::error::PageEditError;
use crate::rotation::RotationTracker;
use crate::types::PageId;
use std::path::Path;

/// Assemble the pages of `order` from `source`.
pub fn build(
    source: &SourceDocument,
    order: &[PageId],
    rotations: &RotationTracker,
) -> Result<DocumentBuilder, PageEditError> {
    if order.is_empty() {
        return Err(PageEditError::EmptyOutput);
    }

    let mut builder = DocumentBuilder::new();
    for &id in order {
        // Identities can come from a stale snapshot; the backend check in
        // append_page reports them as SourceUnavailable
        builder.append_page(source, id, rotations.get(id))?;
    }

    debug_assert_eq!(builder.page_count(), order.len());
    Ok(builder)
}

/// Build and persist to `path`, returning a handle on the written document.
pub fn materialize(
    source: &SourceDocument,
    order: &[PageId],
    rotations: &RotationTracker,
    path: &Path,
    compress: bool,
) -> Result<SourceDocument, PageEditError> {
    let builder = build(source, order, rotations)?;
    let document = builder.save(path, compress)?;

    tracing::info!(
        "Materialized {} pages from {} into {}",
        order.len(),
        source.path().display(),
        path.display()
    );
    Ok(SourceDocument::from_document(path, document))
}

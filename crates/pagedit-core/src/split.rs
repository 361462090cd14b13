//! Split export
//!
//! Writes one document per range segment, taking pages from the session's
//! current order with their rotations applied. The session itself is not
//! touched.
//!
//! [`RangeSet`] collects ranges across several documents for one export;
//! each entry remembers the document it was picked from.

use crate::backend::SourceDocument;
use crate::error::PageEditError;
use crate::ranges;
use crate::reconstruct;
use crate::rotation::RotationTracker;
use crate::session::EditSession;
use crate::types::PageId;
use crate::workspace::Workspace;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

/// `{stem}_page_{n}.pdf` for one page, `{stem}_pages_{a}-{b}.pdf` otherwise
pub fn segment_file_name(stem: &str, segment: &RangeInclusive<usize>) -> String {
    if segment.start() == segment.end() {
        format!("{}_page_{}.pdf", stem, segment.start())
    } else {
        format!("{}_pages_{}-{}.pdf", stem, segment.start(), segment.end())
    }
}

/// Split the session's current order by range text (`"1-3,5"`).
///
/// Every segment is validated before any file is written. Returns the
/// written paths in segment order.
pub fn split_ranges(
    session: &EditSession,
    text: &str,
    out_dir: &Path,
    stem: &str,
    compress: bool,
) -> Result<Vec<PathBuf>, PageEditError> {
    let segments = ranges::parse_segments(text, session.page_count())?;
    if segments.is_empty() {
        return Err(PageEditError::EmptyOutput);
    }

    let mut written = Vec::with_capacity(segments.len());
    for segment in &segments {
        let order = &session.order()[segment.start() - 1..*segment.end()];
        let path = out_dir.join(segment_file_name(stem, segment));
        reconstruct::materialize(session.document(), order, session.rotations(), &path, compress)?;
        written.push(path);
    }

    tracing::info!(
        "Split {} into {} documents",
        session.document().path().display(),
        written.len()
    );
    Ok(written)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RangeId(String);

impl RangeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusive range of 1-based positions in one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub id: RangeId,
    pub start: usize,
    pub end: usize,
    pub source_path: PathBuf,
}

impl PageRange {
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn segment(&self) -> RangeInclusive<usize> {
        self.start..=self.end
    }
}

/// Page ranges picked for export, in selection order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RangeSet {
    next_id: u64,
    entries: Vec<PageRange>,
}

impl RangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `start..=end` of the document at `source_path`. Reversed bounds
    /// are swapped; position 0 is rejected. Upper bounds are checked on
    /// export, against the document as it is then.
    pub fn add(
        &mut self,
        start: usize,
        end: usize,
        source_path: impl Into<PathBuf>,
    ) -> Result<RangeId, PageEditError> {
        let (start, end) = if start > end { (end, start) } else { (start, end) };
        if start == 0 {
            return Err(PageEditError::Range {
                position: 0,
                page_count: end,
            });
        }
        self.next_id += 1;
        let id = RangeId(format!("range_{}", self.next_id));
        self.entries.push(PageRange {
            id: id.clone(),
            start,
            end,
            source_path: source_path.into(),
        });
        Ok(id)
    }

    pub fn remove(&mut self, id: &RangeId) -> Result<PageRange, PageEditError> {
        let pos = self
            .entries
            .iter()
            .position(|entry| &entry.id == id)
            .ok_or_else(|| PageEditError::UnknownRange(id.to_string()))?;
        Ok(self.entries.remove(pos))
    }

    /// Remove every range and restart numbering at `range_1`
    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_id = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageRange> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pages covered by all ranges together
    pub fn total_pages(&self) -> usize {
        self.entries.iter().map(PageRange::len).sum()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

/// Write one document per entry of `ranges` into `out_dir`.
///
/// An entry whose document is open in `workspace` takes pages from that
/// session's current order, rotations included. Other entries read the
/// latest materialization recorded for their path. Every entry is checked
/// before any file is written.
pub fn export_ranges(
    workspace: &Workspace,
    ranges: &RangeSet,
    out_dir: &Path,
    compress: bool,
) -> Result<Vec<PathBuf>, PageEditError> {
    if ranges.is_empty() {
        return Err(PageEditError::EmptyOutput);
    }

    let mut opened: HashMap<&Path, SourceDocument> = HashMap::new();
    for entry in ranges.iter() {
        let path = entry.source_path.as_path();
        if workspace.session(path).is_none() && !opened.contains_key(path) {
            let document = SourceDocument::open(workspace.provenance().resolve(path))?;
            opened.insert(path, document);
        }
    }

    let unrotated = RotationTracker::new();
    let mut jobs = Vec::with_capacity(ranges.len());
    for entry in ranges.iter() {
        let path = entry.source_path.as_path();
        let (document, order, rotations) = match workspace.session(path) {
            Some(session) => (session.document(), session.order().to_vec(), session.rotations()),
            None => {
                let document = &opened[path];
                let order: Vec<PageId> = (0..document.page_count()).map(PageId).collect();
                (document, order, &unrotated)
            }
        };
        if entry.end > order.len() {
            return Err(PageEditError::Range {
                position: entry.end,
                page_count: order.len(),
            });
        }
        let pages = order[entry.start - 1..entry.end].to_vec();
        let output = out_dir.join(segment_file_name(&file_stem(path), &entry.segment()));
        jobs.push((document, pages, rotations, output));
    }

    let mut written = Vec::with_capacity(jobs.len());
    for (document, pages, rotations, output) in jobs {
        reconstruct::materialize(document, &pages, rotations, &output, compress)?;
        written.push(output);
    }

    tracing::info!(
        "Exported {} page ranges to {}",
        written.len(),
        out_dir.display()
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::tests::{page_labels, page_rotations, source};
    use crate::config::{EditorConfig, MaterializeConfig};
    use crate::error::ErrorKind;
    use crate::rotation::RotationDirection;
    use crate::session::tests::Scratch;
    use crate::session::SessionOrigin;
    use lopdf::Document;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn session(pages: u32) -> EditSession {
        EditSession::new(SessionOrigin::File("doc.pdf".into()), source(pages, "Doc"))
    }

    #[test]
    fn test_segment_file_names() {
        assert_eq!(segment_file_name("doc", &(3..=3)), "doc_page_3.pdf");
        assert_eq!(segment_file_name("doc", &(2..=5)), "doc_pages_2-5.pdf");
    }

    #[test]
    fn test_split_follows_current_order() {
        let scratch = Scratch::new("split");
        let mut session = session(5);
        session.delete(2).unwrap();
        session.reorder(4, 1).unwrap();
        session.rotate(1, RotationDirection::Clockwise).unwrap();
        let before = session.snapshot();

        // Current order: Page-5, Page-1, Page-3, Page-4
        let written = split_ranges(&session, "1-2,4", &scratch.dir, "doc", false).unwrap();
        assert_eq!(
            written,
            vec![scratch.dir.join("doc_pages_1-2.pdf"), scratch.dir.join("doc_page_4.pdf")]
        );

        let first = Document::load(&written[0]).unwrap();
        assert_eq!(page_labels(&first), vec!["Doc-Page-5", "Doc-Page-1"]);
        assert_eq!(page_rotations(&first), vec![90, 0]);
        let second = Document::load(&written[1]).unwrap();
        assert_eq!(page_labels(&second), vec!["Doc-Page-4"]);

        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn test_range_set_ids_and_removal() {
        let mut ranges = RangeSet::new();
        let first = ranges.add(1, 3, "a.pdf").unwrap();
        let second = ranges.add(5, 4, "b.pdf").unwrap();
        assert_eq!(first.as_str(), "range_1");
        assert_eq!(ranges.iter().nth(1).unwrap().segment(), 4..=5);
        assert_eq!(ranges.total_pages(), 5);

        assert_eq!(ranges.add(0, 2, "a.pdf").unwrap_err().kind(), ErrorKind::Range);
        assert_eq!(ranges.len(), 2);

        assert_eq!(ranges.remove(&second).unwrap().source_path, PathBuf::from("b.pdf"));
        assert_eq!(ranges.remove(&second).unwrap_err().kind(), ErrorKind::UnknownRange);

        ranges.clear();
        assert!(ranges.is_empty());
        assert_eq!(ranges.add(2, 2, "a.pdf").unwrap().as_str(), "range_1");

        let restored = RangeSet::from_json(&ranges.to_json().unwrap()).unwrap();
        assert_eq!(restored.iter().collect::<Vec<_>>(), ranges.iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_export_ranges_across_documents() {
        let scratch = Scratch::new("export-ranges");
        let a = scratch.write_pdf("alpha.pdf", 4, "A");
        let b = scratch.write_pdf("beta.pdf", 3, "B");
        let out = scratch.dir.join("out");
        fs::create_dir_all(&out).unwrap();

        let mut ws = Workspace::new(EditorConfig {
            materialize: MaterializeConfig {
                temp_dir: Some(scratch.dir.join("tmp")),
                compress: false,
                ..MaterializeConfig::default()
            },
            ..EditorConfig::default()
        });
        // alpha is open with a pending move and rotation; beta is not open
        let session = ws.open(&a).unwrap();
        session.reorder(4, 1).unwrap();
        session.rotate(1, RotationDirection::Clockwise).unwrap();

        let mut ranges = RangeSet::new();
        ranges.add(1, 2, &a).unwrap();
        ranges.add(3, 3, &b).unwrap();
        let written = export_ranges(&ws, &ranges, &out, false).unwrap();
        assert_eq!(
            written,
            vec![out.join("alpha_pages_1-2.pdf"), out.join("beta_page_3.pdf")]
        );

        let first = Document::load(&written[0]).unwrap();
        assert_eq!(page_labels(&first), vec!["A-Page-4", "A-Page-1"]);
        assert_eq!(page_rotations(&first), vec![90, 0]);
        let second = Document::load(&written[1]).unwrap();
        assert_eq!(page_labels(&second), vec!["B-Page-3"]);
    }

    #[test]
    fn test_export_ranges_uses_applied_edits_of_closed_documents() {
        let scratch = Scratch::new("export-applied");
        let a = scratch.write_pdf("alpha.pdf", 3, "A");
        let out = scratch.dir.join("out");
        fs::create_dir_all(&out).unwrap();

        let mut ws = Workspace::new(EditorConfig {
            materialize: MaterializeConfig {
                temp_dir: Some(scratch.dir.join("tmp")),
                compress: false,
                ..MaterializeConfig::default()
            },
            ..EditorConfig::default()
        });
        ws.open(&a).unwrap().delete(1).unwrap();
        ws.apply(&a).unwrap();
        ws.close(&a);

        let mut ranges = RangeSet::new();
        ranges.add(1, 2, &a).unwrap();
        let written = export_ranges(&ws, &ranges, &out, false).unwrap();
        let doc = Document::load(&written[0]).unwrap();
        assert_eq!(page_labels(&doc), vec!["A-Page-2", "A-Page-3"]);

        // Only two pages remain, so page 3 is out of range and nothing is written
        ranges.add(3, 3, &a).unwrap();
        fs::remove_file(&written[0]).unwrap();
        let err = export_ranges(&ws, &ranges, &out, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        assert!(!written[0].exists());

        assert_eq!(
            export_ranges(&ws, &RangeSet::new(), &out, false).unwrap_err().kind(),
            ErrorKind::EmptyOutput
        );
    }

    #[test]
    fn test_split_validates_before_writing() {
        let scratch = Scratch::new("split-invalid");
        let session = session(3);
        let err = split_ranges(&session, "1,7", &scratch.dir, "doc", false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        assert!(!scratch.dir.join("doc_page_1.pdf").exists());

        let err = split_ranges(&session, "", &scratch.dir, "doc", false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyOutput);
    }
}

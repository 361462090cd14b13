//! Merge provenance
//!
//! Applying edits writes a new temporary document. The record kept here
//! maps each logical source path to the latest document materialized for
//! it, so a later merge (or reopen) picks up the edited pages rather than
//! the file the user originally chose.

use crate::backend::{DocumentBuilder, SourceDocument};
use crate::config::MaterializeConfig;
use crate::error::PageEditError;
use crate::rotation::Rotation;
use crate::session::{EditSession, SessionOrigin};
use crate::types::PageId;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeOrder {
    #[default]
    AThenB,
    BThenA,
}

#[derive(Debug, Clone, Default)]
pub struct MergeProvenance {
    records: HashMap<PathBuf, PathBuf>,
    settings: MaterializeConfig,
}

impl MergeProvenance {
    pub fn new(settings: MaterializeConfig) -> Self {
        Self {
            records: HashMap::new(),
            settings,
        }
    }

    /// Latest materialization of `source`, or `source` itself
    pub fn resolve(&self, source: &Path) -> PathBuf {
        self.records
            .get(source)
            .cloned()
            .unwrap_or_else(|| source.to_path_buf())
    }

    /// Point `source` at a new materialization; the latest record wins
    pub fn record(&mut self, source: PathBuf, materialized: PathBuf) {
        tracing::debug!(
            "Provenance: {} -> {}",
            source.display(),
            materialized.display()
        );
        self.records.insert(source, materialized);
    }

    pub fn records(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.records
            .iter()
            .map(|(source, materialized)| (source.as_path(), materialized.as_path()))
    }

    pub fn compress(&self) -> bool {
        self.settings.compress
    }

    /// Fresh path `{temp_dir}/{prefix}{stem}_{tag}_{uuid}.pdf`. The
    /// directory is created if missing.
    pub fn allocate_path(&self, stem: &str, tag: &str) -> Result<PathBuf, PageEditError> {
        let dir = self.settings.resolved_temp_dir();
        fs::create_dir_all(&dir).map_err(|e| PageEditError::write(&dir, e))?;
        Ok(dir.join(format!(
            "{}{}_{}_{}.pdf",
            self.settings.file_prefix,
            stem,
            tag,
            Uuid::new_v4()
        )))
    }

    /// Concatenate the latest versions of `a` and `b` into a new temporary
    /// document and open a session over it.
    ///
    /// Uncommitted edits in open sessions are not included; only what has
    /// been applied is.
    pub fn merge(&self, a: &Path, b: &Path, order: MergeOrder) -> Result<EditSession, PageEditError> {
        let (first, second) = match order {
            MergeOrder::AThenB => (a, b),
            MergeOrder::BThenA => (b, a),
        };

        let first_doc = SourceDocument::open(self.resolve(first))?;
        let second_doc = SourceDocument::open(self.resolve(second))?;

        let mut builder = DocumentBuilder::new();
        for source in [&first_doc, &second_doc] {
            for index in 0..source.page_count() {
                builder.append_page(source, PageId(index), Rotation::None)?;
            }
        }

        let origin = SessionOrigin::Merge {
            first: first.to_path_buf(),
            second: second.to_path_buf(),
        };
        let path = self.allocate_path(&origin.stem(), "merged")?;
        let document = builder.save(&path, self.settings.compress)?;

        tracing::info!(
            "Merged {} ({} pages) and {} ({} pages) into {}",
            first.display(),
            first_doc.page_count(),
            second.display(),
            second_doc.page_count(),
            path.display()
        );
        Ok(EditSession::new(origin, SourceDocument::from_document(path, document)))
    }
}

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageEditError {
    #[error("Invalid range token: '{token}'")]
    Format { token: String },

    #[error("Position {position} is out of range (1-{page_count})")]
    Range { position: usize, page_count: usize },

    #[error("Crop too small: {width:.0}x{height:.0} pixels (minimum {min:.0}x{min:.0})")]
    TooSmall { width: f64, height: f64, min: f64 },

    #[error("Invalid page position {position} (document order has {len} pages)")]
    Index { position: usize, len: usize },

    #[error("Source document cannot supply page {identity} (document has {page_count} pages)")]
    SourceUnavailable { identity: usize, page_count: usize },

    #[error("Failed to open {}: {reason}", .path.display())]
    Open { path: PathBuf, reason: String },

    #[error("Failed to write {}: {reason}", .path.display())]
    Write { path: PathBuf, reason: String },

    #[error("Apply failed, session left unchanged: {0}")]
    Recoverable(Box<PageEditError>),

    #[error("Nothing to apply: session has no pending edits")]
    NotDirty,

    #[error("Cannot materialize a document with no pages")]
    EmptyOutput,

    #[error("Invalid rotation: {0} degrees")]
    InvalidRotation(i64),

    #[error("No crop region with id '{0}'")]
    UnknownCrop(String),

    #[error("No page range with id '{0}'")]
    UnknownRange(String),

    #[error("No open session for {}", .0.display())]
    NoSession(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Fieldless discriminant of [`PageEditError`], for callers that branch on
/// the kind of failure rather than its details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Format,
    Range,
    TooSmall,
    Index,
    SourceUnavailable,
    Open,
    Write,
    Recoverable,
    NotDirty,
    EmptyOutput,
    InvalidRotation,
    UnknownCrop,
    UnknownRange,
    NoSession,
    Config,
}

impl PageEditError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PageEditError::Format { .. } => ErrorKind::Format,
            PageEditError::Range { .. } => ErrorKind::Range,
            PageEditError::TooSmall { .. } => ErrorKind::TooSmall,
            PageEditError::Index { .. } => ErrorKind::Index,
            PageEditError::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            PageEditError::Open { .. } => ErrorKind::Open,
            PageEditError::Write { .. } => ErrorKind::Write,
            PageEditError::Recoverable(_) => ErrorKind::Recoverable,
            PageEditError::NotDirty => ErrorKind::NotDirty,
            PageEditError::EmptyOutput => ErrorKind::EmptyOutput,
            PageEditError::InvalidRotation(_) => ErrorKind::InvalidRotation,
            PageEditError::UnknownCrop(_) => ErrorKind::UnknownCrop,
            PageEditError::UnknownRange(_) => ErrorKind::UnknownRange,
            PageEditError::NoSession(_) => ErrorKind::NoSession,
            PageEditError::Config(_) => ErrorKind::Config,
        }
    }

    /// The underlying failure of a [`PageEditError::Recoverable`], or `self`.
    pub fn root_cause(&self) -> &PageEditError {
        match self {
            PageEditError::Recoverable(inner) => inner.root_cause(),
            other => other,
        }
    }

    pub(crate) fn open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PageEditError::Open {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PageEditError::Write {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

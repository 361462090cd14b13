//! Small value types shared across the edit model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle for one page of a source document: its 0-based original
/// index. Identities never change while a session lives, whatever the
/// current display order is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub usize);

impl PageId {
    pub fn index(self) -> usize {
        self.0
    }

    /// 1-based page number in the source document
    pub fn page_number(self) -> usize {
        self.0 + 1
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<usize> for PageId {
    fn from(index: usize) -> Self {
        PageId(index)
    }
}

/// Page size in PDF points (1/72 inch)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
}

impl PageGeometry {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn letter() -> Self {
        Self::new(612.0, 792.0)
    }

    /// Geometry as displayed once `degrees` of rotation are applied.
    pub fn rotated(self, degrees: u16) -> Self {
        if degrees % 180 == 90 {
            Self::new(self.height, self.width)
        } else {
            self
        }
    }
}

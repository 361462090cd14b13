//! Crop selection
//!
//! A crop is dragged on a page thumbnail in pixel space and stored in
//! document units. Document rectangles use a top-left origin, like the
//! thumbnail they were drawn on; [`DocRect::to_crop_box`] converts them to
//! PDF user space (bottom-left origin) when a crop is exported.

use crate::backend::{DocumentBuilder, SourceDocument};
use crate::error::PageEditError;
use crate::rotation::Rotation;
use crate::types::{PageGeometry, PageId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Selection rectangle in thumbnail pixels. The corners may come in any
/// order, since a drag can start from any corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UiRect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl UiRect {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

/// Rendered thumbnail size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailSize {
    pub width: f64,
    pub height: f64,
}

impl ThumbnailSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Normalized rectangle in document units (`x1 <= x2`, `y1 <= y2`),
/// top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocRect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl DocRect {
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// PDF CropBox `[llx, lly, urx, ury]` for a page with the given MediaBox
    pub fn to_crop_box(&self, media_box: [f64; 4]) -> [f64; 4] {
        let left = media_box[0].min(media_box[2]);
        let top = media_box[1].max(media_box[3]);
        [
            left + self.x1,
            top - self.y2,
            left + self.x2,
            top - self.y1,
        ]
    }

    /// Map a rectangle measured on the page as displayed, turned clockwise
    /// by `rotation`, back onto the unrotated page of size `page`.
    pub fn to_unrotated(&self, page: PageGeometry, rotation: Rotation) -> DocRect {
        let (w, h) = (page.width, page.height);
        let corner = |u: f64, v: f64| match rotation {
            Rotation::None => (u, v),
            Rotation::Quarter => (v, h - u),
            Rotation::Half => (w - u, h - v),
            Rotation::ThreeQuarter => (w - v, u),
        };
        let (ax, ay) = corner(self.x1, self.y1);
        let (bx, by) = corner(self.x2, self.y2);
        DocRect {
            x1: ax.min(bx),
            y1: ay.min(by),
            x2: ax.max(bx),
            y2: ay.max(by),
        }
    }
}

/// Map a thumbnail selection onto the page it was drawn on.
///
/// `page` is the geometry as shown on the thumbnail. Fails with `TooSmall`
/// if either side of the selection is shorter than `min_pixels`, if the
/// thumbnail has no area, or if any coordinate is not a finite number.
pub fn to_document_rect(
    selection: UiRect,
    thumbnail: ThumbnailSize,
    page: PageGeometry,
    min_pixels: f64,
) -> Result<DocRect, PageEditError> {
    let width = (selection.x2 - selection.x1).abs();
    let height = (selection.y2 - selection.y1).abs();
    let finite = [
        selection.x1,
        selection.y1,
        selection.x2,
        selection.y2,
        thumbnail.width,
        thumbnail.height,
    ]
    .iter()
    .all(|v| v.is_finite());
    if !finite || width < min_pixels || height < min_pixels {
        return Err(PageEditError::TooSmall {
            width,
            height,
            min: min_pixels,
        });
    }
    if thumbnail.width <= 0.0 || thumbnail.height <= 0.0 {
        return Err(PageEditError::TooSmall {
            width: thumbnail.width,
            height: thumbnail.height,
            min: min_pixels,
        });
    }

    let (x1, x2) = (selection.x1.min(selection.x2), selection.x1.max(selection.x2));
    let (y1, y2) = (selection.y1.min(selection.y2), selection.y1.max(selection.y2));

    Ok(DocRect {
        x1: x1 / thumbnail.width * page.width,
        y1: y1 / thumbnail.height * page.height,
        x2: x2 / thumbnail.width * page.width,
        y2: y2 / thumbnail.height * page.height,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CropId(String);

impl CropId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CropId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CropId {
    fn from(id: &str) -> Self {
        CropId(id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropRegion {
    pub id: CropId,
    /// Page identity within the document at `source_path`
    pub page: PageId,
    /// Unrotated page space, top-left origin
    pub rect: DocRect,
    /// Extra turn applied to the exported page, on top of its own /Rotate
    #[serde(default)]
    pub rotation: Rotation,
    pub source_path: PathBuf,
}

/// Crop regions in creation order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CropSet {
    next_id: u64,
    regions: Vec<CropRegion>,
}

impl CropSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, page: PageId, rect: DocRect, source_path: impl Into<PathBuf>) -> CropId {
        self.add_rotated(page, rect, Rotation::None, source_path)
    }

    /// Add a region whose export keeps a pending page rotation
    pub fn add_rotated(
        &mut self,
        page: PageId,
        rect: DocRect,
        rotation: Rotation,
        source_path: impl Into<PathBuf>,
    ) -> CropId {
        self.next_id += 1;
        let id = CropId(format!("crop_{}", self.next_id));
        self.regions.push(CropRegion {
            id: id.clone(),
            page,
            rect,
            rotation,
            source_path: source_path.into(),
        });
        id
    }

    pub fn remove(&mut self, id: &CropId) -> Result<CropRegion, PageEditError> {
        let pos = self
            .regions
            .iter()
            .position(|region| &region.id == id)
            .ok_or_else(|| PageEditError::UnknownCrop(id.to_string()))?;
        Ok(self.regions.remove(pos))
    }

    /// Remove every region and restart numbering at `crop_1`
    pub fn clear(&mut self) {
        self.regions.clear();
        self.next_id = 0;
    }

    pub fn get(&self, id: &CropId) -> Option<&CropRegion> {
        self.regions.iter().find(|region| &region.id == id)
    }

    pub fn for_page(&self, page: PageId) -> Vec<&CropRegion> {
        self.regions
            .iter()
            .filter(|region| region.page == page)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CropRegion> {
        self.regions.iter()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// `{base}_page_{page_number}_crop_{index}.pdf`
pub fn crop_file_name(base: &str, page_number: usize, index: usize) -> String {
    format!("{}_page_{}_crop_{}.pdf", base, page_number, index)
}

/// Write a single-page document showing only the crop region of its page.
pub fn extract_crop(
    source: &SourceDocument,
    region: &CropRegion,
    output: &Path,
    compress: bool,
) -> Result<(), PageEditError> {
    let media_box = source.media_box(region.page)?;
    let mut builder = DocumentBuilder::new();
    builder.append_page(source, region.page, region.rotation)?;
    builder.set_crop_box(1, region.rect.to_crop_box(media_box))?;
    builder.save(output, compress)?;
    Ok(())
}

/// Export every region of `crops` into `out_dir`, opening each region's
/// source document once. Regions are numbered per page in creation order.
pub fn extract_all(
    crops: &CropSet,
    out_dir: &Path,
    base: &str,
    compress: bool,
) -> Result<Vec<PathBuf>, PageEditError> {
    let mut sources: HashMap<&Path, SourceDocument> = HashMap::new();
    let mut per_page: HashMap<(&Path, PageId), usize> = HashMap::new();
    let mut written = Vec::with_capacity(crops.len());

    for region in crops.iter() {
        let path = region.source_path.as_path();
        if !sources.contains_key(path) {
            sources.insert(path, SourceDocument::open(path)?);
        }
        let source = &sources[path];

        let index = per_page.entry((path, region.page)).or_insert(0);
        *index += 1;

        let output = out_dir.join(crop_file_name(base, region.page.page_number(), *index));
        extract_crop(source, region, &output, compress)?;
        written.push(output);
    }

    tracing::info!("Extracted {} crop regions to {}", written.len(), out_dir.display());
    Ok(written)
}

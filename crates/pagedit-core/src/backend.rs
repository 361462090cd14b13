//! Document backend on top of lopdf
//!
//! `SourceDocument` is a read-only handle on a parsed PDF. `DocumentBuilder`
//! assembles a new PDF by appending pages from one or more sources. The
//! builder imports every object of a source once, shifted by an id offset
//! so objects of different sources cannot collide, then re-parents the
//! appended pages under a single flat page tree. Objects no page reaches
//! any more (deleted pages, the sources' old catalogs) are pruned on finish.

use crate::error::PageEditError;
use crate::rotation::Rotation;
use crate::types::{PageGeometry, PageId};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Guard against cyclic /Parent chains in malformed files
const MAX_TREE_DEPTH: usize = 64;

/// A parsed, immutable source PDF
#[derive(Debug, Clone)]
pub struct SourceDocument {
    key: Uuid,
    path: PathBuf,
    document: Document,
    pages: Vec<ObjectId>,
}

impl SourceDocument {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PageEditError> {
        let path = path.as_ref();
        let document = Document::load(path).map_err(|e| PageEditError::open(path, e))?;
        let source = Self::from_document(path, document);
        tracing::debug!(
            "Opened {} ({} pages)",
            path.display(),
            source.page_count()
        );
        Ok(source)
    }

    /// Parse in-memory bytes; `path` only labels the document.
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: &[u8]) -> Result<Self, PageEditError> {
        let path = path.into();
        let document = Document::load_mem(bytes).map_err(|e| PageEditError::open(&path, e))?;
        Ok(Self::from_document(path, document))
    }

    pub fn from_document(path: impl Into<PathBuf>, document: Document) -> Self {
        let pages = document.get_pages().into_values().collect();
        Self {
            key: Uuid::new_v4(),
            path: path.into(),
            document,
            pages,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Size of a page from its (possibly inherited) MediaBox.
    /// Pages without a usable MediaBox report US Letter.
    pub fn page_geometry(&self, id: PageId) -> Result<PageGeometry, PageEditError> {
        let [x1, y1, x2, y2] = self.media_box(id)?;
        Ok(PageGeometry::new((x2 - x1).abs(), (y2 - y1).abs()))
    }

    /// MediaBox as `[x1, y1, x2, y2]` in PDF user space
    pub fn media_box(&self, id: PageId) -> Result<[f64; 4], PageEditError> {
        let page_id = self.page_object(id)?;
        Ok(inherited_attribute(&self.document, page_id, b"MediaBox")
            .and_then(|obj| parse_box_array(&self.document, obj))
            .unwrap_or([0.0, 0.0, 612.0, 792.0]))
    }

    /// Rotation the page already carries in the source file
    pub fn page_rotation(&self, id: PageId) -> Result<Rotation, PageEditError> {
        let page_id = self.page_object(id)?;
        Ok(inherited_attribute(&self.document, page_id, b"Rotate")
            .and_then(|obj| resolve(&self.document, obj).as_i64().ok())
            .and_then(|degrees| Rotation::from_degrees(degrees).ok())
            .unwrap_or_default())
    }

    pub(crate) fn page_object(&self, id: PageId) -> Result<ObjectId, PageEditError> {
        self.pages
            .get(id.index())
            .copied()
            .ok_or(PageEditError::SourceUnavailable {
                identity: id.index(),
                page_count: self.pages.len(),
            })
    }
}

/// Assembles a new PDF page by page
#[derive(Debug)]
pub struct DocumentBuilder {
    document: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
    offsets: HashMap<Uuid, u32>,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBuilder {
    pub fn new() -> Self {
        let mut document = Document::with_version("1.7");
        let pages_id = document.new_object_id();
        Self {
            document,
            pages_id,
            kids: Vec::new(),
            offsets: HashMap::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Append one page of `source`, turned by `rotation` on top of whatever
    /// rotation the page already has. The rotation is a page attribute; the
    /// content stream is untouched.
    pub fn append_page(
        &mut self,
        source: &SourceDocument,
        id: PageId,
        rotation: Rotation,
    ) -> Result<(), PageEditError> {
        let source_page = source.page_object(id)?;
        let base_rotation = source.page_rotation(id)?;
        let offset = self.import(source);

        // Values the page inherits in the source tree are lost once it is
        // re-parented, so copy them onto the page itself
        let inherited: Vec<(&[u8], Object)> = INHERITABLE
            .iter()
            .filter_map(|key| {
                inherited_attribute(&source.document, source_page, key)
                    .map(|obj| (*key, remap_object_refs(obj.clone(), offset)))
            })
            .collect();

        let mut page_id = (source_page.0 + offset, source_page.1);
        if self.kids.contains(&page_id) {
            // Same page appended twice: each occurrence needs its own object
            let copy = self
                .document
                .objects
                .get(&page_id)
                .cloned()
                .ok_or(PageEditError::SourceUnavailable {
                    identity: id.index(),
                    page_count: source.page_count(),
                })?;
            page_id = self.document.add_object(copy);
        }

        let page = self
            .document
            .objects
            .get_mut(&page_id)
            .and_then(|obj| obj.as_dict_mut().ok())
            .ok_or(PageEditError::SourceUnavailable {
                identity: id.index(),
                page_count: source.page_count(),
            })?;

        for (key, value) in inherited {
            page.set(key, value);
        }
        page.set("Parent", Object::Reference(self.pages_id));

        let total = base_rotation.add(rotation);
        if total.is_none() {
            page.remove(b"Rotate");
        } else {
            page.set("Rotate", Object::Integer(i64::from(total.degrees())));
        }

        self.kids.push(page_id);
        Ok(())
    }

    /// Set the CropBox of an already appended page (1-based position)
    pub fn set_crop_box(&mut self, position: usize, crop_box: [f64; 4]) -> Result<(), PageEditError> {
        let page_id = position
            .checked_sub(1)
            .and_then(|i| self.kids.get(i))
            .copied()
            .ok_or(PageEditError::Index {
                position,
                len: self.kids.len(),
            })?;
        if let Some(Object::Dictionary(page)) = self.document.objects.get_mut(&page_id) {
            page.set(
                "CropBox",
                Object::Array(crop_box.iter().map(|v| Object::Real(*v as f32)).collect()),
            );
        }
        Ok(())
    }

    /// Close the page tree and drop everything no page needs
    pub fn finish(mut self, compress: bool) -> Document {
        let pages = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(self.kids.len() as i64)),
            (
                "Kids",
                Object::Array(self.kids.iter().map(|id| Object::Reference(*id)).collect()),
            ),
        ]);
        self.document
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let catalog = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(self.pages_id)),
        ]);
        let catalog_id = self.document.add_object(catalog);
        self.document
            .trailer
            .set("Root", Object::Reference(catalog_id));

        self.document.prune_objects();
        self.document.renumber_objects();
        if compress {
            self.document.compress();
        }
        self.document
    }

    /// Finish and serialize to memory
    pub fn to_bytes(self, compress: bool) -> Result<Vec<u8>, PageEditError> {
        let mut document = self.finish(compress);
        let mut buffer = Vec::new();
        document
            .save_to(&mut buffer)
            .map_err(|e| PageEditError::write("<memory>", e))?;
        Ok(buffer)
    }

    /// Finish and write to `path`. The bytes go to a sibling `.partial`
    /// file first and are renamed into place, so `path` never holds a
    /// half-written document.
    pub fn save(self, path: &Path, compress: bool) -> Result<Document, PageEditError> {
        let mut document = self.finish(compress);
        let mut buffer = Vec::new();
        document
            .save_to(&mut buffer)
            .map_err(|e| PageEditError::write(path, e))?;

        let partial = partial_path(path);
        if let Err(e) = fs::write(&partial, &buffer) {
            let _ = fs::remove_file(&partial);
            return Err(PageEditError::write(path, e));
        }
        if let Err(e) = fs::rename(&partial, path) {
            let _ = fs::remove_file(&partial);
            return Err(PageEditError::write(path, e));
        }

        tracing::debug!(
            "Wrote {} ({} bytes, {} pages)",
            path.display(),
            buffer.len(),
            document.get_pages().len()
        );
        Ok(document)
    }

    /// Copy all objects of `source` into the builder once; returns the id
    /// offset applied to them.
    fn import(&mut self, source: &SourceDocument) -> u32 {
        if let Some(offset) = self.offsets.get(&source.key) {
            return *offset;
        }

        let offset = self.document.max_id;
        for (id, object) in source.document.objects.iter() {
            self.document
                .objects
                .insert((id.0 + offset, id.1), remap_object_refs(object.clone(), offset));
        }
        self.document.max_id = (source.document.max_id + offset).max(self.document.max_id);
        self.offsets.insert(source.key, offset);
        offset
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Recursively remap object references in an object
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// Look up `key` on a page, walking up the /Parent chain if the page does
/// not define it itself.
fn inherited_attribute<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.objects.get(&page_id)?.as_dict().ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        let parent_id = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.objects.get(&parent_id)?.as_dict().ok()?;
    }
    None
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.objects.get(id).unwrap_or(obj),
        other => other,
    }
}

/// Parse a box array [x1, y1, x2, y2]
fn parse_box_array(doc: &Document, obj: &Object) -> Option<[f64; 4]> {
    let array = resolve(doc, obj).as_array().ok()?;
    if array.len() != 4 {
        return None;
    }

    let mut result = [0.0; 4];
    for (i, obj) in array.iter().enumerate() {
        result[i] = match resolve(doc, obj) {
            Object::Integer(n) => *n as f64,
            Object::Real(n) => *n as f64,
            _ => return None,
        };
    }
    Some(result)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::{content::Content, content::Operation, Stream};

    /// Create a PDF whose pages carry "<prefix>-Page-<n>" in their content
    /// stream, so tests can tell pages apart after reordering. Page `i` gets
    /// a MediaBox of `(612 + i) x 792`.
    pub(crate) fn create_test_pdf(num_pages: u32, content_prefix: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let mut page_ids = Vec::new();

        for i in 0..num_pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new(
                        "Tf",
                        vec![Object::Name(b"F1".to_vec()), Object::Integer(12)],
                    ),
                    Operation::new("Td", vec![Object::Integer(100), Object::Integer(700)]),
                    Operation::new(
                        "Tj",
                        vec![Object::String(
                            format!("{}-Page-{}", content_prefix, i + 1).into_bytes(),
                            lopdf::StringFormat::Literal,
                        )],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));

            let page = Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                (
                    "MediaBox",
                    Object::Array(vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(612 + i as i64),
                        Object::Integer(792),
                    ]),
                ),
                ("Contents", Object::Reference(content_id)),
            ]);
            let page_id = doc.add_object(page);
            page_ids.push(page_id);
        }

        let pages = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(num_pages as i64)),
            (
                "Kids",
                Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
            ),
        ]);
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]);
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    /// Content label ("<prefix>-Page-<n>") of every page, in page order
    pub(crate) fn page_labels(doc: &Document) -> Vec<String> {
        doc.get_pages()
            .into_values()
            .map(|page_id| {
                let content = doc.get_page_content(page_id).unwrap();
                let content = Content::decode(&content).unwrap();
                content
                    .operations
                    .iter()
                    .find(|op| op.operator == "Tj")
                    .and_then(|op| op.operands.first())
                    .and_then(|obj| obj.as_str().ok())
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                    .unwrap_or_default()
            })
            .collect()
    }

    /// Explicit /Rotate of every page, in page order
    pub(crate) fn page_rotations(doc: &Document) -> Vec<i64> {
        doc.get_pages()
            .into_values()
            .map(|page_id| {
                doc.get_dictionary(page_id)
                    .ok()
                    .and_then(|page| page.get(b"Rotate").ok())
                    .and_then(|obj| obj.as_i64().ok())
                    .unwrap_or(0)
            })
            .collect()
    }

    pub(crate) fn source(num_pages: u32, prefix: &str) -> SourceDocument {
        SourceDocument::from_bytes(
            format!("{prefix}.pdf"),
            &create_test_pdf(num_pages, prefix),
        )
        .unwrap()
    }

    #[test]
    fn test_open_reports_pages_and_geometry() {
        let doc = source(3, "Doc");
        assert_eq!(doc.page_count(), 3);
        assert_eq!(
            doc.page_geometry(PageId(2)).unwrap(),
            PageGeometry::new(614.0, 792.0)
        );
        assert_eq!(doc.page_rotation(PageId(0)).unwrap(), Rotation::None);
    }

    #[test]
    fn test_rejects_invalid_pdf() {
        let err = SourceDocument::from_bytes("bad.pdf", b"not a valid pdf").unwrap_err();
        assert!(matches!(err, PageEditError::Open { .. }));
    }

    #[test]
    fn test_missing_page_is_source_unavailable() {
        let doc = source(2, "Doc");
        match doc.page_geometry(PageId(5)).unwrap_err() {
            PageEditError::SourceUnavailable {
                identity,
                page_count,
            } => {
                assert_eq!(identity, 5);
                assert_eq!(page_count, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_builder_keeps_requested_pages_in_order() {
        let doc = source(4, "Doc");
        let mut builder = DocumentBuilder::new();
        builder.append_page(&doc, PageId(3), Rotation::None).unwrap();
        builder.append_page(&doc, PageId(1), Rotation::Quarter).unwrap();
        assert_eq!(builder.page_count(), 2);

        let bytes = builder.to_bytes(false).unwrap();
        let out = Document::load_mem(&bytes).unwrap();
        assert_eq!(page_labels(&out), vec!["Doc-Page-4", "Doc-Page-2"]);
        assert_eq!(page_rotations(&out), vec![0, 90]);
    }

    #[test]
    fn test_builder_concatenates_sources() {
        let a = source(2, "A");
        let b = source(1, "B");
        let mut builder = DocumentBuilder::new();
        for doc in [&b, &a] {
            for i in 0..doc.page_count() {
                builder.append_page(doc, PageId(i), Rotation::None).unwrap();
            }
        }
        let out = Document::load_mem(&builder.to_bytes(true).unwrap()).unwrap();
        assert_eq!(page_labels(&out), vec!["B-Page-1", "A-Page-1", "A-Page-2"]);
    }

    #[test]
    fn test_rotation_adds_to_existing_rotate() {
        let mut raw = Document::load_mem(&create_test_pdf(1, "Doc")).unwrap();
        let page_id = *raw.get_pages().get(&1).unwrap();
        raw.get_dictionary_mut(page_id)
            .unwrap()
            .set("Rotate", Object::Integer(270));
        let doc = SourceDocument::from_document("rotated.pdf", raw);
        assert_eq!(doc.page_rotation(PageId(0)).unwrap(), Rotation::ThreeQuarter);

        let mut builder = DocumentBuilder::new();
        builder.append_page(&doc, PageId(0), Rotation::Half).unwrap();
        let out = Document::load_mem(&builder.to_bytes(false).unwrap()).unwrap();
        assert_eq!(page_rotations(&out), vec![90]);
    }

    #[test]
    fn test_inherited_media_box_survives_reparenting() {
        let mut raw = Document::load_mem(&create_test_pdf(1, "Doc")).unwrap();
        let page_id = *raw.get_pages().get(&1).unwrap();
        let page = raw.get_dictionary_mut(page_id).unwrap();
        let parent = page.get(b"Parent").unwrap().as_reference().unwrap();
        page.remove(b"MediaBox");
        raw.get_dictionary_mut(parent).unwrap().set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(300),
                Object::Integer(400),
            ]),
        );
        let doc = SourceDocument::from_document("inherit.pdf", raw);
        assert_eq!(
            doc.page_geometry(PageId(0)).unwrap(),
            PageGeometry::new(300.0, 400.0)
        );

        let mut builder = DocumentBuilder::new();
        builder.append_page(&doc, PageId(0), Rotation::None).unwrap();
        let out = SourceDocument::from_document("out.pdf", builder.finish(false));
        assert_eq!(
            out.page_geometry(PageId(0)).unwrap(),
            PageGeometry::new(300.0, 400.0)
        );
    }

    #[test]
    fn test_same_page_twice_gets_distinct_objects() {
        let doc = source(1, "Doc");
        let mut builder = DocumentBuilder::new();
        builder.append_page(&doc, PageId(0), Rotation::None).unwrap();
        builder.append_page(&doc, PageId(0), Rotation::Half).unwrap();
        let out = Document::load_mem(&builder.to_bytes(false).unwrap()).unwrap();
        assert_eq!(page_labels(&out), vec!["Doc-Page-1", "Doc-Page-1"]);
        assert_eq!(page_rotations(&out), vec![0, 180]);
    }

    #[test]
    fn test_save_is_atomic_and_loadable() {
        let dir = std::env::temp_dir().join(format!("pagedit-backend-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("out.pdf");

        let doc = source(2, "Doc");
        let mut builder = DocumentBuilder::new();
        builder.append_page(&doc, PageId(1), Rotation::None).unwrap();
        builder.save(&path, true).unwrap();

        assert!(path.exists());
        assert!(!partial_path(&path).exists());
        let reopened = SourceDocument::open(&path).unwrap();
        assert_eq!(reopened.page_count(), 1);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_save_to_missing_directory_fails_with_write_error() {
        let path = std::env::temp_dir()
            .join(format!("pagedit-missing-{}", Uuid::new_v4()))
            .join("out.pdf");
        let doc = source(1, "Doc");
        let mut builder = DocumentBuilder::new();
        builder.append_page(&doc, PageId(0), Rotation::None).unwrap();
        let err = builder.save(&path, false).unwrap_err();
        assert!(matches!(err, PageEditError::Write { .. }));
    }
}

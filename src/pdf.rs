//! PDF access behind one capability interface: page count, page text,
//! per-policy sub-documents and password encryption. Implemented once on lopdf.
//! Also hosts the print merge of the no-email subset.

use crate::error::PdfError;
use lopdf::{Document, EncryptionState, EncryptionVersion, Object, ObjectId, Permissions, StringFormat};
use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Key length (bits) for RC4 password protection.
const KEY_LENGTH: usize = 128;

/// What the splitter needs from a loaded source PDF.
pub trait PdfSource {
    type Document: PolicyDocument;

    fn page_count(&self) -> usize;

    /// Plain text of a zero-based page.
    fn page_text(&self, index: usize) -> Result<String, PdfError>;

    /// New document holding the given zero-based pages, in source order.
    fn sub_document(&self, pages: &[usize]) -> Result<Self::Document, PdfError>;
}

/// A per-policy document that can be password protected and serialized.
pub trait PolicyDocument {
    fn encrypt(&mut self, password: &str) -> Result<(), PdfError>;

    fn to_bytes(&mut self) -> Result<Vec<u8>, PdfError>;
}

/// Source PDF fully read into memory. The file handle is released by `load`.
pub struct LopdfSource {
    doc: Document,
    /// 1-based lopdf page numbers, in page order.
    page_numbers: Vec<u32>,
}

impl LopdfSource {
    pub fn load(path: &Path) -> Result<Self, PdfError> {
        if !path.exists() {
            return Err(PdfError::Load {
                path: path.to_path_buf(),
                reason: "File not found.".to_string(),
            });
        }
        let doc = Document::load(path).map_err(|e| PdfError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_document(doc))
    }

    pub fn from_document(doc: Document) -> Self {
        let page_numbers = doc.get_pages().keys().copied().collect();
        Self { doc, page_numbers }
    }

    fn page_number(&self, index: usize) -> Result<u32, PdfError> {
        self.page_numbers
            .get(index)
            .copied()
            .ok_or(PdfError::PageOutOfRange {
                index,
                count: self.page_numbers.len(),
            })
    }
}

impl PdfSource for LopdfSource {
    type Document = LopdfPolicyDocument;

    fn page_count(&self) -> usize {
        self.page_numbers.len()
    }

    fn page_text(&self, index: usize) -> Result<String, PdfError> {
        let number = self.page_number(index)?;
        self.doc.extract_text(&[number]).map_err(|e| PdfError::Text {
            index,
            reason: e.to_string(),
        })
    }

    fn sub_document(&self, pages: &[usize]) -> Result<LopdfPolicyDocument, PdfError> {
        if pages.is_empty() {
            return Err(PdfError::Build("no pages selected".to_string()));
        }
        let keep = pages
            .iter()
            .map(|&i| self.page_number(i))
            .collect::<Result<BTreeSet<u32>, _>>()?;
        let removed: Vec<u32> = self
            .page_numbers
            .iter()
            .copied()
            .filter(|n| !keep.contains(n))
            .collect();

        let mut doc = self.doc.clone();
        doc.delete_pages(&removed);
        doc.prune_objects();
        doc.renumber_objects();
        doc.compress();
        if doc.trailer.get(b"ID").is_err() {
            let id = Object::String(file_id(pages), StringFormat::Hexadecimal);
            doc.trailer.set("ID", Object::Array(vec![id.clone(), id]));
        }
        debug!(pages = ?pages, removed = removed.len(), "built sub-document");
        Ok(LopdfPolicyDocument { doc })
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a over the page indices as little-endian u64s.
fn fnv1a<'a>(pages: impl Iterator<Item = &'a usize>) -> u64 {
    pages
        .flat_map(|&p| (p as u64).to_le_bytes())
        .fold(FNV_OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME))
}

/// 16-byte file identifier computed from the page selection alone: FNV-1a of
/// the indices in order, then in reverse. Same pages give the same bytes on
/// every platform and toolchain.
fn file_id(pages: &[usize]) -> Vec<u8> {
    let forward = fnv1a(pages.iter());
    let backward = fnv1a(pages.iter().rev());
    [forward.to_be_bytes(), backward.to_be_bytes()].concat()
}

pub struct LopdfPolicyDocument {
    doc: Document,
}

impl LopdfPolicyDocument {
    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }
}

impl PolicyDocument for LopdfPolicyDocument {
    fn encrypt(&mut self, password: &str) -> Result<(), PdfError> {
        let version = EncryptionVersion::V2 {
            document: &self.doc,
            owner_password: password,
            user_password: password,
            key_length: KEY_LENGTH,
            permissions: Permissions::all(),
        };
        let state = EncryptionState::try_from(version).map_err(|e| PdfError::Encrypt(e.to_string()))?;
        self.doc
            .encrypt(&state)
            .map_err(|e| PdfError::Encrypt(e.to_string()))
    }

    fn to_bytes(&mut self) -> Result<Vec<u8>, PdfError> {
        let mut buf = Vec::new();
        self.doc
            .save_to(&mut buf)
            .map_err(|e| PdfError::Save(e.to_string()))?;
        Ok(buf)
    }
}

/// Source document with per-page text extracted lazily and cached once.
pub struct SourceDocument<S> {
    source: S,
    texts: Vec<OnceCell<Option<String>>>,
}

impl<S: PdfSource> SourceDocument<S> {
    pub fn new(source: S) -> Self {
        let texts = (0..source.page_count()).map(|_| OnceCell::new()).collect();
        Self { source, texts }
    }

    pub fn page_count(&self) -> usize {
        self.texts.len()
    }

    /// Text of a page, or `None` when extraction failed. Failures are logged
    /// once per page and never abort the scan.
    pub fn page_text(&self, index: usize) -> Option<&str> {
        let cell = self.texts.get(index)?;
        cell.get_or_init(|| match self.source.page_text(index) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(page = index, error = %e, "page text extraction failed, treating page as tokenless");
                None
            }
        })
        .as_deref()
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

/// Result of merging the print-bound documents.
pub struct MergeOutcome {
    pub document: Document,
    pub merged: Vec<PathBuf>,
    pub skipped: Vec<(PathBuf, String)>,
    pub page_count: usize,
}

/// Merge PDF files in the given order. Unreadable or empty inputs are skipped.
pub fn merge_files(paths: &[PathBuf]) -> Result<MergeOutcome, PdfError> {
    let mut documents = Vec::new();
    let mut merged = Vec::new();
    let mut skipped = Vec::new();
    for (i, path) in paths.iter().enumerate() {
        if i % 50 == 0 || i + 1 == paths.len() {
            debug!("merging {}/{}: {}", i + 1, paths.len(), path.display());
        }
        match Document::load(path) {
            Ok(doc) if doc.get_pages().is_empty() => {
                warn!(file = %path.display(), "skipping PDF without pages");
                skipped.push((path.clone(), "no pages".to_string()));
            }
            Ok(doc) => {
                documents.push(doc);
                merged.push(path.clone());
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping unreadable PDF");
                skipped.push((path.clone(), e.to_string()));
            }
        }
    }
    if documents.is_empty() {
        return Err(PdfError::Merge("No PDFs could be merged".to_string()));
    }
    let document = merge_documents(documents)?;
    let page_count = document.get_pages().len();
    Ok(MergeOutcome {
        document,
        merged,
        skipped,
        page_count,
    })
}

/// Concatenate documents into one page tree. Pages keep document order, then page order.
pub fn merge_documents(documents: Vec<Document>) -> Result<Document, PdfError> {
    let mut max_id = 1;
    let mut pages: Vec<(ObjectId, Object)> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for mut doc in documents {
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;
        for (_, page_id) in doc.get_pages() {
            let page = doc
                .get_object(page_id)
                .map_err(|e| PdfError::Merge(e.to_string()))?
                .to_owned();
            pages.push((page_id, page));
        }
        objects.extend(doc.objects);
    }

    let mut merged = Document::with_version("1.5");
    let mut catalog: Option<(ObjectId, Object)> = None;
    let mut page_tree: Option<(ObjectId, Object)> = None;

    for (object_id, object) in objects {
        let type_name = object.type_name().map(|t| t.to_vec()).unwrap_or_default();
        match type_name.as_slice() {
            b"Catalog" => {
                if catalog.is_none() {
                    catalog = Some((object_id, object));
                }
            }
            b"Pages" => {
                if let Ok(dict) = object.as_dict() {
                    let mut dict = dict.clone();
                    if let Some((_, previous)) = &page_tree {
                        if let Ok(previous) = previous.as_dict() {
                            dict.extend(previous);
                        }
                    }
                    let id = page_tree.as_ref().map(|(id, _)| *id).unwrap_or(object_id);
                    page_tree = Some((id, Object::Dictionary(dict)));
                }
            }
            b"Page" | b"Outlines" | b"Outline" => {}
            _ => {
                merged.objects.insert(object_id, object);
            }
        }
    }

    let (pages_id, pages_object) =
        page_tree.ok_or_else(|| PdfError::Merge("page tree root not found".to_string()))?;
    let (catalog_id, catalog_object) =
        catalog.ok_or_else(|| PdfError::Merge("catalog not found".to_string()))?;

    let kids: Vec<Object> = pages.iter().map(|(id, _)| Object::Reference(*id)).collect();
    let count = pages.len() as i64;
    for (page_id, page) in pages {
        if let Ok(dict) = page.as_dict() {
            let mut dict = dict.clone();
            dict.set("Parent", pages_id);
            merged.objects.insert(page_id, Object::Dictionary(dict));
        }
    }
    if let Ok(dict) = pages_object.as_dict() {
        let mut dict = dict.clone();
        dict.remove(b"Parent");
        dict.set("Count", count);
        dict.set("Kids", kids);
        merged.objects.insert(pages_id, Object::Dictionary(dict));
    }
    if let Ok(dict) = catalog_object.as_dict() {
        let mut dict = dict.clone();
        dict.set("Pages", pages_id);
        dict.remove(b"Outlines");
        merged.objects.insert(catalog_id, Object::Dictionary(dict));
    }
    merged.trailer.set("Root", catalog_id);
    merged.max_id = merged.objects.len() as u32;
    merged.renumber_objects();
    merged.compress();
    Ok(merged)
}

/// Small text-only PDFs for tests, one Courier line per page.
#[doc(hidden)]
pub mod fixtures {
    use crate::error::PdfError;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    pub fn text_pdf(pages: &[&str]) -> Result<Document, PdfError> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let encoded = content.encode().map_err(|e| PdfError::Build(e.to_string()))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(page_id.into());
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        Ok(doc)
    }

    pub fn text_pdf_bytes(pages: &[&str]) -> Result<Vec<u8>, PdfError> {
        let mut doc = text_pdf(pages)?;
        let mut buf = Vec::new();
        doc.save_to(&mut buf).map_err(|e| PdfError::Save(e.to_string()))?;
        Ok(buf)
    }
}
